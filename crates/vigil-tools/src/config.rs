use serde::Deserialize;

/// Tool-layer configuration, embedded in the binary's config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Per-call execution deadline in seconds.
    pub timeout: u64,
    /// Paths tools may touch. Empty means the current directory.
    pub allowed_paths: Vec<String>,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    /// "stdout" or a file path.
    pub destination: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout: 120,
            allowed_paths: Vec::new(),
            audit: AuditConfig::default(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            destination: "stdout".into(),
        }
    }
}
