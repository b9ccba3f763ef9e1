use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use vigil_tools::ToolsConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9300,
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Path to a rule document. The built-in rules apply when unset.
    pub rules_path: Option<String>,
    /// Overrides the rule document's interactive default when set.
    pub interactive: Option<bool>,
}

impl Config {
    /// Loads configuration from a TOML file, falling back to defaults
    /// when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VIGIL_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("VIGIL_PORT")
            && let Ok(port) = v.parse()
        {
            self.server.port = port;
        }
        if let Ok(v) = std::env::var("VIGIL_AUTH_TOKEN") {
            self.server.auth_token = Some(v);
        }
        if let Ok(v) = std::env::var("VIGIL_RULES_PATH") {
            self.policy.rules_path = Some(v);
        }
    }

    /// # Errors
    ///
    /// Returns an error when a field holds an unusable value.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.tools.timeout == 0 {
            anyhow::bail!("tools.timeout must be at least 1 second");
        }
        Ok(())
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
