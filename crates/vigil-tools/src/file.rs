use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::call::ToolArgs;
use crate::descriptor::{ExecContext, ToolDescriptor, ToolHandler, deserialize_args};
use crate::error::ToolError;

const GREP_MATCH_LIMIT: usize = 100;
const IGNORED_DIRS: &[&str] = &[".git", "target", "node_modules", ".hg"];

/// Sandbox shared by the file-system tools. Paths outside the allowed
/// roots are policy rejections, not I/O failures.
#[derive(Debug, Clone)]
pub struct Workspace {
    allowed_paths: Vec<PathBuf>,
}

impl Workspace {
    #[must_use]
    pub fn new(allowed_paths: Vec<PathBuf>) -> Self {
        let paths = if allowed_paths.is_empty() {
            vec![std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))]
        } else {
            allowed_paths
        };
        Self {
            allowed_paths: paths
                .into_iter()
                .map(|p| p.canonicalize().unwrap_or(p))
                .collect(),
        }
    }

    fn validate_path(&self, path: &Path) -> Result<PathBuf, ToolError> {
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(path)
        };
        let canonical = resolve_via_ancestors(&resolved);
        if !self.allowed_paths.iter().any(|a| canonical.starts_with(a)) {
            return Err(ToolError::SandboxViolation {
                path: canonical.display().to_string(),
            });
        }
        Ok(canonical)
    }

    fn contains(&self, path: &Path) -> bool {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.allowed_paths.iter().any(|a| canonical.starts_with(a))
    }
}

/// Canonicalize a path by walking up to the nearest existing ancestor,
/// so not-yet-created files still resolve for the sandbox check.
fn resolve_via_ancestors(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut suffix = PathBuf::new();
    while !existing.exists() {
        if let Some(parent) = existing.parent() {
            if let Some(name) = existing.file_name() {
                suffix = if suffix.as_os_str().is_empty() {
                    PathBuf::from(name)
                } else {
                    PathBuf::from(name).join(&suffix)
                };
            }
            existing = parent;
        } else {
            break;
        }
    }
    let base = existing.canonicalize().unwrap_or(existing.to_path_buf());
    if suffix.as_os_str().is_empty() {
        base
    } else {
        base.join(&suffix)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadParams {
    pub path: String,
    /// Zero-based line to start from.
    #[serde(default)]
    pub offset: Option<u64>,
    /// Maximum number of lines returned.
    #[serde(default)]
    pub limit: Option<u64>,
}

pub struct FileReadTool {
    workspace: Workspace,
}

impl FileReadTool {
    #[must_use]
    pub fn descriptor(workspace: Workspace) -> ToolDescriptor {
        ToolDescriptor::new(
            "file_read",
            "Read a file, returning numbered lines",
            schemars::schema_for!(ReadParams),
            Arc::new(Self { workspace }),
        )
    }
}

impl ToolHandler for FileReadTool {
    fn execute(
        &self,
        args: ToolArgs,
        _ctx: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let params: ReadParams = deserialize_args(&args)?;
            let path = self.workspace.validate_path(Path::new(&params.path))?;
            let content = std::fs::read_to_string(&path)?;

            #[allow(clippy::cast_possible_truncation)]
            let offset = params.offset.unwrap_or(0) as usize;
            #[allow(clippy::cast_possible_truncation)]
            let limit = params.limit.map_or(usize::MAX, |l| l as usize);

            let selected: Vec<String> = content
                .lines()
                .skip(offset)
                .take(limit)
                .enumerate()
                .map(|(i, line)| format!("{:>4}\t{line}", offset + i + 1))
                .collect();
            Ok(selected.join("\n"))
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteParams {
    pub path: String,
    pub content: String,
}

pub struct FileWriteTool {
    workspace: Workspace,
}

impl FileWriteTool {
    #[must_use]
    pub fn descriptor(workspace: Workspace) -> ToolDescriptor {
        ToolDescriptor::new(
            "file_write",
            "Write content to a file, creating parent directories",
            schemars::schema_for!(WriteParams),
            Arc::new(Self { workspace }),
        )
        .mutating()
    }
}

impl ToolHandler for FileWriteTool {
    fn execute(
        &self,
        args: ToolArgs,
        _ctx: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let params: WriteParams = deserialize_args(&args)?;
            // Write through the validated path, never the raw one, so
            // the checked location and the written location agree.
            let path = self.workspace.validate_path(Path::new(&params.path))?;

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &params.content)?;
            Ok(format!(
                "Wrote {} bytes to {}",
                params.content.len(),
                params.path
            ))
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditParams {
    pub path: String,
    pub old_string: String,
    pub new_string: String,
}

pub struct FileEditTool {
    workspace: Workspace,
}

impl FileEditTool {
    #[must_use]
    pub fn descriptor(workspace: Workspace) -> ToolDescriptor {
        ToolDescriptor::new(
            "file_edit",
            "Replace the first occurrence of a string in a file",
            schemars::schema_for!(EditParams),
            Arc::new(Self { workspace }),
        )
        .mutating()
    }
}

impl ToolHandler for FileEditTool {
    fn execute(
        &self,
        args: ToolArgs,
        _ctx: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let params: EditParams = deserialize_args(&args)?;
            let path = self.workspace.validate_path(Path::new(&params.path))?;

            let content = std::fs::read_to_string(&path)?;
            if !content.contains(&params.old_string) {
                return Err(ToolError::Execution(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("old_string not found in {}", params.path),
                )));
            }

            let new_content = content.replacen(&params.old_string, &params.new_string, 1);
            std::fs::write(&path, &new_content)?;
            Ok(format!("Edited {}", params.path))
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GlobParams {
    pub pattern: String,
}

pub struct GlobTool {
    workspace: Workspace,
}

impl GlobTool {
    #[must_use]
    pub fn descriptor(workspace: Workspace) -> ToolDescriptor {
        ToolDescriptor::new(
            "glob",
            "List files matching a glob pattern",
            schemars::schema_for!(GlobParams),
            Arc::new(Self { workspace }),
        )
    }
}

impl ToolHandler for GlobTool {
    fn execute(
        &self,
        args: ToolArgs,
        _ctx: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let params: GlobParams = deserialize_args(&args)?;
            let matches: Vec<String> = glob::glob(&params.pattern)
                .map_err(|e| ToolError::InvalidArguments {
                    message: e.to_string(),
                })?
                .filter_map(Result::ok)
                .filter(|p| self.workspace.contains(p))
                .map(|p| p.display().to_string())
                .collect();

            if matches.is_empty() {
                Ok(format!("No files matching: {}", params.pattern))
            } else {
                Ok(matches.join("\n"))
            }
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GrepParams {
    pub pattern: String,
    /// Directory or file to search. Defaults to the current directory.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub case_sensitive: Option<bool>,
}

pub struct GrepTool {
    workspace: Workspace,
}

impl GrepTool {
    #[must_use]
    pub fn descriptor(workspace: Workspace) -> ToolDescriptor {
        ToolDescriptor::new(
            "grep",
            "Search file contents recursively with a regex",
            schemars::schema_for!(GrepParams),
            Arc::new(Self { workspace }),
        )
    }
}

impl ToolHandler for GrepTool {
    fn execute(
        &self,
        args: ToolArgs,
        _ctx: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let params: GrepParams = deserialize_args(&args)?;
            let search_path = params.path.as_deref().unwrap_or(".");
            let path = self.workspace.validate_path(Path::new(search_path))?;

            let regex = regex::RegexBuilder::new(&params.pattern)
                .case_insensitive(!params.case_sensitive.unwrap_or(true))
                .build()
                .map_err(|e| ToolError::InvalidArguments {
                    message: e.to_string(),
                })?;

            let mut results = Vec::new();
            grep_recursive(&path, &regex, &mut results, GREP_MATCH_LIMIT)?;

            if results.is_empty() {
                Ok(format!("No matches for: {}", params.pattern))
            } else {
                Ok(results.join("\n"))
            }
        })
    }
}

fn grep_recursive(
    path: &Path,
    regex: &regex::Regex,
    results: &mut Vec<String>,
    limit: usize,
) -> Result<(), ToolError> {
    if results.len() >= limit {
        return Ok(());
    }
    if path.is_file() {
        if let Ok(content) = std::fs::read_to_string(path) {
            for (i, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    results.push(format!("{}:{}: {line}", path.display(), i + 1));
                    if results.len() >= limit {
                        return Ok(());
                    }
                }
            }
        }
    } else if path.is_dir() {
        let entries = std::fs::read_dir(path)?;
        for entry in entries.flatten() {
            let p = entry.path();
            let name = p.file_name().and_then(|n| n.to_str());
            if name.is_some_and(|n| n.starts_with('.') || IGNORED_DIRS.contains(&n)) {
                continue;
            }
            grep_recursive(&p, regex, results, limit)?;
        }
    }
    Ok(())
}
