//! Type definitions for repo-mcp

use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Configuration Types
// ============================================================================

/// File-backed configuration
///
/// The write gate is deliberately absent: it comes from the environment
/// (see [`FeatureGate`]) so it cannot be flipped by a file inside the repo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exec: ExecConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Shell used to run `[scripts]` table command lines (`<shell> -c <line>`)
    #[serde(default = "default_shell")]
    pub shell: String,
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Manifest path relative to the root; `.json` reads `"scripts"` and runs them
    /// with `npm run`, `.toml` reads `[scripts]` and runs them with the shell
    #[serde(default = "default_manifest")]
    pub manifest: String,
}

fn default_manifest() -> String {
    "package.json".to_string()
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
        }
    }
}

/// Whether write-type tools may touch the filesystem
///
/// Read once when the server starts and handed to the registry; never
/// consulted again from the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureGate {
    write_enabled: bool,
}

impl FeatureGate {
    pub const WRITE_ENV: &'static str = "ENABLE_MCP_FILE_WRITE";

    pub fn from_env() -> Self {
        Self::from_flag(std::env::var(Self::WRITE_ENV).ok().as_deref())
    }

    /// Unset, empty, `0`, `false`, `no` and `off` keep writes disabled
    pub fn from_flag(value: Option<&str>) -> Self {
        let write_enabled = match value.map(str::trim) {
            None | Some("") => false,
            Some(v) => !matches!(
                v.to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            ),
        };
        Self { write_enabled }
    }

    pub fn writes_enabled() -> Self {
        Self {
            write_enabled: true,
        }
    }

    pub fn allows_write(&self) -> bool {
        self.write_enabled
    }
}

// ============================================================================
// Call Types
// ============================================================================

/// One tool invocation as it arrives from a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// The uniform text envelope every call resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub text: String,
}

/// What a handler produced before it is flattened into a [`ToolResult`]
pub type ToolOutcome = Result<String, ToolError>;

impl From<ToolOutcome> for ToolResult {
    fn from(outcome: ToolOutcome) -> Self {
        let text = match outcome {
            Ok(text) => text,
            Err(err) => err.to_string(),
        };
        Self { text }
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Exit code plus interleaved stdout/stderr of a finished child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output: String,
}

impl CommandOutput {
    /// Exit code as the leading token, then a blank line, then the output
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.exit_code, self.output)
    }
}

/// Response for git_status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub branch: Option<String>,
    pub head_commit: Option<String>,
    pub is_clean: bool,
    pub staged: Vec<FileStatus>,
    pub modified: Vec<FileStatus>,
    pub untracked: Vec<String>,
    pub conflicted: Vec<String>,
}

/// Status of a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStatus {
    pub path: String,
    pub status: String, // "new", "modified", "deleted", "renamed", "typechange"
    pub old_path: Option<String>,
}

/// One entry of git_log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub short_id: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub date: DateTime<Utc>,
    pub parent_ids: Vec<String>,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
#[error("Path outside repo not allowed: {requested}")]
pub struct PathEscapeError {
    pub requested: String,
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Script '{name}' not found in {manifest}")]
    ScriptNotFound { name: String, manifest: String },

    #[error("cannot read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse {}: {detail}", .path.display())]
    Malformed { path: PathBuf, detail: String },
}

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("not a git repository: {0}")]
    RepoNotFound(String),

    #[error(transparent)]
    Git(#[from] git2::Error),
}

/// Every way a tool call can fail; the display text is what the caller sees
#[derive(Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    PathEscape(#[from] PathEscapeError),

    #[error("File too large to return (>{limit_kb}KB)")]
    TooLarge { size: u64, limit_kb: u64 },

    #[error("Error reading file: {0}")]
    Read(#[source] io::Error),

    #[error("file_write is disabled on this server")]
    WriteDisabled,

    #[error("Error writing file: {0}")]
    Write(#[source] io::Error),

    #[error("Script '{name}' not found in {manifest}")]
    ScriptNotFound { name: String, manifest: String },

    #[error("Error running script: {0}")]
    Manifest(#[source] ManifestError),

    #[error("Error running {task}: {source}")]
    Execution {
        task: &'static str,
        #[source]
        source: ExecError,
    },

    #[error("Error getting git {query}: {source}")]
    Vcs {
        query: &'static str,
        #[source]
        source: VcsError,
    },

    #[error("Error encoding result: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid arguments for {tool}: {detail}")]
    InvalidArguments { tool: String, detail: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl From<ManifestError> for ToolError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::ScriptNotFound { name, manifest } => {
                ToolError::ScriptNotFound { name, manifest }
            }
            other => ToolError::Manifest(other),
        }
    }
}
