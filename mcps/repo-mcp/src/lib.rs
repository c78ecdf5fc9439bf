//! Repo MCP Library
//!
//! Repository tools for an AI assistant: contained file reads and writes,
//! whitelisted manifest scripts, test and lint runs, and git inspection.
//! Writes stay off unless the server was started with `ENABLE_MCP_FILE_WRITE`.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use repo_mcp::{RepoMcpServer, ToolCall};
//!
//! let server = RepoMcpServer::from_env()?;
//! let result = server.registry().dispatch(ToolCall::new("git_log", json!({"max": 5}))).await;
//! println!("{}", result.text);
//! ```

pub mod guard;
pub mod params;
pub mod registry;
pub mod runner;
pub mod scripts;
pub mod server;
pub mod types;
pub mod vcs;

pub use guard::{PathGuard, Root};
pub use registry::{ToolKind, ToolRegistry, MAX_READ_BYTES};
pub use server::RepoMcpServer;
pub use types::{Config, FeatureGate, ToolCall, ToolError, ToolResult};

// Re-export parameter types for direct API usage
pub use params::*;
