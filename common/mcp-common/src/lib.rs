//! MCP Common - shared plumbing for the repo tools
//!
//! - **Initialization**: [`init_tracing`] and the `serve_stdio!` macro
//! - **Results**: text envelopes, which is all the repo tools return
//! - **Embeddable**: [`EmbeddableMcp`] for calling tools in-process
//!
//! ```rust,ignore
//! // main.rs of a server
//! mcp_common::serve_stdio!(RepoMcpServer::from_env, "repo_mcp");
//! ```

pub mod embeddable;
pub mod init;
pub mod result;

// Re-export commonly used items at crate root
pub use embeddable::{EmbeddableError, EmbeddableMcp, EmbeddableResult};
pub use init::init_tracing;
pub use result::{json_text, result_text, text_result};

// Re-export rmcp types that are commonly needed
pub use rmcp::{
    model::{CallToolResult, Content, Tool},
    ErrorData as McpError,
};

// Re-export async_trait for implementing EmbeddableMcp
pub use async_trait::async_trait;
