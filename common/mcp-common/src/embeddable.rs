//! In-process tool calls
//!
//! [`EmbeddableMcp`] lets a host (or a test) call a server's tools by name
//! without a stdio transport. The repo tools only ever answer with text, so
//! the trait is text-first and wraps into `CallToolResult` on demand.

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};
use serde_json::Value;

use crate::result::text_result;

/// Errors raised before a tool gets to run
///
/// Anything that goes wrong *inside* a tool, including undecodable
/// arguments, is reported in its text instead.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddableError {
    /// No tool is registered under this name
    #[error("tool not found: {0}")]
    ToolNotFound(String),
}

/// Result type for embeddable calls
pub type EmbeddableResult<T> = Result<T, EmbeddableError>;

/// A server whose tools can be driven directly from Rust
#[async_trait]
pub trait EmbeddableMcp: Send + Sync {
    /// Name used in MCP client configuration
    fn server_name(&self) -> &str;

    /// Every tool the server exposes, with its input schema
    fn list_tools(&self) -> Vec<Tool>;

    /// Run a tool and return its text payload
    async fn call_text(&self, name: &str, params: Value) -> EmbeddableResult<String>;

    /// Run a tool and wrap the payload the way the stdio transport would
    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
        let text = self.call_text(name, params).await?;
        Ok(text_result(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::result_text;

    struct EchoServer;

    #[async_trait]
    impl EmbeddableMcp for EchoServer {
        fn server_name(&self) -> &str {
            "echo"
        }

        fn list_tools(&self) -> Vec<Tool> {
            vec![]
        }

        async fn call_text(&self, name: &str, params: Value) -> EmbeddableResult<String> {
            match name {
                "echo" => Ok(params.to_string()),
                other => Err(EmbeddableError::ToolNotFound(other.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_call_tool_wraps_text() {
        let result = EchoServer
            .call_tool("echo", serde_json::json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(result_text(&result), r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_error() {
        let result = EchoServer.call_tool("nope", Value::Null).await;
        assert!(matches!(result, Err(EmbeddableError::ToolNotFound(name)) if name == "nope"));
    }
}
