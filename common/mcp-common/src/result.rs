//! Result envelope helpers
//!
//! The repo tools answer every call with a single text item; failures are
//! described in that text rather than through MCP error codes.

use rmcp::model::{CallToolResult, Content, RawContent};
use serde::Serialize;

/// Wrap a text payload in a successful `CallToolResult`
pub fn text_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Pretty-print structured data for a text payload
pub fn json_text<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

/// Pull the text back out of a result produced by [`text_result`]
///
/// Returns an empty string when the first content item is not text.
pub fn result_text(result: &CallToolResult) -> String {
    result
        .content
        .first()
        .and_then(|content| match &content.raw {
            RawContent::Text(text) => Some(text.text.clone()),
            _ => None,
        })
        .unwrap_or_default()
}
