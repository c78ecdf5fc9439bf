//! Parameter types for repo-mcp tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FileReadParams {
    #[schemars(description = "File path relative to the repository root")]
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FileWriteParams {
    #[schemars(description = "File path relative to the repository root")]
    pub path: String,

    #[schemars(description = "Full new content of the file")]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RunScriptParams {
    #[schemars(description = "Name of a script declared in the project manifest")]
    pub script: String,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GitLogParams {
    #[schemars(description = "Maximum number of commits to return (default: 10)")]
    #[serde(default)]
    pub max: Option<usize>,
}
