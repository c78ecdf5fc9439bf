//! MCP Server implementation for repository tools
//!
//! Each `#[tool]` method decodes its parameters through rmcp and hands off to
//! the [`ToolRegistry`]; the registry owns every policy decision.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mcp_common::{
    async_trait, text_result, CallToolResult, EmbeddableError, EmbeddableMcp, EmbeddableResult,
    McpError, Tool,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use serde_json::Value;

use crate::guard::Root;
use crate::params::*;
use crate::registry::{ToolKind, ToolRegistry};
use crate::types::{Config, FeatureGate, ToolCall, ToolOutcome};

/// Env var pointing at an explicit config file
pub const CONFIG_ENV: &str = "REPO_MCP_CONFIG_PATH";

/// Config file looked up in the root
pub const LOCAL_CONFIG: &str = "repo-mcp.toml";

#[derive(Clone)]
pub struct RepoMcpServer {
    registry: Arc<ToolRegistry>,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Tool Router
// ============================================================================

#[tool_router]
impl RepoMcpServer {
    /// Server rooted at the current directory
    ///
    /// The write gate is taken from `ENABLE_MCP_FILE_WRITE` here and nowhere else.
    /// Config is searched in order:
    /// 1. `REPO_MCP_CONFIG_PATH` env var
    /// 2. `<root>/repo-mcp.toml`
    /// 3. `$XDG_CONFIG_HOME/repo-mcp/config.toml`
    /// 4. Default config if none found
    pub fn from_env() -> anyhow::Result<Self> {
        let root = Root::current()?;
        let config = load_config(&root);
        let gate = FeatureGate::from_env();

        tracing::info!(
            root = %root.as_path().display(),
            writes_enabled = gate.allows_write(),
            manifest = %config.scripts.manifest,
            "Repository tools ready"
        );

        Ok(Self::with_registry(ToolRegistry::for_root(root, &config, gate)))
    }

    pub fn with_registry(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            tool_router: Self::tool_router(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[tool(description = "Read a UTF-8 text file inside the repository (files over 200KB are refused)")]
    async fn file_read(
        &self,
        Parameters(params): Parameters<FileReadParams>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self.registry.file_read(params).await;
        Ok(respond(ToolKind::FileRead, outcome))
    }

    #[tool(description = "Write a file inside the repository, replacing its content. Only available when the server was started with ENABLE_MCP_FILE_WRITE")]
    async fn file_write(
        &self,
        Parameters(params): Parameters<FileWriteParams>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self.registry.file_write(params).await;
        Ok(respond(ToolKind::FileWrite, outcome))
    }

    #[tool(description = "Run a script declared in the project manifest by name (package.json scripts run via npm run). Output starts with the exit code")]
    async fn run_script(
        &self,
        Parameters(params): Parameters<RunScriptParams>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self.registry.run_script(params).await;
        Ok(respond(ToolKind::RunScript, outcome))
    }

    #[tool(description = "Run the project's test suite (npm run test). Output starts with the exit code")]
    async fn run_tests(&self) -> Result<CallToolResult, McpError> {
        let outcome = self.registry.run_tests().await;
        Ok(respond(ToolKind::RunTests, outcome))
    }

    #[tool(description = "Run the project's linter (npm run lint). Output starts with the exit code")]
    async fn lint(&self) -> Result<CallToolResult, McpError> {
        let outcome = self.registry.lint().await;
        Ok(respond(ToolKind::Lint, outcome))
    }

    #[tool(description = "Show working tree status: branch, staged, modified, untracked and conflicted files")]
    async fn git_status(&self) -> Result<CallToolResult, McpError> {
        let outcome = self.registry.git_status().await;
        Ok(respond(ToolKind::GitStatus, outcome))
    }

    #[tool(description = "Show recent commits, newest first")]
    async fn git_log(
        &self,
        Parameters(params): Parameters<GitLogParams>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self.registry.git_log(params).await;
        Ok(respond(ToolKind::GitLog, outcome))
    }
}

fn respond(kind: ToolKind, outcome: ToolOutcome) -> CallToolResult {
    text_result(ToolRegistry::render(kind, outcome).text)
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for RepoMcpServer {
    fn get_info(&self) -> ServerInfo {
        let write_note = if self.registry.gate().allows_write() {
            "file_write is enabled."
        } else {
            "file_write is disabled; restart with ENABLE_MCP_FILE_WRITE=1 to enable it."
        };

        ServerInfo {
            instructions: Some(format!(
                "Repository tools scoped to {}. Paths are relative to the repository root and \
                 may not leave it. Scripts are run by name from the project manifest only. {}",
                self.registry.root().as_path().display(),
                write_note
            )),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Embeddable
// ============================================================================

#[async_trait]
impl EmbeddableMcp for RepoMcpServer {
    fn server_name(&self) -> &str {
        "repo"
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    async fn call_text(&self, name: &str, params: Value) -> EmbeddableResult<String> {
        if ToolKind::from_name(name).is_none() {
            return Err(EmbeddableError::ToolNotFound(name.to_string()));
        }
        let result = self.registry.dispatch(ToolCall::new(name, params)).await;
        Ok(result.text)
    }
}

// ============================================================================
// Config loading
// ============================================================================

fn load_config(root: &Root) -> Config {
    // 1. REPO_MCP_CONFIG_PATH
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            if let Some(config) = read_config(&path) {
                tracing::info!("Loaded config from {}={}", CONFIG_ENV, path.display());
                return config;
            }
        } else {
            tracing::warn!("{}={} does not exist", CONFIG_ENV, env_path);
        }
    }

    // 2. <root>/repo-mcp.toml, 3. $XDG_CONFIG_HOME/repo-mcp/config.toml
    let mut config_paths = vec![root.join(LOCAL_CONFIG)];
    if let Some(config_dir) = dirs::config_dir() {
        config_paths.push(config_dir.join("repo-mcp").join("config.toml"));
    }

    for path in config_paths {
        if path.exists() {
            if let Some(config) = read_config(&path) {
                tracing::info!("Loaded config from {}", path.display());
                return config;
            }
        }
    }

    tracing::info!("Using default configuration");
    Config::default()
}

fn read_config(path: &Path) -> Option<Config> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Failed to read config {}: {}", path.display(), e);
            return None;
        }
    };
    match toml::from_str::<Config>(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Failed to parse config {}: {}", path.display(), e);
            None
        }
    }
}
