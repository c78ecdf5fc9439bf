//! Repo MCP - repository tools over stdio
//!
//! Serves the current directory. Arguments are ignored, so launchers may
//! start it as `repo-mcp serve-stdio`.

use repo_mcp::RepoMcpServer;

mcp_common::serve_stdio!(RepoMcpServer::from_env, "repo_mcp");
