use anyhow::Result;
use clap::Parser;

use repo_mcp_stop::{OsProcesses, StopConfig, StopController};

/// Stop a background repo-mcp server started from this directory
///
/// Exits 0 when a server was stopped, 1 otherwise.
#[derive(Parser)]
#[command(name = "repo-mcp-stop", version, about)]
struct Cli {}

fn main() -> Result<()> {
    let _cli = Cli::parse();
    mcp_common::init_tracing(&["repo_mcp_stop"])?;

    let outcome = StopController::new(StopConfig::default(), OsProcesses).stop();
    std::process::exit(outcome.exit_code());
}
