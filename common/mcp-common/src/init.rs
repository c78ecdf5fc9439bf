//! Process start-up helpers
//!
//! Tracing goes to stderr because stdout belongs to the MCP protocol (and the
//! stop controller keeps the same convention so both binaries log alike).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for one of the repo tools
///
/// Every name in `targets` gets an `info` directive on top of whatever
/// `RUST_LOG` asks for. `LOG_FORMAT=json` switches to one JSON object per line.
///
/// ```rust,ignore
/// mcp_common::init_tracing(&["repo_mcp", "mcp_common"])?;
/// ```
pub fn init_tracing(targets: &[&str]) -> anyhow::Result<()> {
    let mut filter = EnvFilter::from_default_env();
    for target in targets {
        filter = filter.add_directive(format!("{}=info", target).parse()?);
    }

    let registry = tracing_subscriber::registry().with(filter);

    if json_requested() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

fn json_requested() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Generate `main` for a stdio MCP server
///
/// `$ctor` is any path to a function returning `anyhow::Result<Server>` (or a
/// result whose error converts into `anyhow::Error`), so construction
/// failures surface as a non-zero exit instead of a panic.
///
/// ```rust,ignore
/// mcp_common::serve_stdio!(RepoMcpServer::from_env, "repo_mcp");
/// ```
#[macro_export]
macro_rules! serve_stdio {
    ($ctor:path, $crate_name:expr) => {
        #[tokio::main]
        async fn main() -> anyhow::Result<()> {
            use rmcp::ServiceExt;

            $crate::init_tracing(&[$crate_name, "mcp_common"])?;

            tracing::info!(concat!("Starting ", $crate_name, " MCP Server"));

            let server = $ctor()?;
            let service = server.serve(rmcp::transport::stdio()).await?;

            tracing::info!("Server running, waiting for requests...");

            service.waiting().await?;

            tracing::info!("Server shutting down");
            Ok(())
        }
    };
}
