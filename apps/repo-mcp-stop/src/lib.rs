//! Repo MCP Stop
//!
//! Stops a background `repo-mcp` server. The pid in `.repo-mcp.pid` gets a
//! SIGTERM, then a SIGKILL if it outlives the grace window. With no record at
//! all, processes launched as `repo-mcp serve-stdio` are terminated instead.
//!
//! ```rust,ignore
//! use repo_mcp_stop::{OsProcesses, StopConfig, StopController};
//!
//! let outcome = StopController::new(StopConfig::default(), OsProcesses).stop();
//! std::process::exit(outcome.exit_code());
//! ```

pub mod controller;
pub mod process;
pub mod record;

pub use controller::{StopConfig, StopController, StopOutcome};
pub use process::{OsProcesses, ProcessControl, StopSignal};
pub use record::{ProcessRecord, RecordError, RecordState};
