//! Tool registry
//!
//! Maps tool names to handlers and applies the two policy knobs (the write
//! gate and the read ceiling) before any I/O. Handlers return a typed
//! [`ToolOutcome`]; it only becomes plain text at the edge, in [`ToolRegistry::render`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::AsyncReadExt;

use crate::guard::{PathGuard, Root};
use crate::params::*;
use crate::runner::{CommandRunner, Invocation, ProcessRunner};
use crate::scripts::ScriptWhitelist;
use crate::types::{Config, FeatureGate, ToolCall, ToolError, ToolOutcome, ToolResult};
use crate::vcs::{GitRepository, VcsQuery};

/// Largest file `file_read` will return
pub const MAX_READ_BYTES: u64 = 200 * 1024;

/// Commits returned by `git_log` when no `max` is given
pub const DEFAULT_LOG_COUNT: usize = 10;

const TEST_COMMAND: [&str; 3] = ["npm", "run", "test"];
const LINT_COMMAND: [&str; 3] = ["npm", "run", "lint"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    FileRead,
    FileWrite,
    RunScript,
    RunTests,
    Lint,
    GitStatus,
    GitLog,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::FileRead,
        ToolKind::FileWrite,
        ToolKind::RunScript,
        ToolKind::RunTests,
        ToolKind::Lint,
        ToolKind::GitStatus,
        ToolKind::GitLog,
    ];

    /// Wire name of the tool
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::FileRead => "file_read",
            ToolKind::FileWrite => "file_write",
            ToolKind::RunScript => "run_script",
            ToolKind::RunTests => "run_tests",
            ToolKind::Lint => "lint",
            ToolKind::GitStatus => "git_status",
            ToolKind::GitLog => "git_log",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

pub struct ToolRegistry {
    guard: PathGuard,
    scripts: ScriptWhitelist,
    runner: Arc<dyn CommandRunner>,
    vcs: Arc<dyn VcsQuery>,
    gate: FeatureGate,
    shell: String,
}

impl ToolRegistry {
    pub fn new(
        root: Root,
        config: &Config,
        gate: FeatureGate,
        runner: Arc<dyn CommandRunner>,
        vcs: Arc<dyn VcsQuery>,
    ) -> Self {
        Self {
            scripts: ScriptWhitelist::new(&root, &config.scripts.manifest),
            guard: PathGuard::new(root),
            runner,
            vcs,
            gate,
            shell: config.exec.shell.clone(),
        }
    }

    /// Registry backed by real processes and the git repository at `root`
    pub fn for_root(root: Root, config: &Config, gate: FeatureGate) -> Self {
        let runner = Arc::new(ProcessRunner::new(root.clone()));
        let vcs = Arc::new(GitRepository::new(root.clone()));
        Self::new(root, config, gate, runner, vcs)
    }

    pub fn root(&self) -> &Root {
        self.guard.root()
    }

    pub fn gate(&self) -> FeatureGate {
        self.gate
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Run a call by name; always produces a result, never an error
    pub async fn dispatch(&self, call: ToolCall) -> ToolResult {
        match ToolKind::from_name(&call.name) {
            Some(kind) => {
                let outcome = self.execute(kind, call.arguments).await;
                Self::render(kind, outcome)
            }
            None => {
                tracing::warn!(tool = %call.name, "Unknown tool requested");
                ToolResult::from(Err(ToolError::UnknownTool(call.name)))
            }
        }
    }

    /// Decode arguments for `kind` and run its handler
    pub async fn execute(&self, kind: ToolKind, arguments: Value) -> ToolOutcome {
        match kind {
            ToolKind::FileRead => self.file_read(decode(kind, arguments)?).await,
            ToolKind::FileWrite => self.file_write(decode(kind, arguments)?).await,
            ToolKind::RunScript => self.run_script(decode(kind, arguments)?).await,
            ToolKind::RunTests => self.run_tests().await,
            ToolKind::Lint => self.lint().await,
            ToolKind::GitStatus => self.git_status().await,
            ToolKind::GitLog => self.git_log(decode(kind, arguments)?).await,
        }
    }

    /// Flatten an outcome into the text envelope, logging failures
    pub fn render(kind: ToolKind, outcome: ToolOutcome) -> ToolResult {
        match &outcome {
            Ok(text) => tracing::info!(tool = kind.name(), bytes = text.len(), "Tool call completed"),
            Err(err) => tracing::warn!(tool = kind.name(), error = %err, "Tool call failed"),
        }
        ToolResult::from(outcome)
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    pub async fn file_read(&self, params: FileReadParams) -> ToolOutcome {
        let path = self.guard.resolve(&params.path)?;

        let file = tokio::fs::File::open(&path).await.map_err(ToolError::Read)?;
        let metadata = file.metadata().await.map_err(ToolError::Read)?;
        if metadata.len() > MAX_READ_BYTES {
            return Err(too_large(metadata.len()));
        }

        // The file may grow after the stat; never buffer more than one byte past the ceiling
        let mut bytes = Vec::with_capacity(metadata.len() as usize);
        file.take(MAX_READ_BYTES + 1)
            .read_to_end(&mut bytes)
            .await
            .map_err(ToolError::Read)?;
        if bytes.len() as u64 > MAX_READ_BYTES {
            return Err(too_large(bytes.len() as u64));
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn file_write(&self, params: FileWriteParams) -> ToolOutcome {
        if !self.gate.allows_write() {
            return Err(ToolError::WriteDisabled);
        }

        let path = self.guard.resolve(&params.path)?;
        tokio::fs::write(&path, params.content.as_bytes())
            .await
            .map_err(ToolError::Write)?;

        Ok("Write successful".to_string())
    }

    pub async fn run_script(&self, params: RunScriptParams) -> ToolOutcome {
        let invocation = self.scripts.invocation(&params.script, &self.shell).await?;
        self.run_task("script", &invocation).await
    }

    pub async fn run_tests(&self) -> ToolOutcome {
        self.run_task("tests", &fixed(TEST_COMMAND)).await
    }

    pub async fn lint(&self) -> ToolOutcome {
        self.run_task("lint", &fixed(LINT_COMMAND)).await
    }

    pub async fn git_status(&self) -> ToolOutcome {
        let report = self.vcs.status().map_err(|source| ToolError::Vcs {
            query: "status",
            source,
        })?;
        Ok(mcp_common::json_text(&report)?)
    }

    pub async fn git_log(&self, params: GitLogParams) -> ToolOutcome {
        // `0` means "use the default", not "no commits"
        let max = params
            .max
            .filter(|max| *max > 0)
            .unwrap_or(DEFAULT_LOG_COUNT);
        let commits = self.vcs.log(max).map_err(|source| ToolError::Vcs {
            query: "log",
            source,
        })?;
        Ok(mcp_common::json_text(&commits)?)
    }

    async fn run_task(&self, task: &'static str, invocation: &Invocation) -> ToolOutcome {
        tracing::info!(task, command = %invocation, "Running");
        let output = self
            .runner
            .run(invocation)
            .await
            .map_err(|source| ToolError::Execution { task, source })?;
        Ok(output.render())
    }
}

fn too_large(size: u64) -> ToolError {
    ToolError::TooLarge {
        size,
        limit_kb: MAX_READ_BYTES / 1024,
    }
}

fn fixed([program, args @ ..]: [&str; 3]) -> Invocation {
    Invocation::new(program, args.iter().copied())
}

/// Missing arguments decode like an empty object so optional-only tools accept `null`
fn decode<T: DeserializeOwned>(kind: ToolKind, arguments: Value) -> Result<T, ToolError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool: kind.name().to_string(),
        detail: e.to_string(),
    })
}
