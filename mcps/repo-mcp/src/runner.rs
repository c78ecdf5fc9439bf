//! Command execution
//!
//! Runs a child in the root, merges stdout and stderr into one buffer in the
//! order the chunks arrive, and reports the exit code as data.

use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::guard::Root;
use crate::types::{CommandOutput, ExecError};

/// A program and its arguments; never assembled from caller input directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `<shell> -c <line>`
    pub fn shell(shell: &str, line: &str) -> Self {
        Self::new(shell, ["-c", line])
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion; a non-zero exit is an `Ok` result
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError>;
}

/// Spawns real processes with the root as working directory
///
/// Project-local tools in `node_modules/.bin` are found before anything on `PATH`.
///
/// There is no timeout: a child that never exits keeps the call pending
/// until the server itself is stopped.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    root: Root,
}

impl ProcessRunner {
    pub fn new(root: Root) -> Self {
        Self { root }
    }

    /// `<root>/node_modules/.bin` ahead of the inherited `PATH`
    fn search_path(&self) -> Option<OsString> {
        let local = self.root.join("node_modules").join(".bin");
        let inherited = std::env::var_os("PATH");
        let dirs = std::iter::once(local).chain(inherited.iter().flat_map(std::env::split_paths));
        std::env::join_paths(dirs).ok()
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError> {
        tracing::debug!(command = %invocation, "Spawning");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(self.root.as_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(path) = self.search_path() {
            command.env("PATH", path);
        }

        let mut child = command
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let mut stdout = child.stdout.take().ok_or_else(missing_pipe)?;
        let mut stderr = child.stderr.take().ok_or_else(missing_pipe)?;

        let mut combined = Vec::new();
        let mut out_buf = [0u8; 8192];
        let mut err_buf = [0u8; 8192];
        let (mut out_open, mut err_open) = (true, true);

        while out_open || err_open {
            tokio::select! {
                read = stdout.read(&mut out_buf), if out_open => match read? {
                    0 => out_open = false,
                    n => combined.extend_from_slice(&out_buf[..n]),
                },
                read = stderr.read(&mut err_buf), if err_open => match read? {
                    0 => err_open = false,
                    n => combined.extend_from_slice(&err_buf[..n]),
                },
            }
        }

        let status = child.wait().await?;
        let exit_code = exit_code(status);
        tracing::debug!(command = %invocation, exit_code, "Finished");

        Ok(CommandOutput {
            exit_code,
            output: String::from_utf8_lossy(&combined).into_owned(),
        })
    }
}

fn missing_pipe() -> ExecError {
    ExecError::Io(std::io::Error::other("child pipe was not captured"))
}

/// Signal deaths map to `128 + signal` like a shell would report them
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
