//! OS process control
//!
//! [`ProcessControl`] is the seam between the stop state machine and the
//! process table, so the controller can be driven by a fake in tests.

use std::ffi::OsStr;
use std::io;

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, Signal, System, UpdateKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM
    Graceful,
    /// SIGKILL
    Forceful,
}

pub trait ProcessControl {
    /// Zero-effect existence probe
    fn is_alive(&self, pid: i32) -> bool;

    /// A process that no longer exists is reported as `ErrorKind::NotFound`
    fn send(&self, pid: i32, signal: StopSignal) -> io::Result<()>;

    /// SIGTERM every process whose command line contains `pattern`, except
    /// ourselves. Returns how many were signalled.
    fn terminate_matching(&self, pattern: &str) -> usize;
}

/// The real process table
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcesses;

#[cfg(unix)]
impl ProcessControl for OsProcesses {
    fn is_alive(&self, pid: i32) -> bool {
        if unsafe { libc::kill(pid, 0) } == 0 {
            return true;
        }
        // EPERM: it exists, we just may not signal it
        io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    fn send(&self, pid: i32, signal: StopSignal) -> io::Result<()> {
        let signo = match signal {
            StopSignal::Graceful => libc::SIGTERM,
            StopSignal::Forceful => libc::SIGKILL,
        };
        tracing::info!(pid, ?signal, "Sending signal");
        if unsafe { libc::kill(pid, signo) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Err(io::Error::new(io::ErrorKind::NotFound, err))
        } else {
            Err(err)
        }
    }

    fn terminate_matching(&self, pattern: &str) -> usize {
        terminate_matching(pattern)
    }
}

#[cfg(not(unix))]
impl ProcessControl for OsProcesses {
    fn is_alive(&self, pid: i32) -> bool {
        let pid = sysinfo::Pid::from_u32(pid as u32);
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        sys.process(pid).is_some()
    }

    fn send(&self, pid: i32, signal: StopSignal) -> io::Result<()> {
        let pid = sysinfo::Pid::from_u32(pid as u32);
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process = sys
            .process(pid)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        tracing::info!(pid = pid.as_u32(), ?signal, "Sending signal");
        let sent = match signal {
            StopSignal::Graceful => process.kill_with(Signal::Term).unwrap_or(false),
            StopSignal::Forceful => process.kill(),
        };
        if sent {
            Ok(())
        } else {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        }
    }

    fn terminate_matching(&self, pattern: &str) -> usize {
        terminate_matching(pattern)
    }
}

fn terminate_matching(pattern: &str) -> usize {
    let own = sysinfo::get_current_pid().ok();

    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::new().with_cmd(UpdateKind::Always),
    );

    let mut count = 0;
    for (pid, process) in sys.processes() {
        if Some(*pid) == own {
            continue;
        }
        let cmdline = process
            .cmd()
            .iter()
            .map(|arg| {
                let arg: &OsStr = arg.as_ref();
                arg.to_string_lossy()
            })
            .collect::<Vec<_>>()
            .join(" ");
        if !cmdline.contains(pattern) {
            continue;
        }

        let sent = match process.kill_with(Signal::Term) {
            Some(sent) => sent,
            None => process.kill(),
        };
        if sent {
            tracing::info!(pid = pid.as_u32(), cmdline = %cmdline, "Terminated by pattern");
            count += 1;
        } else {
            tracing::warn!(pid = pid.as_u32(), cmdline = %cmdline, "Failed to signal matching process");
        }
    }
    count
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_own_process_is_alive() {
        assert!(OsProcesses.is_alive(std::process::id() as i32));
    }

    #[test]
    fn test_init_counts_as_alive() {
        // pid 1 always exists; unprivileged probes get EPERM
        assert!(OsProcesses.is_alive(1));
    }

    #[test]
    fn test_signalling_exited_process_is_not_found() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        child.wait().unwrap();

        let err = OsProcesses
            .send(child.id() as i32, StopSignal::Forceful)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_unmatched_pattern_signals_nothing() {
        let pattern = format!("no-such-process-{}-zz", std::process::id());
        assert_eq!(OsProcesses.terminate_matching(&pattern), 0);
    }
}
