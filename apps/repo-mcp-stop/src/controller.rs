//! Stop state machine
//!
//! ```text
//! no record ──────────────────────────────► pattern fallback ─► StoppedByPattern | NothingToStop
//! record ─► invalid ─► remove ────────────► InvalidRecord
//!        └► pid ─► not alive ─► remove ───► StaleRecord
//!                └► SIGTERM refused ──────► SignalFailed (record kept)
//!                └► SIGTERM ─► gone within grace ─► remove ─► Stopped { forced: false }
//!                           └► still alive ─► SIGKILL ─► remove ─► Stopped { forced: true }
//! ```
//!
//! Only a missing record leads to the fallback. A stale record means the
//! managed server already exited, and a pattern match could hit something else.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::process::{ProcessControl, StopSignal};
use crate::record::{ProcessRecord, RecordState};

/// Pid record, relative to the working directory
pub const DEFAULT_RECORD_PATH: &str = ".repo-mcp.pid";

/// Command-line fragment launchers use to start the server
pub const DEFAULT_PATTERN: &str = "repo-mcp serve-stdio";

#[derive(Debug, Clone)]
pub struct StopConfig {
    pub record_path: PathBuf,
    pub pattern: String,
    /// How long a SIGTERM gets before SIGKILL
    pub grace: Duration,
    pub poll_interval: Duration,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            record_path: PathBuf::from(DEFAULT_RECORD_PATH),
            pattern: DEFAULT_PATTERN.to_string(),
            grace: Duration::from_secs(3),
            poll_interval: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { pid: i32, forced: bool },
    StoppedByPattern { count: usize },
    InvalidRecord,
    StaleRecord { pid: i32 },
    SignalFailed { pid: i32 },
    RecordUnreadable,
    NothingToStop,
}

impl StopOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StopOutcome::Stopped { .. } | StopOutcome::StoppedByPattern { .. }
        )
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopOutcome::Stopped { pid, forced: false } => write!(f, "stopped process {}", pid),
            StopOutcome::Stopped { pid, forced: true } => {
                write!(f, "killed process {} after grace period", pid)
            }
            StopOutcome::StoppedByPattern { count } => {
                write!(f, "terminated {} process(es) by command-line match", count)
            }
            StopOutcome::InvalidRecord => write!(f, "pid record was invalid and has been removed"),
            StopOutcome::StaleRecord { pid } => {
                write!(f, "process {} was not running; stale record removed", pid)
            }
            StopOutcome::SignalFailed { pid } => {
                write!(f, "could not signal process {}; record kept", pid)
            }
            StopOutcome::RecordUnreadable => write!(f, "pid record could not be read"),
            StopOutcome::NothingToStop => write!(f, "nothing to stop"),
        }
    }
}

pub struct StopController<P> {
    config: StopConfig,
    record: ProcessRecord,
    control: P,
}

impl<P: ProcessControl> StopController<P> {
    pub fn new(config: StopConfig, control: P) -> Self {
        Self {
            record: ProcessRecord::new(config.record_path.clone()),
            config,
            control,
        }
    }

    pub fn control(&self) -> &P {
        &self.control
    }

    pub fn stop(&self) -> StopOutcome {
        let outcome = match self.record.read() {
            Ok(RecordState::Absent) => {
                tracing::info!(path = %self.record.path().display(), "No pid record");
                self.stop_by_pattern()
            }
            Ok(RecordState::Invalid(raw)) => {
                tracing::warn!(content = %raw.trim(), "Pid record does not hold a valid pid");
                self.discard_record();
                StopOutcome::InvalidRecord
            }
            Ok(RecordState::Pid(pid)) => self.stop_recorded(pid),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read pid record");
                StopOutcome::RecordUnreadable
            }
        };

        if outcome.is_success() {
            tracing::info!(%outcome, "Stop finished");
        } else {
            tracing::warn!(%outcome, "Stop finished");
        }
        outcome
    }

    fn stop_recorded(&self, pid: i32) -> StopOutcome {
        if !self.control.is_alive(pid) {
            tracing::warn!(pid, "Recorded process is not running");
            self.discard_record();
            return StopOutcome::StaleRecord { pid };
        }

        if let Err(e) = self.control.send(pid, StopSignal::Graceful) {
            tracing::error!(pid, error = %e, "SIGTERM refused");
            return StopOutcome::SignalFailed { pid };
        }

        let forced = !self.wait_for_exit(pid);
        if forced {
            tracing::warn!(pid, grace_ms = self.config.grace.as_millis() as u64, "Still running after grace period");
            if let Err(e) = self.control.send(pid, StopSignal::Forceful) {
                // NotFound means it exited between the last probe and now
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(pid, error = %e, "SIGKILL failed");
                }
            }
        }

        self.discard_record();
        StopOutcome::Stopped { pid, forced }
    }

    /// Poll until `pid` disappears or the grace window closes
    fn wait_for_exit(&self, pid: i32) -> bool {
        let deadline = Instant::now() + self.config.grace;
        loop {
            if !self.control.is_alive(pid) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(self.config.poll_interval.min(deadline - now));
        }
    }

    fn stop_by_pattern(&self) -> StopOutcome {
        tracing::info!(pattern = %self.config.pattern, "Searching process table");
        match self.control.terminate_matching(&self.config.pattern) {
            0 => StopOutcome::NothingToStop,
            count => StopOutcome::StoppedByPattern { count },
        }
    }

    fn discard_record(&self) {
        if let Err(e) = self.record.remove() {
            tracing::warn!(error = %e, "Failed to remove pid record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use tempfile::TempDir;

    /// Scripted process table
    #[derive(Default)]
    struct FakeProcesses {
        alive: Cell<bool>,
        /// Process exits after this many probes following SIGTERM; `None` ignores SIGTERM
        exits_after_probes: Option<usize>,
        refuse_signals: bool,
        /// SIGKILL finds the process already gone
        vanishes_before_kill: bool,
        matches: usize,
        probes_since_term: Cell<usize>,
        terminated: Cell<bool>,
        signals: RefCell<Vec<(i32, StopSignal)>>,
        pattern_searches: RefCell<Vec<String>>,
    }

    impl FakeProcesses {
        fn running() -> Self {
            Self {
                alive: Cell::new(true),
                exits_after_probes: Some(0),
                ..Default::default()
            }
        }

        fn signals(&self) -> Vec<(i32, StopSignal)> {
            self.signals.borrow().clone()
        }
    }

    impl ProcessControl for FakeProcesses {
        fn is_alive(&self, _pid: i32) -> bool {
            if self.terminated.get() {
                let probes = self.probes_since_term.get();
                self.probes_since_term.set(probes + 1);
                if self.exits_after_probes.is_some_and(|n| probes >= n) {
                    self.alive.set(false);
                }
            }
            self.alive.get()
        }

        fn send(&self, pid: i32, signal: StopSignal) -> io::Result<()> {
            if self.refuse_signals {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            self.signals.borrow_mut().push((pid, signal));
            if signal == StopSignal::Forceful && self.vanishes_before_kill {
                self.alive.set(false);
                return Err(io::Error::from(io::ErrorKind::NotFound));
            }
            match signal {
                StopSignal::Graceful => self.terminated.set(true),
                StopSignal::Forceful => self.alive.set(false),
            }
            Ok(())
        }

        fn terminate_matching(&self, pattern: &str) -> usize {
            self.pattern_searches.borrow_mut().push(pattern.to_string());
            self.matches
        }
    }

    fn setup(record: Option<&str>) -> (TempDir, StopConfig) {
        let dir = TempDir::new().unwrap();
        let record_path = dir.path().join(DEFAULT_RECORD_PATH);
        if let Some(content) = record {
            std::fs::write(&record_path, content).unwrap();
        }
        let config = StopConfig {
            record_path,
            grace: Duration::from_millis(100),
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        };
        (dir, config)
    }

    #[test]
    fn test_invalid_record_is_removed_without_signals() {
        let (_dir, config) = setup(Some("garbage"));
        let path = config.record_path.clone();
        let controller = StopController::new(config, FakeProcesses::running());

        let outcome = controller.stop();
        assert_eq!(outcome, StopOutcome::InvalidRecord);
        assert_eq!(outcome.exit_code(), 1);
        assert!(!path.exists());
        assert!(controller.control().signals().is_empty());
        assert!(controller.control().pattern_searches.borrow().is_empty());
    }

    #[test]
    fn test_zero_pid_is_invalid() {
        let (_dir, config) = setup(Some("0"));
        let controller = StopController::new(config, FakeProcesses::running());
        assert_eq!(controller.stop(), StopOutcome::InvalidRecord);
        assert!(controller.control().signals().is_empty());
    }

    #[test]
    fn test_stale_record_skips_fallback() {
        let (_dir, config) = setup(Some("4242"));
        let path = config.record_path.clone();
        let control = FakeProcesses {
            matches: 3,
            ..Default::default()
        };
        let controller = StopController::new(config, control);

        assert_eq!(controller.stop(), StopOutcome::StaleRecord { pid: 4242 });
        assert!(!path.exists());
        assert!(controller.control().signals().is_empty());
        assert!(controller.control().pattern_searches.borrow().is_empty());
    }

    #[test]
    fn test_graceful_stop() {
        let (_dir, config) = setup(Some("4242\n"));
        let path = config.record_path.clone();
        let control = FakeProcesses {
            exits_after_probes: Some(2),
            ..FakeProcesses::running()
        };
        let controller = StopController::new(config, control);

        let outcome = controller.stop();
        assert_eq!(
            outcome,
            StopOutcome::Stopped {
                pid: 4242,
                forced: false
            }
        );
        assert_eq!(outcome.exit_code(), 0);
        assert!(!path.exists());
        assert_eq!(
            controller.control().signals(),
            vec![(4242, StopSignal::Graceful)]
        );
    }

    #[test]
    fn test_escalates_after_grace() {
        let (_dir, config) = setup(Some("4242"));
        let path = config.record_path.clone();
        let control = FakeProcesses {
            exits_after_probes: None,
            ..FakeProcesses::running()
        };
        let controller = StopController::new(config, control);

        let started = Instant::now();
        let outcome = controller.stop();
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(
            outcome,
            StopOutcome::Stopped {
                pid: 4242,
                forced: true
            }
        );
        assert!(!path.exists());
        assert_eq!(
            controller.control().signals(),
            vec![(4242, StopSignal::Graceful), (4242, StopSignal::Forceful)]
        );
    }

    #[test]
    fn test_vanished_before_kill_is_still_stopped() {
        let (_dir, config) = setup(Some("4242"));
        let path = config.record_path.clone();
        let control = FakeProcesses {
            exits_after_probes: None,
            vanishes_before_kill: true,
            ..FakeProcesses::running()
        };
        let controller = StopController::new(config, control);

        assert_eq!(
            controller.stop(),
            StopOutcome::Stopped {
                pid: 4242,
                forced: true
            }
        );
        assert!(!path.exists());
    }

    #[test]
    fn test_refused_signal_keeps_record() {
        let (_dir, config) = setup(Some("4242"));
        let path = config.record_path.clone();
        let control = FakeProcesses {
            refuse_signals: true,
            matches: 1,
            ..FakeProcesses::running()
        };
        let controller = StopController::new(config, control);

        assert_eq!(controller.stop(), StopOutcome::SignalFailed { pid: 4242 });
        assert!(path.exists());
        assert!(controller.control().pattern_searches.borrow().is_empty());
    }

    #[test]
    fn test_no_record_uses_pattern() {
        let (_dir, config) = setup(None);
        let control = FakeProcesses {
            matches: 2,
            ..Default::default()
        };
        let controller = StopController::new(config, control);

        assert_eq!(controller.stop(), StopOutcome::StoppedByPattern { count: 2 });
        assert_eq!(
            *controller.control().pattern_searches.borrow(),
            vec![DEFAULT_PATTERN.to_string()]
        );
    }

    #[test]
    fn test_nothing_to_stop_is_idempotent() {
        let (dir, config) = setup(None);
        let controller = StopController::new(config, FakeProcesses::default());

        assert_eq!(controller.stop(), StopOutcome::NothingToStop);
        assert_eq!(controller.stop(), StopOutcome::NothingToStop);
        assert_eq!(controller.stop().exit_code(), 1);
        assert!(controller.control().signals().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(StopOutcome::StoppedByPattern { count: 1 }.exit_code(), 0);
        assert_eq!(StopOutcome::RecordUnreadable.exit_code(), 1);
        assert_eq!(StopOutcome::SignalFailed { pid: 1 }.exit_code(), 1);
    }
}
