//! Pid record file
//!
//! The record holds one decimal pid and nothing else. Launchers write it;
//! the controller is the only thing that removes it.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("cannot read pid record {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write pid record {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot remove pid record {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What the record file currently says
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    Absent,
    /// Present but not a usable pid; holds the raw content
    Invalid(String),
    Pid(i32),
}

#[derive(Debug, Clone)]
pub struct ProcessRecord {
    path: PathBuf,
}

impl ProcessRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<RecordState, RecordError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(match parse_pid(&raw) {
                Some(pid) => RecordState::Pid(pid),
                None => RecordState::Invalid(raw),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RecordState::Absent),
            Err(source) => Err(RecordError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Used by launchers and tests; the controller never creates a record
    pub fn write(&self, pid: u32) -> Result<(), RecordError> {
        std::fs::write(&self.path, pid.to_string()).map_err(|source| RecordError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Removing an already missing record is not an error
    pub fn remove(&self) -> Result<(), RecordError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Removed pid record");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RecordError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Positive and within `i32`; `0` and negatives would address process groups
fn parse_pid(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok().filter(|pid| *pid > 0)
}
