//! OS process plumbing shared by both supervisors.
//!
//! Architecture:
//! - `scan.rs` - process enumeration through two independent methods
//! - `signal.rs` - per-pid signal delivery
//! - `ladder.rs` - graceful → terminate → force-kill → verify escalation

mod ladder;
mod scan;
mod signal;

use thiserror::Error;

use crate::error::ErrorKind;

pub use ladder::{KillLadder, LadderReport};
pub use scan::{Probe, ProcessMatch, ProcessScanner, ProcessSignature};
pub use signal::{is_alive, send_signal, Signal};

#[derive(Error, Debug)]
pub enum ProcessError {
  #[error("Process {0} not found")]
  NotFound(u32),
  #[error("Failed to signal process {pid}: {source}")]
  Signal { pid: u32, source: std::io::Error },
  #[error("Process enumeration failed: {0}")]
  Enumerate(String),
  #[error("Failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    source: std::io::Error,
  },
  #[error("{0} timed out")]
  Timeout(&'static str),
}

impl ProcessError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ProcessError::NotFound(_) => ErrorKind::ProcessNotFound,
      ProcessError::Signal { .. } | ProcessError::Spawn { .. } => ErrorKind::Io,
      ProcessError::Enumerate(_) => ErrorKind::External,
      ProcessError::Timeout(_) => ErrorKind::Timeout,
    }
  }
}
