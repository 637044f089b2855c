//! Shared failure taxonomy.
//!
//! Each module owns its own `thiserror` enum; `ErrorKind` is the coarse
//! classification every one of them maps onto so callers can react uniformly.

use serde::Serialize;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
  /// A pipe, socket, or subprocess did not answer in time.
  Timeout,
  /// The expected OS process does not exist.
  ProcessNotFound,
  /// Processes survived every stage of the kill ladder.
  KillLadderExhausted,
  /// A process was found that nothing in this service owns.
  OrphanDetected,
  /// A path escaped the library root, or an argument is out of range.
  InvalidPath,
  /// Queue full, duplicate start, concurrent start/stop, or lost arbitration.
  Conflict,
  /// The IPC channel exists but nothing answers on it.
  StaleChannel,
  /// Filesystem or OS level I/O failure.
  Io,
  /// A collaborator (yt-dlp, mpv) reported a failure.
  External,
}
