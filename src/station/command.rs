//! Commands understood by the station player's control FIFO.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::process::Signal;
use crate::status::SnapshotStatus;

/// Line written to the FIFO to make the player exit.
pub const QUIT: &str = "q";

/// User-level command for the station player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum StationCommand {
  Pause,
  Resume,
  TogglePause,
  Next,
  Love,
  Ban,
  VolumeUp,
  VolumeDown,
  SelectStation(u32),
  Quit,
}

impl StationCommand {
  /// Text written to the FIFO (without the trailing newline).
  pub fn wire(&self) -> String {
    match self {
      StationCommand::Pause => "S".to_string(),
      StationCommand::Resume => "P".to_string(),
      StationCommand::TogglePause => "p".to_string(),
      StationCommand::Next => "n".to_string(),
      StationCommand::Love => "+".to_string(),
      StationCommand::Ban => "-".to_string(),
      StationCommand::VolumeUp => ")".to_string(),
      StationCommand::VolumeDown => "(".to_string(),
      StationCommand::SelectStation(n) => format!("s{}", n),
      StationCommand::Quit => QUIT.to_string(),
    }
  }

  /// Delivering the command twice has the same effect as delivering it once.
  pub fn is_idempotent(&self) -> bool {
    matches!(
      self,
      StationCommand::Pause | StationCommand::Resume | StationCommand::Quit
    )
  }

  /// Signal delivered when the pipe cannot carry the command.
  pub fn fallback_signal(&self) -> Option<Signal> {
    match self {
      StationCommand::Pause => Some(Signal::Stop),
      StationCommand::Resume => Some(Signal::Cont),
      _ => None,
    }
  }

  /// Status the snapshot should show once the command took effect.
  pub fn resulting_status(&self, current: Option<SnapshotStatus>) -> SnapshotStatus {
    match self {
      StationCommand::Pause => SnapshotStatus::Paused,
      StationCommand::Resume | StationCommand::Next | StationCommand::SelectStation(_) => {
        SnapshotStatus::Playing
      }
      StationCommand::Quit => SnapshotStatus::Stopped,
      StationCommand::TogglePause => match current {
        Some(SnapshotStatus::Paused) => SnapshotStatus::Playing,
        _ => SnapshotStatus::Paused,
      },
      _ => current.unwrap_or(SnapshotStatus::Playing),
    }
  }
}

impl fmt::Display for StationCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StationCommand::Pause => write!(f, "pause"),
      StationCommand::Resume => write!(f, "resume"),
      StationCommand::TogglePause => write!(f, "toggle"),
      StationCommand::Next => write!(f, "next"),
      StationCommand::Love => write!(f, "love"),
      StationCommand::Ban => write!(f, "ban"),
      StationCommand::VolumeUp => write!(f, "volumeUp"),
      StationCommand::VolumeDown => write!(f, "volumeDown"),
      StationCommand::SelectStation(n) => write!(f, "station {}", n),
      StationCommand::Quit => write!(f, "quit"),
    }
  }
}

impl FromStr for StationCommand {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    match lower.as_str() {
      "pause" => Ok(StationCommand::Pause),
      "resume" | "play" => Ok(StationCommand::Resume),
      "toggle" | "playpause" => Ok(StationCommand::TogglePause),
      "next" | "skip" => Ok(StationCommand::Next),
      "love" | "favorite" => Ok(StationCommand::Love),
      "ban" => Ok(StationCommand::Ban),
      "volumeup" => Ok(StationCommand::VolumeUp),
      "volumedown" => Ok(StationCommand::VolumeDown),
      "quit" | "exit" => Ok(StationCommand::Quit),
      _ => {
        let number = lower
          .strip_prefix("station")
          .or_else(|| lower.strip_prefix('s'))
          .map(|rest| rest.trim_start_matches([' ', ':']));
        match number.and_then(|n| n.parse::<u32>().ok()) {
          Some(n) => Ok(StationCommand::SelectStation(n)),
          None => Err(format!("Unknown station command: {}", s)),
        }
      }
    }
  }
}
