//! MPV JSON IPC protocol types.
//!
//! Reference: https://mpv.io/manual/master/#json-ipc

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

static REQUEST_ID: AtomicI64 = AtomicI64::new(1);

/// Generate a unique request ID for MPV commands.
pub fn next_request_id() -> i64 {
  REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// Command sent to MPV via IPC.
#[derive(Debug, Clone, Serialize)]
pub struct MpvCommand {
  pub command: Vec<serde_json::Value>,
  pub request_id: i64,
}

impl MpvCommand {
  /// Create a new command with auto-generated request ID.
  pub fn new(args: Vec<serde_json::Value>) -> Self {
    Self {
      command: args,
      request_id: next_request_id(),
    }
  }

  /// Replace whatever is playing with `url`.
  pub fn loadfile(url: &str) -> Self {
    Self::new(vec!["loadfile".into(), url.into(), "replace".into()])
  }

  /// Stop playback and clear the playlist. MPV stays alive (idle).
  pub fn stop() -> Self {
    Self::new(vec!["stop".into()])
  }

  /// Seek by `delta` seconds from the current position.
  pub fn seek_relative(delta: f64) -> Self {
    Self::new(vec!["seek".into(), delta.into(), "relative".into()])
  }

  pub fn set_pause(paused: bool) -> Self {
    Self::new(vec!["set_property".into(), "pause".into(), paused.into()])
  }

  /// Set volume (0-100).
  pub fn set_volume(volume: f64) -> Self {
    Self::new(vec!["set_property".into(), "volume".into(), volume.into()])
  }

  /// Observe a property for changes.
  pub fn observe_property(id: i64, name: &str) -> Self {
    Self::new(vec!["observe_property".into(), id.into(), name.into()])
  }

  pub fn get_property(name: &str) -> Self {
    Self::new(vec!["get_property".into(), name.into()])
  }

  pub fn quit() -> Self {
    Self::new(vec!["quit".into()])
  }
}

/// Response from MPV for a command.
#[derive(Debug, Clone, Deserialize)]
pub struct MpvResponse {
  /// "success" or error message.
  pub error: String,
  pub data: Option<serde_json::Value>,
  pub request_id: i64,
}

impl MpvResponse {
  pub fn is_success(&self) -> bool {
    self.error == "success"
  }
}

/// Event sent by MPV (property changes, playback events, etc.).
#[derive(Debug, Clone, Deserialize)]
pub struct MpvEvent {
  /// Event type (e.g., "property-change", "end-file", "file-loaded").
  pub event: String,
  /// Observer ID for property-change events.
  pub id: Option<i64>,
  /// Property name for property-change events.
  pub name: Option<String>,
  pub data: Option<serde_json::Value>,
  /// Reason for end-file events (e.g., "eof", "stop", "quit", "error").
  pub reason: Option<String>,
  /// Error text attached to some end-file events.
  pub file_error: Option<String>,
}

impl MpvEvent {
  /// Parse a single event line, as received on the socket.
  pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(line)
  }
}

/// Typed property values from MPV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
  Bool(bool),
  Number(f64),
  String(String),
  Null,
  /// Arrays and objects, kept as raw JSON.
  Json(serde_json::Value),
}

impl PropertyValue {
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      PropertyValue::Number(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      PropertyValue::Bool(b) => Some(*b),
      _ => None,
    }
  }
}

impl From<serde_json::Value> for PropertyValue {
  fn from(value: serde_json::Value) -> Self {
    match value {
      serde_json::Value::Bool(b) => PropertyValue::Bool(b),
      serde_json::Value::Number(n) => PropertyValue::Number(n.as_f64().unwrap_or(0.0)),
      serde_json::Value::String(s) => PropertyValue::String(s),
      serde_json::Value::Array(_) | serde_json::Value::Object(_) => PropertyValue::Json(value),
      serde_json::Value::Null => PropertyValue::Null,
    }
  }
}

/// Message received from MPV IPC (either response or event).
#[derive(Debug, Clone)]
pub enum MpvMessage {
  Response(MpvResponse),
  Event(MpvEvent),
}

impl MpvMessage {
  /// Parse a JSON line from MPV.
  pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    if value.get("event").is_some() {
      Ok(MpvMessage::Event(serde_json::from_value(value)?))
    } else {
      Ok(MpvMessage::Response(serde_json::from_value(value)?))
    }
  }
}
