//! StatusSnapshot persistence.
//!
//! The snapshot is a small JSON document read by observers outside this
//! process. Writers patch it with read-merge-write; the write goes through a
//! temporary file and an atomic rename so readers never see half a document.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug)]
pub enum StatusError {
  #[error("Status file I/O failed: {0}")]
  Io(#[from] std::io::Error),
  #[error("Status serialization failed: {0}")]
  Json(#[from] serde_json::Error),
}

/// Playback status recorded in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
  Playing,
  Paused,
  Stopped,
}

impl SnapshotStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      SnapshotStatus::Playing => "playing",
      SnapshotStatus::Paused => "paused",
      SnapshotStatus::Stopped => "stopped",
    }
  }
}

/// Flags describing the supervised process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFlags {
  pub running: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pid: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub station: Option<u32>,
}

/// Typed view over the snapshot document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
  #[serde(default)]
  pub status: Option<SnapshotStatus>,
  #[serde(default)]
  pub update_time: Option<String>,
  #[serde(default)]
  pub last_command: Option<String>,
  #[serde(default)]
  pub run_flags: Option<RunFlags>,
  /// Keys written by other writers, preserved untouched.
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Partial update applied over the current snapshot.
#[derive(Debug, Clone, Default)]
pub struct StatusPatch {
  fields: Map<String, Value>,
}

impl StatusPatch {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn status(mut self, status: SnapshotStatus) -> Self {
    self.fields.insert("status".into(), status.as_str().into());
    self
  }

  pub fn last_command(mut self, command: &str) -> Self {
    self.fields.insert("lastCommand".into(), command.into());
    self
  }

  pub fn run_flags(mut self, flags: &RunFlags) -> Self {
    // RunFlags holds only plain fields, serialization cannot fail.
    if let Ok(value) = serde_json::to_value(flags) {
      self.fields.insert("runFlags".into(), value);
    }
    self
  }

  /// Arbitrary extra key.
  pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
    self.fields.insert(key.to_string(), value.into());
    self
  }

  fn status_value(&self) -> Option<&Value> {
    self.fields.get("status")
  }
}

/// Reads and atomically rewrites the snapshot file.
#[derive(Debug, Clone)]
pub struct StatusStore {
  path: PathBuf,
}

impl StatusStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Read the current snapshot, repairing or discarding corrupt content.
  pub async fn read(&self) -> StatusSnapshot {
    let document = self.read_document().await;
    serde_json::from_value(Value::Object(document)).unwrap_or_else(|e| {
      log::warn!("Status snapshot has unexpected shape: {}", e);
      StatusSnapshot::default()
    })
  }

  async fn read_document(&self) -> Map<String, Value> {
    match tokio::fs::read(&self.path).await {
      Ok(bytes) => parse_or_repair(&bytes),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
      Err(e) => {
        log::warn!("Failed to read status file {:?}: {}", self.path, e);
        Map::new()
      }
    }
  }

  /// Merge `patch` over the current document and persist it.
  ///
  /// Falls back to a direct write, then to a minimal emergency record. Only
  /// returns an error when all three writes failed.
  pub async fn update(&self, patch: StatusPatch) -> Result<StatusSnapshot, StatusError> {
    let mut document = self.read_document().await;
    let now = chrono::Utc::now().to_rfc3339();
    let status = patch.status_value().cloned();
    for (key, value) in patch.fields {
      document.insert(key, value);
    }
    document.insert("updateTime".into(), Value::String(now.clone()));

    let bytes = serde_json::to_vec_pretty(&document)?;

    if let Some(parent) = self.path.parent() {
      if let Err(e) = tokio::fs::create_dir_all(parent).await {
        log::warn!("Failed to create status directory {:?}: {}", parent, e);
      }
    }

    match self.write_atomic(&bytes).await {
      Ok(()) => {}
      Err(e) => {
        log::warn!("Atomic status write failed: {}, writing directly", e);
        if let Err(e) = tokio::fs::write(&self.path, &bytes).await {
          log::error!("Direct status write failed: {}, writing emergency record", e);
          let emergency = serde_json::json!({
            "status": status.unwrap_or(Value::Null),
            "updateTime": now,
            "emergency": true,
          });
          tokio::fs::write(&self.path, serde_json::to_vec(&emergency)?).await?;
        }
      }
    }

    Ok(serde_json::from_value(Value::Object(document)).unwrap_or_default())
  }

  async fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = self
      .path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "status.json".to_string());
    let tmp = self
      .path
      .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

    let result = async {
      let mut file = tokio::fs::File::create(&tmp).await?;
      file.write_all(bytes).await?;
      file.flush().await?;
      file.sync_all().await?;
      drop(file);
      tokio::fs::rename(&tmp, &self.path).await
    }
    .await;

    if result.is_err() {
      let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
  }
}

/// Parse the snapshot, attempting a best-effort repair when it is corrupt.
fn parse_or_repair(bytes: &[u8]) -> Map<String, Value> {
  if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(bytes) {
    return map;
  }

  log::warn!("Status snapshot is corrupt, attempting repair");
  let text: String = String::from_utf8_lossy(bytes)
    .chars()
    .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
    .collect();
  let text = text.trim_start_matches('\u{feff}').trim();

  // Two writers racing can leave concatenated or truncated documents;
  // keep the first complete object.
  let Some(start) = text.find('{') else {
    log::warn!("Status snapshot unrecoverable, starting from empty");
    return Map::new();
  };
  let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
  if let Some(Ok(Value::Object(map))) = stream.next() {
    log::info!("Recovered status snapshot from leading object");
    return map;
  }

  if let Some(end) = text.rfind('}') {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[start..=end]) {
      log::info!("Recovered status snapshot by truncating trailing garbage");
      return map;
    }
  }

  log::warn!("Status snapshot unrecoverable, starting from empty");
  Map::new()
}
