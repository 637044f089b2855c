//! Remote track catalog backed by `yt-dlp`.
//!
//! Stream addresses handed out by the catalog are short-lived, so nothing is
//! cached: every `resolve` asks yt-dlp again.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

use crate::config::MediaConfig;
use crate::error::ErrorKind;

const MAX_ID_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum CatalogError {
  #[error("yt-dlp executable {0:?} not found")]
  NotFound(String),
  #[error("Failed to run yt-dlp: {0}")]
  Io(#[from] std::io::Error),
  #[error("yt-dlp timed out after {0:?}")]
  Timeout(Duration),
  #[error("yt-dlp failed: {0}")]
  Failed(String),
  #[error("Invalid track id {0:?}")]
  InvalidId(String),
  #[error("No stream address for {0}")]
  NoAddress(String),
}

impl CatalogError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      CatalogError::NotFound(_) => ErrorKind::ProcessNotFound,
      CatalogError::Io(_) => ErrorKind::Io,
      CatalogError::Timeout(_) => ErrorKind::Timeout,
      CatalogError::InvalidId(_) => ErrorKind::InvalidPath,
      CatalogError::Failed(_) | CatalogError::NoAddress(_) => ErrorKind::External,
    }
  }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
  pub id: String,
  pub title: String,
  pub uploader: Option<String>,
  pub duration_secs: f64,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
  id: String,
  #[serde(default)]
  title: Option<String>,
  #[serde(default)]
  uploader: Option<String>,
  #[serde(default)]
  channel: Option<String>,
  #[serde(default)]
  duration: Option<f64>,
  #[serde(default)]
  is_live: Option<bool>,
  #[serde(default)]
  live_status: Option<String>,
}

impl RawEntry {
  /// Drop entries that cannot be played as a finite track: unknown length,
  /// live streams and auto-generated mixes.
  fn into_hit(self) -> Option<SearchHit> {
    let duration = self.duration.filter(|d| *d > 0.0)?;
    let live = self.is_live.unwrap_or(false)
      || matches!(self.live_status.as_deref(), Some("is_live" | "is_upcoming"));
    if live || self.id.starts_with("RD") {
      return None;
    }
    let title = self.title.unwrap_or_else(|| self.id.clone());
    if title.starts_with("Mix -") {
      return None;
    }
    Some(SearchHit {
      id: self.id,
      title,
      uploader: self.uploader.or(self.channel),
      duration_secs: duration,
    })
  }
}

/// Parse `--dump-json` output, one JSON object per line.
pub fn parse_search_output(stdout: &[u8]) -> Vec<SearchHit> {
  String::from_utf8_lossy(stdout)
    .lines()
    .filter(|line| !line.trim().is_empty())
    .filter_map(|line| match serde_json::from_str::<RawEntry>(line) {
      Ok(entry) => entry.into_hit(),
      Err(e) => {
        log::debug!("Skipping unparsable search entry: {}", e);
        None
      }
    })
    .collect()
}

/// Accept a bare video id or a full https URL; anything else could be read
/// as an option by yt-dlp.
pub fn watch_url(id: &str) -> Result<String, CatalogError> {
  let id = id.trim();
  if id.starts_with("https://") && !id.chars().any(char::is_whitespace) {
    return Ok(id.to_string());
  }
  let valid = !id.is_empty()
    && id.len() <= MAX_ID_LEN
    && !id.starts_with('-')
    && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if valid {
    Ok(format!("https://www.youtube.com/watch?v={}", id))
  } else {
    Err(CatalogError::InvalidId(id.to_string()))
  }
}

/// Remote source of playable tracks.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
  /// Fresh, ephemeral stream address for `id`.
  async fn resolve(&self, id: &str) -> Result<String, CatalogError>;

  async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CatalogError>;

  /// Command that downloads `id` as audio to `target`. Not started.
  fn fetch_command(&self, id: &str, target: &Path) -> Result<Command, CatalogError>;
}

pub struct YtDlpCatalog {
  binary: String,
  search_limit: u32,
  timeout: Duration,
}

impl YtDlpCatalog {
  pub fn new(config: &MediaConfig) -> Self {
    Self {
      binary: config.ytdlp_path.clone(),
      search_limit: config.search_limit,
      timeout: Duration::from_millis(config.catalog_timeout_ms),
    }
  }

  async fn run(&self, args: &[String]) -> Result<Vec<u8>, CatalogError> {
    let program = which::which(&self.binary).map_err(|_| CatalogError::NotFound(self.binary.clone()))?;
    log::debug!("Running {:?} {:?}", program, args);

    let mut cmd = Command::new(program);
    cmd
      .args(args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);

    let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
      Ok(output) => output?,
      Err(_) => return Err(CatalogError::Timeout(self.timeout)),
    };
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let reason = stderr.lines().last().unwrap_or("").trim().to_string();
      return Err(CatalogError::Failed(format!("{} ({})", reason, output.status)));
    }
    Ok(output.stdout)
  }
}

#[async_trait]
impl RemoteCatalog for YtDlpCatalog {
  async fn resolve(&self, id: &str) -> Result<String, CatalogError> {
    let url = watch_url(id)?;
    let args = [
      "-g".to_string(),
      "-f".to_string(),
      "bestaudio".to_string(),
      "--no-playlist".to_string(),
      "--".to_string(),
      url,
    ];
    let stdout = self.run(&args).await?;
    let address = String::from_utf8_lossy(&stdout)
      .lines()
      .map(str::trim)
      .find(|line| !line.is_empty())
      .map(str::to_string)
      .ok_or_else(|| CatalogError::NoAddress(id.to_string()))?;
    log::info!("Resolved {} to a fresh stream address", id);
    Ok(address)
  }

  async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CatalogError> {
    let args = [
      "--dump-json".to_string(),
      "--flat-playlist".to_string(),
      "--no-warnings".to_string(),
      format!("ytsearch{}:{}", self.search_limit, query.trim()),
    ];
    let stdout = self.run(&args).await?;
    let hits = parse_search_output(&stdout);
    log::info!("Search {:?} returned {} playable hits", query, hits.len());
    Ok(hits)
  }

  fn fetch_command(&self, id: &str, target: &Path) -> Result<Command, CatalogError> {
    let url = watch_url(id)?;
    // yt-dlp picks the extension itself after extraction.
    let template = target.with_extension("%(ext)s");
    let mut cmd = Command::new(&self.binary);
    cmd
      .arg("-x")
      .arg("--audio-format")
      .arg("mp3")
      .arg("--no-playlist")
      .arg("-o")
      .arg(template)
      .arg("--")
      .arg(url)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped());
    Ok(cmd)
  }
}
