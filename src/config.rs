//! Application configuration with persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("Failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    source: serde_json::Error,
  },
  #[error("Invalid config: {0}")]
  Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
  #[serde(default)]
  pub station: StationConfig,

  #[serde(default)]
  pub media: MediaConfig,

  #[serde(default)]
  pub broker: BrokerConfig,
}

/// Settings for the pipe-controlled station player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationConfig {
  /// Station player executable (name on PATH or absolute path).
  #[serde(default = "default_station_binary")]
  pub binary: String,

  /// Extra command-line arguments for the station player.
  #[serde(default)]
  pub args: Vec<String>,

  /// Control FIFO read by the station player.
  #[serde(default = "default_fifo_path")]
  pub fifo_path: PathBuf,

  /// StatusSnapshot file read by out-of-process observers.
  #[serde(default = "default_status_file")]
  pub status_file: PathBuf,

  /// Directory receiving the player's stdout/stderr logs.
  #[serde(default = "default_log_dir")]
  pub log_dir: PathBuf,

  /// Station selected after a successful start (None = player default).
  #[serde(default)]
  pub default_station: Option<u32>,

  /// Minimum time between two starts or two stops.
  #[serde(default = "default_cooldown_ms")]
  pub cooldown_ms: u64,

  /// Minimum time between two identical commands.
  #[serde(default = "default_command_cooldown_ms")]
  pub command_cooldown_ms: u64,

  /// Time given to a freshly spawned player before re-verifying it.
  #[serde(default = "default_settle_ms")]
  pub settle_ms: u64,

  /// Timeout for a single FIFO delivery attempt.
  #[serde(default = "default_pipe_timeout_ms")]
  pub pipe_timeout_ms: u64,

  /// Timeout for the running check done before each command.
  #[serde(default = "default_status_check_timeout_ms")]
  pub status_check_timeout_ms: u64,

  /// Hard deadline for `stop()`.
  #[serde(default = "default_stop_deadline_ms")]
  pub stop_deadline_ms: u64,

  #[serde(default)]
  pub ladder: LadderConfig,

  /// Retry policy wrapped around `start()`.
  #[serde(default = "default_start_retry")]
  pub start_retry: RetryConfig,
}

/// Settings for the kill ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LadderConfig {
  /// Wait after the graceful quit request.
  #[serde(default = "default_grace_ms")]
  pub grace_ms: u64,

  /// Wait after SIGTERM.
  #[serde(default = "default_term_wait_ms")]
  pub term_wait_ms: u64,

  /// Wait after SIGKILL.
  #[serde(default = "default_kill_wait_ms")]
  pub kill_wait_ms: u64,

  /// Global deadline for the whole ladder.
  #[serde(default = "default_ladder_deadline_ms")]
  pub deadline_ms: u64,
}

/// Settings for the mpv companion and the media controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConfig {
  /// Custom MPV executable path (None = auto-detect).
  #[serde(default)]
  pub mpv_path: Option<String>,

  /// Additional MPV command-line arguments.
  #[serde(default)]
  pub mpv_args: Vec<String>,

  /// JSON IPC socket used to control MPV.
  #[serde(default = "default_socket_path")]
  pub socket_path: PathBuf,

  /// Root directory of the local library. Every local path must resolve under it.
  #[serde(default = "default_library_root")]
  pub library_root: PathBuf,

  /// yt-dlp executable (name on PATH or absolute path).
  #[serde(default = "default_ytdlp")]
  pub ytdlp_path: String,

  /// Number of results requested from a remote search.
  #[serde(default = "default_search_limit")]
  pub search_limit: u32,

  /// Timeout for the pre-play health query.
  #[serde(default = "default_health_timeout_ms")]
  pub health_timeout_ms: u64,

  /// Pause after respawning MPV before loading.
  #[serde(default = "default_respawn_settle_ms")]
  pub respawn_settle_ms: u64,

  /// Timeout for a remote resolve or search.
  #[serde(default = "default_catalog_timeout_ms")]
  pub catalog_timeout_ms: u64,

  #[serde(default)]
  pub ladder: LadderConfig,

  /// Retry policy for connecting to the IPC socket.
  #[serde(default = "default_connect_retry")]
  pub connect_retry: RetryConfig,
}

/// Settings for the resource broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
  /// Bounded wait on the switch lock.
  #[serde(default = "default_switch_timeout_ms")]
  pub switch_timeout_ms: u64,

  /// Bound on stopping the previous owner before falling back to signals.
  #[serde(default = "default_halt_timeout_ms")]
  pub halt_timeout_ms: u64,

  #[serde(default)]
  pub ladder: LadderConfig,
}

/// Serializable form of a retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
  pub max_attempts: u32,
  pub base_delay_ms: u64,
  pub backoff_factor: f64,
}

fn home() -> PathBuf {
  dirs::home_dir().unwrap_or_else(std::env::temp_dir)
}

fn state_dir() -> PathBuf {
  dirs::data_local_dir()
    .unwrap_or_else(std::env::temp_dir)
    .join("audio-arbiter")
}

fn default_station_binary() -> String {
  "pianobar".to_string()
}

fn default_fifo_path() -> PathBuf {
  dirs::config_dir()
    .unwrap_or_else(|| home().join(".config"))
    .join("pianobar")
    .join("ctl")
}

fn default_status_file() -> PathBuf {
  state_dir().join("station_status.json")
}

fn default_log_dir() -> PathBuf {
  state_dir().join("logs")
}

fn default_cooldown_ms() -> u64 {
  5_000
}

fn default_command_cooldown_ms() -> u64 {
  1_000
}

fn default_settle_ms() -> u64 {
  3_000
}

fn default_pipe_timeout_ms() -> u64 {
  1_000
}

fn default_status_check_timeout_ms() -> u64 {
  2_000
}

fn default_stop_deadline_ms() -> u64 {
  60_000
}

fn default_grace_ms() -> u64 {
  2_000
}

fn default_term_wait_ms() -> u64 {
  2_000
}

fn default_kill_wait_ms() -> u64 {
  1_000
}

fn default_ladder_deadline_ms() -> u64 {
  30_000
}

fn default_start_retry() -> RetryConfig {
  RetryConfig {
    max_attempts: 3,
    base_delay_ms: 2_000,
    backoff_factor: 1.5,
  }
}

fn default_socket_path() -> PathBuf {
  std::env::temp_dir().join("audio-arbiter-mpv.sock")
}

fn default_library_root() -> PathBuf {
  dirs::audio_dir().unwrap_or_else(|| home().join("Music"))
}

fn default_ytdlp() -> String {
  "yt-dlp".to_string()
}

fn default_search_limit() -> u32 {
  10
}

fn default_health_timeout_ms() -> u64 {
  500
}

fn default_respawn_settle_ms() -> u64 {
  500
}

fn default_catalog_timeout_ms() -> u64 {
  20_000
}

fn default_connect_retry() -> RetryConfig {
  RetryConfig {
    max_attempts: 10,
    base_delay_ms: 100,
    backoff_factor: 1.2,
  }
}

fn default_switch_timeout_ms() -> u64 {
  500
}

fn default_halt_timeout_ms() -> u64 {
  10_000
}

impl Default for StationConfig {
  fn default() -> Self {
    Self {
      binary: default_station_binary(),
      args: Vec::new(),
      fifo_path: default_fifo_path(),
      status_file: default_status_file(),
      log_dir: default_log_dir(),
      default_station: None,
      cooldown_ms: default_cooldown_ms(),
      command_cooldown_ms: default_command_cooldown_ms(),
      settle_ms: default_settle_ms(),
      pipe_timeout_ms: default_pipe_timeout_ms(),
      status_check_timeout_ms: default_status_check_timeout_ms(),
      stop_deadline_ms: default_stop_deadline_ms(),
      ladder: LadderConfig::default(),
      start_retry: default_start_retry(),
    }
  }
}

impl Default for LadderConfig {
  fn default() -> Self {
    Self {
      grace_ms: default_grace_ms(),
      term_wait_ms: default_term_wait_ms(),
      kill_wait_ms: default_kill_wait_ms(),
      deadline_ms: default_ladder_deadline_ms(),
    }
  }
}

impl Default for MediaConfig {
  fn default() -> Self {
    Self {
      mpv_path: None,
      mpv_args: Vec::new(),
      socket_path: default_socket_path(),
      library_root: default_library_root(),
      ytdlp_path: default_ytdlp(),
      search_limit: default_search_limit(),
      health_timeout_ms: default_health_timeout_ms(),
      respawn_settle_ms: default_respawn_settle_ms(),
      catalog_timeout_ms: default_catalog_timeout_ms(),
      ladder: LadderConfig::default(),
      connect_retry: default_connect_retry(),
    }
  }
}

impl Default for BrokerConfig {
  fn default() -> Self {
    Self {
      switch_timeout_ms: default_switch_timeout_ms(),
      halt_timeout_ms: default_halt_timeout_ms(),
      ladder: LadderConfig::default(),
    }
  }
}

impl AppConfig {
  /// `<config dir>/audio-arbiter/config.json`.
  pub fn default_path() -> PathBuf {
    dirs::config_dir()
      .unwrap_or_else(|| home().join(".config"))
      .join("audio-arbiter")
      .join("config.json")
  }

  /// Load configuration from a JSON file. A missing file yields the defaults.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        log::info!("No config at {:?}, using defaults", path);
        return Ok(Self::default());
      }
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        })
      }
    };

    let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    config.validate().map_err(ConfigError::Invalid)?;
    log::info!("Loaded config from {:?}", path);
    Ok(config)
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), String> {
    if self.station.binary.trim().is_empty() {
      return Err("Station binary cannot be empty".to_string());
    }
    if self.media.search_limit < 1 || self.media.search_limit > 50 {
      return Err("Search limit must be between 1 and 50".to_string());
    }
    if self.media.health_timeout_ms == 0 {
      return Err("Health timeout must be positive".to_string());
    }
    if self.broker.switch_timeout_ms == 0 {
      return Err("Switch timeout must be positive".to_string());
    }
    for retry in [&self.station.start_retry, &self.media.connect_retry] {
      if retry.max_attempts == 0 {
        return Err("Retry attempts must be at least 1".to_string());
      }
      if retry.backoff_factor < 1.0 {
        return Err("Backoff factor must be at least 1.0".to_string());
      }
    }
    Ok(())
  }
}
