//! High-level MPV client with command methods.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;

use super::ipc::{IpcError, MpvIpc};
use super::process::{cleanup_ipc, find_mpv, socket_signature, spawn_mpv};
use super::protocol::{MpvCommand, MpvEvent, MpvResponse, PropertyValue};
use crate::config::MediaConfig;
use crate::error::ErrorKind;
use crate::process::{KillLadder, ProcessError, ProcessScanner, ProcessSignature};
use crate::retry::RetryPolicy;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const QUIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Properties observed on every fresh connection, with their observer ids.
pub const OBSERVED_PROPERTIES: [(i64, &str); 3] = [(1, "pause"), (2, "time-pos"), (3, "duration")];

#[derive(Error, Debug)]
pub enum MpvError {
  #[error("MPV executable not found")]
  NotFound,
  #[error("Process error: {0}")]
  Process(#[from] ProcessError),
  #[error("IPC error: {0}")]
  Ipc(#[from] IpcError),
  #[error("MPV command failed: {0}")]
  CommandFailed(String),
  #[error("Not connected")]
  NotConnected,
  #[error("MPV did not answer within {0:?}")]
  Unresponsive(Duration),
}

impl MpvError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      MpvError::NotFound => ErrorKind::ProcessNotFound,
      MpvError::Process(e) => e.kind(),
      MpvError::Ipc(e) => e.kind(),
      MpvError::CommandFailed(_) => ErrorKind::External,
      MpvError::NotConnected => ErrorKind::StaleChannel,
      MpvError::Unresponsive(_) => ErrorKind::Timeout,
    }
  }
}

/// High-level MPV client.
///
/// The event stream returned by [`MpvClient::events`] outlives reconnects:
/// every connection forwards into the same channel.
pub struct MpvClient {
  mpv_path: Option<PathBuf>,
  extra_args: Vec<String>,
  socket_path: PathBuf,
  signature: ProcessSignature,
  connect_retry: RetryPolicy<IpcError>,
  settle: Duration,
  ladder: KillLadder,
  pid: Arc<Mutex<Option<u32>>>,
  ipc: Mutex<Option<Arc<MpvIpc>>>,
  events_tx: Sender<MpvEvent>,
  events_rx: Receiver<MpvEvent>,
}

impl MpvClient {
  pub fn new(config: &MediaConfig) -> Self {
    let (events_tx, events_rx) = async_channel::unbounded();
    Self {
      mpv_path: config.mpv_path.as_ref().map(PathBuf::from),
      extra_args: config.mpv_args.clone(),
      signature: socket_signature(&config.socket_path),
      socket_path: config.socket_path.clone(),
      connect_retry: RetryPolicy::from_config(&config.connect_retry),
      settle: Duration::from_millis(config.respawn_settle_ms),
      ladder: KillLadder::new(ProcessScanner::default(), &config.ladder),
      pid: Arc::new(Mutex::new(None)),
      ipc: Mutex::new(None),
      events_tx,
      events_rx,
    }
  }

  /// How this client's MPV process is recognized.
  pub fn signature(&self) -> ProcessSignature {
    self.signature.clone()
  }

  /// Pid of the MPV process spawned by this client, while it lives.
  pub fn pid(&self) -> Option<u32> {
    *self.pid.lock()
  }

  /// Spawn MPV, connect to its socket and observe the playback properties.
  pub async fn start(&self) -> Result<(), MpvError> {
    self.disconnect();
    cleanup_ipc(&self.socket_path);

    let mpv_exe = self.mpv_path.clone().or_else(find_mpv).ok_or(MpvError::NotFound)?;
    let mut child = spawn_mpv(&mpv_exe, &self.socket_path, &self.extra_args)?;
    let pid = child.id();
    *self.pid.lock() = pid;

    let tracked = Arc::clone(&self.pid);
    tokio::spawn(async move {
      match child.wait().await {
        Ok(status) => log::info!("MPV process {:?} exited with: {}", pid, status),
        Err(e) => log::error!("wait() on MPV process failed: {}", e),
      }
      let mut tracked = tracked.lock();
      if *tracked == pid {
        *tracked = None;
      }
    });

    // Give MPV a moment to create the socket.
    tokio::time::sleep(self.settle).await;
    self.connect().await?;

    for (id, name) in OBSERVED_PROPERTIES {
      self.observe_property(id, name).await?;
    }
    log::info!("MPV client connected (pid {:?})", pid);
    Ok(())
  }

  /// Connect to an MPV already listening on the socket.
  pub async fn connect(&self) -> Result<(), MpvError> {
    let ipc = MpvIpc::connect(
      &self.socket_path,
      &self.connect_retry,
      self.events_tx.clone(),
      COMMAND_TIMEOUT,
    )
    .await?;
    *self.ipc.lock() = Some(Arc::new(ipc));
    Ok(())
  }

  fn disconnect(&self) {
    if let Some(conn) = self.ipc.lock().take() {
      log::debug!("Closing MPV IPC connection");
      conn.close();
    }
  }

  /// Quit MPV: ask politely, then make sure no process is left on our socket.
  pub async fn shutdown(&self) {
    let ipc = self.ipc.lock().take();
    if let Some(ipc) = ipc {
      if tokio::time::timeout(QUIT_TIMEOUT, ipc.send_command(MpvCommand::quit()))
        .await
        .is_err()
      {
        log::warn!("MPV did not acknowledge quit");
      }
      ipc.close();
    }

    let report = self.ladder.run(&self.signature, &[], None).await;
    if !report.is_clean() {
      log::error!("MPV processes survived shutdown: {:?}", report.stragglers);
    }
    *self.pid.lock() = None;
    cleanup_ipc(&self.socket_path);
    log::info!("MPV client stopped");
  }

  /// Kill whatever runs on our socket, remove the socket and start fresh.
  pub async fn recover(&self) -> Result<(), MpvError> {
    log::warn!("Recovering MPV companion on {:?}", self.socket_path);
    self.disconnect();

    let report = self.ladder.run(&self.signature, &[], None).await;
    if !report.found.is_empty() {
      log::info!("Removed unresponsive MPV processes {:?}", report.found);
    }
    if !report.is_clean() {
      log::error!("MPV processes survived recovery: {:?}", report.stragglers);
    }
    *self.pid.lock() = None;
    cleanup_ipc(&self.socket_path);

    self.start().await
  }

  /// Trivial property query raced against `timeout`.
  pub async fn health_check(&self, timeout: Duration) -> Result<(), MpvError> {
    let ipc = self.get_ipc()?;
    if ipc.is_closed() {
      return Err(MpvError::Ipc(IpcError::Disconnected));
    }
    match tokio::time::timeout(timeout, ipc.send_command(MpvCommand::get_property("idle-active"))).await {
      // Any answer, even an error response, proves MPV is alive.
      Ok(Ok(_)) => Ok(()),
      Ok(Err(e)) => Err(e.into()),
      Err(_) => Err(MpvError::Unresponsive(timeout)),
    }
  }

  /// Check if connected.
  pub fn is_connected(&self) -> bool {
    self.ipc.lock().as_ref().is_some_and(|ipc| !ipc.is_closed())
  }

  fn get_ipc(&self) -> Result<Arc<MpvIpc>, MpvError> {
    self.ipc.lock().clone().ok_or(MpvError::NotConnected)
  }

  async fn send(&self, cmd: MpvCommand) -> Result<MpvResponse, MpvError> {
    let ipc = self.get_ipc()?;
    let response = ipc.send_command(cmd).await?;

    if !response.is_success() {
      return Err(MpvError::CommandFailed(response.error));
    }

    Ok(response)
  }

  /// Load a file or URL, replacing the current one.
  pub async fn loadfile(&self, url: &str) -> Result<(), MpvError> {
    log::info!("Loading file: {}", url);
    self.send(MpvCommand::loadfile(url)).await?;
    Ok(())
  }

  /// Stop playback; MPV stays idle.
  pub async fn stop_playback(&self) -> Result<(), MpvError> {
    self.send(MpvCommand::stop()).await?;
    Ok(())
  }

  pub async fn seek_relative(&self, delta: f64) -> Result<(), MpvError> {
    self.send(MpvCommand::seek_relative(delta)).await?;
    Ok(())
  }

  pub async fn set_pause(&self, paused: bool) -> Result<(), MpvError> {
    self.send(MpvCommand::set_pause(paused)).await?;
    Ok(())
  }

  /// Set volume (0-100).
  pub async fn set_volume(&self, volume: f64) -> Result<(), MpvError> {
    self.send(MpvCommand::set_volume(volume)).await?;
    Ok(())
  }

  pub async fn get_property(&self, name: &str) -> Result<PropertyValue, MpvError> {
    let response = self.send(MpvCommand::get_property(name)).await?;
    Ok(
      response
        .data
        .map(PropertyValue::from)
        .unwrap_or(PropertyValue::Null),
    )
  }

  /// Observe a property for changes.
  /// Changes arrive on [`MpvClient::events`] with event="property-change".
  pub async fn observe_property(&self, observer_id: i64, property: &str) -> Result<(), MpvError> {
    self.send(MpvCommand::observe_property(observer_id, property)).await?;
    Ok(())
  }

  /// Event stream shared by all connections of this client.
  pub fn events(&self) -> Receiver<MpvEvent> {
    self.events_rx.clone()
  }
}
