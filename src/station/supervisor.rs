//! Lifecycle of the station player process.
//!
//! `NotRunning → Starting → Running → Stopping → NotRunning`. Start and stop
//! share one operation lock and are strictly serialized; a second request
//! while one is in flight is rejected rather than queued.

use std::fs::OpenOptions;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use super::command::{StationCommand, QUIT};
use super::fifo::{ControlFifo, FifoError};
use crate::broker::{AudioSource, ResourceBroker, SourceId};
use crate::config::StationConfig;
use crate::error::ErrorKind;
use crate::process::{
  is_alive, send_signal, KillLadder, LadderReport, ProcessError, ProcessScanner, ProcessSignature, Signal,
};
use crate::retry::RetryPolicy;
use crate::status::{RunFlags, SnapshotStatus, StatusPatch, StatusSnapshot, StatusStore};

const PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum StationError {
  #[error("Another start/stop is in progress")]
  Busy,
  #[error("Rate limited, try again in {0:?}")]
  RateLimited(Duration),
  #[error("Audio output could not be acquired")]
  Conflict,
  #[error("Station player was preempted while starting")]
  Preempted,
  #[error("Station player is not running")]
  NotRunning,
  #[error("Station player executable {0:?} not found")]
  BinaryNotFound(String),
  #[error("Process error: {0}")]
  Process(#[from] ProcessError),
  #[error("Control FIFO error: {0}")]
  Fifo(#[from] FifoError),
  #[error("Station player did not come up: {0}")]
  VerificationFailed(String),
  #[error("Orphaned station processes survived cleanup: {0:?}")]
  OrphansSurvived(Vec<u32>),
  #[error("Command '{0}' could not be delivered")]
  DeliveryFailed(String),
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

impl StationError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      StationError::Busy
      | StationError::RateLimited(_)
      | StationError::Conflict
      | StationError::Preempted => ErrorKind::Conflict,
      StationError::NotRunning | StationError::BinaryNotFound(_) => ErrorKind::ProcessNotFound,
      StationError::Process(e) => e.kind(),
      StationError::Fifo(e) => e.kind(),
      StationError::VerificationFailed(_) => ErrorKind::ProcessNotFound,
      StationError::OrphansSurvived(_) => ErrorKind::OrphanDetected,
      StationError::DeliveryFailed(_) => ErrorKind::Timeout,
      StationError::Io(_) => ErrorKind::Io,
    }
  }

  /// Whether another start attempt can help.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      StationError::Process(_)
        | StationError::Fifo(_)
        | StationError::VerificationFailed(_)
        | StationError::OrphansSurvived(_)
        | StationError::Io(_)
    )
  }
}

/// Lifecycle state of the station player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StationState {
  #[default]
  NotRunning,
  Starting,
  Running,
  Stopping,
}

/// The spawned player process.
#[derive(Debug, Clone, Copy)]
pub struct ProcessHandle {
  pub pid: u32,
  pub started_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReport {
  pub pid: Option<u32>,
  pub already_running: bool,
  pub attempts: u32,
}

/// Result of a stop. A stop always counts as success; failures are recorded
/// here for observability only.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopReport {
  pub already_stopped: bool,
  pub graceful: bool,
  pub forced: bool,
  pub stragglers: Vec<u32>,
}

/// Which delivery paths carried a command.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
  pub direct: bool,
  pub helper: bool,
  pub signal: bool,
}

impl DeliveryReport {
  pub fn any(&self) -> bool {
    self.direct || self.helper || self.signal
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReport {
  pub command: StationCommand,
  pub delivery: DeliveryReport,
  /// Status recorded optimistically; the player never acknowledges.
  pub status: SnapshotStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStatus {
  pub state: StationState,
  pub pid: Option<u32>,
  pub uptime_secs: Option<u64>,
  pub last_command: Option<String>,
  pub owns_output: bool,
  pub snapshot: StatusSnapshot,
}

#[derive(Debug, Clone, Copy)]
enum OpKind {
  Start,
  Stop,
}

#[derive(Default)]
struct Inner {
  state: StationState,
  process: Option<ProcessHandle>,
  last_start: Option<Instant>,
  last_stop: Option<Instant>,
  last_command: Option<(StationCommand, Instant)>,
}

/// Supervises the station player.
pub struct StationSupervisor {
  config: StationConfig,
  signature: ProcessSignature,
  fifo: ControlFifo,
  status: StatusStore,
  scanner: ProcessScanner,
  ladder: KillLadder,
  broker: Arc<ResourceBroker>,
  inner: Arc<Mutex<Inner>>,
  op_lock: tokio::sync::Mutex<()>,
  command_lock: tokio::sync::Mutex<()>,
  start_retry: RetryPolicy<StationError>,
  cooldown: Duration,
  command_cooldown: Duration,
  settle: Duration,
  grace: Duration,
  pipe_timeout: Duration,
  status_check_timeout: Duration,
  stop_deadline: Duration,
}

impl StationSupervisor {
  pub fn new(config: StationConfig, broker: Arc<ResourceBroker>) -> Self {
    let scanner = ProcessScanner::default();
    let ms = Duration::from_millis;
    Self {
      signature: ProcessSignature::named(&config.binary),
      fifo: ControlFifo::new(&config.fifo_path, ms(config.pipe_timeout_ms)),
      status: StatusStore::new(&config.status_file),
      ladder: KillLadder::new(scanner.clone(), &config.ladder),
      scanner,
      broker,
      inner: Arc::new(Mutex::new(Inner::default())),
      op_lock: tokio::sync::Mutex::new(()),
      command_lock: tokio::sync::Mutex::new(()),
      start_retry: RetryPolicy::from_config(&config.start_retry).retry_if(StationError::is_retryable),
      cooldown: ms(config.cooldown_ms),
      command_cooldown: ms(config.command_cooldown_ms),
      settle: ms(config.settle_ms),
      grace: ms(config.ladder.grace_ms),
      pipe_timeout: ms(config.pipe_timeout_ms),
      status_check_timeout: ms(config.status_check_timeout_ms),
      stop_deadline: ms(config.stop_deadline_ms),
      config,
    }
  }

  /// Current lifecycle state.
  pub fn state(&self) -> StationState {
    self.inner.lock().state
  }

  /// Pid of the process this supervisor spawned, if it is still tracked.
  pub fn tracked_pid(&self) -> Option<u32> {
    self.inner.lock().process.map(|p| p.pid)
  }

  fn set_state(&self, state: StationState) {
    let mut inner = self.inner.lock();
    if inner.state != state {
      log::info!("Station state {:?} -> {:?}", inner.state, state);
      inner.state = state;
    }
  }

  fn check_cooldown(&self, kind: OpKind) -> Result<(), StationError> {
    let mut inner = self.inner.lock();
    let slot = match kind {
      OpKind::Start => &mut inner.last_start,
      OpKind::Stop => &mut inner.last_stop,
    };
    if let Some(at) = *slot {
      let elapsed = at.elapsed();
      if elapsed < self.cooldown {
        log::warn!("Station {:?} rejected, last one {:?} ago", kind, elapsed);
        return Err(StationError::RateLimited(self.cooldown - elapsed));
      }
    }
    *slot = Some(Instant::now());
    Ok(())
  }

  fn check_command_cooldown(&self, command: StationCommand) -> Result<(), StationError> {
    let mut inner = self.inner.lock();
    if let Some((last, at)) = inner.last_command {
      let elapsed = at.elapsed();
      if last == command && elapsed < self.command_cooldown {
        log::warn!("Duplicate command '{}' rejected", command);
        return Err(StationError::RateLimited(self.command_cooldown - elapsed));
      }
    }
    inner.last_command = Some((command, Instant::now()));
    Ok(())
  }

  async fn persist(&self, patch: StatusPatch) {
    match tokio::time::timeout(PERSIST_TIMEOUT, self.status.update(patch)).await {
      Ok(Ok(_)) => {}
      Ok(Err(e)) => log::error!("Failed to persist station status: {}", e),
      Err(_) => log::error!("Persisting station status timed out"),
    }
  }

  /// Start the station player.
  pub async fn start(&self) -> Result<StartReport, StationError> {
    let _op = self.op_lock.try_lock().map_err(|_| {
      log::warn!("Station start rejected: operation in progress");
      StationError::Busy
    })?;
    self.check_cooldown(OpKind::Start)?;
    log::info!("Starting station player {}", self.config.binary);

    let probe = self.scanner.probe(&self.signature).await;
    if probe.confirmed() {
      let pid = probe.table.first().copied();
      log::info!("Station player already running (pid {:?}), adopting it", pid);
      // Tracked before acquiring so the broker does not take it for a stray.
      if let Some(pid) = pid {
        self.inner.lock().process = Some(ProcessHandle {
          pid,
          started_at: Instant::now(),
        });
      }
      if !self.broker.acquire(SourceId::Station).await {
        self.inner.lock().process = None;
        return Err(StationError::Conflict);
      }
      self.set_state(StationState::Running);
      return Ok(StartReport {
        pid,
        already_running: true,
        attempts: 0,
      });
    }

    if !self.broker.acquire(SourceId::Station).await {
      return Err(StationError::Conflict);
    }

    self.set_state(StationState::Starting);
    let result = self
      .start_retry
      .run("station start", |attempt| self.start_attempt(attempt))
      .await;

    if let Err(e) = &result {
      log::error!("Station player failed to start: {}", e);
      {
        let mut inner = self.inner.lock();
        inner.state = StationState::NotRunning;
        inner.process = None;
      }
      self.broker.release(SourceId::Station);
      self
        .persist(
          StatusPatch::new()
            .status(SnapshotStatus::Stopped)
            .last_command("start")
            .run_flags(&RunFlags::default())
            .field("lastError", e.to_string()),
        )
        .await;
    }
    result
  }

  async fn start_attempt(&self, attempt: u32) -> Result<StartReport, StationError> {
    log::info!("Station start attempt {}", attempt);

    let cleanup = self.cleanup_orphans().await;
    if !cleanup.stragglers.is_empty() && !cleanup.timed_out {
      return Err(StationError::OrphansSurvived(cleanup.stragglers));
    }

    self.fifo.ensure()?;
    self.ensure_still_owner()?;

    let pid = self.spawn()?;
    tokio::time::sleep(self.settle).await;

    if let Err(e) = self.verify_started(pid).await.and_then(|_| self.ensure_still_owner()) {
      self.abort_start(pid).await;
      return Err(e);
    }

    self.set_state(StationState::Running);
    self
      .persist(
        StatusPatch::new()
          .status(SnapshotStatus::Playing)
          .last_command("start")
          .run_flags(&RunFlags {
            running: true,
            pid: Some(pid),
            station: self.config.default_station,
          }),
      )
      .await;

    if let Some(station) = self.config.default_station {
      let delivery = self.deliver(StationCommand::SelectStation(station), Some(pid)).await;
      if !delivery.any() {
        log::warn!("Default station {} could not be selected", station);
      }
    }

    Ok(StartReport {
      pid: Some(pid),
      already_running: false,
      attempts: attempt,
    })
  }

  fn ensure_still_owner(&self) -> Result<(), StationError> {
    if self.broker.is_active(SourceId::Station) {
      Ok(())
    } else {
      Err(StationError::Preempted)
    }
  }

  fn spawn(&self) -> Result<u32, StationError> {
    let program = which::which(&self.config.binary)
      .map_err(|_| StationError::BinaryNotFound(self.config.binary.clone()))?;

    std::fs::create_dir_all(&self.config.log_dir)?;
    let stdout = open_log(&self.config.log_dir.join("station.out.log"))?;
    let stderr = open_log(&self.config.log_dir.join("station.err.log"))?;

    let mut cmd = tokio::process::Command::new(&program);
    cmd
      .args(&self.config.args)
      .stdin(Stdio::null())
      .stdout(Stdio::from(stdout))
      .stderr(Stdio::from(stderr))
      .process_group(0);

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
      program: program.display().to_string(),
      source,
    })?;
    let pid = child
      .id()
      .ok_or_else(|| StationError::VerificationFailed("spawned process has no pid".to_string()))?;
    log::info!("Spawned station player {:?} (pid {})", program, pid);

    self.inner.lock().process = Some(ProcessHandle {
      pid,
      started_at: Instant::now(),
    });

    let inner = Arc::clone(&self.inner);
    tokio::spawn(async move {
      match child.wait().await {
        Ok(status) => log::info!("Station player {} exited: {}", pid, status),
        Err(e) => log::warn!("Waiting for station player {} failed: {}", pid, e),
      }
      let mut inner = inner.lock();
      if inner.process.is_some_and(|p| p.pid == pid) {
        inner.process = None;
      }
    });

    Ok(pid)
  }

  async fn verify_started(&self, pid: u32) -> Result<(), StationError> {
    let tracked = self.tracked_pid() == Some(pid) && is_alive(pid);
    let probe = self.scanner.probe(&self.signature).await;
    if tracked && probe.confirmed() {
      log::info!("Station player {} verified running", pid);
      Ok(())
    } else {
      Err(StationError::VerificationFailed(format!(
        "pid {} tracked={} table={:?} pgrep={:?}",
        pid, tracked, probe.table, probe.pgrep
      )))
    }
  }

  async fn abort_start(&self, pid: u32) {
    log::warn!("Aborting start of station player {}", pid);
    let report = self.ladder.run(&self.signature, &[], None).await;
    if !report.is_clean() {
      log::error!("Station processes survived aborted start: {:?}", report.stragglers);
    }
    self.inner.lock().process = None;
  }

  /// Stop the station player. Always reports success once accepted.
  pub async fn stop(&self) -> Result<StopReport, StationError> {
    let _op = self.op_lock.try_lock().map_err(|_| {
      log::warn!("Station stop rejected: operation in progress");
      StationError::Busy
    })?;
    self.check_cooldown(OpKind::Stop)?;
    Ok(self.stop_locked("stop").await)
  }

  async fn stop_locked(&self, command: &str) -> StopReport {
    let mut guard = AbandonedStop {
      supervisor: self,
      command,
      armed: true,
    };
    let report = self.stop_with_deadline(command).await;
    guard.armed = false;
    report
  }

  async fn stop_with_deadline(&self, command: &str) -> StopReport {
    match tokio::time::timeout(self.stop_deadline, self.stop_steps(command)).await {
      Ok(report) => report,
      Err(_) => {
        log::error!("Station stop exceeded {:?}, forcing completion", self.stop_deadline);
        let stragglers = self.tracked_pid().into_iter().collect();
        self.finish_stop(command, Some("stop deadline exceeded")).await;
        StopReport {
          already_stopped: false,
          graceful: false,
          forced: true,
          stragglers,
        }
      }
    }
  }

  async fn stop_steps(&self, command: &str) -> StopReport {
    let tracked = self.tracked_pid().filter(|pid| is_alive(*pid));
    let probe = self.scanner.probe(&self.signature).await;
    if tracked.is_none() && !probe.any() {
      log::info!("Station player already stopped");
      self.finish_stop(command, None).await;
      return StopReport {
        already_stopped: true,
        ..StopReport::default()
      };
    }

    self.set_state(StationState::Stopping);
    if let Err(e) = self.fifo.ensure() {
      log::warn!("Control FIFO unusable before quit: {}", e);
    }

    let graceful = match tokio::time::timeout(self.pipe_timeout, self.fifo.write_direct(QUIT)).await {
      Ok(Ok(())) => true,
      Ok(Err(e)) => {
        log::warn!("Graceful quit failed: {}", e);
        false
      }
      Err(_) => {
        log::warn!("Graceful quit timed out");
        false
      }
    };
    if graceful {
      tokio::time::sleep(self.grace).await;
    }

    let mut report = StopReport {
      graceful,
      ..StopReport::default()
    };
    if self.scanner.probe(&self.signature).await.any() {
      log::warn!("Station player still running, escalating");
      let ladder = self.ladder.run(&self.signature, &[], None).await;
      report.forced = ladder.timed_out;
    }

    report.stragglers = self.scanner.probe(&self.signature).await.pids();
    let error = if report.stragglers.is_empty() {
      None
    } else {
      log::error!("Unkillable station processes remain: {:?}", report.stragglers);
      Some(format!("unkillable processes {:?}", report.stragglers))
    };
    self.finish_stop(command, error.as_deref()).await;
    report
  }

  async fn finish_stop(&self, command: &str, error: Option<&str>) {
    {
      let mut inner = self.inner.lock();
      inner.state = StationState::NotRunning;
      inner.process = None;
    }
    let mut patch = StatusPatch::new()
      .status(SnapshotStatus::Stopped)
      .last_command(command)
      .run_flags(&RunFlags::default());
    if let Some(error) = error {
      patch = patch.field("lastError", error);
    }
    self.persist(patch).await;
    self.broker.release(SourceId::Station);
  }

  /// Send a command to the running player.
  ///
  /// There is no acknowledgment channel: success means at least one delivery
  /// path accepted the command, and the snapshot records the intended effect.
  pub async fn send_command(&self, command: StationCommand) -> Result<CommandReport, StationError> {
    if self.op_lock.try_lock().is_err() {
      return Err(StationError::Busy);
    }
    let _cmd = self.command_lock.try_lock().map_err(|_| StationError::Busy)?;
    self.check_command_cooldown(command)?;

    let running = tokio::time::timeout(self.status_check_timeout, self.is_running())
      .await
      .unwrap_or_else(|_| {
        log::warn!("Station running check timed out, assuming not running");
        false
      });
    if !running {
      let was_running = {
        let mut inner = self.inner.lock();
        // No stop holds the op lock here, so Stopping is left over from one
        // that never finished.
        let was_running = matches!(inner.state, StationState::Running | StationState::Stopping);
        if was_running {
          inner.state = StationState::NotRunning;
          inner.process = None;
        }
        was_running
      };
      if was_running {
        log::warn!("Station player disappeared");
        self
          .persist(
            StatusPatch::new()
              .status(SnapshotStatus::Stopped)
              .last_command("exited")
              .run_flags(&RunFlags::default()),
          )
          .await;
        self.broker.release(SourceId::Station);
      }
      return Err(StationError::NotRunning);
    }

    if let Err(e) = self.fifo.ensure() {
      log::warn!("Control FIFO repair failed: {}", e);
    }

    let pid = match self.tracked_pid() {
      Some(pid) => Some(pid),
      None => self.scanner.probe(&self.signature).await.table.first().copied(),
    };
    let delivery = self.deliver(command, pid).await;
    if !delivery.any() {
      return Err(StationError::DeliveryFailed(command.to_string()));
    }

    let current = self.status.read().await.status;
    let status = command.resulting_status(current);
    self
      .persist(
        StatusPatch::new()
          .status(status)
          .last_command(&command.to_string()),
      )
      .await;

    Ok(CommandReport {
      command,
      delivery,
      status,
    })
  }

  async fn is_running(&self) -> bool {
    if self.tracked_pid().is_some_and(is_alive) {
      return true;
    }
    self.scanner.probe(&self.signature).await.confirmed()
  }

  async fn deliver(&self, command: StationCommand, pid: Option<u32>) -> DeliveryReport {
    let line = command.wire();
    let signal = command.fallback_signal();
    let mut report = DeliveryReport::default();

    // A stopped process cannot read the pipe, so continue it first.
    if signal == Some(Signal::Cont) {
      if let Some(pid) = pid {
        report.signal = Self::signal(pid, Signal::Cont);
      }
    }

    report.direct = match self.fifo.write_direct(&line).await {
      Ok(()) => true,
      Err(e) => {
        log::warn!("Direct FIFO write of '{}' failed: {}", command, e);
        false
      }
    };

    if !report.direct || command.is_idempotent() {
      report.helper = match self.fifo.write_via_helper(&line).await {
        Ok(()) => true,
        Err(e) => {
          log::warn!("Helper FIFO write of '{}' failed: {}", command, e);
          false
        }
      };
    }

    if signal == Some(Signal::Stop) && !report.direct && !report.helper {
      if let Some(pid) = pid {
        report.signal = Self::signal(pid, Signal::Stop);
      }
    }

    log::info!(
      "Delivered '{}': direct={} helper={} signal={}",
      command,
      report.direct,
      report.helper,
      report.signal
    );
    report
  }

  fn signal(pid: u32, signal: Signal) -> bool {
    match send_signal(pid, signal) {
      Ok(()) => true,
      Err(e) => {
        log::warn!("Fallback {:?} to {} failed: {}", signal, pid, e);
        false
      }
    }
  }

  /// Remove every station player process: graceful quit, SIGTERM, SIGKILL,
  /// then verification. Bounded by the ladder deadline.
  pub async fn cleanup_orphans(&self) -> LadderReport {
    let fifo = self.fifo.clone();
    let timeout = self.pipe_timeout;
    let graceful = Box::pin(async move {
      match tokio::time::timeout(timeout, fifo.write_direct(QUIT)).await {
        Ok(Ok(())) => log::info!("Sent quit to orphaned station player"),
        Ok(Err(e)) => log::debug!("Quit to orphaned station player failed: {}", e),
        Err(_) => log::debug!("Quit to orphaned station player timed out"),
      }
    });
    self.ladder.run(&self.signature, &[], Some(graceful)).await
  }

  /// Snapshot of the supervisor and the persisted status.
  pub async fn status(&self) -> StationStatus {
    let (state, process, last_command) = {
      let inner = self.inner.lock();
      (
        inner.state,
        inner.process,
        inner.last_command.map(|(command, _)| command.to_string()),
      )
    };
    StationStatus {
      state,
      pid: process.map(|p| p.pid),
      uptime_secs: process.map(|p| p.started_at.elapsed().as_secs()),
      last_command,
      owns_output: self.broker.is_active(SourceId::Station),
      snapshot: self.status.read().await,
    }
  }
}

/// Completes the bookkeeping of a stop whose future is dropped half-way,
/// which happens when the broker gives up waiting on `halt`.
struct AbandonedStop<'a> {
  supervisor: &'a StationSupervisor,
  command: &'a str,
  armed: bool,
}

impl Drop for AbandonedStop<'_> {
  fn drop(&mut self) {
    if !self.armed {
      return;
    }
    log::warn!("Station stop abandoned, forcing state to NotRunning");
    {
      let mut inner = self.supervisor.inner.lock();
      inner.state = StationState::NotRunning;
      inner.process = None;
    }
    self.supervisor.broker.release(SourceId::Station);

    let patch = StatusPatch::new()
      .status(SnapshotStatus::Stopped)
      .last_command(self.command)
      .run_flags(&RunFlags::default())
      .field("lastError", "stop abandoned");
    let store = self.supervisor.status.clone();
    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        handle.spawn(async move {
          if let Err(e) = store.update(patch).await {
            log::error!("Failed to persist abandoned stop: {}", e);
          }
        });
      }
      Err(_) => log::error!("No runtime left to persist abandoned stop"),
    }
  }
}

fn open_log(path: &Path) -> std::io::Result<std::fs::File> {
  OpenOptions::new().create(true).append(true).open(path)
}

#[async_trait]
impl AudioSource for StationSupervisor {
  fn id(&self) -> SourceId {
    SourceId::Station
  }

  async fn halt(&self) -> Result<(), String> {
    let Ok(_op) = self.op_lock.try_lock() else {
      return Err("station start/stop in progress".to_string());
    };
    let report = self.stop_locked("preempted").await;
    if report.stragglers.is_empty() {
      Ok(())
    } else {
      Err(format!("station processes survived: {:?}", report.stragglers))
    }
  }

  fn signature(&self) -> ProcessSignature {
    self.signature.clone()
  }

  fn owned_pids(&self) -> Vec<u32> {
    self.tracked_pid().into_iter().collect()
  }
}
