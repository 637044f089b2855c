//! Media playback on the MPV companion.
//!
//! Play operations are serialized by `play_lock`. Player events are consumed
//! by a listener task and fed through [`transition`]; the effects it returns
//! are carried out here.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::backend::PlayerBackend;
use super::library::{Library, LibraryError};
use super::machine::{transition, Effect, Machine, Phase, PlayerEvent};
use super::progress::{MediaNotice, ProgressHub, Subscription};
use super::queue::{Queue, QueueFull, QueueSlot};
use super::track::{Track, TrackMetadata};
use crate::broker::{AudioSource, ResourceBroker, SourceId};
use crate::catalog::{CatalogError, RemoteCatalog, SearchHit};
use crate::config::MediaConfig;
use crate::error::ErrorKind;
use crate::mpv::MpvError;
use crate::process::ProcessSignature;

const DEFAULT_VOLUME: f64 = 100.0;

#[derive(Error, Debug)]
pub enum MediaError {
  #[error("Audio output could not be acquired")]
  Conflict,
  #[error("Player error: {0}")]
  Player(#[from] MpvError),
  #[error("Catalog error: {0}")]
  Catalog(#[from] CatalogError),
  #[error("Library error: {0}")]
  Library(#[from] LibraryError),
  #[error("{0}")]
  QueueFull(#[from] QueueFull),
  #[error("Queue slot {0:?} is empty")]
  EmptySlot(QueueSlot),
  #[error("Nothing is playing")]
  NothingPlaying,
  #[error("Volume {0} is outside 0-100")]
  InvalidVolume(f64),
}

impl MediaError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      MediaError::Conflict | MediaError::QueueFull(_) => ErrorKind::Conflict,
      MediaError::Player(e) => e.kind(),
      MediaError::Catalog(e) => e.kind(),
      MediaError::Library(e) => e.kind(),
      MediaError::EmptySlot(_) | MediaError::NothingPlaying => ErrorKind::Conflict,
      MediaError::InvalidVolume(_) => ErrorKind::InvalidPath,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveStatus {
  Pending,
}

/// Handle for a background save. The outcome arrives as a
/// `SaveCompleted`/`SaveFailed` notice with the same job id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTicket {
  pub job_id: String,
  pub target: PathBuf,
  pub status: SaveStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
  pub path: PathBuf,
  pub dequeued: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatus {
  pub phase: Phase,
  pub current: Option<Track>,
  pub position: f64,
  pub duration: Option<f64>,
  pub volume: f64,
  pub queue: Queue,
  pub owns_output: bool,
  pub player_pid: Option<u32>,
}

struct Playback {
  machine: Machine,
  current: Option<Track>,
  queue: Queue,
  volume: f64,
}

impl Default for Playback {
  fn default() -> Self {
    Self {
      machine: Machine::default(),
      current: None,
      queue: Queue::default(),
      volume: DEFAULT_VOLUME,
    }
  }
}

pub struct MediaController {
  backend: Arc<dyn PlayerBackend>,
  catalog: Arc<dyn RemoteCatalog>,
  broker: Arc<ResourceBroker>,
  library: Library,
  playback: Mutex<Playback>,
  hub: Arc<ProgressHub>,
  play_lock: tokio::sync::Mutex<()>,
  health_timeout: Duration,
  listener: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl MediaController {
  pub fn new(
    config: &MediaConfig,
    backend: Arc<dyn PlayerBackend>,
    catalog: Arc<dyn RemoteCatalog>,
    broker: Arc<ResourceBroker>,
  ) -> Self {
    Self {
      backend,
      catalog,
      broker,
      library: Library::new(&config.library_root),
      playback: Mutex::new(Playback::default()),
      hub: Arc::new(ProgressHub::default()),
      play_lock: tokio::sync::Mutex::new(()),
      health_timeout: Duration::from_millis(config.health_timeout_ms),
      listener: Mutex::new(None),
    }
  }

  // ---- event listener ----

  /// Start consuming player events. Replaces a running listener.
  pub fn start_listener(self: &Arc<Self>) {
    self.stop_listener();

    let token = CancellationToken::new();
    let cancelled = token.clone();
    let events = self.backend.events();
    let weak: Weak<Self> = Arc::downgrade(self);

    let handle = tokio::spawn(async move {
      log::info!("Media event listener started");
      loop {
        tokio::select! {
          _ = cancelled.cancelled() => break,
          received = events.recv() => {
            let raw = match received {
              Ok(raw) => raw,
              Err(_) => {
                log::warn!("Media event stream closed");
                break;
              }
            };
            let Some(event) = PlayerEvent::from_mpv(&raw) else {
              continue;
            };
            let Some(controller) = weak.upgrade() else {
              break;
            };
            controller.handle_event(event).await;
          }
        }
      }
      log::info!("Media event listener stopped");
    });

    *self.listener.lock() = Some((token, handle));
  }

  pub fn stop_listener(&self) {
    if let Some((token, _handle)) = self.listener.lock().take() {
      token.cancel();
    }
  }

  /// Apply one player event and carry out its effects.
  pub async fn handle_event(&self, event: PlayerEvent) {
    log::debug!("Media event {:?}", event);
    let effects = {
      let mut playback = self.playback.lock();
      let (next, effects) = transition(&playback.machine, event);
      if next.phase != playback.machine.phase {
        log::info!("Media phase {:?} -> {:?}", playback.machine.phase, next.phase);
      }
      playback.machine = next;
      effects
    };

    for effect in effects {
      match effect {
        Effect::AutoAdvance => {
          if let Err(e) = self.auto_advance().await {
            log::error!("Auto-advance failed: {}", e);
          }
        }
        Effect::PublishProgress => self.publish_progress(),
        Effect::PublishError(message) => {
          log::warn!("Playback error: {}", message);
          self.hub.broadcast(MediaNotice::Error { message });
        }
      }
    }
  }

  fn publish_progress(&self) {
    self.hub.publish_with(|| {
      let playback = self.playback.lock();
      MediaNotice::Progress {
        phase: playback.machine.phase,
        position: playback.machine.position,
        duration: playback.machine.duration,
        title: playback.current.as_ref().map(|t| t.title.clone()),
      }
    });
  }

  fn publish_track_changed(&self) {
    self.hub.publish_with(|| MediaNotice::TrackChanged {
      track: self.playback.lock().current.clone(),
    });
  }

  // ---- playback ----

  /// Make sure the player answers; otherwise restart it and forget what it
  /// was doing.
  async fn ensure_healthy(&self) -> Result<(), MediaError> {
    match self.backend.health_check(self.health_timeout).await {
      Ok(()) => Ok(()),
      Err(e) => {
        log::warn!("Media player unhealthy ({}), recovering", e);
        {
          let mut playback = self.playback.lock();
          playback.machine = Machine::default();
          playback.current = None;
        }
        self.backend.recover().await?;
        log::info!("Media player recovered");
        Ok(())
      }
    }
  }

  async fn acquire_output(&self) -> Result<(), MediaError> {
    if self.broker.acquire(SourceId::Media).await {
      Ok(())
    } else {
      Err(MediaError::Conflict)
    }
  }

  /// Play a remote track. The stream address is resolved for this play only.
  pub async fn play_remote(&self, id: &str, metadata: TrackMetadata) -> Result<Track, MediaError> {
    let _play = self.play_lock.lock().await;
    self.ensure_healthy().await?;
    self.acquire_output().await?;

    let address = match self.catalog.resolve(id).await {
      Ok(address) => address,
      Err(e) => {
        self.release_if_idle();
        return Err(e.into());
      }
    };
    self.load(Track::remote(id, &metadata), &address).await
  }

  /// Play a file from the library.
  pub async fn play_local(&self, path: &Path) -> Result<Track, MediaError> {
    let _play = self.play_lock.lock().await;
    let path = self.library.existing_file(path)?;
    self.ensure_healthy().await?;
    self.acquire_output().await?;
    let url = path.to_string_lossy().into_owned();
    self.load(Track::local(&path), &url).await
  }

  /// Load `url` into the player. The output may have been taken by the other
  /// source while the caller was resolving or probing; ownership is checked
  /// again on both sides of the load.
  async fn load(&self, track: Track, url: &str) -> Result<Track, MediaError> {
    let replacing = {
      let mut playback = self.playback.lock();
      if !self.broker.is_active(SourceId::Media) {
        log::warn!("Output taken before {} could load", track.title);
        return Err(MediaError::Conflict);
      }
      playback.current = Some(track.clone());
      playback.machine.begin_load(track.duration_seconds)
    };
    log::info!(
      "Loading {} - {}{}",
      track.artist,
      track.title,
      if replacing { " (replacing current track)" } else { "" }
    );
    self.publish_track_changed();

    match self.backend.load(url).await {
      Ok(()) if self.broker.is_active(SourceId::Media) => Ok(track),
      Ok(()) => {
        log::warn!("Output taken while {} was loading, stopping it", track.title);
        {
          let mut playback = self.playback.lock();
          playback.machine.abandon_load();
          playback.current = None;
        }
        if let Err(e) = self.backend.stop().await {
          log::warn!("Stopping media player failed: {}", e);
        }
        self.publish_track_changed();
        Err(MediaError::Conflict)
      }
      Err(e) => {
        log::error!("Loading {} failed: {}", track.title, e);
        {
          let mut playback = self.playback.lock();
          playback.machine = Machine::default();
          playback.current = None;
        }
        self.broker.release(SourceId::Media);
        self.publish_track_changed();
        Err(e.into())
      }
    }
  }

  fn release_if_idle(&self) {
    if !self.playback.lock().machine.phase.is_active() {
      self.broker.release(SourceId::Media);
    }
  }

  /// Natural end of a track: play the next one unless something else was
  /// started in the meantime.
  async fn auto_advance(&self) -> Result<Option<Track>, MediaError> {
    let _play = self.play_lock.lock().await;
    if self.playback.lock().machine.phase.is_active() {
      log::debug!("Skipping auto-advance, playback already replaced");
      return Ok(None);
    }
    self.advance_locked().await
  }

  /// Skip to the next queued track, or stop when the queue is empty.
  pub async fn next(&self) -> Result<Option<Track>, MediaError> {
    let _play = self.play_lock.lock().await;
    self.advance_locked().await
  }

  async fn advance_locked(&self) -> Result<Option<Track>, MediaError> {
    loop {
      let next = self.playback.lock().queue.advance();
      let Some(track) = next else {
        self.finish_playback().await;
        return Ok(None);
      };
      let Some(path) = track.local_path().map(Path::to_path_buf) else {
        continue;
      };
      if !path.is_file() {
        log::warn!("Queued file {:?} disappeared, skipping", path);
        continue;
      }

      log::info!("Advancing to {}", track.title);
      self.ensure_healthy().await?;
      self.acquire_output().await?;
      let url = path.to_string_lossy().into_owned();
      return self.load(track, &url).await.map(Some);
    }
  }

  /// Stop whatever plays, clear the current track and give up the output.
  async fn finish_playback(&self) {
    let active = {
      let mut playback = self.playback.lock();
      let active = playback.machine.phase.is_active();
      playback.machine.begin_stop();
      playback.current = None;
      active
    };
    if active {
      if let Err(e) = self.backend.stop().await {
        log::warn!("Stopping media player failed: {}", e);
      }
    }
    self.broker.release(SourceId::Media);
    self.publish_track_changed();
  }

  pub async fn stop(&self) -> Result<(), MediaError> {
    let _play = self.play_lock.lock().await;
    log::info!("Stopping media playback");
    self.finish_playback().await;
    Ok(())
  }

  fn ensure_playing(&self) -> Result<(), MediaError> {
    if self.playback.lock().machine.phase.is_active() {
      Ok(())
    } else {
      Err(MediaError::NothingPlaying)
    }
  }

  pub async fn pause(&self) -> Result<(), MediaError> {
    self.ensure_playing()?;
    self.backend.set_pause(true).await?;
    Ok(())
  }

  pub async fn resume(&self) -> Result<(), MediaError> {
    self.ensure_playing()?;
    self.backend.set_pause(false).await?;
    Ok(())
  }

  /// Seek relative to the current position.
  pub async fn seek(&self, delta_seconds: f64) -> Result<(), MediaError> {
    self.ensure_playing()?;
    self.backend.seek(delta_seconds).await?;
    Ok(())
  }

  pub async fn set_volume(&self, volume: f64) -> Result<(), MediaError> {
    if !(0.0..=100.0).contains(&volume) {
      return Err(MediaError::InvalidVolume(volume));
    }
    self.backend.set_volume(volume).await?;
    self.playback.lock().volume = volume;
    Ok(())
  }

  // ---- queue ----

  pub fn enqueue(&self, path: &Path) -> Result<QueueSlot, MediaError> {
    let path = self.library.existing_file(path)?;
    let slot = self.playback.lock().queue.enqueue(Track::local(&path))?;
    log::info!("Queued {:?} in {:?}", path, slot);
    Ok(slot)
  }

  pub fn dequeue(&self, slot: QueueSlot) -> Result<Track, MediaError> {
    self
      .playback
      .lock()
      .queue
      .dequeue(slot)
      .ok_or(MediaError::EmptySlot(slot))
  }

  pub fn queue(&self) -> Queue {
    self.playback.lock().queue.clone()
  }

  // ---- observers ----

  pub fn subscribe_progress(&self) -> Subscription {
    self.hub.subscribe()
  }

  pub fn unsubscribe_progress(&self, id: u64) -> bool {
    self.hub.unsubscribe(id)
  }

  // ---- library ----

  /// Download a remote track into the library in the background.
  pub fn save_to_library(&self, id: &str, file_name: &str) -> Result<SaveTicket, MediaError> {
    let target = self.library.save_target(file_name)?;
    let mut command = self.catalog.fetch_command(id, &target)?;
    let child = command.spawn().map_err(CatalogError::Io)?;

    let job_id = Uuid::new_v4().to_string();
    log::info!("Save job {} started for {} -> {:?}", job_id, id, target);

    let hub = Arc::clone(&self.hub);
    let job = job_id.clone();
    let path = target.clone();
    tokio::spawn(async move {
      let notice = save_outcome(job, path, child.wait_with_output().await);
      hub.broadcast(notice);
    });

    Ok(SaveTicket {
      job_id,
      target,
      status: SaveStatus::Pending,
    })
  }

  pub fn delete_from_library(&self, path: &Path) -> Result<DeleteReport, MediaError> {
    let path = self.library.delete(path)?;
    let dequeued = self.playback.lock().queue.remove_path(&path);
    if dequeued {
      log::info!("Removed deleted file {:?} from the queue", path);
    }
    Ok(DeleteReport { path, dequeued })
  }

  pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, MediaError> {
    Ok(self.catalog.search(query).await?)
  }

  pub fn status(&self) -> MediaStatus {
    let playback = self.playback.lock();
    MediaStatus {
      phase: playback.machine.phase,
      current: playback.current.clone(),
      position: playback.machine.position,
      duration: playback.machine.duration,
      volume: playback.volume,
      queue: playback.queue.clone(),
      owns_output: self.broker.is_active(SourceId::Media),
      player_pid: self.backend.pid(),
    }
  }
}

fn save_outcome(job_id: String, path: PathBuf, result: std::io::Result<Output>) -> MediaNotice {
  match result {
    Ok(output) if output.status.success() => {
      log::info!("Save job {} finished: {:?}", job_id, path);
      MediaNotice::SaveCompleted { job_id, path }
    }
    Ok(output) => {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let message = match stderr.lines().last().map(str::trim) {
        Some(line) if !line.is_empty() => line.to_string(),
        _ => format!("fetch exited with {}", output.status),
      };
      log::error!("Save job {} failed: {}", job_id, message);
      MediaNotice::SaveFailed { job_id, message }
    }
    Err(e) => {
      log::error!("Save job {} failed: {}", job_id, e);
      MediaNotice::SaveFailed {
        job_id,
        message: e.to_string(),
      }
    }
  }
}

#[async_trait]
impl AudioSource for MediaController {
  fn id(&self) -> SourceId {
    SourceId::Media
  }

  /// Preempted by the other source. Does not wait for `play_lock`: the
  /// holder may itself be waiting on the broker.
  async fn halt(&self) -> Result<(), String> {
    let active = {
      let mut playback = self.playback.lock();
      let active = playback.machine.phase.is_active();
      playback.machine.begin_stop();
      playback.current = None;
      active
    };
    self.broker.release(SourceId::Media);
    self.publish_track_changed();
    if active {
      self.backend.stop().await.map_err(|e| e.to_string())?;
    }
    Ok(())
  }

  fn signature(&self) -> ProcessSignature {
    self.backend.signature()
  }

  fn owned_pids(&self) -> Vec<u32> {
    self.backend.pid().into_iter().collect()
  }
}

impl Drop for MediaController {
  fn drop(&mut self) {
    self.stop_listener();
  }
}
