use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::Command;

use audio_arbiter::broker::{ActiveSource, AudioSource, ResourceBroker, SourceId};
use audio_arbiter::catalog::{CatalogError, RemoteCatalog, SearchHit};
use audio_arbiter::config::{BrokerConfig, MediaConfig};
use audio_arbiter::media::{MediaController, MediaError, MediaNotice, Phase, PlayerBackend, QueueSlot, TrackMetadata};
use audio_arbiter::mpv::{MpvError, MpvEvent};
use audio_arbiter::process::ProcessSignature;
use audio_arbiter::ErrorKind;

/// Player that answers instantly and emits the events MPV would.
struct FakePlayer {
  events_tx: Sender<MpvEvent>,
  events_rx: Receiver<MpvEvent>,
  loads: Mutex<Vec<String>>,
  playing: AtomicBool,
  healthy: AtomicBool,
  recovers: AtomicUsize,
  stops: AtomicUsize,
}

impl FakePlayer {
  fn new() -> Arc<Self> {
    let (events_tx, events_rx) = async_channel::unbounded();
    Arc::new(Self {
      events_tx,
      events_rx,
      loads: Mutex::new(Vec::new()),
      playing: AtomicBool::new(false),
      healthy: AtomicBool::new(true),
      recovers: AtomicUsize::new(0),
      stops: AtomicUsize::new(0),
    })
  }

  fn emit(&self, line: &str) {
    let event = MpvEvent::from_line(line).expect("valid event");
    self.events_tx.try_send(event).expect("event channel open");
  }

  /// The current file ran out.
  fn finish_track(&self) {
    self.playing.store(false, Ordering::SeqCst);
    self.emit(r#"{"event":"end-file","reason":"eof"}"#);
  }

  fn loads(&self) -> Vec<String> {
    self.loads.lock().clone()
  }
}

#[async_trait]
impl PlayerBackend for FakePlayer {
  async fn health_check(&self, _timeout: Duration) -> Result<(), MpvError> {
    if self.healthy.load(Ordering::SeqCst) {
      Ok(())
    } else {
      Err(MpvError::Unresponsive(Duration::from_millis(100)))
    }
  }

  async fn recover(&self) -> Result<(), MpvError> {
    self.recovers.fetch_add(1, Ordering::SeqCst);
    self.playing.store(false, Ordering::SeqCst);
    self.healthy.store(true, Ordering::SeqCst);
    Ok(())
  }

  async fn load(&self, url: &str) -> Result<(), MpvError> {
    self.loads.lock().push(url.to_string());
    if self.playing.swap(true, Ordering::SeqCst) {
      self.emit(r#"{"event":"end-file","reason":"stop"}"#);
    }
    self.emit(r#"{"event":"file-loaded"}"#);
    Ok(())
  }

  async fn set_pause(&self, paused: bool) -> Result<(), MpvError> {
    self.emit(&format!(
      r#"{{"event":"property-change","id":1,"name":"pause","data":{}}}"#,
      paused
    ));
    Ok(())
  }

  async fn stop(&self) -> Result<(), MpvError> {
    self.stops.fetch_add(1, Ordering::SeqCst);
    if self.playing.swap(false, Ordering::SeqCst) {
      self.emit(r#"{"event":"end-file","reason":"stop"}"#);
    }
    Ok(())
  }

  async fn seek(&self, _delta_seconds: f64) -> Result<(), MpvError> {
    Ok(())
  }

  async fn set_volume(&self, _volume: f64) -> Result<(), MpvError> {
    Ok(())
  }

  fn events(&self) -> Receiver<MpvEvent> {
    self.events_rx.clone()
  }

  fn pid(&self) -> Option<u32> {
    None
  }

  fn signature(&self) -> ProcessSignature {
    ProcessSignature::named("no-such-player-zz")
  }
}

/// Catalog handing out a new address on every resolve.
#[derive(Default)]
struct FakeCatalog {
  resolves: AtomicUsize,
  resolve_delay_ms: AtomicU64,
}

#[async_trait]
impl RemoteCatalog for FakeCatalog {
  async fn resolve(&self, id: &str) -> Result<String, CatalogError> {
    let n = self.resolves.fetch_add(1, Ordering::SeqCst);
    let delay = self.resolve_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
      tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    Ok(format!("https://stream.invalid/{}/{}", id, n))
  }

  async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CatalogError> {
    Ok(vec![SearchHit {
      id: "abc123".to_string(),
      title: query.to_string(),
      uploader: Some("Someone".to_string()),
      duration_secs: 200.0,
    }])
  }

  fn fetch_command(&self, _id: &str, target: &Path) -> Result<Command, CatalogError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg("touch \"$1\"").arg("sh").arg(target);
    Ok(cmd)
  }
}

struct OtherSource {
  halts: AtomicUsize,
}

#[async_trait]
impl AudioSource for OtherSource {
  fn id(&self) -> SourceId {
    SourceId::Station
  }

  async fn halt(&self) -> Result<(), String> {
    self.halts.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  fn signature(&self) -> ProcessSignature {
    ProcessSignature::named("no-such-station-zz")
  }

  fn owned_pids(&self) -> Vec<u32> {
    Vec::new()
  }
}

struct Harness {
  _dir: tempfile::TempDir,
  root: PathBuf,
  player: Arc<FakePlayer>,
  catalog: Arc<FakeCatalog>,
  broker: Arc<ResourceBroker>,
  media: Arc<MediaController>,
}

impl Harness {
  fn new() -> Self {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let config = MediaConfig {
      library_root: root.clone(),
      health_timeout_ms: 100,
      ..MediaConfig::default()
    };
    let player = FakePlayer::new();
    let catalog = Arc::new(FakeCatalog::default());
    let broker = Arc::new(ResourceBroker::new(&BrokerConfig::default()));
    let media = Arc::new(MediaController::new(
      &config,
      player.clone(),
      catalog.clone(),
      broker.clone(),
    ));
    broker.attach(media.clone());
    media.start_listener();
    Self {
      _dir: dir,
      root,
      player,
      catalog,
      broker,
      media,
    }
  }

  fn file(&self, name: &str) -> PathBuf {
    let path = self.root.join(name);
    std::fs::write(&path, b"audio").unwrap();
    path
  }

  async fn wait_for(&self, what: &str, cond: impl Fn(&MediaController) -> bool) {
    for _ in 0..300 {
      if cond(&self.media) {
        return;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
  }

  async fn wait_playing(&self) {
    self.wait_for("playing", |m| m.status().phase == Phase::Playing).await;
  }
}

#[tokio::test]
async fn test_play_local_acquires_output() {
  let h = Harness::new();
  let path = h.file("Artist - Song.mp3");

  let track = h.media.play_local(Path::new("Artist - Song.mp3")).await.unwrap();
  assert_eq!(track.title, "Song");
  assert_eq!(track.artist, "Artist");
  h.wait_playing().await;

  let status = h.media.status();
  assert!(status.owns_output);
  assert_eq!(h.broker.active_source(), ActiveSource::Media);
  assert_eq!(h.player.loads(), vec![path.to_string_lossy().into_owned()]);
}

#[tokio::test]
async fn test_replacing_track_does_not_auto_advance() {
  let h = Harness::new();
  let a = h.file("a.mp3");
  let b = h.file("b.mp3");
  let c = h.file("c.mp3");
  h.media.enqueue(&c).unwrap();

  h.media.play_local(&a).await.unwrap();
  h.wait_playing().await;
  h.media.play_local(&b).await.unwrap();
  h.wait_playing().await;
  tokio::time::sleep(Duration::from_millis(100)).await;

  assert_eq!(h.player.loads().len(), 2);
  let status = h.media.status();
  assert_eq!(status.phase, Phase::Playing);
  assert_eq!(status.current.unwrap().local_path(), Some(b.as_path()));
  assert_eq!(status.queue.len(), 1);
}

#[tokio::test]
async fn test_natural_end_advances_exactly_once() {
  let h = Harness::new();
  let a = h.file("a.mp3");
  let b = h.file("b.mp3");
  let c = h.file("c.mp3");
  h.media.enqueue(&b).unwrap();
  h.media.enqueue(&c).unwrap();

  h.media.play_local(&a).await.unwrap();
  h.wait_playing().await;
  h.player.finish_track();

  h.wait_for("advance to b", |m| {
    m.status().current.and_then(|t| t.local_path().map(Path::to_path_buf)) == Some(b.clone())
  })
  .await;
  h.wait_playing().await;
  tokio::time::sleep(Duration::from_millis(100)).await;

  assert_eq!(h.player.loads().len(), 2);
  let queue = h.media.queue();
  assert_eq!(queue.len(), 1);
  assert_eq!(queue.on_deck().and_then(|t| t.local_path()), Some(c.as_path()));
}

#[tokio::test]
async fn test_natural_end_with_empty_queue_releases_output() {
  let h = Harness::new();
  let a = h.file("a.mp3");

  h.media.play_local(&a).await.unwrap();
  h.wait_playing().await;
  h.player.finish_track();

  h.wait_for("release", |m| !m.status().owns_output).await;
  let status = h.media.status();
  assert_eq!(status.phase, Phase::Idle);
  assert!(status.current.is_none());
  assert_eq!(h.broker.active_source(), ActiveSource::None);
}

#[tokio::test]
async fn test_queued_file_deleted_before_advance_is_skipped() {
  let h = Harness::new();
  let a = h.file("a.mp3");
  let b = h.file("b.mp3");
  let c = h.file("c.mp3");
  h.media.enqueue(&b).unwrap();
  h.media.enqueue(&c).unwrap();
  std::fs::remove_file(&b).unwrap();

  h.media.play_local(&a).await.unwrap();
  h.wait_playing().await;
  h.player.finish_track();

  h.wait_for("advance to c", |m| {
    m.status().current.and_then(|t| t.local_path().map(Path::to_path_buf)) == Some(c.clone())
  })
  .await;
  assert!(h.media.queue().is_empty());
}

#[tokio::test]
async fn test_remote_play_resolves_fresh_address() {
  let h = Harness::new();
  let meta = TrackMetadata {
    title: Some("Remote".to_string()),
    ..TrackMetadata::default()
  };

  h.media.play_remote("abc123", meta.clone()).await.unwrap();
  h.wait_playing().await;
  h.media.play_remote("abc123", meta).await.unwrap();
  h.wait_playing().await;

  let loads = h.player.loads();
  assert_eq!(loads.len(), 2);
  assert_ne!(loads[0], loads[1]);
  assert_eq!(h.catalog.resolves.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_paths_outside_library_are_rejected() {
  let h = Harness::new();
  let escape = Path::new("../../etc/passwd");

  let err = h.media.play_local(escape).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidPath);
  assert!(matches!(h.media.enqueue(escape), Err(ref e) if e.kind() == ErrorKind::InvalidPath));
  assert!(matches!(
    h.media.delete_from_library(escape),
    Err(ref e) if e.kind() == ErrorKind::InvalidPath
  ));

  assert!(h.player.loads().is_empty());
  assert_eq!(h.broker.active_source(), ActiveSource::None);
}

#[tokio::test]
async fn test_unresponsive_player_is_recovered_before_load() {
  let h = Harness::new();
  let a = h.file("a.mp3");
  h.player.healthy.store(false, Ordering::SeqCst);

  h.media.play_local(&a).await.unwrap();
  h.wait_playing().await;

  assert_eq!(h.player.recovers.load(Ordering::SeqCst), 1);
  assert_eq!(h.player.loads().len(), 1);
}

#[tokio::test]
async fn test_unresponsive_player_is_recovered_before_advance() {
  let h = Harness::new();
  let a = h.file("a.mp3");
  let b = h.file("b.mp3");
  h.media.enqueue(&b).unwrap();

  h.media.play_local(&a).await.unwrap();
  h.wait_playing().await;
  h.player.healthy.store(false, Ordering::SeqCst);
  h.player.finish_track();

  h.wait_for("advance to b", |m| {
    m.status().current.and_then(|t| t.local_path().map(Path::to_path_buf)) == Some(b.clone())
  })
  .await;
  h.wait_playing().await;
  assert_eq!(h.player.recovers.load(Ordering::SeqCst), 1);
  assert_eq!(h.player.loads().len(), 2);
  assert!(h.media.queue().is_empty());
}

#[tokio::test]
async fn test_stop_clears_current_and_keeps_queue() {
  let h = Harness::new();
  let a = h.file("a.mp3");
  let b = h.file("b.mp3");
  h.media.enqueue(&b).unwrap();

  h.media.play_local(&a).await.unwrap();
  h.wait_playing().await;
  h.media.stop().await.unwrap();
  tokio::time::sleep(Duration::from_millis(100)).await;

  let status = h.media.status();
  assert_eq!(status.phase, Phase::Idle);
  assert!(status.current.is_none());
  assert!(!status.owns_output);
  assert_eq!(status.queue.len(), 1);
  assert_eq!(h.player.loads().len(), 1);
  assert_eq!(h.player.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_queue_holds_two_tracks() {
  let h = Harness::new();
  let a = h.file("a.mp3");
  let b = h.file("b.mp3");
  let c = h.file("c.mp3");

  assert_eq!(h.media.enqueue(&a).unwrap(), QueueSlot::OnDeck);
  assert_eq!(h.media.enqueue(&b).unwrap(), QueueSlot::InTheHole);
  assert!(matches!(h.media.enqueue(&c), Err(MediaError::QueueFull(_))));

  let removed = h.media.dequeue(QueueSlot::OnDeck).unwrap();
  assert_eq!(removed.local_path(), Some(a.as_path()));
  assert_eq!(h.media.queue().on_deck().and_then(|t| t.local_path()), Some(b.as_path()));
  assert!(matches!(
    h.media.dequeue(QueueSlot::InTheHole),
    Err(MediaError::EmptySlot(QueueSlot::InTheHole))
  ));
}

#[tokio::test]
async fn test_delete_removes_file_from_queue() {
  let h = Harness::new();
  let a = h.file("a.mp3");
  h.media.enqueue(&a).unwrap();

  let report = h.media.delete_from_library(Path::new("a.mp3")).unwrap();
  assert!(report.dequeued);
  assert!(!a.exists());
  assert!(h.media.queue().is_empty());
}

#[tokio::test]
async fn test_save_to_library_reports_completion() {
  let h = Harness::new();
  let subscription = h.media.subscribe_progress();

  let ticket = h.media.save_to_library("abc123", "New Song").unwrap();
  assert_eq!(ticket.target, h.root.join("New Song.mp3"));

  let completed = tokio::time::timeout(Duration::from_secs(5), async {
    loop {
      match subscription.receiver.recv().await {
        Ok(MediaNotice::SaveCompleted { job_id, path }) => break (job_id, path),
        Ok(_) => continue,
        Err(e) => panic!("subscription closed: {}", e),
      }
    }
  })
  .await
  .expect("save notice");
  assert_eq!(completed.0, ticket.job_id);
  assert!(completed.1.exists());

  let err = h.media.save_to_library("abc123", "New Song").unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
  assert!(h.media.unsubscribe_progress(subscription.id));
}

#[tokio::test]
async fn test_invalid_save_names_are_rejected() {
  let h = Harness::new();
  for name in ["", "../escape", "a/b.mp3", ".hidden"] {
    let err = h.media.save_to_library("abc123", name).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath, "name {:?}", name);
  }
}

#[tokio::test]
async fn test_preemption_stops_media_without_advancing() {
  let h = Harness::new();
  let other = Arc::new(OtherSource {
    halts: AtomicUsize::new(0),
  });
  h.broker.attach(other.clone());
  let a = h.file("a.mp3");
  let b = h.file("b.mp3");
  h.media.enqueue(&b).unwrap();

  h.media.play_local(&a).await.unwrap();
  h.wait_playing().await;
  assert!(h.broker.acquire(SourceId::Station).await);
  tokio::time::sleep(Duration::from_millis(100)).await;

  let status = h.media.status();
  assert_eq!(status.phase, Phase::Idle);
  assert!(status.current.is_none());
  assert_eq!(h.broker.active_source(), ActiveSource::Station);
  assert_eq!(h.player.loads().len(), 1);
  assert_eq!(h.player.stops.load(Ordering::SeqCst), 1);
  assert_eq!(other.halts.load(Ordering::SeqCst), 0);

  h.media.play_local(&a).await.unwrap();
  assert_eq!(other.halts.load(Ordering::SeqCst), 1);
  assert!(h.broker.is_active(SourceId::Media));
}

#[tokio::test]
async fn test_output_taken_during_resolve_skips_load() {
  let h = Harness::new();
  let other = Arc::new(OtherSource {
    halts: AtomicUsize::new(0),
  });
  h.broker.attach(other.clone());
  h.catalog.resolve_delay_ms.store(300, Ordering::SeqCst);

  let media = h.media.clone();
  let play = tokio::spawn(async move { media.play_remote("abc123", TrackMetadata::default()).await });
  h.wait_for("media to own the output", |m| m.status().owns_output).await;
  assert!(h.broker.acquire(SourceId::Station).await);

  let result = play.await.unwrap();
  assert!(matches!(result, Err(MediaError::Conflict)));
  tokio::time::sleep(Duration::from_millis(100)).await;

  assert!(h.player.loads().is_empty());
  assert_eq!(h.broker.active_source(), ActiveSource::Station);
  let status = h.media.status();
  assert_eq!(status.phase, Phase::Idle);
  assert!(status.current.is_none());
}

#[tokio::test]
async fn test_pause_requires_playback() {
  let h = Harness::new();
  assert!(matches!(h.media.pause().await, Err(MediaError::NothingPlaying)));

  let a = h.file("a.mp3");
  h.media.play_local(&a).await.unwrap();
  h.wait_playing().await;
  h.media.pause().await.unwrap();
  h.wait_for("paused", |m| m.status().phase == Phase::Paused).await;
  h.media.resume().await.unwrap();
  h.wait_playing().await;

  assert!(matches!(h.media.set_volume(140.0).await, Err(MediaError::InvalidVolume(_))));
  h.media.set_volume(40.0).await.unwrap();
  assert_eq!(h.media.status().volume, 40.0);
}

#[tokio::test]
async fn test_search_passes_through_catalog() {
  let h = Harness::new();
  let hits = h.media.search("lofi").await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].title, "lofi");
}
