#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use audio_arbiter::broker::{ActiveSource, AudioSource, ResourceBroker, SourceId};
use audio_arbiter::config::{BrokerConfig, LadderConfig, RetryConfig, StationConfig};
use audio_arbiter::process::{ProcessScanner, ProcessSignature};
use audio_arbiter::station::{StationCommand, StationError, StationState, StationSupervisor};
use audio_arbiter::status::SnapshotStatus;

/// Reads the control FIFO line by line and exits on the quit command.
const FAKE_PLAYER: &str = "#!/bin/sh\nwhile :; do read line < \"$1\"; [ \"$line\" = q ] && exit 0; done\n";

struct Fixture {
  _dir: tempfile::TempDir,
  name: String,
  config: StationConfig,
}

impl Fixture {
  fn new() -> Self {
    let dir = tempfile::tempdir().unwrap();
    // Short enough to be the whole process name.
    let name = format!("fb{}", &Uuid::new_v4().simple().to_string()[..8]);
    let binary = dir.path().join(&name);
    std::fs::write(&binary, FAKE_PLAYER).unwrap();
    std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

    let fifo: PathBuf = dir.path().join("ctl");
    let config = StationConfig {
      binary: binary.to_string_lossy().into_owned(),
      args: vec![fifo.to_string_lossy().into_owned()],
      fifo_path: fifo,
      status_file: dir.path().join("status.json"),
      log_dir: dir.path().join("logs"),
      settle_ms: 300,
      pipe_timeout_ms: 1_000,
      ladder: LadderConfig {
        grace_ms: 200,
        term_wait_ms: 300,
        kill_wait_ms: 300,
        deadline_ms: 5_000,
      },
      start_retry: RetryConfig {
        max_attempts: 3,
        base_delay_ms: 100,
        backoff_factor: 1.0,
      },
      ..StationConfig::default()
    };
    Self {
      _dir: dir,
      name,
      config,
    }
  }

  async fn running_pids(&self) -> Vec<u32> {
    ProcessScanner::default()
      .probe(&ProcessSignature::named(&self.name))
      .await
      .pids()
  }
}

struct FakeMedia {
  halts: AtomicUsize,
}

#[async_trait]
impl AudioSource for FakeMedia {
  fn id(&self) -> SourceId {
    SourceId::Media
  }

  async fn halt(&self) -> Result<(), String> {
    self.halts.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  fn signature(&self) -> ProcessSignature {
    ProcessSignature::named("no-such-media-zz")
  }

  fn owned_pids(&self) -> Vec<u32> {
    Vec::new()
  }
}

#[tokio::test]
async fn test_start_command_stop() {
  let fixture = Fixture::new();
  let broker = Arc::new(ResourceBroker::new(&BrokerConfig::default()));
  let media = Arc::new(FakeMedia {
    halts: AtomicUsize::new(0),
  });
  broker.attach(media.clone());
  assert!(broker.acquire(SourceId::Media).await);

  let station = Arc::new(StationSupervisor::new(fixture.config.clone(), broker.clone()));
  broker.attach(station.clone());

  let report = station.start().await.unwrap();
  assert!(!report.already_running);
  assert_eq!(station.state(), StationState::Running);
  assert_eq!(broker.active_source(), ActiveSource::Station);
  assert_eq!(media.halts.load(Ordering::SeqCst), 1);
  assert_eq!(fixture.running_pids().await, vec![report.pid.unwrap()]);

  // A second start inside the cooldown is refused and spawns nothing.
  assert!(matches!(station.start().await, Err(StationError::RateLimited(_))));
  assert_eq!(fixture.running_pids().await.len(), 1);

  let command = station.send_command(StationCommand::Next).await.unwrap();
  assert!(command.delivery.any());
  assert_eq!(command.status, SnapshotStatus::Playing);

  let status = station.status().await;
  assert_eq!(status.pid, report.pid);
  assert!(status.owns_output);
  assert_eq!(status.snapshot.last_command.as_deref(), Some("next"));

  let stop = station.stop().await.unwrap();
  assert!(!stop.already_stopped);
  assert!(stop.stragglers.is_empty());
  assert_eq!(station.state(), StationState::NotRunning);
  assert_eq!(broker.active_source(), ActiveSource::None);
  assert!(fixture.running_pids().await.is_empty());

  let status = station.status().await;
  assert_eq!(status.snapshot.status, Some(SnapshotStatus::Stopped));
  assert!(matches!(
    station.send_command(StationCommand::Love).await,
    Err(StationError::NotRunning)
  ));
}

#[tokio::test]
async fn test_stop_past_deadline_still_reports_stopped() {
  let mut fixture = Fixture::new();
  fixture.config.stop_deadline_ms = 1;
  let broker = Arc::new(ResourceBroker::new(&BrokerConfig::default()));
  let station = Arc::new(StationSupervisor::new(fixture.config.clone(), broker.clone()));
  broker.attach(station.clone());

  station.start().await.unwrap();
  let stop = station.stop().await.unwrap();
  assert!(stop.forced);
  assert_eq!(station.state(), StationState::NotRunning);
  assert!(!broker.is_active(SourceId::Station));

  // The process outlived the forced stop; orphan cleanup removes it.
  let cleanup = station.cleanup_orphans().await;
  assert!(cleanup.is_clean(), "stragglers: {:?}", cleanup.stragglers);
  assert!(fixture.running_pids().await.is_empty());
}

#[tokio::test]
async fn test_start_reports_player_left_by_previous_supervisor() {
  let fixture = Fixture::new();
  let broker = Arc::new(ResourceBroker::new(&BrokerConfig::default()));

  // A player left behind by a previous supervisor.
  let first = StationSupervisor::new(fixture.config.clone(), broker.clone());
  let orphan = first.start().await.unwrap().pid.unwrap();
  drop(first);
  broker.release(SourceId::Station);

  let station = Arc::new(StationSupervisor::new(fixture.config.clone(), broker.clone()));
  broker.attach(station.clone());
  let report = station.start().await.unwrap();
  assert!(report.already_running);
  assert_eq!(report.pid, Some(orphan));
  assert!(broker.is_active(SourceId::Station));
  assert_eq!(station.tracked_pid(), Some(orphan));
  assert_eq!(fixture.running_pids().await, vec![orphan]);

  let stop = station.stop().await.unwrap();
  assert!(!stop.already_stopped);
  assert!(fixture.running_pids().await.is_empty());
  assert_eq!(broker.active_source(), ActiveSource::None);
}

#[tokio::test]
async fn test_halt_cut_short_by_broker_still_resets_supervisor() {
  let fixture = Fixture::new();
  let broker = Arc::new(ResourceBroker::new(&BrokerConfig {
    halt_timeout_ms: 100,
    ..BrokerConfig::default()
  }));
  let media = Arc::new(FakeMedia {
    halts: AtomicUsize::new(0),
  });
  broker.attach(media.clone());
  let station = Arc::new(StationSupervisor::new(fixture.config.clone(), broker.clone()));
  broker.attach(station.clone());

  station.start().await.unwrap();
  // The quit grace alone outlasts the halt timeout.
  assert!(broker.acquire(SourceId::Media).await);
  assert_eq!(broker.active_source(), ActiveSource::Media);
  assert_eq!(station.state(), StationState::NotRunning);
  assert!(station.tracked_pid().is_none());

  let mut stopped = false;
  for _ in 0..100 {
    if station.status().await.snapshot.status == Some(SnapshotStatus::Stopped) {
      stopped = true;
      break;
    }
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
  }
  assert!(stopped, "snapshot still reports the player as playing");
  assert!(fixture.running_pids().await.is_empty());
}
