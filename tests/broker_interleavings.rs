use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use audio_arbiter::broker::{ActiveSource, AudioSource, ResourceBroker, SourceId};
use audio_arbiter::config::{BrokerConfig, LadderConfig};
use audio_arbiter::process::ProcessSignature;

struct CountingSource {
  id: SourceId,
  halts: AtomicUsize,
}

#[async_trait]
impl AudioSource for CountingSource {
  fn id(&self) -> SourceId {
    self.id
  }

  async fn halt(&self) -> Result<(), String> {
    self.halts.fetch_add(1, Ordering::SeqCst);
    tokio::task::yield_now().await;
    Ok(())
  }

  fn signature(&self) -> ProcessSignature {
    ProcessSignature::with_arg("no-such-binary-zz", format!("--source={:?}", self.id))
  }

  fn owned_pids(&self) -> Vec<u32> {
    Vec::new()
  }
}

fn source(id: SourceId) -> Arc<CountingSource> {
  Arc::new(CountingSource {
    id,
    halts: AtomicUsize::new(0),
  })
}

fn fast_broker() -> ResourceBroker {
  ResourceBroker::new(&BrokerConfig {
    switch_timeout_ms: 60_000,
    halt_timeout_ms: 500,
    ladder: LadderConfig {
      grace_ms: 0,
      term_wait_ms: 10,
      kill_wait_ms: 10,
      deadline_ms: 2_000,
    },
  })
}

/// xorshift64, enough to shuffle operations reproducibly.
struct Rng(u64);

impl Rng {
  fn next(&mut self) -> u64 {
    self.0 ^= self.0 << 13;
    self.0 ^= self.0 >> 7;
    self.0 ^= self.0 << 17;
    self.0
  }
}

#[tokio::test]
async fn test_sequential_operations_match_model() {
  let broker = fast_broker();
  let station = source(SourceId::Station);
  let media = source(SourceId::Media);
  broker.attach(station.clone());
  broker.attach(media.clone());

  let mut rng = Rng(0x9e37_79b9_7f4a_7c15);
  let mut owner = ActiveSource::None;
  let mut expected_station_halts = 0;
  let mut expected_media_halts = 0;

  for _ in 0..40 {
    let r = rng.next();
    let id = if r & 1 == 0 { SourceId::Station } else { SourceId::Media };
    if r & 2 == 0 {
      assert!(broker.acquire(id).await);
      match (owner, id) {
        (ActiveSource::Station, SourceId::Media) => expected_station_halts += 1,
        (ActiveSource::Media, SourceId::Station) => expected_media_halts += 1,
        _ => {}
      }
      owner = ActiveSource::from(id);
    } else {
      broker.release(id);
      if owner == ActiveSource::from(id) {
        owner = ActiveSource::None;
      }
    }

    assert_eq!(broker.active_source(), owner);
    assert!(!(broker.is_active(SourceId::Station) && broker.is_active(SourceId::Media)));
    assert_eq!(station.halts.load(Ordering::SeqCst), expected_station_halts);
    assert_eq!(media.halts.load(Ordering::SeqCst), expected_media_halts);
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquisitions_keep_single_owner() {
  let broker = Arc::new(fast_broker());
  let station = source(SourceId::Station);
  let media = source(SourceId::Media);
  broker.attach(station.clone());
  broker.attach(media.clone());

  let mut tasks = Vec::new();
  for seed in 1..=4u64 {
    let broker = broker.clone();
    tasks.push(tokio::spawn(async move {
      let mut rng = Rng(seed.wrapping_mul(0x2545_f491_4f6c_dd1d));
      let mut granted = 0;
      for _ in 0..4 {
        let id = if rng.next() & 1 == 0 {
          SourceId::Station
        } else {
          SourceId::Media
        };
        if broker.acquire(id).await {
          granted += 1;
        }
        if rng.next() % 3 == 0 {
          broker.release(id);
        }
      }
      granted
    }));
  }

  let mut granted = 0;
  for task in tasks {
    granted += task.await.unwrap();
  }

  assert_eq!(granted, 16, "every acquisition fits in the switch timeout");
  let halts = station.halts.load(Ordering::SeqCst) + media.halts.load(Ordering::SeqCst);
  assert!(halts <= 16, "each grant halts at most the previous owner");

  // The last grant decides the owner; both sources stay usable afterwards.
  assert!(broker.acquire(SourceId::Station).await);
  assert!(broker.is_active(SourceId::Station));
  assert!(broker.acquire(SourceId::Media).await);
  assert!(broker.is_active(SourceId::Media));
  assert!(station.halts.load(Ordering::SeqCst) >= 1);
}
