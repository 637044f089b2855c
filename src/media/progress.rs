//! Fan-out of playback notices to observers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;

use super::machine::Phase;
use super::track::Track;

const OBSERVER_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum MediaNotice {
  #[serde(rename_all = "camelCase")]
  Progress {
    phase: Phase,
    position: f64,
    duration: Option<f64>,
    title: Option<String>,
  },
  #[serde(rename_all = "camelCase")]
  TrackChanged { track: Option<Track> },
  #[serde(rename_all = "camelCase")]
  Error { message: String },
  #[serde(rename_all = "camelCase")]
  SaveCompleted { job_id: String, path: PathBuf },
  #[serde(rename_all = "camelCase")]
  SaveFailed { job_id: String, message: String },
}

/// A registered observer.
pub struct Subscription {
  pub id: u64,
  pub receiver: Receiver<MediaNotice>,
}

#[derive(Default)]
pub struct ProgressHub {
  observers: Mutex<Vec<(u64, Sender<MediaNotice>)>>,
  next_id: AtomicU64,
}

impl ProgressHub {
  pub fn subscribe(&self) -> Subscription {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
    let (tx, rx) = async_channel::bounded(OBSERVER_CAPACITY);
    self.observers.lock().push((id, tx));
    log::debug!("Progress observer {} subscribed", id);
    Subscription { id, receiver: rx }
  }

  pub fn unsubscribe(&self, id: u64) -> bool {
    let mut observers = self.observers.lock();
    let before = observers.len();
    observers.retain(|(observer, _)| *observer != id);
    before != observers.len()
  }

  pub fn has_observers(&self) -> bool {
    !self.observers.lock().is_empty()
  }

  /// Build and send a notice, but only when someone listens.
  pub fn publish_with(&self, build: impl FnOnce() -> MediaNotice) {
    if self.has_observers() {
      self.broadcast(build());
    }
  }

  /// Send to every observer. A slow observer misses the notice; a closed
  /// one is dropped.
  pub fn broadcast(&self, notice: MediaNotice) {
    self.observers.lock().retain(|(id, tx)| match tx.try_send(notice.clone()) {
      Ok(()) => true,
      Err(TrySendError::Full(_)) => {
        log::debug!("Progress observer {} is behind, skipping notice", id);
        true
      }
      Err(TrySendError::Closed(_)) => {
        log::info!("Dropping closed progress observer {}", id);
        false
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicBool;

  fn error(message: &str) -> MediaNotice {
    MediaNotice::Error {
      message: message.to_string(),
    }
  }

  #[test]
  fn test_notice_not_built_without_observers() {
    let hub = ProgressHub::default();
    let built = AtomicBool::new(false);
    hub.publish_with(|| {
      built.store(true, Ordering::SeqCst);
      error("x")
    });
    assert!(!built.load(Ordering::SeqCst));
  }

  #[test]
  fn test_broadcast_reaches_subscribers() {
    let hub = ProgressHub::default();
    let a = hub.subscribe();
    let b = hub.subscribe();
    hub.broadcast(error("x"));
    assert_eq!(a.receiver.try_recv().unwrap(), error("x"));
    assert_eq!(b.receiver.try_recv().unwrap(), error("x"));
  }

  #[test]
  fn test_closed_observer_is_pruned() {
    let hub = ProgressHub::default();
    let kept = hub.subscribe();
    let dropped = hub.subscribe();
    drop(dropped.receiver);

    hub.broadcast(error("x"));
    assert_eq!(hub.observers.lock().len(), 1);
    assert!(kept.receiver.try_recv().is_ok());
  }

  #[test]
  fn test_full_observer_is_kept() {
    let hub = ProgressHub::default();
    let slow = hub.subscribe();
    for _ in 0..OBSERVER_CAPACITY + 10 {
      hub.broadcast(error("tick"));
    }
    assert_eq!(hub.observers.lock().len(), 1);

    while slow.receiver.try_recv().is_ok() {}
    hub.broadcast(error("after"));
    assert_eq!(slow.receiver.try_recv().unwrap(), error("after"));
  }

  #[test]
  fn test_unsubscribe() {
    let hub = ProgressHub::default();
    let sub = hub.subscribe();
    assert!(hub.unsubscribe(sub.id));
    assert!(!hub.unsubscribe(sub.id));
    assert!(!hub.has_observers());
  }

  #[test]
  fn test_notice_serialization() {
    let json = serde_json::to_value(MediaNotice::SaveFailed {
      job_id: "j1".into(),
      message: "m".into(),
    })
    .unwrap();
    assert_eq!(json["type"], "saveFailed");
    assert_eq!(json["jobId"], "j1");
  }
}
