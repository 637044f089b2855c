//! Ownership arbitration for the shared audio output.
//!
//! Exactly one source owns the output at any time. A source acquires the
//! output before loading media; acquiring stops the previous owner first.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::BrokerConfig;
use crate::process::{KillLadder, ProcessScanner, ProcessSignature};

/// A playback subsystem competing for the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceId {
  Station,
  Media,
}

/// Current owner of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActiveSource {
  None,
  Station,
  Media,
}

impl From<SourceId> for ActiveSource {
  fn from(source: SourceId) -> Self {
    match source {
      SourceId::Station => ActiveSource::Station,
      SourceId::Media => ActiveSource::Media,
    }
  }
}

/// A source the broker can preempt.
#[async_trait]
pub trait AudioSource: Send + Sync {
  fn id(&self) -> SourceId;

  /// Stop producing audio. Called by the broker when another source takes over.
  async fn halt(&self) -> Result<(), String>;

  /// How the source's OS processes are recognized, for signal-level cleanup.
  fn signature(&self) -> ProcessSignature;

  /// Pids the source currently manages and that must survive stray cleanup.
  fn owned_pids(&self) -> Vec<u32>;
}

/// Arbitrates the output between the attached sources.
pub struct ResourceBroker {
  active: RwLock<ActiveSource>,
  switch_lock: tokio::sync::Mutex<()>,
  sources: RwLock<HashMap<SourceId, Weak<dyn AudioSource>>>,
  ladder: KillLadder,
  switch_timeout: Duration,
  halt_timeout: Duration,
}

impl ResourceBroker {
  pub fn new(config: &BrokerConfig) -> Self {
    Self {
      active: RwLock::new(ActiveSource::None),
      switch_lock: tokio::sync::Mutex::new(()),
      sources: RwLock::new(HashMap::new()),
      ladder: KillLadder::new(ProcessScanner::default(), &config.ladder),
      switch_timeout: Duration::from_millis(config.switch_timeout_ms),
      halt_timeout: Duration::from_millis(config.halt_timeout_ms),
    }
  }

  /// Attach a source after construction. Held weakly: sources own the broker.
  pub fn attach(&self, source: Arc<dyn AudioSource>) {
    let id = source.id();
    log::info!("Broker: attached source {:?}", id);
    self.sources.write().insert(id, Arc::downgrade(&source));
  }

  fn source(&self, id: SourceId) -> Option<Arc<dyn AudioSource>> {
    self.sources.read().get(&id).and_then(|weak| weak.upgrade())
  }

  /// Current owner.
  pub fn active_source(&self) -> ActiveSource {
    *self.active.read()
  }

  /// Whether `source` owns the output.
  pub fn is_active(&self, source: SourceId) -> bool {
    self.active_source() == ActiveSource::from(source)
  }

  /// Take ownership of the output for `source`.
  ///
  /// Returns `false` only when the switch lock could not be obtained in time.
  /// Cleanup failures never prevent the grant.
  pub async fn acquire(&self, source: SourceId) -> bool {
    let _guard = match tokio::time::timeout(self.switch_timeout, self.switch_lock.lock()).await {
      Ok(guard) => guard,
      Err(_) => {
        log::warn!(
          "Broker: switch lock busy for {:?}, giving up {:?} acquisition",
          self.switch_timeout,
          source
        );
        return false;
      }
    };

    let current = self.active_source();
    if current == ActiveSource::from(source) {
      log::debug!("Broker: {:?} already owns the output", source);
      return true;
    }

    let previous = match current {
      ActiveSource::None => None,
      ActiveSource::Station => Some(SourceId::Station),
      ActiveSource::Media => Some(SourceId::Media),
    };
    if let Some(previous) = previous {
      log::info!("Broker: {:?} preempts {:?}", source, previous);
      self.stop_source(previous).await;
    }

    self.clear_strays(source).await;

    *self.active.write() = ActiveSource::from(source);
    log::info!("Broker: output now owned by {:?}", source);
    true
  }

  /// Give up ownership. No-op unless `source` is the owner.
  pub fn release(&self, source: SourceId) {
    let mut active = self.active.write();
    if *active == ActiveSource::from(source) {
      *active = ActiveSource::None;
      log::info!("Broker: {:?} released the output", source);
    } else {
      log::debug!("Broker: ignoring release from non-owner {:?} (owner {:?})", source, *active);
    }
  }

  /// Emergency stop of every source, independent of the switch lock.
  pub async fn kill_all(&self) {
    log::warn!("Broker: killing all sources");
    for id in [SourceId::Station, SourceId::Media] {
      self.stop_source(id).await;
    }
    for id in [SourceId::Station, SourceId::Media] {
      if let Some(source) = self.source(id) {
        let report = self.ladder.run(&source.signature(), &[], None).await;
        if !report.is_clean() {
          log::error!("Broker: {:?} processes survived kill_all: {:?}", id, report.stragglers);
        }
      }
    }
    *self.active.write() = ActiveSource::None;
  }

  /// Stop a source through its own halt, falling back to signals.
  async fn stop_source(&self, id: SourceId) {
    let Some(source) = self.source(id) else {
      log::warn!("Broker: source {:?} not attached, nothing to stop", id);
      return;
    };

    let halted = match tokio::time::timeout(self.halt_timeout, source.halt()).await {
      Ok(Ok(())) => true,
      Ok(Err(e)) => {
        log::error!("Broker: halting {:?} failed: {}", id, e);
        false
      }
      Err(_) => {
        log::error!("Broker: halting {:?} timed out after {:?}", id, self.halt_timeout);
        false
      }
    };

    if !halted {
      let signature = source.signature();
      log::warn!("Broker: falling back to signals for {:?} ({})", id, signature.name);
      let report = self.ladder.run(&signature, &[], None).await;
      if !report.is_clean() {
        log::error!("Broker: {:?} stragglers after fallback: {:?}", id, report.stragglers);
      }
    }
  }

  /// Kill processes of `id` that the source does not manage.
  async fn clear_strays(&self, id: SourceId) {
    let Some(source) = self.source(id) else {
      return;
    };
    let signature = source.signature();
    let owned = source.owned_pids();
    let report = self.ladder.run(&signature, &owned, None).await;
    if !report.found.is_empty() {
      log::warn!("Broker: removed stray {:?} processes {:?}", id, report.found);
    }
    if !report.is_clean() {
      log::error!("Broker: stray {:?} processes survived: {:?}", id, report.stragglers);
    }
  }
}
