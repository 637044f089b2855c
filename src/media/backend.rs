use std::time::Duration;

use async_channel::Receiver;
use async_trait::async_trait;

use crate::mpv::{MpvClient, MpvError, MpvEvent};
use crate::process::ProcessSignature;

/// The player the media controller drives.
#[async_trait]
pub trait PlayerBackend: Send + Sync {
  /// Cheap round trip that fails when the player is hung or gone.
  async fn health_check(&self, timeout: Duration) -> Result<(), MpvError>;

  /// Replace the player process with a fresh one.
  async fn recover(&self) -> Result<(), MpvError>;

  async fn load(&self, url: &str) -> Result<(), MpvError>;

  async fn set_pause(&self, paused: bool) -> Result<(), MpvError>;

  async fn stop(&self) -> Result<(), MpvError>;

  async fn seek(&self, delta_seconds: f64) -> Result<(), MpvError>;

  async fn set_volume(&self, volume: f64) -> Result<(), MpvError>;

  fn events(&self) -> Receiver<MpvEvent>;

  fn pid(&self) -> Option<u32>;

  fn signature(&self) -> ProcessSignature;
}

#[async_trait]
impl PlayerBackend for MpvClient {
  async fn health_check(&self, timeout: Duration) -> Result<(), MpvError> {
    MpvClient::health_check(self, timeout).await
  }

  async fn recover(&self) -> Result<(), MpvError> {
    MpvClient::recover(self).await
  }

  async fn load(&self, url: &str) -> Result<(), MpvError> {
    self.loadfile(url).await
  }

  async fn set_pause(&self, paused: bool) -> Result<(), MpvError> {
    MpvClient::set_pause(self, paused).await
  }

  async fn stop(&self) -> Result<(), MpvError> {
    self.stop_playback().await
  }

  async fn seek(&self, delta_seconds: f64) -> Result<(), MpvError> {
    self.seek_relative(delta_seconds).await
  }

  async fn set_volume(&self, volume: f64) -> Result<(), MpvError> {
    MpvClient::set_volume(self, volume).await
  }

  fn events(&self) -> Receiver<MpvEvent> {
    MpvClient::events(self)
  }

  fn pid(&self) -> Option<u32> {
    MpvClient::pid(self)
  }

  fn signature(&self) -> ProcessSignature {
    MpvClient::signature(self)
  }
}
