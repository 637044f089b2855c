//! Arbitration of one audio output between a pipe-controlled station player
//! and an MPV companion controlled over its IPC socket.

use std::sync::Arc;

pub mod broker;
pub mod catalog;
pub mod config;
pub mod error;
pub mod media;
pub mod mpv;
pub mod process;
pub mod retry;
pub mod station;
pub mod status;

pub use broker::{ActiveSource, AudioSource, ResourceBroker, SourceId};
pub use config::{AppConfig, ConfigError};
pub use error::ErrorKind;
pub use media::{MediaController, MediaError};
pub use station::{StationError, StationSupervisor};

use catalog::YtDlpCatalog;
use mpv::{MpvClient, MpvError};

/// Every long-lived component, wired once.
pub struct Services {
  pub config: AppConfig,
  pub broker: Arc<ResourceBroker>,
  pub station: Arc<StationSupervisor>,
  pub player: Arc<MpvClient>,
  pub catalog: Arc<YtDlpCatalog>,
  pub media: Arc<MediaController>,
}

impl Services {
  /// Construct the components and attach both sources to the broker.
  pub fn build(config: AppConfig) -> Result<Self, ConfigError> {
    config.validate().map_err(ConfigError::Invalid)?;

    let broker = Arc::new(ResourceBroker::new(&config.broker));
    let station = Arc::new(StationSupervisor::new(config.station.clone(), broker.clone()));
    let player = Arc::new(MpvClient::new(&config.media));
    let catalog = Arc::new(YtDlpCatalog::new(&config.media));
    let media = Arc::new(MediaController::new(
      &config.media,
      player.clone(),
      catalog.clone(),
      broker.clone(),
    ));

    broker.attach(station.clone());
    broker.attach(media.clone());

    Ok(Self {
      config,
      broker,
      station,
      player,
      catalog,
      media,
    })
  }

  /// Launch the MPV companion and start consuming its events.
  pub async fn start(&self) -> Result<(), MpvError> {
    self.player.start().await?;
    self.media.start_listener();
    log::info!("Services started");
    Ok(())
  }

  /// Stop both sources and the companion.
  pub async fn shutdown(&self) {
    log::info!("Shutting down");
    self.media.stop_listener();
    self.broker.kill_all().await;
    self.player.shutdown().await;
  }
}
