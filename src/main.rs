use std::path::PathBuf;

use audio_arbiter::{AppConfig, Services};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "AUDIO_ARBITER_CONFIG";

fn config_path() -> PathBuf {
  std::env::args_os()
    .nth(1)
    .map(PathBuf::from)
    .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
    .unwrap_or_else(AppConfig::default_path)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = AppConfig::load(&config_path())?;
  let services = Services::build(config)?;

  if let Err(e) = services.start().await {
    log::error!("Failed to start media player companion: {}", e);
  }

  tokio::signal::ctrl_c().await?;
  services.shutdown().await;
  Ok(())
}
