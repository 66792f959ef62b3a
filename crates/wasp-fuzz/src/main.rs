//! Fuzzing session binary: generates, mutates, lifts and runs programs.

mod session;
mod storage;
mod telemetry;

use anyhow::{Context, Result};
use session::Session;
use std::sync::atomic::Ordering;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};
use wasp_core::FuzzConfig;

const CONFIG_ENV: &str = "WASP_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::var(CONFIG_ENV).ok();
    let config = load_config(config_path.as_deref())?;

    telemetry::init_telemetry(telemetry::LogFormat::from_env())?;

    info!("Starting Wasp fuzzing session");
    match &config_path {
        Some(path) => info!("Configuration: {}", path),
        None => info!("Configuration: defaults ({} not set)", CONFIG_ENV),
    }
    info!("Output directory: {}", config.session.output_dir);

    let session = Session::new(config)?;
    let stop = session.stop_handle();

    let run = session.run();
    tokio::pin!(run);

    let stats = tokio::select! {
        stats = &mut run => stats?,
        _ = shutdown_signal() => {
            info!("Stopping workers after their current iteration");
            stop.store(true, Ordering::Relaxed);

            let timeout = tokio::time::sleep(Duration::from_secs(30));
            tokio::pin!(timeout);
            tokio::select! {
                stats = &mut run => stats?,
                _ = &mut timeout => {
                    warn!("Shutdown timeout reached");
                    return Ok(());
                }
            }
        }
    };

    info!(
        "Generated {} programs ({} generation failures), {} mutations applied ({} failed)",
        stats.programs, stats.generation_failures, stats.mutations, stats.failed_mutations
    );
    info!(
        "Ran {} exports of {} modules: {} traps, {} execution failures, {} cases stored",
        stats.exports, stats.modules, stats.traps, stats.execution_failures, stats.stored
    );
    Ok(())
}

fn load_config(path: Option<&str>) -> Result<FuzzConfig> {
    match path {
        Some(path) => FuzzConfig::from_file(path).with_context(|| format!("Failed to load {}", path)),
        None => Ok(FuzzConfig::default()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config() {
        assert_eq!(load_config(None).unwrap().session.workers, 1);

        let path = std::env::temp_dir().join(format!("wasp-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "session": { "workers": 3, "seed": 11 } }"#).unwrap();
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.session.workers, 3);
        assert_eq!(config.session.seed, 11);
        std::fs::remove_file(&path).unwrap();

        assert!(load_config(Some("/nonexistent/wasp.json")).is_err());
    }
}
