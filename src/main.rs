use anyhow::Result;
use homewatch::api::rest::RestApi;
use homewatch::config;
use homewatch::replay::{ReplayDetector, ReplaySource, ReplayTrace};
use homewatch::{AggregationLoop, Clock, Cooldowns, Detectors, MonitorState, SystemClock};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn run_app() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;

    // Initialize logging; RUST_LOG still wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.api.log_level.as_str()),
    )
    .init();
    info!("Starting homewatch");
    info!("Configuration loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let monitor = Arc::new(MonitorState::new(
        Cooldowns::from_config(&config.alarms)?,
        clock.clone(),
    ));

    let trace = Arc::new(ReplayTrace::load(&config.capture.trace_path)?);
    let detectors = Detectors {
        person: Some(Arc::new(ReplayDetector::new(
            trace.clone(),
            vec![config.detection.person_label.clone()],
            config.detection.min_confidence_person,
        ))),
        fire: Some(Arc::new(ReplayDetector::new(
            trace.clone(),
            vec![config.detection.fire_label.clone()],
            config.detection.min_confidence_fire,
        ))),
    };

    let aggregation = AggregationLoop::new(
        &config,
        ReplaySource::new(trace),
        detectors,
        clock,
        monitor.clone(),
    )?;

    let shutdown = CancellationToken::new();

    let loop_handle = tokio::spawn(aggregation.run(shutdown.clone()));
    info!("Aggregation loop started");

    let http_server = RestApi::new(&config.api, monitor);
    let api_shutdown = shutdown.clone();
    let api_handle = tokio::spawn(async move { http_server.run(api_shutdown).await });

    // Wait for termination signals
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    shutdown.cancel();

    match loop_handle.await {
        Ok(Ok(())) => info!("Aggregation loop stopped"),
        Ok(Err(e)) => error!("Aggregation loop failed: {}", e),
        Err(e) => error!("Aggregation loop task panicked: {}", e),
    }
    match api_handle.await {
        Ok(Ok(())) => info!("API server stopped"),
        Ok(Err(e)) => error!("API server failed: {}", e),
        Err(e) => error!("API server task panicked: {}", e),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
