//! Watchpost - single-camera theft/intrusion watcher
//!
//! Calibrates a catalog of the non-human objects visible in a fixed scene,
//! then alerts (audio cue + log) when a cataloged object vanishes or a
//! person enters the frame.
//!
//! Module structure:
//! - `domain/` - Core types (Detection, TrackedObject, WatchState)
//! - `io/` - External interfaces (detection feed, audio cues)
//! - `services/` - Business logic (Watcher, Calibrator, PresenceMatcher)
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use watchpost::infra::{Config, Metrics};
use watchpost::io::{alert_channel, start_feed_listener, CueAssets, FeedListenerConfig};
use watchpost::services::Watcher;

/// Watchpost - unattended-property surveillance aid
#[derive(Parser, Debug)]
#[command(name = "watchpost", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-frame visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = env!("GIT_HASH"), "watchpost starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        feed_addr = %format!("{}:{}", config.feed_bind_address(), config.feed_port()),
        confidence_threshold = %config.confidence_threshold(),
        person_label = %config.person_label(),
        required_frames = %config.required_frames(),
        retention_ratio = %config.retention_ratio(),
        match_radius = %config.match_radius(),
        person_cooldown_ms = %config.person_cooldown().as_millis(),
        theft_cooldown_ms = %config.theft_cooldown().as_millis(),
        audio_dir = %config.audio_dir(),
        "config_loaded"
    );

    // Missing cue assets are a fatal configuration error: refusing to
    // start beats running silently degraded
    let assets = CueAssets::from_config(&config)?;

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());

    // Start the audio playback task (sole owner of the output device)
    let (dispatcher, player) = alert_channel(assets, config.playback_timeout(), metrics.clone());
    let player_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        player.run(player_shutdown).await;
    });

    // Create event channel (bounded for backpressure; the feed drops
    // frames rather than block when the watcher falls behind)
    let (event_tx, event_rx) = mpsc::channel(1000);

    // Start the detection feed listener
    let feed_config = FeedListenerConfig {
        bind_address: config.feed_bind_address().to_string(),
        port: config.feed_port(),
    };
    let feed_metrics = metrics.clone();
    let feed_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) =
            start_feed_listener(feed_config, event_tx, feed_metrics, feed_shutdown).await
        {
            tracing::error!(error = %e, "feed listener error");
        }
    });

    // Start metrics reporter (lock-free reads with full summary)
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    // Run the watcher - consumes frames until shutdown or channel close
    let mut watcher = Watcher::new(config, dispatcher, metrics);
    watcher.run(event_rx, shutdown_rx).await;

    info!("watchpost shutdown complete");
    Ok(())
}
