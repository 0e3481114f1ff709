//! Detection feed TCP listener
//!
//! The external detector process connects and streams one JSON object per
//! line, one line per frame:
//!
//!   {"detections":[{"label":"bottle","confidence":0.91,"bbox":{...}}]}
//!
//! The literal line "RESET" is the operator recalibration command. Frames
//! are forwarded to the watcher via try_send so a slow consumer never
//! blocks the feed; drops are counted in metrics.

use crate::domain::types::{FramePayload, FrameSnapshot, WatchEvent};
use crate::infra::metrics::Metrics;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Feed listener configuration
#[derive(Debug, Clone)]
pub struct FeedListenerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for FeedListenerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1".to_string(), port: 8898 }
    }
}

/// Start the detection feed TCP listener
///
/// Accepts connections from the detector process and forwards frame
/// snapshots (and operator resets) to the watcher.
pub async fn start_feed_listener(
    config: FeedListenerConfig,
    event_tx: mpsc::Sender<WatchEvent>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(addr = %addr, "feed_listener_started");

    loop {
        tokio::select! {
            // Check for shutdown
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("feed_listener_shutdown");
                    return Ok(());
                }
            }
            // Accept new connections
            result = listener.accept() => {
                match result {
                    Ok((socket, addr)) => {
                        let tx = event_tx.clone();
                        let m = metrics.clone();
                        tokio::spawn(async move {
                            handle_feed_connection(socket, addr, tx, m).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "feed_accept_failed");
                    }
                }
            }
        }
    }
}

async fn handle_feed_connection(
    socket: tokio::net::TcpStream,
    addr: SocketAddr,
    event_tx: mpsc::Sender<WatchEvent>,
    metrics: Arc<Metrics>,
) {
    let peer = addr.to_string();
    info!(peer = %peer, "feed_connection_accepted");

    let reader = BufReader::new(socket);
    let mut lines = reader.lines();

    // Rate-limit drop warnings to 1 per second
    let mut last_drop_warn = Instant::now() - Duration::from_secs(2);

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = if line == "RESET" {
            info!(peer = %peer, "reset_command_received");
            WatchEvent::Reset
        } else {
            match parse_frame_line(line) {
                Ok(snapshot) => WatchEvent::Frame(snapshot),
                Err(e) => {
                    warn!(peer = %peer, error = %e, "feed_malformed_line");
                    continue;
                }
            }
        };

        // Use try_send to never block the connection handler
        match event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics.record_frame_dropped();
                if last_drop_warn.elapsed() > Duration::from_secs(1) {
                    warn!(peer = %peer, "frame_dropped: channel full");
                    last_drop_warn = Instant::now();
                }
            }
            Err(TrySendError::Closed(_)) => {
                warn!(peer = %peer, "event_channel_closed");
                break;
            }
        }
    }

    debug!(peer = %peer, "feed_connection_closed");
}

/// Parse one feed line into a frame snapshot
fn parse_frame_line(line: &str) -> Result<FrameSnapshot, serde_json::Error> {
    let payload: FramePayload = serde_json::from_str(line)?;
    Ok(FrameSnapshot::new(payload.detections))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_line() {
        let line = r#"{"detections":[
            {"label":"bottle","confidence":0.9,"bbox":{"x1":0.0,"y1":0.0,"x2":100.0,"y2":100.0}},
            {"label":"person","confidence":0.8,"bbox":{"x1":200.0,"y1":0.0,"x2":300.0,"y2":400.0}}
        ]}"#
        .replace('\n', "");
        let snapshot = parse_frame_line(&line).unwrap();
        assert_eq!(snapshot.detections.len(), 2);
        assert_eq!(snapshot.detections[1].label, "person");
    }

    #[test]
    fn test_parse_empty_frame() {
        let snapshot = parse_frame_line(r#"{"detections":[]}"#).unwrap();
        assert!(snapshot.detections.is_empty());
    }

    #[test]
    fn test_parse_malformed_line() {
        assert!(parse_frame_line("{not json").is_err());
        assert!(parse_frame_line(r#"{"detections":"nope"}"#).is_err());
    }
}
