//! Cue assets, alert dispatch, and the audio playback task
//!
//! There is exactly one audio output channel, guarded by a process-wide
//! `busy` flag. `AlertDispatcher::dispatch` is the only entry point the
//! frame loop uses: it either claims the flag and hands the cue to the
//! playback task, or drops the cue outright. It never blocks and never
//! returns an error to the caller.
//!
//! The playback task clears the flag on success, on playback error, and
//! on watchdog timeout alike. A leaked busy flag would permanently
//! silence all future alerts.

use crate::domain::types::AlertKind;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Resolved and validated cue asset paths
///
/// Both assets must exist at startup; running without them would degrade
/// to silent alerting without anyone noticing.
#[derive(Debug, Clone)]
pub struct CueAssets {
    intrusion: PathBuf,
    theft: PathBuf,
}

impl CueAssets {
    /// Resolve cue paths from config and verify both files exist
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let assets = Self {
            intrusion: config.intrusion_cue_path(),
            theft: config.theft_cue_path(),
        };
        for path in [&assets.intrusion, &assets.theft] {
            if !path.is_file() {
                anyhow::bail!("missing audio cue asset: {}", path.display());
            }
        }
        Ok(assets)
    }

    /// Construct without existence checks (tests, simulators)
    pub fn unchecked(intrusion: PathBuf, theft: PathBuf) -> Self {
        Self { intrusion, theft }
    }

    fn path_for(&self, kind: AlertKind) -> &Path {
        match kind {
            AlertKind::Intrusion => &self.intrusion,
            AlertKind::Theft => &self.theft,
        }
    }
}

/// Non-blocking alert dispatch handle held by the watcher
///
/// Cloneable; all clones share the same busy flag and playback channel.
#[derive(Clone)]
pub struct AlertDispatcher {
    tx: mpsc::Sender<AlertKind>,
    busy: Arc<AtomicBool>,
    metrics: Arc<Metrics>,
}

impl AlertDispatcher {
    /// Dispatch a cue, or drop it if playback is already in progress
    ///
    /// Claims the busy flag with compare-exchange before handing the cue
    /// over, so a cue is either exclusively owned by the playback task or
    /// dropped here. Dropped cues are lost, not deferred.
    pub fn dispatch(&self, kind: AlertKind) {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.metrics.record_cue_dropped();
            debug!(cue = %kind.as_str(), "cue_dropped_busy");
            return;
        }

        match self.tx.try_send(kind) {
            Ok(()) => {
                self.metrics.record_cue_played();
            }
            Err(e) => {
                // Channel full or player gone; release the claim so the
                // next alert is not silenced
                self.busy.store(false, Ordering::Release);
                warn!(cue = %kind.as_str(), error = %e, "cue_send_failed");
            }
        }
    }

    /// Whether a cue is currently claimed or playing
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Test hook standing in for the playback task clearing the flag
    #[cfg(test)]
    pub(crate) fn clear_busy(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Dedicated playback task state
pub struct AudioPlayer {
    assets: CueAssets,
    rx: mpsc::Receiver<AlertKind>,
    busy: Arc<AtomicBool>,
    playback_timeout: Duration,
}

/// Create the dispatcher/player pair sharing one busy flag
///
/// Capacity 1 is intentional: the busy flag already guarantees at most
/// one in-flight cue, the channel only carries the handoff.
pub fn alert_channel(
    assets: CueAssets,
    playback_timeout: Duration,
    metrics: Arc<Metrics>,
) -> (AlertDispatcher, AudioPlayer) {
    let (tx, rx) = mpsc::channel(1);
    let busy = Arc::new(AtomicBool::new(false));
    let dispatcher = AlertDispatcher { tx, busy: busy.clone(), metrics };
    let player = AudioPlayer { assets, rx, busy, playback_timeout };
    (dispatcher, player)
}

impl AudioPlayer {
    /// Run the playback task until shutdown or the dispatcher is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("audio_player_started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("audio_player_shutdown");
                        return;
                    }
                }
                request = self.rx.recv() => {
                    match request {
                        Some(kind) => self.play(kind).await,
                        None => return,
                    }
                }
            }
        }
    }

    /// Play one cue to completion, then clear the busy flag
    ///
    /// Playback runs on the blocking pool under a watchdog timeout; a hung
    /// audio device clears the flag after the timeout instead of silencing
    /// the system forever.
    async fn play(&self, kind: AlertKind) {
        let path = self.assets.path_for(kind).to_path_buf();
        debug!(cue = %kind.as_str(), path = %path.display(), "cue_playback_started");

        let playback = tokio::task::spawn_blocking(move || play_file(&path));

        match tokio::time::timeout(self.playback_timeout, playback).await {
            Ok(Ok(Ok(()))) => {
                debug!(cue = %kind.as_str(), "cue_playback_finished");
            }
            Ok(Ok(Err(e))) => {
                // Broken audio must degrade to silent-but-functional
                // alerting, never crash the loop
                warn!(cue = %kind.as_str(), error = %e, "cue_playback_failed");
            }
            Ok(Err(e)) => {
                error!(cue = %kind.as_str(), error = %e, "cue_playback_panicked");
            }
            Err(_) => {
                error!(
                    cue = %kind.as_str(),
                    timeout_ms = %self.playback_timeout.as_millis(),
                    "cue_playback_timeout"
                );
            }
        }

        self.busy.store(false, Ordering::Release);
    }

    /// Test hook draining the handoff channel without playing anything
    #[cfg(test)]
    pub(crate) fn try_take_cue(&mut self) -> Option<AlertKind> {
        self.rx.try_recv().ok()
    }
}

/// Decode and play a cue file to completion on the default output device
fn play_file(path: &Path) -> anyhow::Result<()> {
    let (_stream, handle) = rodio::OutputStream::try_default()
        .context("failed to open default audio output")?;
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open cue file {}", path.display()))?;
    let source = rodio::Decoder::new(std::io::BufReader::new(file))
        .with_context(|| format!("failed to decode cue file {}", path.display()))?;
    let sink = rodio::Sink::try_new(&handle).context("failed to create audio sink")?;
    sink.append(source);
    sink.sleep_until_end();
    Ok(())
}
