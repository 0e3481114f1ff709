//! Theft/intrusion decision state machine
//!
//! The Watcher is the central per-frame processor that coordinates:
//! - Calibration (building the reference catalog over the startup window)
//! - Presence matching (is each cataloged object still in the scene)
//! - Cooldown-gated alert decisions (intrusion debounce, global theft
//!   cooldown)
//! - Catalog mutation (removing confirmed-stolen objects, operator reset)
//!
//! Catalog and timer state are mutated only here (single-writer); the
//! audio playback task shares nothing with this loop but the busy flag
//! inside the dispatcher.

mod handlers;
#[cfg(test)]
mod tests;

use crate::domain::types::{TrackedObject, WatchEvent, WatchState};
use crate::infra::config::Config;
use crate::infra::metrics::{Metrics, STATE_CALIBRATING};
use crate::io::audio::AlertDispatcher;
use crate::services::calibration::Calibrator;
use crate::services::matcher::PresenceMatcher;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::info;

/// Two independent cooldown clocks, monotonic, "never fired" until the
/// first alert
///
/// An operator reset deliberately does NOT touch these.
#[derive(Debug, Default)]
pub(crate) struct AlertTimers {
    last_person_alert: Option<Instant>,
    last_theft_alert: Option<Instant>,
}

impl AlertTimers {
    /// Person debounce elapsed (always true before the first alert)
    fn person_ready(&self, cooldown: Duration, now: Instant) -> bool {
        self.last_person_alert.map_or(true, |t| now.duration_since(t) > cooldown)
    }

    /// Global theft cooldown elapsed (always true before the first alert)
    fn theft_ready(&self, cooldown: Duration, now: Instant) -> bool {
        self.last_theft_alert.map_or(true, |t| now.duration_since(t) >= cooldown)
    }

    fn mark_person(&mut self, now: Instant) {
        self.last_person_alert = Some(now);
    }

    fn mark_theft(&mut self, now: Instant) {
        self.last_theft_alert = Some(now);
    }
}

/// Central per-frame decision processor
pub struct Watcher {
    /// Calibrating vs. active
    pub(crate) state: WatchState,
    /// Reference catalog; grows only during calibration, shrinks only on
    /// confirmed theft, cleared wholesale on reset
    pub(crate) catalog: Vec<TrackedObject>,
    /// Accumulates observations while calibrating
    pub(crate) calibrator: Calibrator,
    /// Presence decisions against the catalog
    pub(crate) matcher: PresenceMatcher,
    /// Cooldown clocks
    pub(crate) timers: AlertTimers,
    /// Non-blocking audio cue dispatch
    pub(crate) dispatcher: AlertDispatcher,
    /// Application configuration
    pub(crate) config: Config,
    /// Metrics collector
    pub(crate) metrics: Arc<Metrics>,
}

impl Watcher {
    /// Create a new Watcher with the given configuration and dependencies
    pub fn new(config: Config, dispatcher: AlertDispatcher, metrics: Arc<Metrics>) -> Self {
        let calibrator = Calibrator::new(
            config.required_frames(),
            config.min_observations(),
            config.confidence_threshold(),
            config.person_label(),
        );
        let matcher = PresenceMatcher::new(config.match_radius());
        metrics.set_watch_state(STATE_CALIBRATING);
        Self {
            state: WatchState::Calibrating,
            catalog: Vec::new(),
            calibrator,
            matcher,
            timers: AlertTimers::default(),
            dispatcher,
            config,
            metrics,
        }
    }

    /// Start the watcher, consuming events from the channel until shutdown
    pub async fn run(
        &mut self,
        mut event_rx: mpsc::Receiver<WatchEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            required_frames = %self.config.required_frames(),
            "watcher_started"
        );
        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Some(e) => self.process_event(e),
                        None => break, // Channel closed
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("watcher_shutdown");
                        break;
                    }
                }
            }
        }
    }

    /// Process a single event, dispatching to the appropriate handler
    pub fn process_event(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Frame(snapshot) => self.handle_frame(&snapshot),
            WatchEvent::Reset => self.handle_reset(),
        }
    }

    /// Current number of cataloged objects
    pub fn objects_watched(&self) -> usize {
        self.catalog.len()
    }

    /// Current state
    pub fn state(&self) -> WatchState {
        self.state
    }
}
