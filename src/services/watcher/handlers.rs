//! Frame and reset handlers for the Watcher
//!
//! Each handler mutates watcher state and triggers side effects (cue
//! dispatch, metrics). All mutation happens on the watcher loop; nothing
//! here blocks on audio playback.

use super::Watcher;
use crate::domain::types::{AlertKind, Detection, FrameSnapshot, WatchState};
use crate::infra::metrics::{STATE_ACTIVE, STATE_CALIBRATING};
use std::time::Instant;
use tracing::{debug, info, warn};

impl Watcher {
    /// Handle one frame's detection snapshot
    pub(crate) fn handle_frame(&mut self, snapshot: &FrameSnapshot) {
        self.metrics.record_detections(snapshot.detections.len() as u64);

        match self.state {
            WatchState::Calibrating => self.calibrate(snapshot),
            WatchState::Active => self.evaluate(snapshot),
        }

        // Latency from feed receipt to decision, so channel queueing shows
        // up in the numbers as well
        let latency_us = snapshot.received_at.elapsed().as_micros() as u64;
        self.metrics.record_frame_processed(latency_us);
    }

    /// Accumulate a calibration frame; finalize when the window elapses
    ///
    /// Finalization is the sole CALIBRATING -> ACTIVE transition. It fires
    /// on frame count alone, even for an empty scene.
    fn calibrate(&mut self, snapshot: &FrameSnapshot) {
        self.calibrator.accumulate(&snapshot.detections);

        if self.calibrator.is_complete() {
            self.catalog = self.calibrator.finalize();
            self.state = WatchState::Active;
            self.metrics.set_watch_state(STATE_ACTIVE);
            self.metrics.set_objects_watched(self.catalog.len() as u64);
            info!(
                objects_watched = %self.catalog.len(),
                "calibration_complete"
            );
        }
    }

    /// Run the two alert branches for an active frame
    fn evaluate(&mut self, snapshot: &FrameSnapshot) {
        let now = Instant::now();
        self.check_intrusion(&snapshot.detections, now);
        self.check_theft(&snapshot.detections, now);
    }

    /// Intrusion branch: cooldown-debounced person alert
    ///
    /// The cooldown is a pure debounce: a person remaining in frame
    /// re-triggers every cooldown interval. That is the intended behavior
    /// for sustained intrusion, not an oversight.
    fn check_intrusion(&mut self, detections: &[Detection], now: Instant) {
        let person_detected = detections.iter().any(|d| {
            d.label == self.config.person_label()
                && d.confidence > self.config.confidence_threshold()
        });
        if !person_detected {
            return;
        }

        if !self.timers.person_ready(self.config.person_cooldown(), now) {
            self.metrics.record_alert_suppressed();
            debug!("person_alert_suppressed");
            return;
        }

        warn!("person_detected");
        self.dispatcher.dispatch(AlertKind::Intrusion);
        self.metrics.record_intrusion_alert();
        self.timers.mark_person(now);
    }

    /// Theft branch: global cooldown, at most one theft event per tick
    ///
    /// The cooldown is global across all objects so that several objects
    /// vanishing in the same frame (a camera jolt, say) produce one alert
    /// per interval instead of a storm. The cost is that a second
    /// simultaneous theft is reported up to one cooldown late.
    fn check_theft(&mut self, detections: &[Detection], now: Instant) {
        if !self.timers.theft_ready(self.config.theft_cooldown(), now) {
            return;
        }

        // Presence evidence: confident non-human detections only
        let evidence: Vec<Detection> = detections
            .iter()
            .filter(|d| {
                d.label != self.config.person_label()
                    && d.confidence > self.config.confidence_threshold()
            })
            .cloned()
            .collect();

        let stolen = self
            .matcher
            .first_missing(&self.catalog, &evidence)
            .map(|obj| (obj.id.clone(), obj.label.clone(), obj.center));

        let Some((id, label, center)) = stolen else {
            return;
        };

        warn!(
            object = %id,
            label = %label,
            last_seen = %center,
            "theft_alert"
        );
        self.dispatcher.dispatch(AlertKind::Theft);
        self.metrics.record_theft_alert();
        self.timers.mark_theft(now);

        // Once stolen, always stolen for this session: the object is
        // removed and never re-added even if a matching detection
        // reappears later
        self.catalog.retain(|obj| obj.id != id);
        self.metrics.set_objects_watched(self.catalog.len() as u64);
        info!(object = %id, remaining = %self.catalog.len(), "object_untracked");
    }

    /// Operator reset: clear the catalog and recalibrate
    ///
    /// Alert cooldown timers are deliberately left untouched.
    pub(crate) fn handle_reset(&mut self) {
        self.catalog.clear();
        self.calibrator.reset();
        self.state = WatchState::Calibrating;
        self.metrics.record_reset();
        self.metrics.set_watch_state(STATE_CALIBRATING);
        self.metrics.set_objects_watched(0);
        info!("watch_reset");
    }
}
