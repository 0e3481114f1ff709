//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally; these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions
//! (the audio busy flag in `io::audio` is the one coordination atomic, and it
//! lives there, not here).

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Watch state values for the state gauge
pub const STATE_CALIBRATING: u64 = 0;
pub const STATE_ACTIVE: u64 = 1;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps periodic counters to get a
/// consistent snapshot.
pub struct Metrics {
    /// Total frames ever processed (monotonic)
    frames_total: AtomicU64,
    /// Frames since last report (reset on report)
    frames_since_report: AtomicU64,
    /// Sum of frame-processing latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max frame-processing latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Total detections seen across all frames (monotonic)
    detections_total: AtomicU64,
    /// Intrusion alerts fired (monotonic)
    intrusion_alerts_total: AtomicU64,
    /// Theft alerts fired (monotonic)
    theft_alerts_total: AtomicU64,
    /// Alerts suppressed by a cooldown (monotonic)
    alerts_suppressed_total: AtomicU64,
    /// Cues handed to the playback task (monotonic)
    cues_played_total: AtomicU64,
    /// Cues dropped because playback was busy (monotonic)
    cues_dropped_total: AtomicU64,
    /// Frames dropped because the watcher channel was full (monotonic)
    frames_dropped_total: AtomicU64,
    /// Operator resets (monotonic)
    resets_total: AtomicU64,
    /// Current catalog size gauge
    objects_watched: AtomicU64,
    /// Current watch state gauge (0=calibrating, 1=active)
    watch_state: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_total: AtomicU64::new(0),
            frames_since_report: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            detections_total: AtomicU64::new(0),
            intrusion_alerts_total: AtomicU64::new(0),
            theft_alerts_total: AtomicU64::new(0),
            alerts_suppressed_total: AtomicU64::new(0),
            cues_played_total: AtomicU64::new(0),
            cues_dropped_total: AtomicU64::new(0),
            frames_dropped_total: AtomicU64::new(0),
            resets_total: AtomicU64::new(0),
            objects_watched: AtomicU64::new(0),
            watch_state: AtomicU64::new(STATE_CALIBRATING),
        }
    }

    /// Record a processed frame and its processing latency (lock-free)
    #[inline]
    pub fn record_frame_processed(&self, latency_us: u64) {
        self.frames_total.fetch_add(1, Ordering::Relaxed);
        self.frames_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
    }

    /// Record detections delivered in one frame
    #[inline]
    pub fn record_detections(&self, count: u64) {
        self.detections_total.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_intrusion_alert(&self) {
        self.intrusion_alerts_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_theft_alert(&self) {
        self.theft_alerts_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_alert_suppressed(&self) {
        self.alerts_suppressed_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cue_played(&self) {
        self.cues_played_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cue_dropped(&self) {
        self.cues_dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_frame_dropped(&self) {
        self.frames_dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reset(&self) {
        self.resets_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the catalog size gauge (called by the watcher after mutations)
    #[inline]
    pub fn set_objects_watched(&self, count: u64) {
        self.objects_watched.store(count, Ordering::Relaxed);
    }

    /// Set the watch state gauge (STATE_CALIBRATING / STATE_ACTIVE)
    #[inline]
    pub fn set_watch_state(&self, state: u64) {
        self.watch_state.store(state, Ordering::Relaxed);
    }

    #[inline]
    pub fn intrusion_alerts_total(&self) -> u64 {
        self.intrusion_alerts_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn theft_alerts_total(&self) -> u64 {
        self.theft_alerts_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn cues_dropped_total(&self) -> u64 {
        self.cues_dropped_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn frames_total(&self) -> u64 {
        self.frames_total.load(Ordering::Relaxed)
    }

    /// Calculate and return a metrics summary, then reset periodic counters
    ///
    /// This is the only method that resets counters. It uses atomic swap
    /// to get a consistent snapshot while allowing concurrent updates.
    pub fn report(&self) -> MetricsSummary {
        let frames = self.frames_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let latency_max = self.latency_max_us.swap(0, Ordering::Relaxed);

        let avg_latency_us = if frames > 0 { latency_sum / frames } else { 0 };

        MetricsSummary {
            frames,
            avg_latency_us,
            max_latency_us: latency_max,
            frames_total: self.frames_total.load(Ordering::Relaxed),
            detections_total: self.detections_total.load(Ordering::Relaxed),
            intrusion_alerts_total: self.intrusion_alerts_total.load(Ordering::Relaxed),
            theft_alerts_total: self.theft_alerts_total.load(Ordering::Relaxed),
            alerts_suppressed_total: self.alerts_suppressed_total.load(Ordering::Relaxed),
            cues_played_total: self.cues_played_total.load(Ordering::Relaxed),
            cues_dropped_total: self.cues_dropped_total.load(Ordering::Relaxed),
            frames_dropped_total: self.frames_dropped_total.load(Ordering::Relaxed),
            resets_total: self.resets_total.load(Ordering::Relaxed),
            objects_watched: self.objects_watched.load(Ordering::Relaxed),
            state: if self.watch_state.load(Ordering::Relaxed) == STATE_ACTIVE {
                "active"
            } else {
                "calibrating"
            },
        }
    }
}

/// Snapshot of metrics for one reporting interval
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub frames: u64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
    pub frames_total: u64,
    pub detections_total: u64,
    pub intrusion_alerts_total: u64,
    pub theft_alerts_total: u64,
    pub alerts_suppressed_total: u64,
    pub cues_played_total: u64,
    pub cues_dropped_total: u64,
    pub frames_dropped_total: u64,
    pub resets_total: u64,
    pub objects_watched: u64,
    pub state: &'static str,
}

impl MetricsSummary {
    /// Log the summary as a single structured event
    pub fn log(&self) {
        info!(
            state = %self.state,
            objects_watched = %self.objects_watched,
            frames = %self.frames,
            frames_total = %self.frames_total,
            avg_latency_us = %self.avg_latency_us,
            max_latency_us = %self.max_latency_us,
            detections_total = %self.detections_total,
            intrusion_alerts = %self.intrusion_alerts_total,
            theft_alerts = %self.theft_alerts_total,
            alerts_suppressed = %self.alerts_suppressed_total,
            cues_played = %self.cues_played_total,
            cues_dropped = %self.cues_dropped_total,
            frames_dropped = %self.frames_dropped_total,
            resets = %self.resets_total,
            "metrics_summary"
        );
    }
}
