//! Tests for the Watcher module

use super::*;
use crate::domain::types::{AlertKind, BBox, Detection, FrameSnapshot, ObjectId, Point};
use crate::io::audio::{alert_channel, AudioPlayer, CueAssets};
use std::path::PathBuf;
use std::thread::sleep;

/// Test harness that keeps the playback channel receiver alive so cue
/// handoff succeeds, and exposes it for assertions
struct TestWatcher {
    watcher: Watcher,
    player: AudioPlayer,
}

impl std::ops::Deref for TestWatcher {
    type Target = Watcher;
    fn deref(&self) -> &Self::Target {
        &self.watcher
    }
}

impl std::ops::DerefMut for TestWatcher {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.watcher
    }
}

impl TestWatcher {
    /// Pop the cue handed to the playback task, simulating it finishing
    /// (which clears the busy flag)
    fn finish_cue(&mut self) -> Option<AlertKind> {
        let cue = self.player.try_take_cue();
        self.watcher.dispatcher.clear_busy();
        cue
    }

    fn feed(&mut self, snapshot: FrameSnapshot) {
        self.watcher.process_event(WatchEvent::Frame(snapshot));
    }
}

fn create_test_watcher(config: Config) -> TestWatcher {
    let metrics = Arc::new(Metrics::new());
    let assets = CueAssets::unchecked(
        PathBuf::from("intrusion.mp3"),
        PathBuf::from("theft.mp3"),
    );
    let (dispatcher, player) =
        alert_channel(assets, Duration::from_secs(30), metrics.clone());
    TestWatcher { watcher: Watcher::new(config, dispatcher, metrics), player }
}

/// Short-window, short-cooldown config so tests run in milliseconds
fn fast_config() -> Config {
    Config::default()
        .with_required_frames(3)
        .with_person_cooldown_ms(50)
        .with_theft_cooldown_ms(50)
}

/// Builder for frame snapshots
#[derive(Default)]
struct FrameBuilder {
    detections: Vec<Detection>,
}

impl FrameBuilder {
    fn new() -> Self {
        Self::default()
    }

    fn with(mut self, label: &str, confidence: f64, cx: f64, cy: f64) -> Self {
        self.detections.push(Detection {
            label: label.to_string(),
            confidence,
            bbox: BBox { x1: cx - 20.0, y1: cy - 20.0, x2: cx + 20.0, y2: cy + 20.0 },
        });
        self
    }

    fn person(self) -> Self {
        self.with("person", 0.9, 600.0, 300.0)
    }

    fn build(self) -> FrameSnapshot {
        FrameSnapshot::new(self.detections)
    }
}

fn empty_frame() -> FrameSnapshot {
    FrameBuilder::new().build()
}

fn bottle_frame(cx: f64, cy: f64) -> FrameSnapshot {
    FrameBuilder::new().with("bottle", 0.9, cx, cy).build()
}

/// Calibrate a watcher on a steady bottle at (100, 100)
fn calibrated_with_bottle(config: Config) -> TestWatcher {
    let mut tw = create_test_watcher(config);
    let frames = tw.config.required_frames();
    for _ in 0..frames {
        tw.feed(bottle_frame(100.0, 100.0));
    }
    assert_eq!(tw.state(), WatchState::Active);
    assert_eq!(tw.objects_watched(), 1);
    tw
}

#[test]
fn test_calibration_transitions_to_active_exactly_once() {
    let mut tw = create_test_watcher(fast_config());
    assert_eq!(tw.state(), WatchState::Calibrating);

    tw.feed(empty_frame());
    tw.feed(empty_frame());
    assert_eq!(tw.state(), WatchState::Calibrating);

    // Exactly `required_frames` frames flip the state, detections or not
    tw.feed(empty_frame());
    assert_eq!(tw.state(), WatchState::Active);
    assert_eq!(tw.objects_watched(), 0);

    // Further frames never re-enter calibration on their own
    tw.feed(bottle_frame(100.0, 100.0));
    assert_eq!(tw.state(), WatchState::Active);
    assert_eq!(tw.objects_watched(), 0);
}

#[test]
fn test_no_alerts_while_calibrating() {
    let mut tw = create_test_watcher(fast_config());
    tw.feed(FrameBuilder::new().person().build());
    tw.feed(FrameBuilder::new().person().build());
    assert_eq!(tw.metrics.intrusion_alerts_total(), 0);
    assert!(tw.finish_cue().is_none());
}

#[test]
fn test_intrusion_alert_fires_and_debounces() {
    let mut tw = calibrated_with_bottle(fast_config());

    tw.feed(FrameBuilder::new().person().with("bottle", 0.9, 100.0, 100.0).build());
    assert_eq!(tw.metrics.intrusion_alerts_total(), 1);
    assert_eq!(tw.finish_cue(), Some(AlertKind::Intrusion));

    // Within the cooldown the alert is suppressed, even though the person
    // never left the frame
    tw.feed(FrameBuilder::new().person().with("bottle", 0.9, 100.0, 100.0).build());
    assert_eq!(tw.metrics.intrusion_alerts_total(), 1);
    assert!(tw.finish_cue().is_none());

    // After the cooldown a still-present person re-triggers
    sleep(Duration::from_millis(80));
    tw.feed(FrameBuilder::new().person().with("bottle", 0.9, 100.0, 100.0).build());
    assert_eq!(tw.metrics.intrusion_alerts_total(), 2);
    assert_eq!(tw.finish_cue(), Some(AlertKind::Intrusion));
}

#[test]
fn test_low_confidence_person_ignored() {
    let mut tw = calibrated_with_bottle(fast_config());
    tw.feed(
        FrameBuilder::new()
            .with("person", 0.2, 600.0, 300.0)
            .with("bottle", 0.9, 100.0, 100.0)
            .build(),
    );
    assert_eq!(tw.metrics.intrusion_alerts_total(), 0);
}

#[test]
fn test_object_within_radius_is_not_theft() {
    let mut tw = calibrated_with_bottle(fast_config());

    // Tracked at (100,100), detected at (200,100): distance 100 < 150
    tw.feed(bottle_frame(200.0, 100.0));
    assert_eq!(tw.metrics.theft_alerts_total(), 0);
    assert_eq!(tw.objects_watched(), 1);
}

#[test]
fn test_object_beyond_radius_is_theft() {
    let mut tw = calibrated_with_bottle(fast_config());

    // Tracked at (100,100), detected at (300,100): distance 200 >= 150
    tw.feed(bottle_frame(300.0, 100.0));
    assert_eq!(tw.metrics.theft_alerts_total(), 1);
    assert_eq!(tw.objects_watched(), 0);
    assert_eq!(tw.finish_cue(), Some(AlertKind::Theft));
}

#[test]
fn test_stolen_object_never_readded() {
    let mut tw = calibrated_with_bottle(fast_config());

    tw.feed(empty_frame());
    assert_eq!(tw.metrics.theft_alerts_total(), 1);
    assert_eq!(tw.objects_watched(), 0);
    tw.finish_cue();

    // The bottle reappearing changes nothing: once stolen, always stolen
    sleep(Duration::from_millis(80));
    tw.feed(bottle_frame(100.0, 100.0));
    tw.feed(empty_frame());
    assert_eq!(tw.objects_watched(), 0);
    assert_eq!(tw.metrics.theft_alerts_total(), 1);
}

#[test]
fn test_simultaneous_thefts_serialize_by_cooldown() {
    let config = fast_config();
    let mut tw = create_test_watcher(config);
    let frames = tw.config.required_frames();
    for _ in 0..frames {
        tw.feed(
            FrameBuilder::new()
                .with("bottle", 0.9, 100.0, 100.0)
                .with("laptop", 0.9, 500.0, 400.0)
                .build(),
        );
    }
    assert_eq!(tw.objects_watched(), 2);

    // Both vanish in the same tick: exactly one alert, one removal
    tw.feed(empty_frame());
    assert_eq!(tw.metrics.theft_alerts_total(), 1);
    assert_eq!(tw.objects_watched(), 1);
    assert_eq!(tw.finish_cue(), Some(AlertKind::Theft));
    assert_eq!(tw.catalog[0].label, "laptop");

    // Within the cooldown the theft branch is skipped entirely
    tw.feed(empty_frame());
    assert_eq!(tw.metrics.theft_alerts_total(), 1);
    assert_eq!(tw.objects_watched(), 1);

    // The second theft surfaces once the cooldown elapses
    sleep(Duration::from_millis(80));
    tw.feed(empty_frame());
    assert_eq!(tw.metrics.theft_alerts_total(), 2);
    assert_eq!(tw.objects_watched(), 0);
}

#[test]
fn test_theft_removes_exactly_the_absent_object() {
    let config = fast_config();
    let mut tw = create_test_watcher(config);
    let frames = tw.config.required_frames();
    for _ in 0..frames {
        tw.feed(
            FrameBuilder::new()
                .with("bottle", 0.9, 100.0, 100.0)
                .with("laptop", 0.9, 500.0, 400.0)
                .build(),
        );
    }

    // Only the laptop disappears
    tw.feed(bottle_frame(100.0, 100.0));
    assert_eq!(tw.metrics.theft_alerts_total(), 1);
    assert_eq!(tw.objects_watched(), 1);
    assert_eq!(tw.catalog[0].id, ObjectId("bottle_0".to_string()));
    assert_eq!(tw.catalog[0].center, Point { x: 100.0, y: 100.0 });
}

#[test]
fn test_reset_recalibrates_but_keeps_cooldown_timers() {
    // Long theft cooldown so the timer visibly survives the reset
    let config = Config::default().with_required_frames(2).with_theft_cooldown_ms(60_000);
    let mut tw = create_test_watcher(config);
    tw.feed(bottle_frame(100.0, 100.0));
    tw.feed(bottle_frame(100.0, 100.0));

    tw.feed(empty_frame());
    assert_eq!(tw.metrics.theft_alerts_total(), 1);
    tw.finish_cue();

    tw.watcher.process_event(WatchEvent::Reset);
    assert_eq!(tw.state(), WatchState::Calibrating);
    assert_eq!(tw.objects_watched(), 0);

    // Recalibrate on the same scene, then make the bottle vanish: the
    // pre-reset theft timer still gates the alert
    tw.feed(bottle_frame(100.0, 100.0));
    tw.feed(bottle_frame(100.0, 100.0));
    assert_eq!(tw.state(), WatchState::Active);
    assert_eq!(tw.objects_watched(), 1);

    tw.feed(empty_frame());
    assert_eq!(tw.metrics.theft_alerts_total(), 1);
    assert_eq!(tw.objects_watched(), 1);
}

#[test]
fn test_cue_dropped_while_busy_does_not_block_decision() {
    let mut tw = calibrated_with_bottle(fast_config());

    // Intrusion claims the audio channel and keeps it (cue not finished)
    tw.feed(FrameBuilder::new().person().with("bottle", 0.9, 100.0, 100.0).build());
    assert_eq!(tw.metrics.intrusion_alerts_total(), 1);

    // Theft decision still lands: object removed, timer stamped, but the
    // cue itself is dropped, not queued
    tw.feed(FrameBuilder::new().person().build());
    assert_eq!(tw.metrics.theft_alerts_total(), 1);
    assert_eq!(tw.objects_watched(), 0);
    assert_eq!(tw.metrics.cues_dropped_total(), 1);
    assert_eq!(tw.finish_cue(), Some(AlertKind::Intrusion));
    assert!(tw.finish_cue().is_none());
}

/// End-to-end calibration scenario: a bottle visible in 25 of 30 frames
/// is cataloged at its first observed center; one empty frame later it is
/// reported stolen and the catalog is empty.
#[test]
fn test_bottle_scenario_25_of_30_then_stolen() {
    let config = Config::default()
        .with_person_cooldown_ms(50)
        .with_theft_cooldown_ms(50);
    let mut tw = create_test_watcher(config);

    for i in 0..30 {
        if i < 25 {
            tw.feed(bottle_frame(50.0, 50.0));
        } else {
            tw.feed(empty_frame());
        }
    }
    assert_eq!(tw.state(), WatchState::Active);
    assert_eq!(tw.objects_watched(), 1);
    assert_eq!(tw.catalog[0].label, "bottle");
    assert_eq!(tw.catalog[0].center, Point { x: 50.0, y: 50.0 });

    tw.feed(empty_frame());
    assert_eq!(tw.metrics.theft_alerts_total(), 1);
    assert_eq!(tw.objects_watched(), 0);
    assert_eq!(tw.finish_cue(), Some(AlertKind::Theft));
}

#[tokio::test]
async fn test_run_consumes_events_until_shutdown() {
    let tw = create_test_watcher(fast_config());
    let TestWatcher { mut watcher, player: _player } = tw;
    let metrics = watcher.metrics.clone();

    let (event_tx, event_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        watcher.run(event_rx, shutdown_rx).await;
    });

    for _ in 0..3 {
        event_tx.send(WatchEvent::Frame(empty_frame())).await.unwrap();
    }

    // Wait for the frames to drain through the loop
    tokio::time::timeout(Duration::from_secs(1), async {
        while metrics.frames_total() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("watcher did not process frames");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("watcher did not shut down")
        .unwrap();
}
