//! Reference catalog construction over the calibration window
//!
//! For a fixed number of frames every confident non-human detection is
//! accumulated per label. At finalization, labels seen in at least the
//! retention fraction of the window are promoted to tracked objects; the
//! rest are dropped as noise. A stray detection or a brief occlusion must
//! neither pollute the catalog nor prevent cataloging an object that is
//! present most of the time.

use crate::domain::types::{Detection, ObjectId, Point, TrackedObject};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub struct Calibrator {
    /// Observed centers per label, in first-seen label order
    observations: HashMap<String, Vec<Point>>,
    /// Labels in first-seen order, for deterministic catalog ordering
    label_order: Vec<String>,
    frames_seen: u32,
    required_frames: u32,
    min_observations: u32,
    confidence_threshold: f64,
    person_label: String,
}

impl Calibrator {
    pub fn new(
        required_frames: u32,
        min_observations: u32,
        confidence_threshold: f64,
        person_label: &str,
    ) -> Self {
        Self {
            observations: HashMap::new(),
            label_order: Vec::new(),
            frames_seen: 0,
            required_frames,
            min_observations,
            confidence_threshold,
            person_label: person_label.to_string(),
        }
    }

    /// Accumulate one frame's detections; call once per frame while calibrating
    pub fn accumulate(&mut self, detections: &[Detection]) {
        for detection in detections {
            if detection.label == self.person_label {
                continue;
            }
            if detection.confidence <= self.confidence_threshold {
                continue;
            }
            if !self.observations.contains_key(&detection.label) {
                self.label_order.push(detection.label.clone());
            }
            self.observations
                .entry(detection.label.clone())
                .or_default()
                .push(detection.center());
        }

        self.frames_seen += 1;
        debug!(
            frame = %self.frames_seen,
            required = %self.required_frames,
            labels = %self.observations.len(),
            "calibration_frame"
        );
    }

    /// Whether the calibration window has elapsed
    ///
    /// Completion is time-based, not catalog-size-based: an empty scene
    /// completes like any other.
    pub fn is_complete(&self) -> bool {
        self.frames_seen >= self.required_frames
    }

    /// Current progress for status reporting
    pub fn frames_seen(&self) -> u32 {
        self.frames_seen
    }

    /// Promote consistently observed labels to tracked objects and reset
    ///
    /// One representative observation (the first) per surviving label
    /// becomes the fixed reference center. Identities are assigned here
    /// and stay stable until the object is removed.
    pub fn finalize(&mut self) -> Vec<TrackedObject> {
        let mut catalog = Vec::new();

        for label in &self.label_order {
            let Some(centers) = self.observations.get(label) else {
                continue;
            };
            if centers.len() < self.min_observations as usize {
                debug!(
                    label = %label,
                    observations = %centers.len(),
                    min = %self.min_observations,
                    "calibration_label_dropped"
                );
                continue;
            }
            let object = TrackedObject {
                id: ObjectId(format!("{}_{}", label, catalog.len())),
                label: label.clone(),
                center: centers[0],
            };
            info!(
                object = %object.id,
                label = %object.label,
                center = %object.center,
                observations = %centers.len(),
                "object_cataloged"
            );
            catalog.push(object);
        }

        if catalog.is_empty() {
            // Legal outcome: only intrusion alerts remain meaningful
            warn!("calibration_empty_catalog");
        }

        self.reset();

        catalog
    }

    /// Discard all accumulated state and restart the window (operator reset)
    pub fn reset(&mut self) {
        self.observations.clear();
        self.label_order.clear();
        self.frames_seen = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::BBox;

    fn detection(label: &str, confidence: f64, cx: f64, cy: f64) -> Detection {
        Detection {
            label: label.to_string(),
            confidence,
            bbox: BBox { x1: cx - 10.0, y1: cy - 10.0, x2: cx + 10.0, y2: cy + 10.0 },
        }
    }

    fn calibrator(required: u32, min_obs: u32) -> Calibrator {
        Calibrator::new(required, min_obs, 0.35, "person")
    }

    #[test]
    fn test_completes_after_required_frames_even_with_no_detections() {
        let mut cal = calibrator(5, 4);
        for _ in 0..4 {
            cal.accumulate(&[]);
            assert!(!cal.is_complete());
        }
        cal.accumulate(&[]);
        assert!(cal.is_complete());
        assert!(cal.finalize().is_empty());
    }

    #[test]
    fn test_consistent_label_is_cataloged_at_first_center() {
        let mut cal = calibrator(10, 7);
        for i in 0..10 {
            // Center drifts slightly; the first observation wins
            cal.accumulate(&[detection("bottle", 0.9, 50.0 + f64::from(i), 50.0)]);
        }
        let catalog = cal.finalize();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].label, "bottle");
        assert_eq!(catalog[0].id, ObjectId("bottle_0".to_string()));
        assert_eq!(catalog[0].center, Point { x: 50.0, y: 50.0 });
    }

    #[test]
    fn test_sparse_label_is_dropped_as_noise() {
        let mut cal = calibrator(30, 21);
        for i in 0..30 {
            let mut frame = vec![detection("laptop", 0.8, 100.0, 100.0)];
            // "cup" flickers in only 20 of 30 frames: below the 70% bar
            if i < 20 {
                frame.push(detection("cup", 0.8, 300.0, 300.0));
            }
            cal.accumulate(&frame);
        }
        let catalog = cal.finalize();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].label, "laptop");
    }

    #[test]
    fn test_person_and_low_confidence_excluded() {
        let mut cal = calibrator(3, 2);
        for _ in 0..3 {
            cal.accumulate(&[
                detection("person", 0.99, 50.0, 50.0),
                detection("bottle", 0.2, 80.0, 80.0),
            ]);
        }
        assert!(cal.finalize().is_empty());
    }

    #[test]
    fn test_finalize_resets_for_recalibration() {
        let mut cal = calibrator(2, 2);
        cal.accumulate(&[detection("bottle", 0.9, 50.0, 50.0)]);
        cal.accumulate(&[detection("bottle", 0.9, 50.0, 50.0)]);
        assert_eq!(cal.finalize().len(), 1);

        assert_eq!(cal.frames_seen(), 0);
        assert!(!cal.is_complete());
        // A fresh window must not inherit old observations
        cal.accumulate(&[]);
        cal.accumulate(&[]);
        assert!(cal.finalize().is_empty());
    }

    #[test]
    fn test_identities_are_ordinal_per_catalog() {
        let mut cal = calibrator(2, 2);
        for _ in 0..2 {
            cal.accumulate(&[
                detection("bottle", 0.9, 50.0, 50.0),
                detection("laptop", 0.9, 200.0, 200.0),
            ]);
        }
        let catalog = cal.finalize();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].id, ObjectId("bottle_0".to_string()));
        assert_eq!(catalog[1].id, ObjectId("laptop_1".to_string()));
    }
}
