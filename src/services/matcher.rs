//! Presence decisions against the reference catalog
//!
//! An object is present when some current detection carries its label and
//! its bounding-box center lies within the match radius of the fixed
//! reference center. The first same-label in-radius detection wins; no
//! global nearest-neighbor assignment is attempted across the catalog.
//!
//! Known limitation, kept deliberately: two tracked objects of the same
//! label within radius of one detection will both match it, so one of
//! them moving away goes unnoticed until the shared detection vanishes.
//! The radius is defined in detector pixel space, independent of any
//! display-only resize.

use crate::domain::types::{Detection, TrackedObject};

pub struct PresenceMatcher {
    radius: f64,
}

impl PresenceMatcher {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }

    /// Whether a tracked object is still in the scene
    pub fn is_present(&self, tracked: &TrackedObject, detections: &[Detection]) -> bool {
        detections.iter().any(|d| {
            d.label == tracked.label && d.center().distance_to(&tracked.center) < self.radius
        })
    }

    /// First catalog entry with no qualifying detection, in catalog order
    ///
    /// Absence is evaluated per object, independently; the caller decides
    /// how many absences to act on per tick.
    pub fn first_missing<'a>(
        &self,
        catalog: &'a [TrackedObject],
        detections: &[Detection],
    ) -> Option<&'a TrackedObject> {
        catalog.iter().find(|tracked| !self.is_present(tracked, detections))
    }
}
