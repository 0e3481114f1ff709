//! Shared types for the watchpost core

use serde::Deserialize;
use std::time::Instant;

/// Newtype wrapper for catalog object identities to provide type safety
///
/// Identities are assigned once, at calibration finalization ("bottle_0",
/// "laptop_1", ...), and stay stable until the object is removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(pub String);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bounding box in detector pixel space, corner form
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn center(&self) -> Point {
        Point { x: (self.x1 + self.x2) / 2.0, y: (self.y1 + self.y2) / 2.0 }
    }
}

/// Point in detector pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// One model detection, as delivered by the external detector process
///
/// Ephemeral: produced fresh each frame and never retained past it, except
/// as input to the calibration accumulator.
#[derive(Debug, Clone, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub bbox: BBox,
}

impl Detection {
    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}

/// Wire format for one frame on the detection feed (one JSON line)
#[derive(Debug, Deserialize)]
pub struct FramePayload {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// All detections for one frame, stamped on arrival
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub detections: Vec<Detection>,
    pub received_at: Instant,
}

impl FrameSnapshot {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections, received_at: Instant::now() }
    }
}

/// Event consumed by the watcher loop
#[derive(Debug)]
pub enum WatchEvent {
    Frame(FrameSnapshot),
    /// Operator reset: clear the catalog and recalibrate
    Reset,
}

/// Cataloged object watched for continued presence
///
/// The center is fixed at calibration time and never updated afterward;
/// the system tracks absence, not motion.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub id: ObjectId,
    pub label: String,
    pub center: Point,
}

/// System state: the catalog grows only while calibrating, and once active
/// only shrinks (confirmed theft) or is cleared wholesale (reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Calibrating,
    Active,
}

impl WatchState {
    pub fn as_str(&self) -> &str {
        match self {
            WatchState::Calibrating => "calibrating",
            WatchState::Active => "active",
        }
    }
}

/// Which audio cue an alert resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Intrusion,
    Theft,
}

impl AlertKind {
    pub fn as_str(&self) -> &str {
        match self {
            AlertKind::Intrusion => "intrusion",
            AlertKind::Theft => "theft",
        }
    }
}
