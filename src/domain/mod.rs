//! Domain models - core surveillance types
//!
//! This module contains the canonical data types used throughout the system:
//! - `Detection` - a single model detection for one frame
//! - `FrameSnapshot` - all detections for one frame
//! - `TrackedObject` - a cataloged object watched for continued presence
//! - `WatchState` - calibrating vs. active
//! - `AlertKind` - which audio cue an alert resolves to

pub mod types;
