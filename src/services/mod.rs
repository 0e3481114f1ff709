//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `watcher` - Central per-frame decision state machine
//! - `calibration` - Reference catalog construction over the startup window
//! - `matcher` - Label + proximity presence decisions against the catalog

pub mod calibration;
pub mod matcher;
pub mod watcher;

// Re-export commonly used types
pub use calibration::Calibrator;
pub use matcher::PresenceMatcher;
pub use watcher::Watcher;
