//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `feed` - TCP listener for the external detector's per-frame JSONL feed
//! - `audio` - cue assets, alert dispatch, and the audio playback task

pub mod audio;
pub mod feed;

// Re-export commonly used types
pub use audio::{alert_channel, AlertDispatcher, AudioPlayer, CueAssets};
pub use feed::{start_feed_listener, FeedListenerConfig};
