//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. Default: config/dev.toml
//!
//! A missing file falls back to built-in defaults with a warning so the
//! binary stays runnable on a bare checkout.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// TCP port the detection feed listener binds to
    #[serde(default = "default_feed_port")]
    pub port: u16,
    #[serde(default = "default_feed_bind_address")]
    pub bind_address: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { port: default_feed_port(), bind_address: default_feed_bind_address() }
    }
}

fn default_feed_port() -> u16 {
    8898
}

fn default_feed_bind_address() -> String {
    "127.0.0.1".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Minimum model confidence for a detection to be considered at all
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Class label the detector uses for humans
    #[serde(default = "default_person_label")]
    pub person_label: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            person_label: default_person_label(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.35
}

fn default_person_label() -> String {
    "person".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    /// Number of frames the calibration window spans
    #[serde(default = "default_required_frames")]
    pub required_frames: u32,
    /// Fraction of the window a label must be observed in to be cataloged
    #[serde(default = "default_retention_ratio")]
    pub retention_ratio: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            required_frames: default_required_frames(),
            retention_ratio: default_retention_ratio(),
        }
    }
}

fn default_required_frames() -> u32 {
    30
}

fn default_retention_ratio() -> f64 {
    0.7
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Debounce between successive person alerts
    #[serde(default = "default_person_cooldown_ms")]
    pub person_cooldown_ms: u64,
    /// Global cooldown between theft alerts (across all objects)
    #[serde(default = "default_theft_cooldown_ms")]
    pub theft_cooldown_ms: u64,
    /// Presence match radius in detector pixel space
    #[serde(default = "default_match_radius")]
    pub match_radius: f64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            person_cooldown_ms: default_person_cooldown_ms(),
            theft_cooldown_ms: default_theft_cooldown_ms(),
            match_radius: default_match_radius(),
        }
    }
}

fn default_person_cooldown_ms() -> u64 {
    5000
}

fn default_theft_cooldown_ms() -> u64 {
    3000
}

fn default_match_radius() -> f64 {
    150.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Directory holding the pre-rendered cue assets
    #[serde(default = "default_audio_dir")]
    pub dir: String,
    #[serde(default = "default_intrusion_cue")]
    pub intrusion_cue: String,
    #[serde(default = "default_theft_cue")]
    pub theft_cue: String,
    /// Watchdog ceiling on a single cue playback
    #[serde(default = "default_playback_timeout_secs")]
    pub playback_timeout_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            dir: default_audio_dir(),
            intrusion_cue: default_intrusion_cue(),
            theft_cue: default_theft_cue(),
            playback_timeout_secs: default_playback_timeout_secs(),
        }
    }
}

fn default_audio_dir() -> String {
    "audio".to_string()
}

fn default_intrusion_cue() -> String {
    "intrusion.mp3".to_string()
}

fn default_theft_cue() -> String {
    "theft.mp3".to_string()
}

fn default_playback_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    feed_port: u16,
    feed_bind_address: String,
    confidence_threshold: f64,
    person_label: String,
    required_frames: u32,
    retention_ratio: f64,
    person_cooldown_ms: u64,
    theft_cooldown_ms: u64,
    match_radius: f64,
    audio_dir: String,
    intrusion_cue: String,
    theft_cue: String,
    playback_timeout_secs: u64,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            feed_port: toml_config.feed.port,
            feed_bind_address: toml_config.feed.bind_address,
            confidence_threshold: toml_config.detection.confidence_threshold,
            person_label: toml_config.detection.person_label,
            required_frames: toml_config.calibration.required_frames,
            retention_ratio: toml_config.calibration.retention_ratio,
            person_cooldown_ms: toml_config.alerts.person_cooldown_ms,
            theft_cooldown_ms: toml_config.alerts.theft_cooldown_ms,
            match_radius: toml_config.alerts.match_radius,
            audio_dir: toml_config.audio.dir,
            intrusion_cue: toml_config.audio.intrusion_cue,
            theft_cue: toml_config.audio.theft_cue,
            playback_timeout_secs: toml_config.audio.playback_timeout_secs,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: config_file.to_string(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Minimum number of observation frames for a label to survive
    /// calibration finalize (ceil of retention_ratio * required_frames)
    pub fn min_observations(&self) -> u32 {
        (self.retention_ratio * f64::from(self.required_frames)).ceil() as u32
    }

    // Getters for all config fields
    pub fn feed_port(&self) -> u16 {
        self.feed_port
    }

    pub fn feed_bind_address(&self) -> &str {
        &self.feed_bind_address
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn person_label(&self) -> &str {
        &self.person_label
    }

    pub fn required_frames(&self) -> u32 {
        self.required_frames
    }

    pub fn retention_ratio(&self) -> f64 {
        self.retention_ratio
    }

    pub fn person_cooldown(&self) -> Duration {
        Duration::from_millis(self.person_cooldown_ms)
    }

    pub fn theft_cooldown(&self) -> Duration {
        Duration::from_millis(self.theft_cooldown_ms)
    }

    pub fn match_radius(&self) -> f64 {
        self.match_radius
    }

    pub fn audio_dir(&self) -> &str {
        &self.audio_dir
    }

    pub fn intrusion_cue_path(&self) -> PathBuf {
        Path::new(&self.audio_dir).join(&self.intrusion_cue)
    }

    pub fn theft_cue_path(&self) -> PathBuf {
        Path::new(&self.audio_dir).join(&self.theft_cue)
    }

    pub fn playback_timeout(&self) -> Duration {
        Duration::from_secs(self.playback_timeout_secs)
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to shrink the calibration window
    #[cfg(test)]
    pub fn with_required_frames(mut self, frames: u32) -> Self {
        self.required_frames = frames;
        self
    }

    /// Builder method for tests to set the person alert debounce
    #[cfg(test)]
    pub fn with_person_cooldown_ms(mut self, ms: u64) -> Self {
        self.person_cooldown_ms = ms;
        self
    }

    /// Builder method for tests to set the theft cooldown
    #[cfg(test)]
    pub fn with_theft_cooldown_ms(mut self, ms: u64) -> Self {
        self.theft_cooldown_ms = ms;
        self
    }

    /// Builder method for tests to point at a cue asset directory
    #[cfg(test)]
    pub fn with_audio_dir(mut self, dir: &str) -> Self {
        self.audio_dir = dir.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.feed_port(), 8898);
        assert_eq!(config.confidence_threshold(), 0.35);
        assert_eq!(config.person_label(), "person");
        assert_eq!(config.required_frames(), 30);
        assert_eq!(config.retention_ratio(), 0.7);
        assert_eq!(config.person_cooldown(), Duration::from_secs(5));
        assert_eq!(config.theft_cooldown(), Duration::from_secs(3));
        assert_eq!(config.match_radius(), 150.0);
        assert_eq!(config.metrics_interval_secs(), 10);
    }

    #[test]
    fn test_min_observations_rounds_up() {
        let config = Config::default();
        // 0.7 * 30 = 21
        assert_eq!(config.min_observations(), 21);

        let config = Config::default().with_required_frames(10);
        // ceil(0.7 * 10) = 7
        assert_eq!(config.min_observations(), 7);

        let config = Config::default().with_required_frames(25);
        // ceil(0.7 * 25) = ceil(17.5) = 18
        assert_eq!(config.min_observations(), 18);
    }

    #[test]
    fn test_cue_paths_join_audio_dir() {
        let config = Config::default();
        assert_eq!(config.intrusion_cue_path(), PathBuf::from("audio/intrusion.mp3"));
        assert_eq!(config.theft_cue_path(), PathBuf::from("audio/theft.mp3"));
    }
}
