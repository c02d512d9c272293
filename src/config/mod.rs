use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub alarms: AlarmConfig,
    #[serde(default)]
    pub fall: FallConfig,
    #[serde(default)]
    pub fire: FireConfig,
    #[serde(default)]
    pub light: LightConfig,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// API server address
    #[serde(default = "default_api_address")]
    pub address: String,
    /// API server port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_api_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    5001
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Frame source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Recorded detection trace replayed as the frame source
    #[serde(default = "default_trace_path")]
    pub trace_path: PathBuf,
    /// Rewind file-backed sources when they run out of frames
    #[serde(default = "default_true")]
    pub restart_on_end: bool,
}

fn default_trace_path() -> PathBuf {
    PathBuf::from("traces/kitchen.json")
}

fn default_true() -> bool {
    true
}

/// Settings handed to the bundled replay detectors
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectionConfig {
    #[serde(default = "default_person_label")]
    pub person_label: String,
    #[serde(default = "default_fire_label")]
    pub fire_label: String,
    #[serde(default = "default_min_confidence_person")]
    pub min_confidence_person: f32,
    #[serde(default = "default_min_confidence_fire")]
    pub min_confidence_fire: f32,
}

fn default_person_label() -> String {
    "person".to_string()
}

fn default_fire_label() -> String {
    "fire".to_string()
}

fn default_min_confidence_person() -> f32 {
    0.60
}

fn default_min_confidence_fire() -> f32 {
    0.40
}

/// Per-type alarm cooldowns, in seconds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlarmConfig {
    #[serde(default = "default_fall_cooldown")]
    pub fall_cooldown_secs: f64,
    #[serde(default = "default_unattended_fire_cooldown")]
    pub unattended_fire_cooldown_secs: f64,
    #[serde(default = "default_forgotten_light_cooldown")]
    pub forgotten_light_cooldown_secs: f64,
    /// Cooldown applied to custom alarm types
    #[serde(default = "default_cooldown")]
    pub default_cooldown_secs: f64,
}

fn default_fall_cooldown() -> f64 {
    30.0
}

fn default_unattended_fire_cooldown() -> f64 {
    20.0
}

fn default_forgotten_light_cooldown() -> f64 {
    10.0
}

fn default_cooldown() -> f64 {
    30.0
}

/// Fall detection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallConfig {
    /// Boxes with height/width below this ratio count as lying down
    #[serde(default = "default_aspect_ratio_threshold")]
    pub aspect_ratio_threshold: f64,
    /// How long a lying candidate must persist before a fall is raised
    #[serde(default = "default_min_fall_duration")]
    pub min_duration_secs: f64,
}

fn default_aspect_ratio_threshold() -> f64 {
    0.8
}

fn default_min_fall_duration() -> f64 {
    2.0
}

/// Unattended fire configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FireConfig {
    /// Fire must burn, and the room be empty, for at least this long
    #[serde(default = "default_unattended_secs")]
    pub unattended_secs: f64,
}

fn default_unattended_secs() -> f64 {
    10.0
}

/// Forgotten light configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LightConfig {
    #[serde(default = "default_on_threshold")]
    pub on_threshold: f64,
    #[serde(default = "default_off_threshold")]
    pub off_threshold: f64,
    /// Keep this short only for testing; production wants minutes or hours
    #[serde(default = "default_forgotten_secs")]
    pub forgotten_secs: f64,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: f64,
    /// First local hour (inclusive) in which the light is watched
    #[serde(default)]
    pub active_hours_start: u32,
    /// Last local hour (exclusive); a value below the start wraps past midnight
    #[serde(default = "default_active_hours_end")]
    pub active_hours_end: u32,
}

fn default_on_threshold() -> f64 {
    110.0
}

fn default_off_threshold() -> f64 {
    90.0
}

fn default_forgotten_secs() -> f64 {
    1800.0
}

fn default_check_interval() -> f64 {
    1.0
}

fn default_active_hours_end() -> u32 {
    24
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: default_api_address(),
            port: default_api_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            trace_path: default_trace_path(),
            restart_on_end: true,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            person_label: default_person_label(),
            fire_label: default_fire_label(),
            min_confidence_person: default_min_confidence_person(),
            min_confidence_fire: default_min_confidence_fire(),
        }
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            fall_cooldown_secs: default_fall_cooldown(),
            unattended_fire_cooldown_secs: default_unattended_fire_cooldown(),
            forgotten_light_cooldown_secs: default_forgotten_light_cooldown(),
            default_cooldown_secs: default_cooldown(),
        }
    }
}

impl Default for FallConfig {
    fn default() -> Self {
        Self {
            aspect_ratio_threshold: default_aspect_ratio_threshold(),
            min_duration_secs: default_min_fall_duration(),
        }
    }
}

impl Default for FireConfig {
    fn default() -> Self {
        Self {
            unattended_secs: default_unattended_secs(),
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            on_threshold: default_on_threshold(),
            off_threshold: default_off_threshold(),
            forgotten_secs: default_forgotten_secs(),
            check_interval_secs: default_check_interval(),
            active_hours_start: 0,
            active_hours_end: default_active_hours_end(),
        }
    }
}

/// Converts a seconds field into a `Duration`, rejecting negative or non-finite values.
pub fn secs(name: &str, value: f64) -> std::result::Result<Duration, Error> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::Config(format!("{} must be a non-negative number of seconds, got {}", name, value)))
}

impl Config {
    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> std::result::Result<(), Error> {
        secs("alarms.fall_cooldown_secs", self.alarms.fall_cooldown_secs)?;
        secs("alarms.unattended_fire_cooldown_secs", self.alarms.unattended_fire_cooldown_secs)?;
        secs("alarms.forgotten_light_cooldown_secs", self.alarms.forgotten_light_cooldown_secs)?;
        secs("alarms.default_cooldown_secs", self.alarms.default_cooldown_secs)?;
        secs("fall.min_duration_secs", self.fall.min_duration_secs)?;
        secs("fire.unattended_secs", self.fire.unattended_secs)?;
        secs("light.forgotten_secs", self.light.forgotten_secs)?;
        secs("light.check_interval_secs", self.light.check_interval_secs)?;

        if !(self.fall.aspect_ratio_threshold > 0.0) {
            return Err(Error::Config(format!(
                "fall.aspect_ratio_threshold must be positive, got {}",
                self.fall.aspect_ratio_threshold
            )));
        }

        if self.light.off_threshold >= self.light.on_threshold {
            return Err(Error::Config(format!(
                "light.off_threshold ({}) must be below light.on_threshold ({})",
                self.light.off_threshold, self.light.on_threshold
            )));
        }

        if self.light.active_hours_start > 24 || self.light.active_hours_end > 24 {
            return Err(Error::Config(format!(
                "light active hours must lie within 0..=24, got {}..{}",
                self.light.active_hours_start, self.light.active_hours_end
            )));
        }

        Ok(())
    }
}

/// Load configuration from a file or use default
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = match config_path {
        Some(path) => {
            let config_str = std::fs::read_to_string(path)
                .context(format!("Failed to read config file: {:?}", path))?;

            if path.extension().map_or(false, |ext| ext == "json") {
                serde_json::from_str(&config_str).context("Failed to parse JSON config")?
            } else if path.extension().map_or(false, |ext| ext == "toml") {
                toml::from_str(&config_str).context("Failed to parse TOML config")?
            } else {
                return Err(anyhow::anyhow!("Unsupported config file format"));
            }
        }
        None => Config::default(),
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.alarms.fall_cooldown_secs, 30.0);
        assert_eq!(config.alarms.unattended_fire_cooldown_secs, 20.0);
        assert_eq!(config.alarms.forgotten_light_cooldown_secs, 10.0);
        assert_eq!(config.fall.aspect_ratio_threshold, 0.8);
        assert_eq!(config.fall.min_duration_secs, 2.0);
        assert_eq!(config.fire.unattended_secs, 10.0);
        assert_eq!(config.light.on_threshold, 110.0);
        assert_eq!(config.light.off_threshold, 90.0);
        assert_eq!((config.light.active_hours_start, config.light.active_hours_end), (0, 24));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() -> Result<()> {
        let config: Config = toml::from_str(
            r#"
            [alarms]
            forgotten_light_cooldown_secs = 0.0

            [light]
            forgotten_secs = 1.0
            active_hours_start = 22
            active_hours_end = 6
            "#,
        )?;

        assert_eq!(config.alarms.forgotten_light_cooldown_secs, 0.0);
        assert_eq!(config.alarms.fall_cooldown_secs, 30.0);
        assert_eq!(config.light.forgotten_secs, 1.0);
        assert_eq!(config.light.on_threshold, 110.0);
        assert_eq!(config.api.port, 5001);
        config.validate()?;
        Ok(())
    }

    #[test]
    fn rejects_inverted_light_thresholds() {
        let mut config = Config::default();
        config.light.off_threshold = 120.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_negative_durations() {
        let mut config = Config::default();
        config.fire.unattended_secs = -1.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        assert!(load_config(Some(Path::new("settings.yaml"))).is_err());
    }

    #[test]
    fn shipped_config_loads() -> Result<()> {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("homewatch.toml");
        let config = load_config(Some(&path))?;
        assert_eq!(config.alarms.unattended_fire_cooldown_secs, 20.0);
        assert_eq!(config.capture.trace_path, PathBuf::from("traces/kitchen.json"));
        Ok(())
    }
}
