//! INI configuration file for the tracker and CLI.
//!
//! ```ini
//! [tracking]
//! min_distance_m = 10
//! min_interval_ms = 1000
//! ; a number of meters, or high / medium / low
//! desired_accuracy = medium
//! timeout_ms = 30000
//!
//! [tracker]
//! history_size = 16
//! platform_error_retries = 2
//! activation_timeout_ms = 30000
//! ```
//!
//! Missing keys keep their defaults; a missing file yields the defaults.

use std::path::Path;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::settings::TrackerSettings;
use super::tracking::{AccuracyPreset, ConfigError, TrackingConfig};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// File could not be read or is not valid INI
    #[error("Failed to read config file: {0}")]
    Read(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    Write(#[from] std::io::Error),

    /// A key holds a value that cannot be parsed
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Values parsed but do not form a valid configuration
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ConfigError),
}

/// Contents of a tracker configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub tracking: TrackingConfig,
    pub tracker: TrackerSettings,
}

impl ConfigFile {
    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        Self::parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn parse_str(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content)
            .map_err(|e| ConfigFileError::Read(ini::Error::Parse(e)))?;
        Self::parse_ini(&ini)
    }

    /// Overlay the values found in `ini` onto the defaults and validate.
    pub fn parse_ini(ini: &Ini) -> Result<Self, ConfigFileError> {
        let mut config = Self::default();

        // [tracking] section
        if let Some(section) = ini.section(Some("tracking")) {
            if let Some(v) = section.get("min_distance_m") {
                config.tracking.min_distance_m = parse_value("tracking", "min_distance_m", v)?;
            }
            if let Some(v) = section.get("min_interval_ms") {
                let ms: u64 = parse_value("tracking", "min_interval_ms", v)?;
                config.tracking.min_interval = Duration::from_millis(ms);
            }
            if let Some(v) = section.get("desired_accuracy") {
                config.tracking.desired_accuracy_m = parse_accuracy(v)?;
            }
            if let Some(v) = section.get("timeout_ms") {
                let v = v.trim();
                if !v.is_empty() {
                    let ms: u64 = parse_value("tracking", "timeout_ms", v)?;
                    config.tracking.timeout = Some(Duration::from_millis(ms));
                }
            }
        }

        // [tracker] section
        if let Some(section) = ini.section(Some("tracker")) {
            if let Some(v) = section.get("history_size") {
                config.tracker.history_size = parse_value("tracker", "history_size", v)?;
            }
            if let Some(v) = section.get("platform_error_retries") {
                config.tracker.platform_error_retries =
                    parse_value("tracker", "platform_error_retries", v)?;
            }
            if let Some(v) = section.get("activation_timeout_ms") {
                let ms: u64 = parse_value("tracker", "activation_timeout_ms", v)?;
                config.tracker.activation_timeout = Duration::from_millis(ms);
            }
        }

        config.tracking.validate()?;
        config.tracker.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    /// Render as a commented INI document that [`parse_str`](Self::parse_str) reads back.
    pub fn to_config_string(&self) -> String {
        let tracking = &self.tracking;
        let tracker = &self.tracker;
        let timeout = tracking
            .timeout
            .map(|t| t.as_millis().to_string())
            .unwrap_or_default();

        format!(
            r#"[tracking]
; Minimum movement in meters between reported fixes (0 = report on interval only)
min_distance_m = {}
; Minimum time in milliseconds between reported fixes
min_interval_ms = {}
; Reject fixes less precise than this: meters, or high / medium / low
desired_accuracy = {}
; Fail the session after this many milliseconds without a fix (empty = never)
timeout_ms = {}

[tracker]
; Number of accepted fixes kept in memory
history_size = {}
; Consecutive platform errors tolerated before the session fails
platform_error_retries = {}
; Maximum time in milliseconds to wait for the location source to start
activation_timeout_ms = {}
"#,
            tracking.min_distance_m,
            tracking.min_interval.as_millis(),
            tracking.desired_accuracy_m,
            timeout,
            tracker.history_size,
            tracker.platform_error_retries,
            tracker.activation_timeout.as_millis(),
        )
    }
}

fn parse_value<T: std::str::FromStr>(
    section: &str,
    key: &str,
    value: &str,
) -> Result<T, ConfigFileError> {
    value.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: format!("expected a {}", std::any::type_name::<T>()),
    })
}

/// Accept either a preset name or a number of meters.
fn parse_accuracy(value: &str) -> Result<f64, ConfigFileError> {
    if let Ok(preset) = value.parse::<AccuracyPreset>() {
        return Ok(preset.meters());
    }
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigFileError::InvalidValue {
            section: "tracking".to_string(),
            key: "desired_accuracy".to_string(),
            value: value.to_string(),
            reason: "must be a number of meters or one of: high, medium, low".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_returns_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_parse_full_file() {
        let config = ConfigFile::parse_str(
            r#"
[tracking]
min_distance_m = 10
min_interval_ms = 500
desired_accuracy = medium
timeout_ms = 30000

[tracker]
history_size = 8
platform_error_retries = 2
activation_timeout_ms = 5000
"#,
        )
        .unwrap();

        assert_eq!(config.tracking.min_distance_m, 10.0);
        assert_eq!(config.tracking.min_interval, Duration::from_millis(500));
        assert_eq!(config.tracking.desired_accuracy_m, 50.0);
        assert_eq!(config.tracking.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.tracker.history_size, 8);
        assert_eq!(config.tracker.platform_error_retries, 2);
        assert_eq!(config.tracker.activation_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_numeric_accuracy() {
        let config = ConfigFile::parse_str("[tracking]\ndesired_accuracy = 35.5\n").unwrap();
        assert_eq!(config.tracking.desired_accuracy_m, 35.5);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ConfigFile::parse_str("[tracking]\nmin_distance_m = 25\n").unwrap();
        assert_eq!(config.tracking.min_distance_m, 25.0);
        assert_eq!(config.tracking.min_interval, Duration::from_millis(1000));
        assert_eq!(config.tracker, TrackerSettings::default());
    }

    #[test]
    fn test_invalid_number_reports_key() {
        let err = ConfigFile::parse_str("[tracker]\nhistory_size = lots\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue {
                section, key, value, ..
            } => {
                assert_eq!(section, "tracker");
                assert_eq!(key, "history_size");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_accuracy_name() {
        let err = ConfigFile::parse_str("[tracking]\ndesired_accuracy = best\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { key, .. } if key == "desired_accuracy"));
    }

    #[test]
    fn test_semantic_validation_runs() {
        let err = ConfigFile::parse_str("[tracking]\nmin_distance_m = -3\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::Invalid(ConfigError::InvalidMinDistance(_))
        ));

        let err = ConfigFile::parse_str("[tracker]\nhistory_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::Invalid(ConfigError::EmptyHistory)));

        let ini = format!("[tracker]\nhistory_size = {}\n", usize::MAX);
        let err = ConfigFile::parse_str(&ini).unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::Invalid(ConfigError::HistoryTooLarge { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("gpstracker.ini");

        let mut config = ConfigFile::default();
        config.tracking = config
            .tracking
            .with_min_distance(12.5)
            .with_timeout(Duration::from_secs(45));
        config.tracker = config.tracker.with_history_size(4);

        config.save_to(&path).unwrap();
        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_written_file_is_commented() {
        let content = ConfigFile::default().to_config_string();
        assert!(content.contains("[tracking]"));
        assert!(content.contains("[tracker]"));
        assert!(content.contains("; Minimum movement"));
        assert!(content.contains("timeout_ms = \n"));
    }
}
