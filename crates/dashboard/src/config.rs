//! TOML config file loading and validation for the dashboard server and the
//! defaults every new session starts from.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::session::{IrrigationConfig, DURATION_MAX, DURATION_MIN, THRESHOLD_MAX, THRESHOLD_MIN};

/// Longest generated window: one year.
pub const MAX_SERIES_HOURS: u32 = 24 * 365;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web: WebSection,
    pub series: SeriesSection,
    /// Initial irrigation configuration record of every new session.
    pub irrigation: IrrigationConfig,
    pub session: SessionSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SeriesSection {
    /// Length of the generated window.
    pub hours: u32,
    /// Minutes between two samples.
    pub interval_min: u32,
    /// Fixed seed; every session then sees the same series.
    pub seed: Option<u64>,
}

impl Default for SeriesSection {
    fn default() -> Self {
        Self {
            hours: 24,
            interval_min: 10,
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub idle_timeout_min: u32,
    /// Live sessions kept at once; the least recently seen is dropped first.
    pub max_sessions: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            idle_timeout_min: 60,
            max_sessions: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all sections. Returns `Ok(())` or an error describing every
    /// violation found.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.web.port == 0 {
            errors.push("web.port must be non-zero".to_string());
        }

        let s = &self.series;
        if s.hours == 0 {
            errors.push("series.hours must be positive".to_string());
        } else if s.hours > MAX_SERIES_HOURS {
            errors.push(format!(
                "series.hours {} exceeds the maximum of {MAX_SERIES_HOURS}",
                s.hours
            ));
        }
        if s.interval_min == 0 {
            errors.push("series.interval_min must be positive".to_string());
        } else if s.hours > 0 && u64::from(s.hours) * 60 < u64::from(s.interval_min) {
            errors.push(format!(
                "series.interval_min ({}) exceeds the window of {} hour(s); no samples would be generated",
                s.interval_min, s.hours
            ));
        }

        let irr = &self.irrigation;
        if !(THRESHOLD_MIN..=THRESHOLD_MAX).contains(&irr.threshold) {
            errors.push(format!(
                "irrigation.threshold {} out of range [{THRESHOLD_MIN}, {THRESHOLD_MAX}]",
                irr.threshold
            ));
        }
        if !(DURATION_MIN..=DURATION_MAX).contains(&irr.duration_sec) {
            errors.push(format!(
                "irrigation.duration_sec {} out of range [{DURATION_MIN}, {DURATION_MAX}]",
                irr.duration_sec
            ));
        }

        if self.session.idle_timeout_min == 0 {
            errors.push("session.idle_timeout_min must be positive".to_string());
        }
        if self.session.max_sessions == 0 {
            errors.push("session.max_sessions must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

/// Like [`load`], but a missing file yields the built-in defaults.
pub fn load_or_default(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        return load(path);
    }
    tracing::info!(path, "no config file found, using defaults");
    let config = Config::default();
    config.validate()?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Assert validation fails and the error message contains `needle`.
    fn assert_validation_err(cfg: &Config, needle: &str) {
        let err = cfg.validate().unwrap_err();
        let msg = format!("{err:#}");
        assert!(
            msg.contains(needle),
            "expected error containing {needle:?}, got: {msg}"
        );
    }

    // -- Parsing ----------------------------------------------------------

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[web]
port = 9000

[series]
hours = 48
interval_min = 15
seed = 1234

[irrigation]
auto = false
threshold = 55.0
time1 = "06:15"
time2 = "21:45"
duration_sec = 120

[session]
idle_timeout_min = 30
max_sessions = 50
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.web.port, 9000);
        assert_eq!(config.series.hours, 48);
        assert_eq!(config.series.interval_min, 15);
        assert_eq!(config.series.seed, Some(1234));
        assert!(!config.irrigation.auto);
        assert_eq!(config.irrigation.threshold, 55.0);
        assert_eq!(config.irrigation.time1.to_string(), "06:15");
        assert_eq!(config.irrigation.time2.to_string(), "21:45");
        assert_eq!(config.irrigation.duration_sec, 120);
        assert_eq!(config.session.idle_timeout_min, 30);
        assert_eq!(config.session.max_sessions, 50);
        config.validate().unwrap();
    }

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.series.hours, 24);
        assert_eq!(config.series.interval_min, 10);
        assert!(config.series.seed.is_none());
        assert_eq!(config.irrigation, IrrigationConfig::default());
        assert_eq!(config.session.idle_timeout_min, 60);
        config.validate().unwrap();
    }

    #[test]
    fn parse_partial_section_fills_defaults() {
        let config: Config = toml::from_str("[irrigation]\nthreshold = 25.0\n").unwrap();
        assert_eq!(config.irrigation.threshold, 25.0);
        assert_eq!(config.irrigation.time1.to_string(), "07:30");
        assert_eq!(config.irrigation.duration_sec, 30);
    }

    #[test]
    fn parse_bad_time_fails() {
        let err = toml::from_str::<Config>("[irrigation]\ntime1 = \"7 o'clock\"\n").unwrap_err();
        assert!(err.to_string().contains("expected HH:MM"), "got: {err}");
    }

    // -- Validation -------------------------------------------------------

    #[test]
    fn zero_port_rejected() {
        let mut cfg = Config::default();
        cfg.web.port = 0;
        assert_validation_err(&cfg, "web.port must be non-zero");
    }

    #[test]
    fn zero_hours_rejected() {
        let mut cfg = Config::default();
        cfg.series.hours = 0;
        assert_validation_err(&cfg, "series.hours must be positive");
    }

    #[test]
    fn zero_hours_reported_once() {
        let mut cfg = Config::default();
        cfg.series.hours = 0;
        let msg = format!("{:#}", cfg.validate().unwrap_err());
        assert!(msg.contains("(1 error)"), "got: {msg}");
        assert!(!msg.contains("exceeds the window"), "got: {msg}");
    }

    #[test]
    fn hours_above_one_year_rejected() {
        let mut cfg = Config::default();
        cfg.series.hours = MAX_SERIES_HOURS + 1;
        assert_validation_err(&cfg, "series.hours 8761 exceeds the maximum of 8760");
        cfg.series.hours = MAX_SERIES_HOURS;
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_max_sessions_rejected() {
        let mut cfg = Config::default();
        cfg.session.max_sessions = 0;
        assert_validation_err(&cfg, "session.max_sessions must be positive");
    }

    #[test]
    fn zero_interval_rejected() {
        let mut cfg = Config::default();
        cfg.series.interval_min = 0;
        assert_validation_err(&cfg, "series.interval_min must be positive");
    }

    #[test]
    fn interval_longer_than_window_rejected() {
        let mut cfg = Config::default();
        cfg.series.hours = 1;
        cfg.series.interval_min = 90;
        assert_validation_err(&cfg, "exceeds the window of 1 hour(s)");
    }

    #[test]
    fn threshold_bounds() {
        let mut cfg = Config::default();
        cfg.irrigation.threshold = 9.5;
        assert_validation_err(&cfg, "irrigation.threshold 9.5 out of range");
        cfg.irrigation.threshold = 90.5;
        assert_validation_err(&cfg, "irrigation.threshold 90.5 out of range");
        cfg.irrigation.threshold = 10.0;
        cfg.validate().unwrap();
        cfg.irrigation.threshold = 90.0;
        cfg.validate().unwrap();
    }

    #[test]
    fn duration_bounds() {
        let mut cfg = Config::default();
        cfg.irrigation.duration_sec = 4;
        assert_validation_err(&cfg, "irrigation.duration_sec 4 out of range");
        cfg.irrigation.duration_sec = 601;
        assert_validation_err(&cfg, "irrigation.duration_sec 601 out of range");
        cfg.irrigation.duration_sec = 600;
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_idle_timeout_rejected() {
        let mut cfg = Config::default();
        cfg.session.idle_timeout_min = 0;
        assert_validation_err(&cfg, "session.idle_timeout_min must be positive");
    }

    #[test]
    fn multiple_errors_collected() {
        let mut cfg = Config::default();
        cfg.web.port = 0;
        cfg.series.hours = 0;
        cfg.irrigation.threshold = 1.0;
        let msg = format!("{:#}", cfg.validate().unwrap_err());
        assert!(msg.contains("3 errors"), "got: {msg}");
        assert!(msg.contains("web.port"), "missing port error in: {msg}");
        assert!(msg.contains("series.hours"), "missing hours error in: {msg}");
        assert!(msg.contains("irrigation.threshold"), "missing threshold error in: {msg}");
    }

    // -- Loading ----------------------------------------------------------

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_or_default("/nonexistent/garden-dashboard.toml").unwrap();
        assert_eq!(cfg.web.port, 8080);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load("/nonexistent/garden-dashboard.toml").unwrap_err();
        assert!(format!("{err:#}").contains("failed to read config"));
    }

    #[test]
    fn load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!("garden-dashboard-{}.toml", std::process::id()));
        std::fs::write(&path, "[series]\ninterval_min = 0\n").unwrap();
        let err = load(path.to_str().unwrap()).unwrap_err();
        std::fs::remove_file(&path).ok();
        let msg = format!("{err:#}");
        assert!(msg.contains("invalid config"), "got: {msg}");
        assert!(msg.contains("series.interval_min must be positive"), "got: {msg}");
    }
}
