#![allow(dead_code)]
//! Engine wide defaults.

use crate::error::{Result, TimelineError};
use crate::time::{parse_time, TimeUnit, TimeValue};
use serde::{Deserialize, Serialize};

/// Defaults applied to every node created by an [`crate::Engine`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Unit for bare numbers passed in and for times reported back.
    pub time_unit: TimeUnit,

    /// Duration given to new tweens.
    pub default_duration: TimeValue,

    /// Easing used when a tween does not declare one, and the fallback for unknown names.
    pub default_easing: String,

    /// Backend used by `Engine::animate` and timeline shortcuts.
    pub default_driver: String,

    /// Sleep between ticks in `Engine::run`.
    pub frame_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_unit: TimeUnit::Millis,
            default_duration: TimeValue::Text("400ms".into()),
            default_easing: "easeOutQuad".into(),
            default_driver: "null".into(),
            frame_interval_ms: 16,
        }
    }
}

impl Config {
    /// Default duration resolved to milliseconds.
    pub fn default_duration_ms(&self) -> f64 {
        parse_time(&self.default_duration, self.time_unit)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_interval_ms == 0 {
            return Err(TimelineError::InvalidConfig {
                reason: "frame_interval_ms must be positive".into(),
            });
        }
        if self.default_driver.trim().is_empty() {
            return Err(TimelineError::InvalidConfig {
                reason: "default_driver is empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.default_duration_ms(), 400.0);
        assert_eq!(cfg.default_easing, "easeOutQuad");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"time_unit":"s","default_duration":0.5}"#)
            .unwrap();
        assert_eq!(cfg.time_unit, TimeUnit::Seconds);
        assert_eq!(cfg.default_duration_ms(), 500.0);
        assert_eq!(cfg.frame_interval_ms, 16);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let cfg = Config {
            frame_interval_ms: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
