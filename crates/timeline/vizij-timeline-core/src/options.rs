//! Bulk options accepted by tweens and timelines, with their alias names.

use crate::driver::Target;
use crate::easing::Easing;
use crate::error::{Result, TimelineError};
use crate::property::PropertyBlock;
use crate::time::TimeValue;
use serde::{Deserialize, Serialize};

/// Speed as a number or a named shortcut (`half`, `double`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpeedValue {
    Number(f64),
    Text(String),
}

impl From<f64> for SpeedValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for SpeedValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Invalid or non-positive speeds become 1.
pub fn parse_speed(value: &SpeedValue) -> f64 {
    let v = match value {
        SpeedValue::Number(n) => *n,
        SpeedValue::Text(s) => match s.as_str() {
            "half" => 0.5,
            "double" => 2.0,
            other => leading_float(other).unwrap_or(f64::NAN),
        },
    };
    if v.is_finite() && v > 0.0 {
        v
    } else {
        1.0
    }
}

/// Longest numeric prefix, e.g. `"1.5x"` -> 1.5.
fn leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E')))
        .unwrap_or(s.len());
    let candidate = &s[..end];
    (1..=candidate.len())
        .rev()
        .find_map(|i| candidate[..i].parse::<f64>().ok())
}

/// Loop count from a raw number: NaN is 0, infinities and negatives are -1 (forever).
pub fn parse_loops(value: f64) -> i32 {
    if value.is_nan() {
        0
    } else if value.is_infinite() || value < 0.0 {
        -1
    } else {
        value.trunc().min(i32::MAX as f64) as i32
    }
}

/// Options object. Timelines ignore the tween-only fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimOptions {
    #[serde(alias = "sleep", skip_serializing_if = "Option::is_none")]
    pub delay: Option<TimeValue>,
    #[serde(alias = "repeat", skip_serializing_if = "Option::is_none")]
    pub loops: Option<f64>,
    #[serde(alias = "repeatDelay", skip_serializing_if = "Option::is_none")]
    pub loops_delay: Option<TimeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yoyo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(alias = "timeScale", skip_serializing_if = "Option::is_none")]
    pub speed: Option<SpeedValue>,

    #[serde(alias = "ease", skip_serializing_if = "Option::is_none")]
    pub easing: Option<Easing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimeValue>,
    /// Inverse of auto-start for `Engine::animate`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<PropertyBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<PropertyBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub then: Option<PropertyBlock>,
}

impl AnimOptions {
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let Some(obj) = value.as_object() else {
            return Err(TimelineError::InvalidOptions {
                reason: "expected an object".into(),
            });
        };
        for key in ["to", "from", "then"] {
            if let Some(block) = obj.get(key) {
                PropertyBlock::from_json(block)?;
            }
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Whether any tween-only field is set.
    pub fn has_tween_fields(&self) -> bool {
        self.easing.is_some()
            || self.duration.is_some()
            || self.paused.is_some()
            || self.to.is_some()
            || self.from.is_some()
            || self.then.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyValue;
    use serde_json::json;

    #[test]
    fn speed_shortcuts_and_fallbacks() {
        assert_eq!(parse_speed(&"half".into()), 0.5);
        assert_eq!(parse_speed(&"double".into()), 2.0);
        assert_eq!(parse_speed(&"1.5x".into()), 1.5);
        assert_eq!(parse_speed(&"fast".into()), 1.0);
        assert_eq!(parse_speed(&0.0.into()), 1.0);
        assert_eq!(parse_speed(&(-2.0).into()), 1.0);
        assert_eq!(parse_speed(&"inf".into()), 1.0);
        assert_eq!(parse_speed(&3.0.into()), 3.0);
    }

    #[test]
    fn loops_coercion() {
        assert_eq!(parse_loops(2.7), 2);
        assert_eq!(parse_loops(f64::INFINITY), -1);
        assert_eq!(parse_loops(-5.0), -1);
        assert_eq!(parse_loops(f64::NAN), 0);
    }

    #[test]
    fn aliases_are_accepted() {
        let opts = AnimOptions::from_json(&json!({
            "sleep": "1s",
            "repeat": 2,
            "repeatDelay": 500,
            "timeScale": "double",
            "ease": "easeInQuad",
            "to": {"left": "100"},
            "paused": true
        }))
        .unwrap();
        assert_eq!(opts.delay, Some(TimeValue::Text("1s".into())));
        assert_eq!(opts.loops, Some(2.0));
        assert_eq!(opts.loops_delay, Some(TimeValue::Number(500.0)));
        assert_eq!(opts.speed, Some(SpeedValue::Text("double".into())));
        assert_eq!(opts.easing, Some(Easing::Named("easeInQuad".into())));
        assert_eq!(opts.paused, Some(true));
        let to = opts.to.unwrap();
        assert_eq!(to.get("left").unwrap().value, PropertyValue::Text("100".into()));
    }

    #[test]
    fn canonical_names_and_errors() {
        let opts = AnimOptions::from_json(&json!({"loopsDelay": "fast", "yoyo": true})).unwrap();
        assert_eq!(opts.loops_delay, Some(TimeValue::Text("fast".into())));
        assert!(!opts.has_tween_fields());

        let err = AnimOptions::from_json(&json!({"to": 5})).unwrap_err();
        assert!(matches!(err, TimelineError::InvalidPropertyBlock { .. }));
        let err = AnimOptions::from_json(&json!([1])).unwrap_err();
        assert!(matches!(err, TimelineError::InvalidOptions { .. }));
    }
}
