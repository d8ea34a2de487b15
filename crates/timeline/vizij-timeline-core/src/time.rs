#![allow(dead_code)]
//! Time model: units, parsing of user supplied durations, and the finite/infinite span.
//!
//! Every node stores its timing in milliseconds (the core unit). Values coming from users
//! are interpreted in the node's display unit unless they carry an explicit `s`/`ms` suffix.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Unit used to interpret bare numbers and to report times back.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "s")]
    Seconds,
    #[default]
    #[serde(rename = "ms")]
    Millis,
}

impl TimeUnit {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Millis => "ms",
        }
    }

    /// Case-insensitive `s` / `ms`.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("s") {
            Some(Self::Seconds)
        } else if s.eq_ignore_ascii_case("ms") {
            Some(Self::Millis)
        } else {
            None
        }
    }

    #[inline]
    pub fn to_ms(self, value: f64) -> f64 {
        convert_time(value, self, TimeUnit::Millis)
    }

    #[inline]
    pub fn from_ms(self, ms: f64) -> f64 {
        convert_time(ms, TimeUnit::Millis, self)
    }
}

/// Convert a raw value between units.
#[inline]
pub fn convert_time(value: f64, from: TimeUnit, to: TimeUnit) -> f64 {
    match (from, to) {
        (TimeUnit::Seconds, TimeUnit::Millis) => value * 1000.0,
        (TimeUnit::Millis, TimeUnit::Seconds) => value * 0.001,
        _ => value,
    }
}

/// Round to three decimals, the precision of every reported time and progress.
#[inline]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// A duration as supplied by a user: a number in the active unit or a string such as
/// `"250ms"`, `"1.5s"`, `"fast"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    Number(f64),
    Text(String),
}

impl From<f64> for TimeValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<u32> for TimeValue {
    fn from(v: u32) -> Self {
        Self::Number(v as f64)
    }
}

impl From<i32> for TimeValue {
    fn from(v: i32) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for TimeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for TimeValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Named duration shortcuts.
pub fn duration_shortcut(name: &str) -> Option<&'static str> {
    match name {
        "fast" => Some("200ms"),
        "slow" => Some("600ms"),
        _ => None,
    }
}

/// Parse a user duration into milliseconds. Anything unparsable or negative yields 0.
pub fn parse_time(value: &TimeValue, unit: TimeUnit) -> f64 {
    let ms = match value {
        TimeValue::Number(n) => unit.to_ms(*n),
        TimeValue::Text(s) => parse_time_str(s, unit),
    };
    // Unbounded lengths come from loops, never from a single time value.
    if ms.is_finite() {
        ms.max(0.0)
    } else {
        0.0
    }
}

/// `[+-]? <digits and dots> (s|ms)?`, whitespace allowed around the number.
pub fn parse_time_str(raw: &str, unit: TimeUnit) -> f64 {
    let s = duration_shortcut(raw).unwrap_or(raw);
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let rest = rest.trim_start();
    let split = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    if split == 0 {
        return 0.0;
    }
    let (number, suffix) = rest.split_at(split);
    let suffix = suffix.trim_start();
    let unit = if suffix.is_empty() {
        unit
    } else {
        match TimeUnit::parse(suffix) {
            Some(u) => u,
            None => return 0.0,
        }
    };
    let Ok(value) = number.parse::<f64>() else {
        return 0.0;
    };
    let ms = unit.to_ms(value);
    if negative {
        0.0
    } else {
        ms
    }
}

/// Total length of an animatable: a finite number of milliseconds or unbounded.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Span {
    Finite(f64),
    Infinite,
}

impl Default for Span {
    fn default() -> Self {
        Span::ZERO
    }
}

impl Span {
    pub const ZERO: Span = Span::Finite(0.0);

    /// Map an IEEE infinity onto the explicit variant.
    #[inline]
    pub fn from_ms(ms: f64) -> Self {
        if ms.is_infinite() {
            Span::Infinite
        } else {
            Span::Finite(ms)
        }
    }

    #[inline]
    pub fn is_infinite(&self) -> bool {
        matches!(self, Span::Infinite)
    }

    #[inline]
    pub fn finite(&self) -> Option<f64> {
        match self {
            Span::Finite(v) => Some(*v),
            Span::Infinite => None,
        }
    }

    /// Milliseconds, with `f64::INFINITY` standing in for the unbounded case.
    #[inline]
    pub fn as_ms(&self) -> f64 {
        match self {
            Span::Finite(v) => *v,
            Span::Infinite => f64::INFINITY,
        }
    }

    #[inline]
    pub fn offset(self, delta: f64) -> Span {
        match self {
            Span::Finite(v) => Span::Finite(v + delta),
            Span::Infinite => Span::Infinite,
        }
    }

    #[inline]
    pub fn add(self, other: Span) -> Span {
        match (self, other) {
            (Span::Finite(a), Span::Finite(b)) => Span::Finite(a + b),
            _ => Span::Infinite,
        }
    }

    #[inline]
    pub fn max(self, other: Span) -> Span {
        match (self, other) {
            (Span::Finite(a), Span::Finite(b)) => Span::Finite(a.max(b)),
            _ => Span::Infinite,
        }
    }

    /// Convert a millisecond span to the display unit, rounded to three decimals.
    #[inline]
    pub fn to_unit(self, unit: TimeUnit) -> Span {
        match self {
            Span::Finite(v) => Span::Finite(round3(unit.from_ms(v))),
            Span::Infinite => Span::Infinite,
        }
    }
}

impl PartialOrd for Span {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Span::Finite(a), Span::Finite(b)) => a.partial_cmp(b),
            (Span::Infinite, Span::Infinite) => Some(Ordering::Equal),
            (Span::Infinite, _) => Some(Ordering::Greater),
            (_, Span::Infinite) => Some(Ordering::Less),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Span::Finite(v) => write!(f, "{v}"),
            Span::Infinite => f.write_str("infinite"),
        }
    }
}
