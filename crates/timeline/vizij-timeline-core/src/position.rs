//! Start positions of timeline children.
//!
//! Grammar (case-insensitive): `label? (op '=')? value?` where op is `+`, `++`, `-` or `--`.
//! A single op is relative to the timeline duration so far, a doubled op to the end of the
//! previously merged child. A label, when known, replaces either base.

use crate::error::{Result, TimelineError};
use crate::time::{parse_time_str, Span, TimeUnit};
use serde::{Deserialize, Serialize};

/// Where a child starts inside its timeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    /// After everything added so far.
    #[default]
    Append,
    /// Absolute offset in the timeline's time unit.
    At(f64),
    /// Relative expression such as `"intro+=0.5"` or `"--=200ms"`.
    Expr(String),
}

impl From<f64> for Position {
    fn from(v: f64) -> Self {
        Self::At(v)
    }
}

impl From<i32> for Position {
    fn from(v: i32) -> Self {
        Self::At(v as f64)
    }
}

impl From<&str> for Position {
    fn from(v: &str) -> Self {
        Self::Expr(v.to_string())
    }
}

impl From<String> for Position {
    fn from(v: String) -> Self {
        Self::Expr(v)
    }
}

impl<T: Into<Position>> From<Option<T>> for Position {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// `+=`
    Add,
    /// `-=`
    Sub,
    /// `++=`
    AddCursor,
    /// `--=`
    SubCursor,
}

impl Op {
    #[inline]
    fn sign(self) -> f64 {
        match self {
            Op::Add | Op::AddCursor => 1.0,
            Op::Sub | Op::SubCursor => -1.0,
        }
    }

    #[inline]
    fn from_cursor(self) -> bool {
        matches!(self, Op::AddCursor | Op::SubCursor)
    }
}

/// A position string split into its three optional parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionExpr {
    pub label: Option<String>,
    pub op: Option<Op>,
    pub value: Option<String>,
}

#[inline]
fn is_op_char(c: char) -> bool {
    c == '+' || c == '-' || c == '='
}

/// Split a position expression, or None when it does not follow the grammar.
pub fn parse_position(s: &str) -> Option<PositionExpr> {
    let mut rest = s;

    let label = match rest.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => {
            let end = rest.find(is_op_char).unwrap_or(rest.len());
            let (label, tail) = rest.split_at(end);
            rest = tail;
            Some(label.to_string())
        }
        _ => None,
    };

    let op = match rest.chars().next() {
        Some(c @ ('+' | '-')) => {
            let run = rest.chars().take_while(|&x| x == c).count();
            if run > 2 || !rest[run..].starts_with('=') {
                return None;
            }
            rest = &rest[run + 1..];
            Some(match (c, run) {
                ('+', 1) => Op::Add,
                ('+', _) => Op::AddCursor,
                ('-', 1) => Op::Sub,
                _ => Op::SubCursor,
            })
        }
        Some('=') => return None,
        _ => None,
    };

    let value = if rest.is_empty() {
        None
    } else if rest.contains(is_op_char) {
        return None;
    } else {
        Some(rest.to_string())
    };

    Some(PositionExpr { label, op, value })
}

/// Label names start with a lowercase letter and never contain `+`, `-` or `=`.
pub fn validate_label(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && !chars.any(is_op_char);
    if valid {
        Ok(())
    } else {
        Err(TimelineError::InvalidLabel {
            label: name.to_string(),
        })
    }
}

impl Position {
    /// Resolve to an absolute start in milliseconds.
    ///
    /// `duration` is the timeline length merged so far, `cursor` the end of the previous child,
    /// `label` looks up the position of an already merged label.
    pub fn resolve(
        &self,
        duration: Span,
        cursor: Span,
        unit: TimeUnit,
        label: impl Fn(&str) -> Option<Span>,
    ) -> Span {
        let (start, offset) = match self {
            Position::Append => return duration,
            Position::At(v) => {
                let ms = if v.is_nan() { 0.0 } else { unit.to_ms(*v).max(0.0) };
                (Span::ZERO, ms)
            }
            Position::Expr(s) => {
                let Some(expr) = parse_position(s) else {
                    return duration;
                };
                let value = expr
                    .value
                    .as_deref()
                    .map(|v| parse_time_str(v, unit))
                    .unwrap_or(0.0);
                match (expr.label.as_deref().and_then(&label), expr.op) {
                    // bare label: exactly at the label
                    (Some(at), None) => (at, 0.0),
                    (Some(at), Some(op)) => (at, value * op.sign()),
                    (None, Some(op)) => {
                        let base = if op.from_cursor() { cursor } else { duration };
                        (base, value * op.sign())
                    }
                    (None, None) => (Span::ZERO, value),
                }
            }
        };
        match start {
            Span::Infinite => Span::Infinite,
            Span::Finite(s) => Span::Finite((s + offset).max(0.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(label: Option<&str>, op: Option<Op>, value: Option<&str>) -> PositionExpr {
        PositionExpr {
            label: label.map(str::to_string),
            op,
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn parses_all_shapes() {
        assert_eq!(parse_position("mark"), Some(expr(Some("mark"), None, None)));
        assert_eq!(
            parse_position("mark+=0.5"),
            Some(expr(Some("mark"), Some(Op::Add), Some("0.5")))
        );
        assert_eq!(
            parse_position("--=200ms"),
            Some(expr(None, Some(Op::SubCursor), Some("200ms")))
        );
        assert_eq!(parse_position("1.5s"), Some(expr(None, None, Some("1.5s"))));
        assert_eq!(parse_position("Intro-="), Some(expr(Some("Intro"), Some(Op::Sub), None)));
        assert_eq!(parse_position(""), Some(expr(None, None, None)));
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(parse_position("+++=1"), None);
        assert_eq!(parse_position("+-=1"), None);
        assert_eq!(parse_position("a=1"), None);
        assert_eq!(parse_position("+1"), None);
        assert_eq!(parse_position("+=1+2"), None);
    }

    #[test]
    fn label_validation() {
        assert!(validate_label("intro").is_ok());
        assert!(validate_label("scene 2").is_ok());
        assert!(validate_label("Intro").is_err());
        assert!(validate_label("2nd").is_err());
        assert!(validate_label("a-b").is_err());
        assert!(validate_label("").is_err());
    }

    #[test]
    fn resolve_rules() {
        let labels = |name: &str| (name == "mark").then_some(Span::Finite(2000.0));
        let dur = Span::Finite(3000.0);
        let cur = Span::Finite(1000.0);
        let r = |p: Position| p.resolve(dur, cur, TimeUnit::Seconds, labels);

        assert_eq!(r(Position::Append), dur);
        assert_eq!(r(Position::At(0.25)), Span::Finite(250.0));
        assert_eq!(r("mark+=0.5".into()), Span::Finite(2500.0));
        assert_eq!(r("mark".into()), Span::Finite(2000.0));
        assert_eq!(r("mark-=3".into()), Span::ZERO);
        assert_eq!(r("+=0.3".into()), Span::Finite(3300.0));
        assert_eq!(r("++=0.3".into()), Span::Finite(1300.0));
        assert_eq!(r("--=200ms".into()), Span::Finite(800.0));
        assert_eq!(r("missing+=1".into()), Span::Finite(4000.0));
        assert_eq!(r("missing".into()), Span::ZERO);
        assert_eq!(r("1.5".into()), Span::Finite(1500.0));
        assert_eq!(r("+-=1".into()), dur);
    }

    #[test]
    fn infinite_base_stays_infinite() {
        let p = Position::from("+=1");
        assert!(p
            .resolve(Span::Infinite, Span::Infinite, TimeUnit::Millis, |_| None)
            .is_infinite());
        let at = Position::from(5.0);
        assert_eq!(
            at.resolve(Span::Infinite, Span::Infinite, TimeUnit::Millis, |_| None),
            Span::Finite(5.0)
        );
    }
}
