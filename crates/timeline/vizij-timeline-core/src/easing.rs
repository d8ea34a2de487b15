#![allow(dead_code)]
//! Easing curves:
//! - named easings resolved to cubic-bezier control points
//! - bezier evaluation (x inverted by binary search)
//! - reversal and rebasing of a curve for mid-segment resumption

use serde::{Deserialize, Serialize};

/// Easing as declared by the user: a registered name or explicit control points (x1, y1, x2, y2).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Easing {
    Bezier([f64; 4]),
    Named(String),
}

impl From<&str> for Easing {
    fn from(v: &str) -> Self {
        Self::Named(v.to_string())
    }
}

impl From<String> for Easing {
    fn from(v: String) -> Self {
        Self::Named(v)
    }
}

impl From<[f64; 4]> for Easing {
    fn from(v: [f64; 4]) -> Self {
        Self::Bezier(v)
    }
}

impl Easing {
    /// Control points, or None when the name is not registered.
    pub fn control_points(&self) -> Option<[f64; 4]> {
        match self {
            Easing::Bezier(c) => Some(*c),
            Easing::Named(n) => named_easing(n),
        }
    }
}

pub fn named_easing(name: &str) -> Option<[f64; 4]> {
    let c = match name {
        "linear" => [0.25, 0.25, 0.75, 0.75],
        "ease" => [0.25, 0.1, 0.25, 1.0],
        "ease-in" | "in" => [0.42, 0.0, 1.0, 1.0],
        "ease-out" | "out" => [0.0, 0.0, 0.58, 1.0],
        "ease-in-out" | "in-out" => [0.42, 0.0, 0.58, 1.0],
        "snap" => [0.0, 1.0, 0.5, 1.0],
        "easeInCubic" => [0.550, 0.055, 0.675, 0.190],
        "easeOutCubic" => [0.215, 0.61, 0.355, 1.0],
        "easeInOutCubic" => [0.645, 0.045, 0.355, 1.0],
        "easeInCirc" => [0.6, 0.04, 0.98, 0.335],
        "easeOutCirc" => [0.075, 0.82, 0.165, 1.0],
        "easeInOutCirc" => [0.785, 0.135, 0.15, 0.86],
        "easeInExpo" => [0.95, 0.05, 0.795, 0.035],
        "easeOutExpo" => [0.19, 1.0, 0.22, 1.0],
        "easeInOutExpo" => [1.0, 0.0, 0.0, 1.0],
        "easeInQuad" => [0.55, 0.085, 0.68, 0.53],
        "easeOutQuad" => [0.25, 0.46, 0.45, 0.94],
        "easeInOutQuad" => [0.455, 0.03, 0.515, 0.955],
        "easeInQuart" => [0.895, 0.03, 0.685, 0.22],
        "easeOutQuart" => [0.165, 0.84, 0.44, 1.0],
        "easeInOutQuart" => [0.77, 0.0, 0.175, 1.0],
        "easeInQuint" => [0.755, 0.05, 0.855, 0.06],
        "easeOutQuint" => [0.23, 1.0, 0.32, 1.0],
        "easeInOutQuint" => [0.86, 0.0, 0.07, 1.0],
        "easeInSine" => [0.47, 0.0, 0.745, 0.715],
        "easeOutSine" => [0.39, 0.575, 0.565, 1.0],
        "easeInOutSine" => [0.445, 0.05, 0.55, 0.95],
        "easeInBack" => [0.6, -0.28, 0.735, 0.045],
        "easeOutBack" => [0.175, 0.885, 0.32, 1.275],
        "easeInOutBack" => [0.68, -0.55, 0.265, 1.55],
        _ => return None,
    };
    Some(c)
}

#[inline]
fn cubic_bezier(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Eased progress for input progress `t` in [0,1].
pub fn ease(ctrl: [f64; 4], t: f64) -> f64 {
    let [x1, y1, x2, y2] = ctrl;
    let t = t.clamp(0.0, 1.0);
    if x1 == y1 && x2 == y2 {
        return t;
    }
    // x is monotonic for x1/x2 in [0,1]
    let mut lo = 0.0f64;
    let mut hi = 1.0f64;
    let mut mid = t;
    for _ in 0..48 {
        let x = cubic_bezier(0.0, x1, x2, 1.0, mid);
        if (x - t).abs() < 1e-9 {
            break;
        }
        if x < t {
            lo = mid;
        } else {
            hi = mid;
        }
        mid = 0.5 * (lo + hi);
    }
    cubic_bezier(0.0, y1, y2, 1.0, mid)
}

/// The same curve traversed from the end towards the start.
#[inline]
pub fn reverse_bezier(ctrl: [f64; 4]) -> [f64; 4] {
    [1.0 - ctrl[2], 1.0 - ctrl[3], 1.0 - ctrl[0], 1.0 - ctrl[1]]
}

/// Fit a new curve to the remaining part of `ctrl` after `time` (0..1) has elapsed.
///
/// The tail is sampled at 1/3 and 2/3 and the two inner control points are solved so the
/// new curve passes through them, normalized to the unit square.
pub fn rebase_bezier(ctrl: [f64; 4], time: f64) -> [f64; 4] {
    if time <= 0.0 || time >= 1.0 {
        return ctrl;
    }
    let x_interval = 1.0 - time;
    let start_y = ease(ctrl, time);
    let sign = if start_y > 1.0 { -1.0 } else { 1.0 };
    let y_interval = (1.0 - start_y) * sign;
    if y_interval == 0.0 {
        return ctrl;
    }

    let (u, v) = (0.33, 0.67);
    let uu = u * x_interval + time;
    let vv = v * x_interval + time;
    let p1 = (u, (ease(ctrl, uu) - start_y) * sign / y_interval);
    let p2 = (v, (ease(ctrl, vv) - start_y) * sign / y_interval);

    let comp_u = 1.0 - u;
    let comp_v = 1.0 - v;
    let a = 3.0 * comp_u * comp_u * u;
    let b = 3.0 * comp_u * u * u;
    let c = 3.0 * comp_v * comp_v * v;
    let d = 3.0 * comp_v * v * v;
    let det = a * d - b * c;
    if det == 0.0 {
        log::debug!("bezier rebase degenerate at t={time}");
        return ctrl;
    }

    // p0 = (0,0), p3 = (1,1)
    let u3 = u * u * u;
    let v3 = v * v * v;
    let q1 = (p1.0 - u3, p1.1 - u3);
    let q2 = (p2.0 - v3, p2.1 - v3);
    [
        (d * q1.0 - b * q2.0) / det,
        (d * q1.1 - b * q2.1) / det,
        (-c * q1.0 + a * q2.0) / det,
        (-c * q1.1 + a * q2.1) / det,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    #[test]
    fn linear_is_identity() {
        let c = named_easing("linear").unwrap();
        approx(ease(c, 0.3), 0.3, 1e-9);
        approx(ease(c, 0.0), 0.0, 1e-9);
        approx(ease(c, 1.0), 1.0, 1e-9);
    }

    #[test]
    fn ease_out_front_loads_progress() {
        let c = named_easing("easeOutQuad").unwrap();
        assert!(ease(c, 0.5) > 0.5);
        approx(ease(c, 1.0), 1.0, 1e-6);
    }

    #[test]
    fn reverse_of_reverse_is_identity() {
        let c = named_easing("ease").unwrap();
        assert_eq!(reverse_bezier(reverse_bezier(c)), c);
    }

    #[test]
    fn rebase_keeps_ends_and_follows_tail() {
        let c = named_easing("ease-in").unwrap();
        assert_eq!(rebase_bezier(c, 0.0), c);
        let r = rebase_bezier(c, 0.5);
        approx(r[0], 1.0 / 3.0, 1e-9);
        approx(r[2], 2.0 / 3.0, 1e-9);
        let start = ease(c, 0.5);
        let expected = (ease(c, 0.5 + 0.33 * 0.5) - start) / (1.0 - start);
        approx(ease(r, 0.33), expected, 1e-3);
    }

    #[test]
    fn named_and_unknown() {
        assert!(Easing::from("snap").control_points().is_some());
        assert!(Easing::from("wobble").control_points().is_none());
        assert_eq!(
            Easing::from([0.1, 0.2, 0.3, 0.4]).control_points(),
            Some([0.1, 0.2, 0.3, 0.4])
        );
    }
}
