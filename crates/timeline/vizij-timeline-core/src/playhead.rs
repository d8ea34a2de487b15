#![allow(dead_code)]
//! Playhead state shared by every animatable, plus the pure time math on top of it.

use crate::ids::NodeId;
use crate::time::Span;
use serde::{Deserialize, Serialize};

/// Virtual playhead of one node. Positions are milliseconds in the node's own time.
#[derive(Clone, Debug)]
pub(crate) struct Playhead {
    pub position: f64,
    pub paused: bool,
    /// Set on the first real start, after any initial delay.
    pub running: bool,
    /// Direction requested through play/reverse.
    pub fwd: bool,
    /// Direction of the current segment; flips on yoyo iterations.
    pub local_fwd: bool,
    pub play_allowed: bool,
    pub reverse_allowed: bool,
    pub start_time: f64,
    pub pause_time: f64,
    pub loops_count: i32,
    /// Reported position while end/reverse handlers run.
    pub time_override: Option<f64>,
    /// Filler currently emulating a delay or loops delay.
    pub delay_dummy: Option<NodeId>,
    /// Absolute start in root time, assigned while merging.
    pub offset: f64,
}

impl Default for Playhead {
    fn default() -> Self {
        Self {
            position: 0.0,
            paused: true,
            running: false,
            fwd: true,
            local_fwd: true,
            play_allowed: true,
            reverse_allowed: false,
            start_time: 0.0,
            pause_time: 0.0,
            loops_count: 0,
            time_override: None,
            delay_dummy: None,
            offset: 0.0,
        }
    }
}

impl Playhead {
    #[inline]
    pub fn sign(&self) -> f64 {
        if self.local_fwd {
            1.0
        } else {
            -1.0
        }
    }

    /// Fold the time elapsed since `start_time` into `position`.
    #[inline]
    pub fn fold_elapsed(&mut self, now: f64, speed: f64) {
        self.pause_time = now;
        self.position += (now - self.start_time) * speed * self.sign();
    }

    pub fn virtual_position(&self, now: f64, speed: f64) -> f64 {
        if let Some(t) = self.time_override {
            return t;
        }
        if self.paused {
            return self.position;
        }
        (self.position + (now - self.start_time) * speed * self.sign()).max(0.0)
    }

    /// Whether the requested direction is currently permitted.
    #[inline]
    pub fn direction_allowed(&self) -> bool {
        (self.fwd && self.play_allowed) || (!self.fwd && self.reverse_allowed)
    }

    /// Park at the end reached by the current segment.
    pub fn reset_position(&mut self, duration: f64) {
        self.paused = true;
        self.position = if self.local_fwd { duration } else { 0.0 };
        self.start_time = 0.0;
        self.pause_time = 0.0;
    }

    /// Length of the segment left in the local direction.
    #[inline]
    pub fn remaining(&self, duration: f64) -> f64 {
        if self.local_fwd {
            duration - self.position
        } else {
            self.position
        }
    }

    /// At the edge a segment starts from: 0 going forward, `duration` going backward.
    #[inline]
    pub fn at_segment_start(&self, duration: f64) -> bool {
        (self.position == 0.0 && self.local_fwd) || (self.position == duration && !self.local_fwd)
    }

    pub fn state(&self) -> PlaybackState {
        if self.delay_dummy.is_some() && !self.paused {
            PlaybackState::Delayed
        } else if !self.paused {
            PlaybackState::Playing
        } else if !self.running && self.delay_dummy.is_none() {
            PlaybackState::Idle
        } else if self.fwd && !self.play_allowed {
            PlaybackState::Ended
        } else if !self.fwd && !self.reverse_allowed {
            PlaybackState::Rewound
        } else {
            PlaybackState::Paused
        }
    }
}

/// `(d + (ld + d) * loops) / speed`, unbounded for endless loops of non-zero length.
pub fn total_duration(duration: Span, loops: i32, loops_delay: f64, speed: f64) -> Span {
    let Span::Finite(d) = duration else {
        return Span::Infinite;
    };
    if loops == -1 && (d > 0.0 || loops_delay > 0.0) {
        return Span::Infinite;
    }
    Span::Finite((d + (loops_delay + d) * loops as f64) / speed)
}

/// Coarse playback state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Never started
    Idle,
    /// Waiting on a delay or loops delay
    Delayed,
    Playing,
    Paused,
    /// Completed forward
    Ended,
    /// Completed backward
    Rewound,
}

impl PlaybackState {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Delayed => "delayed",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Ended => "ended",
            Self::Rewound => "rewound",
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing | Self::Delayed)
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Ended | Self::Rewound)
    }
}
