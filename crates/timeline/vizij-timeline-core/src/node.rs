//! Arena node: the animatable base shared by tweens, timelines and fillers.

use crate::events::EventRegistry;
use crate::ids::NodeId;
use crate::playhead::{total_duration, Playhead};
use crate::time::Span;
use crate::timeline::TimelineBody;
use crate::tween::TweenBody;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a node in the arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Tween,
    Timeline,
    /// Zero-effect filler emulating delays and keyframe gaps.
    Dummy,
}

impl NodeKind {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tween => "tween",
            Self::Timeline => "timeline",
            Self::Dummy => "dummy",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) enum Body {
    Tween(Box<TweenBody>),
    Timeline(Box<TimelineBody>),
    Dummy,
}

/// Timing is stored in milliseconds.
pub(crate) struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub duration: Span,
    pub delay: f64,
    pub speed: f64,
    pub loops: i32,
    pub loops_delay: f64,
    pub yoyo: bool,
    /// Derived state is current; cleared by invalidation.
    pub ready: bool,
    pub head: Playhead,
    pub events: EventRegistry,
    pub body: Body,
}

impl Node {
    pub fn new(id: NodeId, duration: f64, body: Body) -> Self {
        Self {
            id,
            parent: None,
            duration: Span::Finite(duration),
            delay: 0.0,
            speed: 1.0,
            loops: 0,
            loops_delay: 0.0,
            yoyo: false,
            ready: false,
            head: Playhead::default(),
            events: EventRegistry::default(),
            body,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self.body {
            Body::Tween(_) => NodeKind::Tween,
            Body::Timeline(_) => NodeKind::Timeline,
            Body::Dummy => NodeKind::Dummy,
        }
    }

    /// Own duration with unbounded timelines as `f64::INFINITY`.
    #[inline]
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_ms()
    }

    #[inline]
    pub fn total_duration(&self) -> Span {
        total_duration(self.duration, self.loops, self.loops_delay, self.speed)
    }

    pub fn tween(&self) -> Option<&TweenBody> {
        match &self.body {
            Body::Tween(t) => Some(t),
            _ => None,
        }
    }

    pub fn tween_mut(&mut self) -> Option<&mut TweenBody> {
        match &mut self.body {
            Body::Tween(t) => Some(t),
            _ => None,
        }
    }

    pub fn timeline(&self) -> Option<&TimelineBody> {
        match &self.body {
            Body::Timeline(t) => Some(t),
            _ => None,
        }
    }

    pub fn timeline_mut(&mut self) -> Option<&mut TimelineBody> {
        match &mut self.body {
            Body::Timeline(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("parent", &self.parent)
            .field("duration", &self.duration)
            .field("head", &self.head)
            .finish()
    }
}
