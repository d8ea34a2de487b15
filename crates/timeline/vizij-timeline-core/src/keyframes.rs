//! Keyframe index of a timeline.
//!
//! A keyframe is an instant where children start or end. Forward playback resumes the
//! children beginning there, backward playback the children ending there. The first child
//! registered as able to *reach* a keyframe becomes its trigger for that direction.

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keyframe time in microseconds, exact enough to merge equal float positions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct KeyTime(i64);

impl KeyTime {
    pub const ZERO: KeyTime = KeyTime(0);

    #[inline]
    pub fn from_ms(ms: f64) -> Self {
        KeyTime((ms * 1000.0).round() as i64)
    }

    #[inline]
    pub fn ms(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Dir {
    Forward,
    Backward,
}

impl Dir {
    #[inline]
    pub fn of(forward: bool) -> Self {
        if forward {
            Dir::Forward
        } else {
            Dir::Backward
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Keyframe {
    /// Children starting here, resumed going forward.
    pub f: Vec<NodeId>,
    /// Children ending here, resumed going backward.
    pub b: Vec<NodeId>,
    pub fc: Vec<NodeId>,
    pub bc: Vec<NodeId>,
    /// Starts here; its reverse completion brings backward playback to this keyframe.
    pub f_trigger: Option<NodeId>,
    /// Ends here; its completion brings forward playback to this keyframe.
    pub b_trigger: Option<NodeId>,
}

impl Keyframe {
    #[inline]
    pub fn children(&self, dir: Dir) -> &[NodeId] {
        match dir {
            Dir::Forward => &self.f,
            Dir::Backward => &self.b,
        }
    }

    #[inline]
    pub fn callbacks(&self, dir: Dir) -> &[NodeId] {
        match dir {
            Dir::Forward => &self.fc,
            Dir::Backward => &self.bc,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct KeyframeIndex {
    frames: BTreeMap<KeyTime, Keyframe>,
}

impl KeyframeIndex {
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn get(&self, t: KeyTime) -> Option<&Keyframe> {
        self.frames.get(&t)
    }

    #[inline]
    pub fn contains(&self, t: KeyTime) -> bool {
        self.frames.contains_key(&t)
    }

    pub fn times(&self) -> Vec<KeyTime> {
        self.frames.keys().copied().collect()
    }

    #[inline]
    pub fn last(&self) -> Option<KeyTime> {
        self.frames.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&KeyTime, &Keyframe)> {
        self.frames.iter()
    }

    /// Register a child over [begin, end]; `end` is None for unbounded children.
    /// Returns whether it became the trigger at begin and at end.
    pub fn insert(
        &mut self,
        node: NodeId,
        is_callback: bool,
        begin: KeyTime,
        end: Option<KeyTime>,
        f_triggering: bool,
        b_triggering: bool,
    ) -> (bool, bool) {
        let kf = self.frames.entry(begin).or_default();
        if is_callback {
            kf.fc.push(node);
        } else {
            kf.f.push(node);
        }
        let first_begin = f_triggering && kf.f_trigger.is_none();
        if first_begin {
            kf.f_trigger = Some(node);
        }

        let mut first_end = false;
        if let Some(end) = end {
            let kf = self.frames.entry(end).or_default();
            if is_callback {
                kf.bc.push(node);
            } else {
                kf.b.push(node);
            }
            first_end = b_triggering && kf.b_trigger.is_none();
            if first_end {
                kf.b_trigger = Some(node);
            }
        }
        (first_begin, first_end)
    }
}

/// Read-only view of one keyframe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyframeInfo {
    /// In the timeline's display unit.
    pub time: f64,
    pub starting: Vec<NodeId>,
    pub ending: Vec<NodeId>,
    pub callbacks_forward: Vec<NodeId>,
    pub callbacks_backward: Vec<NodeId>,
    pub forward_trigger: Option<NodeId>,
    pub backward_trigger: Option<NodeId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_time_merges_float_noise() {
        assert_eq!(KeyTime::from_ms(0.1 + 0.2), KeyTime::from_ms(0.3));
        assert_eq!(KeyTime::from_ms(2500.0).ms(), 2500.0);
    }

    #[test]
    fn first_registration_wins_trigger() {
        let mut idx = KeyframeIndex::default();
        let t0 = KeyTime::ZERO;
        let t1 = KeyTime::from_ms(1000.0);
        assert_eq!(idx.insert(NodeId(1), false, t0, Some(t1), true, true), (true, true));
        assert_eq!(idx.insert(NodeId(2), false, t0, Some(t1), true, true), (false, false));
        assert_eq!(idx.insert(NodeId(3), true, t1, Some(t1), false, false), (false, false));
        let kf = idx.get(t1).unwrap();
        assert_eq!(kf.b, vec![NodeId(1), NodeId(2)]);
        assert_eq!(kf.fc, vec![NodeId(3)]);
        assert_eq!(kf.bc, vec![NodeId(3)]);
        assert_eq!(kf.b_trigger, Some(NodeId(1)));
        assert_eq!(idx.times(), vec![t0, t1]);
    }

    #[test]
    fn unbounded_children_only_register_begin() {
        let mut idx = KeyframeIndex::default();
        idx.insert(NodeId(1), false, KeyTime::ZERO, None, true, true);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.last(), Some(KeyTime::ZERO));
    }
}
