#![allow(dead_code)]
//! Timelines: children placed by the position grammar and driven by a keyframe scheduler.
//!
//! Preparation merges the children in insertion order, indexes every start and end as a
//! keyframe and fills the gaps with fillers, so that every keyframe but the first is reached
//! by a child completing forward and every keyframe but the last by a child completing
//! backward. Playback then hops from keyframe to keyframe: each arrival runs the callbacks
//! registered there and resumes the children starting (or, backward, ending) there.

use crate::driver::Target;
use crate::engine::Engine;
use crate::error::{Result, TimelineError};
use crate::events::{Channel, CoreAction, CoreKey, EventName, Handler};
use crate::ids::NodeId;
use crate::keyframes::{Dir, KeyTime, KeyframeIndex, KeyframeInfo};
use crate::node::{Node, NodeKind};
use crate::options::AnimOptions;
use crate::position::{validate_label, Position};
use crate::property::PropertyBlock;
use crate::time::{Span, TimeValue};
use hashbrown::HashMap;
use indexmap::{IndexMap, IndexSet};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Child {
    Node(NodeId),
    Callback(NodeId),
    Label(String),
}

#[derive(Clone, Debug)]
pub(crate) struct ChildEntry {
    pub child: Child,
    pub start: Position,
    /// Child delay folded into the timeline on a previous merge.
    pub absorbed_delay: f64,
}

/// Function run when playback reaches its position, optionally in one direction only.
pub struct Callback {
    handler: Handler,
    dir: Option<bool>,
}

impl Callback {
    /// Runs in both directions. The handler receives the timeline id.
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(&mut Engine, NodeId) + 'static,
    {
        Self {
            handler: Box::new(f),
            dir: None,
        }
    }

    pub fn forward<F>(f: F) -> Self
    where
        F: FnMut(&mut Engine, NodeId) + 'static,
    {
        Self {
            handler: Box::new(f),
            dir: Some(true),
        }
    }

    pub fn backward<F>(f: F) -> Self
    where
        F: FnMut(&mut Engine, NodeId) + 'static,
    {
        Self {
            handler: Box::new(f),
            dir: Some(false),
        }
    }
}

pub(crate) struct CallbackSlot {
    pub handler: Option<Handler>,
    pub dir: Option<bool>,
    pub is_pause: bool,
}

pub(crate) struct TimelineBody {
    pub entries: Vec<ChildEntry>,
    pub callbacks: HashMap<NodeId, CallbackSlot>,
    pub labels: IndexMap<String, Span>,
    /// End of the last merged child.
    pub cursor: Span,
    pub keyframes: KeyframeIndex,
    /// Every descendant, in this timeline's time, for resetting in reverse order.
    pub back_keyframes: KeyframeIndex,
    /// Children and fillers, in merge order.
    pub children_list: Vec<NodeId>,
    pub placements: IndexMap<NodeId, (Span, Span)>,
    pub dummies: Vec<NodeId>,
    /// Children started and not yet completed.
    pub running: IndexSet<NodeId>,
    pub back_enabled: bool,
    /// Where a pause callback interrupted keyframe processing.
    pub key_time: Option<KeyTime>,
    pub key_dir: Option<Dir>,
    pub key_index: Option<usize>,
    /// The boundary keyframe was reached while children were still running.
    pub pending_end: bool,
    /// Default target of tweens created through this timeline.
    pub target: Option<Target>,
}

impl Default for TimelineBody {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            callbacks: HashMap::new(),
            labels: IndexMap::new(),
            cursor: Span::ZERO,
            keyframes: KeyframeIndex::default(),
            back_keyframes: KeyframeIndex::default(),
            children_list: Vec::new(),
            placements: IndexMap::new(),
            dummies: Vec::new(),
            running: IndexSet::new(),
            back_enabled: true,
            key_time: None,
            key_dir: None,
            key_index: None,
            pending_end: false,
            target: None,
        }
    }
}

impl TimelineBody {
    fn reset_index(&mut self) {
        self.labels.clear();
        self.cursor = Span::ZERO;
        self.keyframes.clear();
        self.back_keyframes.clear();
        self.children_list.clear();
        self.placements.clear();
        self.running.clear();
        self.pending_end = false;
        self.clear_pending_key();
    }

    pub fn clear_pending_key(&mut self) {
        self.key_time = None;
        self.key_dir = None;
        self.key_index = None;
    }

    /// Tweens and timelines added by the user.
    pub fn child_nodes(&self) -> Vec<NodeId> {
        self.entries
            .iter()
            .filter_map(|e| match e.child {
                Child::Node(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn detach(&mut self, child: NodeId) {
        self.entries.retain(|e| e.child != Child::Node(child));
        self.children_list.retain(|c| *c != child);
        self.placements.shift_remove(&child);
        self.running.shift_remove(&child);
    }
}

impl Engine {
    fn timeline_body(&self, id: NodeId) -> Option<&TimelineBody> {
        self.node(id).and_then(Node::timeline)
    }

    fn timeline_body_mut(&mut self, id: NodeId) -> Option<&mut TimelineBody> {
        self.node_mut(id).and_then(Node::timeline_mut)
    }

    fn is_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cur = self.node(of).and_then(|n| n.parent);
        while let Some(c) = cur {
            if c == candidate {
                return true;
            }
            cur = self.node(c).and_then(|n| n.parent);
        }
        false
    }

    fn push_entry(&mut self, tl: NodeId, child: Child, start: Position) -> Result<()> {
        let node = self.require_kind(tl, NodeKind::Timeline)?;
        if let Some(t) = node.timeline_mut() {
            t.entries.push(ChildEntry {
                child,
                start,
                absorbed_delay: 0.0,
            });
        }
        self.invalidate(tl);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Building
    // ---------------------------------------------------------------------

    /// Place a tween or timeline. `None` appends after everything added so far.
    pub fn add(&mut self, tl: NodeId, child: NodeId, position: impl Into<Position>) -> Result<()> {
        self.require_kind(tl, NodeKind::Timeline)?;
        let invalid = |reason: &str| TimelineError::InvalidChild {
            timeline: tl,
            child,
            reason: reason.into(),
        };
        let Some(node) = self.node(child) else {
            return Err(invalid("unknown node"));
        };
        if node.kind() == NodeKind::Dummy {
            return Err(invalid("fillers cannot be added"));
        }
        if child == tl || self.is_ancestor(child, tl) {
            return Err(invalid("would create a cycle"));
        }
        if let Some(p) = node.parent {
            return Err(invalid(&format!("already a child of {p}")));
        }
        if let Some(n) = self.node_mut(child) {
            n.parent = Some(tl);
        }
        log::debug!("timeline {tl}: add {child}");
        self.push_entry(tl, Child::Node(child), position.into())
    }

    /// Run a callback when playback reaches `position`. Returns its id.
    pub fn add_callback(
        &mut self,
        tl: NodeId,
        callback: Callback,
        position: impl Into<Position>,
    ) -> Result<NodeId> {
        self.insert_callback(tl, Some(callback), false, position.into())
    }

    /// Pause the timeline when playback reaches `position`, then run the optional callback.
    pub fn add_pause(
        &mut self,
        tl: NodeId,
        position: impl Into<Position>,
        callback: Option<Callback>,
    ) -> Result<NodeId> {
        self.insert_callback(tl, callback, true, position.into())
    }

    fn insert_callback(
        &mut self,
        tl: NodeId,
        callback: Option<Callback>,
        is_pause: bool,
        position: Position,
    ) -> Result<NodeId> {
        self.require_kind(tl, NodeKind::Timeline)?;
        let id = self.ids.alloc();
        let (handler, dir) = match callback {
            Some(cb) => (Some(cb.handler), cb.dir),
            None => (None, None),
        };
        if let Some(t) = self.timeline_body_mut(tl) {
            t.callbacks.insert(
                id,
                CallbackSlot {
                    handler,
                    dir,
                    is_pause,
                },
            );
        }
        self.push_entry(tl, Child::Callback(id), position)?;
        Ok(id)
    }

    /// Name the position; later children may start relative to it.
    pub fn add_label(&mut self, tl: NodeId, name: &str, position: impl Into<Position>) -> Result<()> {
        validate_label(name)?;
        self.push_entry(tl, Child::Label(name.to_string()), position.into())
    }

    /// Create a tween from options on the default driver and place it.
    pub fn add_tween(
        &mut self,
        tl: NodeId,
        options: &AnimOptions,
        position: impl Into<Position>,
    ) -> Result<NodeId> {
        let target = self.require_kind(tl, NodeKind::Timeline)?
            .timeline()
            .and_then(|t| t.target.clone());
        let driver = self.cfg.default_driver.clone();
        let tw = self.tween(&driver)?;
        if let (None, Some(target)) = (&options.target, target) {
            self.set_target(tw, target)?;
        }
        self.set_options(tw, options)?;
        self.add(tl, tw, position)?;
        Ok(tw)
    }

    /// Place a zero-duration tween applying `values`.
    pub fn add_set(
        &mut self,
        tl: NodeId,
        values: PropertyBlock,
        position: impl Into<Position>,
    ) -> Result<NodeId> {
        let options = AnimOptions {
            to: Some(values),
            duration: Some(TimeValue::Number(0.0)),
            ..AnimOptions::default()
        };
        self.add_tween(tl, &options, position)
    }

    // ---------------------------------------------------------------------
    // Merge
    // ---------------------------------------------------------------------

    pub(crate) fn prepare_timeline(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        if node.ready {
            return;
        }
        let offset = node.head.offset;
        let Some(t) = node.timeline_mut() else {
            return;
        };
        let stale = std::mem::take(&mut t.dummies);
        let old_children = t.children_list.clone();
        t.reset_index();
        let entries = t.entries.clone();
        for d in stale {
            self.remove_dummy(d);
        }
        for c in old_children {
            self.unlink_child(c);
        }

        let unit = self.cfg.time_unit;
        let mut duration = Span::ZERO;
        let mut cursor = Span::ZERO;
        for (idx, entry) in entries.iter().enumerate() {
            if let Child::Node(child) = entry.child {
                let Some(c) = self.node_mut(child) else {
                    continue;
                };
                let mut delay = entry.absorbed_delay;
                if c.delay > 0.0 {
                    delay = c.delay;
                    c.delay = 0.0;
                    if let Some(t) = self.timeline_body_mut(id) {
                        t.entries[idx].absorbed_delay = delay;
                    }
                }
                duration = duration.offset(delay);
                cursor = cursor.offset(delay);
            }

            let begin = {
                let labels = self.timeline_body(id).map(|t| &t.labels);
                entry.start.resolve(duration, cursor, unit, |name| {
                    labels.and_then(|l| l.get(name).copied())
                })
            };

            match &entry.child {
                Child::Label(name) => {
                    if let Some(t) = self.timeline_body_mut(id) {
                        t.labels.insert(name.clone(), begin);
                    }
                }
                Child::Callback(cb) => {
                    cursor = begin;
                    duration = duration.max(begin);
                    if let (Span::Finite(b), Some(t)) = (begin, self.timeline_body_mut(id)) {
                        let at = KeyTime::from_ms(b);
                        t.keyframes.insert(*cb, true, at, Some(at), false, false);
                    }
                }
                Child::Node(child) => {
                    let child = *child;
                    let Some(c) = self.node_mut(child) else {
                        continue;
                    };
                    if let Span::Finite(b) = begin {
                        c.head.offset = offset + b;
                    }
                    if c.kind() == NodeKind::Timeline {
                        c.ready = false;
                    }
                    let total = self.prepare_node(child);
                    let end = begin.add(total);
                    if let Some(t) = self.timeline_body_mut(id) {
                        t.placements.insert(child, (begin, end));
                        t.children_list.push(child);
                    }
                    cursor = end;
                    duration = duration.max(end);
                    match begin {
                        Span::Finite(b) => self.merge_element(id, child, b, end),
                        Span::Infinite => log::debug!("timeline {id}: {child} starts at infinity"),
                    }
                }
            }
        }

        self.fill_gaps(id);
        if let Some(node) = self.node_mut(id) {
            node.duration = duration;
            node.ready = true;
            if let Some(t) = node.timeline_mut() {
                t.cursor = cursor;
                log::trace!(
                    "timeline {id} merged: duration {duration}, {} keyframe(s)",
                    t.keyframes.len()
                );
            }
        }
    }

    /// Index a child over [begin, end] and wire its completion to this timeline.
    fn merge_element(&mut self, tl: NodeId, child: NodeId, begin: f64, end: Span) {
        let at = KeyTime::from_ms(begin);
        let until = end.finite().map(KeyTime::from_ms);
        let trigger = end > Span::Finite(begin);
        let Some(t) = self.timeline_body_mut(tl) else {
            return;
        };
        let (first_begin, first_end) = t.keyframes.insert(child, false, at, until, trigger, trigger);
        self.push_up(tl, child, begin, end);

        let Some(c) = self.node_mut(child) else {
            return;
        };
        c.events.set_core(
            Channel::Event(EventName::Reverse),
            CoreKey::Timeline,
            CoreAction::ChildDone {
                timeline: tl,
                dir: Dir::Backward,
                time: at,
                is_key: first_begin,
            },
        );
        let end_channel = Channel::Event(EventName::End);
        match until {
            Some(until) => c.events.set_core(
                end_channel,
                CoreKey::Timeline,
                CoreAction::ChildDone {
                    timeline: tl,
                    dir: Dir::Forward,
                    time: until,
                    is_key: first_end,
                },
            ),
            None => c.events.unset_core(end_channel, CoreKey::Timeline),
        }
    }

    /// Register a descendant in the reset index of this timeline and every ancestor.
    fn push_up(&mut self, tl: NodeId, child: NodeId, begin: f64, end: Span) {
        let Some(node) = self.node(tl) else {
            return;
        };
        let offset = node.head.offset;
        if let Some(parent) = node.parent {
            let delta = offset - self.head(parent).map_or(0.0, |h| h.offset);
            self.push_up(parent, child, begin + delta, end.offset(delta));
        }
        if let Some(t) = self.timeline_body_mut(tl) {
            let until = end.finite().map(KeyTime::from_ms);
            t.back_keyframes
                .insert(child, false, KeyTime::from_ms(begin), until, false, false);
        }
    }

    fn unlink_child(&mut self, child: NodeId) {
        if let Some(c) = self.node_mut(child) {
            for name in [EventName::End, EventName::Reverse] {
                c.events.unset_core(Channel::Event(name), CoreKey::Timeline);
            }
        }
    }

    /// Give every keyframe the arrival triggers playback needs.
    fn fill_gaps(&mut self, tl: NodeId) {
        let Some(t) = self.timeline_body(tl) else {
            return;
        };
        let times = t.keyframes.times();
        let Some(first) = times.first().copied() else {
            return;
        };
        if first != KeyTime::ZERO {
            self.add_dummy(tl, 0.0, first.ms());
        }

        let times = self.timeline_body(tl).map(|t| t.keyframes.times()).unwrap_or_default();
        let has = |engine: &Engine, time: KeyTime, dir: Dir| {
            engine
                .timeline_body(tl)
                .and_then(|t| t.keyframes.get(time))
                .is_some_and(|kf| match dir {
                    Dir::Forward => kf.b_trigger.is_some(),
                    Dir::Backward => kf.f_trigger.is_some(),
                })
        };
        // forward arrival
        for i in 1..times.len() {
            if has(self, times[i], Dir::Forward) {
                continue;
            }
            let from = (0..i)
                .rev()
                .find(|&j| has(self, times[j], Dir::Forward))
                .unwrap_or(0);
            self.add_dummy(tl, times[from].ms(), times[i].ms());
        }
        // backward arrival
        let last = times.len().saturating_sub(1);
        for i in 0..last {
            if has(self, times[i], Dir::Backward) {
                continue;
            }
            let to = (i + 1..times.len())
                .find(|&k| has(self, times[k], Dir::Backward))
                .unwrap_or(last);
            self.add_dummy(tl, times[i].ms(), times[to].ms());
        }
    }

    fn add_dummy(&mut self, tl: NodeId, from: f64, to: f64) {
        let Some(head) = self.head(tl) else {
            return;
        };
        let (offset, local_fwd) = (head.offset, head.local_fwd);
        let d = self.dummy(tl, to - from);
        if let Some(h) = self.head_mut(d) {
            h.offset = offset + from;
        }
        self.set_dir(d, local_fwd);
        if let Some(t) = self.timeline_body_mut(tl) {
            t.dummies.push(d);
            t.children_list.push(d);
        }
        self.merge_element(tl, d, from, Span::Finite(to));
    }

    // ---------------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------------

    /// Run the callbacks at a keyframe, then resume its children. Backward playback walks the
    /// callbacks last to first; `after` is the pause index to continue past.
    pub(crate) fn process_keyframe(
        &mut self,
        tl: NodeId,
        time: KeyTime,
        dir: Dir,
        after: Option<usize>,
    ) {
        let Some(node) = self.node(tl) else {
            return;
        };
        let local_fwd = node.head.local_fwd;
        let Some(t) = node.timeline() else {
            return;
        };
        let Some(kf) = t.keyframes.get(time).cloned() else {
            return;
        };
        let is_boundary = match dir {
            Dir::Forward => t.keyframes.last() == Some(time),
            Dir::Backward => t.keyframes.times().first() == Some(&time),
        };
        log::trace!("timeline {tl}: keyframe {}ms {dir:?}", time.ms());

        let mut order: Vec<(usize, NodeId)> =
            kf.callbacks(dir).iter().copied().enumerate().collect();
        match (dir, after) {
            (Dir::Forward, Some(p)) => order.retain(|(i, _)| *i > p),
            (Dir::Backward, Some(p)) => order.retain(|(i, _)| *i < p),
            _ => {}
        }
        if dir == Dir::Backward {
            order.reverse();
        }

        for (i, cb) in order {
            let Some(slot) = self.timeline_body(tl).and_then(|t| t.callbacks.get(&cb)) else {
                continue;
            };
            if slot.dir.is_some_and(|d| d != local_fwd) {
                continue;
            }
            if slot.is_pause {
                if let Some(t) = self.timeline_body_mut(tl) {
                    t.key_time = Some(time);
                    t.key_dir = Some(dir);
                    t.key_index = Some(i);
                }
                log::debug!("timeline {tl} paused at {}ms", time.ms());
                self.pause(tl);
                self.run_callback(tl, cb);
                return;
            }
            self.run_callback(tl, cb);
        }

        for child in kf.children(dir) {
            self.resume(*child);
            let playing = self.head(*child).is_some_and(|h| !h.paused);
            if playing {
                if let Some(t) = self.timeline_body_mut(tl) {
                    t.running.insert(*child);
                }
            }
        }

        if is_boundary {
            let Some(t) = self.timeline_body_mut(tl) else {
                return;
            };
            if t.running.is_empty() {
                self.emit(tl, Channel::EndHook);
            } else {
                t.pending_end = true;
            }
        }
    }

    fn run_callback(&mut self, tl: NodeId, cb: NodeId) {
        let Some(mut handler) = self
            .timeline_body_mut(tl)
            .and_then(|t| t.callbacks.get_mut(&cb))
            .and_then(|slot| slot.handler.take())
        else {
            return;
        };
        handler(self, tl);
        if let Some(slot) = self
            .timeline_body_mut(tl)
            .and_then(|t| t.callbacks.get_mut(&cb))
        {
            if slot.handler.is_none() {
                slot.handler = Some(handler);
            }
        }
    }

    /// A child completed (or the timeline starts, with `from` unset).
    pub(crate) fn child_done(
        &mut self,
        tl: NodeId,
        dir: Dir,
        time: KeyTime,
        from: Option<NodeId>,
        is_key: bool,
    ) {
        let Some(t) = self.timeline_body_mut(tl) else {
            return;
        };
        if let Some(c) = from {
            t.running.shift_remove(&c);
        }
        if t.keyframes.is_empty() {
            self.emit(tl, Channel::EndHook);
            return;
        }
        if is_key && t.keyframes.contains(time) {
            self.process_keyframe(tl, time, dir, None);
        }
        let Some(t) = self.timeline_body_mut(tl) else {
            return;
        };
        if t.pending_end && t.running.is_empty() {
            t.pending_end = false;
            self.emit(tl, Channel::EndHook);
        }
    }

    pub(crate) fn run_timeline(&mut self, id: NodeId) {
        let now = self.ticker.now();
        let Some(node) = self.node_mut(id) else {
            return;
        };
        node.head.running = true;
        node.head.start_time = now;
        let has_length = node.duration > Span::ZERO;
        log::debug!("timeline {id} runs ({})", node.duration);
        self.emit(id, Channel::BeginHook);
        if has_length {
            self.start_progress(id);
        }
        self.child_done(id, Dir::Forward, KeyTime::ZERO, None, true);
    }

    pub(crate) fn pause_timeline_children(&mut self, tl: NodeId) {
        let running: Vec<_> = self
            .timeline_body(tl)
            .map(|t| t.running.iter().copied().collect())
            .unwrap_or_default();
        for child in running {
            self.pause(child);
        }
    }

    pub(crate) fn resume_timeline_children(&mut self, tl: NodeId) {
        let Some(node) = self.node_mut(tl) else {
            return;
        };
        let d = node.duration;
        let position = node.head.position;
        let local_fwd = node.head.local_fwd;
        let Some(t) = node.timeline_mut() else {
            return;
        };
        let running: Vec<_> = t.running.iter().copied().collect();
        let pending = match (t.key_time, t.key_dir, t.key_index) {
            (Some(time), Some(dir), Some(i)) if dir == Dir::of(local_fwd) => Some((time, dir, i)),
            _ => None,
        };
        t.clear_pending_key();
        let last = t.keyframes.last();

        for child in &running {
            self.resume(*child);
        }
        if let Some((time, dir, i)) = pending {
            self.process_keyframe(tl, time, dir, Some(i));
            return;
        }
        if !running.is_empty() {
            return;
        }
        if local_fwd && position == 0.0 {
            self.process_keyframe(tl, KeyTime::ZERO, Dir::Forward, None);
        } else if !local_fwd && Span::Finite(position) == d {
            if let Some(last) = last {
                self.process_keyframe(tl, last, Dir::Backward, None);
            }
        }
    }

    /// Reset every descendant to the boundary of the current direction, latest first.
    pub(crate) fn back_timeline_children(&mut self, tl: NodeId) {
        let local_fwd = self.head(tl).is_some_and(|h| h.local_fwd);
        let Some(t) = self.timeline_body_mut(tl) else {
            return;
        };
        t.running.clear();
        t.pending_end = false;
        t.clear_pending_key();
        if !t.back_enabled {
            return;
        }
        let order: Vec<NodeId> = if local_fwd {
            t.back_keyframes
                .iter()
                .rev()
                .flat_map(|(_, kf)| kf.f.iter().rev().copied())
                .collect()
        } else {
            t.back_keyframes
                .iter()
                .flat_map(|(_, kf)| kf.b.iter().rev().copied())
                .collect()
        };
        for child in order {
            let nested = self.kind_of(child) == Some(NodeKind::Timeline);
            if nested {
                if let Some(t) = self.timeline_body_mut(child) {
                    t.back_enabled = false;
                }
            }
            self.pause(child);
            self.back_inner(child);
            if nested {
                if let Some(t) = self.timeline_body_mut(child) {
                    t.back_enabled = true;
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Keyframes of a timeline, preparing it first.
    pub fn keyframes(&mut self, tl: NodeId) -> Option<Vec<KeyframeInfo>> {
        self.timeline_body(tl)?;
        self.prepare_node(tl);
        let unit = self.cfg.time_unit;
        let t = self.timeline_body(tl)?;
        Some(
            t.keyframes
                .iter()
                .map(|(time, kf)| KeyframeInfo {
                    time: crate::time::round3(unit.from_ms(time.ms())),
                    starting: kf.f.clone(),
                    ending: kf.b.clone(),
                    callbacks_forward: kf.fc.clone(),
                    callbacks_backward: kf.bc.clone(),
                    forward_trigger: kf.b_trigger,
                    backward_trigger: kf.f_trigger,
                })
                .collect(),
        )
    }

    /// Start and end of a child inside its timeline, in the display unit.
    pub fn placement(&mut self, tl: NodeId, child: NodeId) -> Option<(Span, Span)> {
        self.timeline_body(tl)?;
        self.prepare_node(tl);
        let unit = self.cfg.time_unit;
        let (begin, end) = *self.timeline_body(tl)?.placements.get(&child)?;
        Some((begin.to_unit(unit), end.to_unit(unit)))
    }

    pub fn label_position(&mut self, tl: NodeId, label: &str) -> Option<Span> {
        self.timeline_body(tl)?;
        self.prepare_node(tl);
        let unit = self.cfg.time_unit;
        Some(self.timeline_body(tl)?.labels.get(label)?.to_unit(unit))
    }

    /// Absolute start in the outermost timeline, in the display unit.
    pub fn offset(&self, id: NodeId) -> Option<f64> {
        Some(self.to_display(self.head(id)?.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ticker::ManualClock;
    use crate::time::TimeUnit;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn setup(unit: TimeUnit) -> (ManualClock, Engine) {
        let clock = ManualClock::new();
        let cfg = Config {
            time_unit: unit,
            ..Config::default()
        };
        (clock.clone(), Engine::with_clock(cfg, Rc::new(clock)))
    }

    fn tween(engine: &mut Engine, duration: f64) -> NodeId {
        let tw = engine.tween("null").unwrap();
        engine.set_duration(tw, duration).unwrap();
        tw
    }

    #[test]
    fn position_grammar_and_labels() {
        let (_clock, mut engine) = setup(TimeUnit::Seconds);
        let tl = engine.timeline();
        let a = tween(&mut engine, 2.0);
        engine.add(tl, a, None::<f64>).unwrap();
        engine.add_label(tl, "mark", None::<f64>).unwrap();
        let b = tween(&mut engine, 1.0);
        engine.add(tl, b, "mark+=0.5").unwrap();
        let c = tween(&mut engine, 1.0);
        engine.add(tl, c, "mark").unwrap();
        let d = tween(&mut engine, 1.0);
        engine.add(tl, d, "+=0.3").unwrap();

        assert_eq!(engine.label_position(tl, "mark"), Some(Span::Finite(2.0)));
        assert_eq!(
            engine.placement(tl, b),
            Some((Span::Finite(2.5), Span::Finite(3.5)))
        );
        assert_eq!(engine.placement(tl, c).map(|p| p.0), Some(Span::Finite(2.0)));
        assert_eq!(engine.placement(tl, d).map(|p| p.0), Some(Span::Finite(3.8)));
        assert_eq!(engine.duration(tl), Some(Span::Finite(4.8)));
    }

    #[test]
    fn invalid_children_are_rejected() {
        let (_clock, mut engine) = setup(TimeUnit::Millis);
        let outer = engine.timeline();
        let inner = engine.timeline();
        engine.add(outer, inner, None::<f64>).unwrap();
        assert!(matches!(
            engine.add(inner, outer, None::<f64>),
            Err(TimelineError::InvalidChild { .. })
        ));
        assert!(matches!(
            engine.add(outer, outer, None::<f64>),
            Err(TimelineError::InvalidChild { .. })
        ));
        let other = engine.timeline();
        assert!(engine.add(other, inner, None::<f64>).is_err());
        assert!(matches!(
            engine.add_label(outer, "Bad", None::<f64>),
            Err(TimelineError::InvalidLabel { .. })
        ));
        let tw = tween(&mut engine, 10.0);
        assert!(matches!(
            engine.add(tw, inner, None::<f64>),
            Err(TimelineError::WrongNodeKind { .. })
        ));
    }

    #[test]
    fn merge_is_idempotent() {
        let (_clock, mut engine) = setup(TimeUnit::Millis);
        let tl = engine.timeline();
        let a = tween(&mut engine, 100.0);
        let b = tween(&mut engine, 300.0);
        engine.add(tl, a, None::<f64>).unwrap();
        engine.add(tl, b, 200.0).unwrap();
        let times = |kfs: Vec<KeyframeInfo>| kfs.iter().map(|k| k.time).collect::<Vec<_>>();
        let first = times(engine.keyframes(tl).unwrap());
        let stale = engine.timeline_body(tl).unwrap().dummies.clone();
        assert_eq!(stale.len(), 1);

        engine.set_yoyo(tl, false).unwrap();
        assert_eq!(times(engine.keyframes(tl).unwrap()), first);
        assert_eq!(engine.timeline_body(tl).unwrap().dummies.len(), 1);
        assert!(stale.iter().all(|d| !engine.contains(*d)));
        assert_eq!(engine.duration(tl), Some(Span::Finite(500.0)));
    }

    #[test]
    fn gaps_get_fillers_and_every_keyframe_a_trigger() {
        let (_clock, mut engine) = setup(TimeUnit::Millis);
        let tl = engine.timeline();
        let a = tween(&mut engine, 100.0);
        let b = tween(&mut engine, 100.0);
        engine.add(tl, a, 50.0).unwrap();
        engine.add(tl, b, 300.0).unwrap();
        let kfs = engine.keyframes(tl).unwrap();
        let times: Vec<_> = kfs.iter().map(|k| k.time).collect();
        assert_eq!(times, vec![0.0, 50.0, 150.0, 300.0, 400.0]);
        let n = kfs.len();
        for (i, kf) in kfs.iter().enumerate() {
            assert_eq!(kf.forward_trigger.is_some(), i > 0, "forward at {}", kf.time);
            assert_eq!(kf.backward_trigger.is_some(), i + 1 < n, "backward at {}", kf.time);
        }
        assert_eq!(engine.timeline_body(tl).unwrap().dummies.len(), 2);
    }

    #[test]
    fn child_delay_is_absorbed_once() {
        let (_clock, mut engine) = setup(TimeUnit::Millis);
        let tl = engine.timeline();
        let a = tween(&mut engine, 100.0);
        engine.set_delay(a, 50.0).unwrap();
        engine.add(tl, a, None::<f64>).unwrap();
        assert_eq!(engine.total_duration(tl), Some(Span::Finite(150.0)));
        assert_eq!(engine.delay(a), Some(0.0));
        engine.set_yoyo(tl, true).unwrap();
        assert_eq!(engine.total_duration(tl), Some(Span::Finite(150.0)));
        assert_eq!(engine.placement(tl, a).map(|p| p.0), Some(Span::Finite(50.0)));
    }

    #[test]
    fn nested_offsets_propagate() {
        let (_clock, mut engine) = setup(TimeUnit::Seconds);
        let outer = engine.timeline();
        let inner = engine.timeline();
        let tw = tween(&mut engine, 1.0);
        engine.add(inner, tw, 0.5).unwrap();
        engine.add(outer, inner, 2.0).unwrap();
        engine.prepare(outer);
        assert_eq!(engine.offset(inner), Some(2.0));
        assert_eq!(engine.offset(tw), Some(2.5));
        assert_eq!(engine.duration(outer), Some(Span::Finite(3.5)));
    }

    #[test]
    fn infinite_children_make_the_timeline_infinite() {
        let (_clock, mut engine) = setup(TimeUnit::Millis);
        let tl = engine.timeline();
        let a = tween(&mut engine, 100.0);
        engine.set_loops(a, -1.0).unwrap();
        let b = tween(&mut engine, 100.0);
        engine.add(tl, a, None::<f64>).unwrap();
        engine.add(tl, b, None::<f64>).unwrap();
        assert_eq!(engine.total_duration(tl), Some(Span::Infinite));
        assert_eq!(engine.placement(tl, b).map(|p| p.0), Some(Span::Infinite));
        let kfs = engine.keyframes(tl).unwrap();
        assert!(kfs.iter().all(|k| !k.starting.contains(&b)));
    }

    #[test]
    fn plays_children_in_sequence() {
        let (clock, mut engine) = setup(TimeUnit::Millis);
        let tl = engine.timeline();
        let a = tween(&mut engine, 100.0);
        let b = tween(&mut engine, 100.0);
        engine.add(tl, a, None::<f64>).unwrap();
        engine.add(tl, b, "+=50").unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (id, name) in [(a, "a"), (b, "b")] {
            let l = log.clone();
            engine.on(id, "end", move |_, _| l.borrow_mut().push(name));
        }
        engine.play(tl);
        clock.advance(120.0);
        engine.tick();
        assert_eq!(*log.borrow(), vec!["a"]);
        assert_eq!(engine.is_running(b), Some(false));
        clock.advance(40.0);
        engine.tick();
        assert_eq!(engine.is_running(b), Some(true));
        clock.advance(100.0);
        engine.tick();
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(engine.state(tl), Some(crate::playhead::PlaybackState::Ended));
        assert_eq!(engine.time(tl), Some(250.0));
        assert!(!engine.is_ticking());
    }

    #[test]
    fn callbacks_respect_direction() {
        let (clock, mut engine) = setup(TimeUnit::Millis);
        let tl = engine.timeline();
        let a = tween(&mut engine, 200.0);
        engine.add(tl, a, None::<f64>).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (f, b, both) = (log.clone(), log.clone(), log.clone());
        engine
            .add_callback(tl, Callback::forward(move |_, _| f.borrow_mut().push("fwd")), 100.0)
            .unwrap();
        engine
            .add_callback(tl, Callback::backward(move |_, _| b.borrow_mut().push("bwd")), 100.0)
            .unwrap();
        engine
            .add_callback(tl, Callback::new(move |_, _| both.borrow_mut().push("any")), 100.0)
            .unwrap();
        engine.play(tl);
        clock.advance(250.0);
        engine.tick();
        assert_eq!(*log.borrow(), vec!["fwd", "any"]);
        engine.reverse(tl);
        clock.advance(250.0);
        engine.tick();
        assert_eq!(*log.borrow(), vec!["fwd", "any", "any", "bwd"]);
    }

    #[test]
    fn callbacks_at_one_time_unwind_in_reverse() {
        let (clock, mut engine) = setup(TimeUnit::Millis);
        let tl = engine.timeline();
        let a = tween(&mut engine, 200.0);
        engine.add(tl, a, None::<f64>).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["first", "second"] {
            let l = log.clone();
            engine
                .add_callback(tl, Callback::new(move |_, _| l.borrow_mut().push(name)), 100.0)
                .unwrap();
        }
        engine.play(tl);
        clock.advance(250.0);
        engine.tick();
        engine.reverse(tl);
        clock.advance(250.0);
        engine.tick();
        assert_eq!(*log.borrow(), vec!["first", "second", "second", "first"]);
    }

    #[test]
    fn backward_pause_continues_with_earlier_callbacks() {
        let (clock, mut engine) = setup(TimeUnit::Millis);
        let tl = engine.timeline();
        let a = tween(&mut engine, 200.0);
        engine.add(tl, a, None::<f64>).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (x, y) = (log.clone(), log.clone());
        engine
            .add_callback(tl, Callback::new(move |_, _| x.borrow_mut().push("a")), 100.0)
            .unwrap();
        engine.add_pause(tl, 100.0, None).unwrap();
        engine
            .add_callback(tl, Callback::new(move |_, _| y.borrow_mut().push("b")), 100.0)
            .unwrap();

        engine.play(tl);
        clock.advance(150.0);
        engine.tick();
        assert_eq!(*log.borrow(), vec!["a"]);
        assert_eq!(engine.is_paused(tl), Some(true));
        engine.resume(tl);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        clock.advance(200.0);
        engine.tick();
        assert_eq!(engine.state(tl), Some(crate::playhead::PlaybackState::Ended));

        engine.reverse(tl);
        clock.advance(150.0);
        engine.tick();
        assert_eq!(*log.borrow(), vec!["a", "b", "b"]);
        assert_eq!(engine.is_paused(tl), Some(true));
        engine.resume(tl);
        assert_eq!(*log.borrow(), vec!["a", "b", "b", "a"]);
    }

    #[test]
    fn pause_breakpoint_halts_until_resumed() {
        let (clock, mut engine) = setup(TimeUnit::Millis);
        let tl = engine.timeline();
        let a = tween(&mut engine, 100.0);
        let b = tween(&mut engine, 100.0);
        engine.add(tl, a, None::<f64>).unwrap();
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        engine
            .add_pause(tl, None::<f64>, Some(Callback::new(move |_, _| *h.borrow_mut() += 1)))
            .unwrap();
        engine.add(tl, b, None::<f64>).unwrap();
        engine.play(tl);
        clock.advance(150.0);
        engine.tick();
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(engine.is_paused(tl), Some(true));
        assert_eq!(engine.is_running(b), Some(false));

        engine.resume(tl);
        assert_eq!(engine.is_running(b), Some(true));
        clock.advance(100.0);
        engine.tick();
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(engine.progress(tl), Some(1.0));
    }

    #[test]
    fn shortcuts_inherit_the_timeline_target() {
        let (_clock, mut engine) = setup(TimeUnit::Millis);
        let tl = engine.timeline();
        engine.set_target(tl, "box").unwrap();
        let opts = AnimOptions::from_json(&serde_json::json!({"to": {"left": 10}, "duration": 100}))
            .unwrap();
        let tw = engine.add_tween(tl, &opts, None::<f64>).unwrap();
        let set = engine
            .add_set(tl, PropertyBlock::new().with("top", 5.0), None::<f64>)
            .unwrap();
        let target = |e: &Engine, id| e.node(id).and_then(Node::tween).map(|t| t.target.clone());
        assert_eq!(target(&engine, tw), Some(Target::from("box")));
        assert_eq!(target(&engine, set), Some(Target::from("box")));
        assert_eq!(
            engine.placement(tl, set),
            Some((Span::Finite(100.0), Span::Finite(100.0)))
        );
    }
}
