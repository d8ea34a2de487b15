#![allow(dead_code)]
//! Tweens: property blocks resolved into per-property records and played on a driver.
//!
//! A tween knows four values per property: `pre` (found on the target before the tween first
//! touched it), `begin`, `end` and `then` (applied after forward completion). Missing begin and
//! end values are fetched from the target the first time they are needed. `display` and
//! `visibility` are never interpolated; they switch instantly at the boundaries.

use crate::driver::{Capabilities, Driver, Handle, PlayheadStrategy, Target};
use crate::easing::{named_easing, rebase_bezier, reverse_bezier, Easing};
use crate::engine::Engine;
use crate::error::Result;
use crate::events::Channel;
use crate::ids::NodeId;
use crate::node::{Node, NodeKind};
use crate::property::{
    camelize, column_values, has_column, is_transform_property, sort_transforms, Field,
    PropertyBlock, PropertyTable, PropertyValue,
};
use crate::ticker::TickKey;
use crate::time::Span;
use indexmap::IndexMap;

const STATIC_PROPERTIES: [&str; 2] = ["display", "visibility"];

const MASK_THEN: u8 = 1;
const MASK_END: u8 = 3;
const MASK_BEGIN: u8 = 4;
const MASK_ALL: u8 = 7;

/// Declared boundary values of one static property.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct StaticProp {
    pub begin: Option<PropertyValue>,
    pub end: Option<PropertyValue>,
    pub then: Option<PropertyValue>,
    pub mask: u8,
}

/// Which static values to apply.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum StaticSlot {
    Begin,
    End,
    Then,
    /// Revealing value held while interpolating.
    Tween,
}

/// Static values of one element, resolved when the tween first runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct StaticValues {
    pub begin: PropertyBlock,
    pub end: PropertyBlock,
    pub then: PropertyBlock,
    pub tween: PropertyBlock,
}

impl StaticValues {
    fn slot(&self, slot: StaticSlot) -> &PropertyBlock {
        match slot {
            StaticSlot::Begin => &self.begin,
            StaticSlot::End => &self.end,
            StaticSlot::Then => &self.then,
            StaticSlot::Tween => &self.tween,
        }
    }
}

/// Derived state, rebuilt by every preparation.
#[derive(Clone, Debug, Default)]
pub(crate) struct TweenData {
    /// One table per element when emulated, a single table otherwise.
    pub tables: Vec<PropertyTable>,
    pub has_begin: bool,
    pub has_end: bool,
    pub has_then: bool,
    /// Pre values were fetched.
    pub has_pre: bool,
    pub has_tween: bool,
    pub has_statics: bool,
    pub begin_ready: bool,
    pub end_ready: bool,
    pub then_ready: bool,
    pub static_props: IndexMap<String, StaticProp>,
    pub statics: Vec<StaticValues>,
}

pub(crate) struct TweenBody {
    pub driver: Box<dyn Driver>,
    pub strategy: PlayheadStrategy,
    pub caps: Capabilities,
    pub target: Target,
    pub from: Option<PropertyBlock>,
    pub to: Option<PropertyBlock>,
    pub then: Option<PropertyBlock>,
    pub easing: Easing,
    pub data: TweenData,
    /// Primitives of the current segment.
    pub handles: Vec<Handle>,
    /// Effective speed the current segment was started with.
    pub segment_speed: f64,
    pub segment_fwd: bool,
    /// Time scale last applied to native primitives.
    pub time_scale: f64,
}

impl TweenBody {
    pub fn new(driver: Box<dyn Driver>, strategy: PlayheadStrategy, easing: Easing) -> Self {
        let caps = driver.capabilities();
        Self {
            driver,
            strategy,
            caps,
            target: Target::none(),
            from: None,
            to: None,
            then: None,
            easing,
            data: TweenData::default(),
            handles: Vec::new(),
            segment_speed: 1.0,
            segment_fwd: true,
            time_scale: 1.0,
        }
    }

    /// Target of table `i`.
    fn table_target(&self, i: usize) -> Target {
        match self.strategy {
            PlayheadStrategy::Emulated => self.target.element(i).unwrap_or_default(),
            PlayheadStrategy::Native => self.target.clone(),
        }
    }

    /// Element values are fetched from: the table's own element, or the first one.
    fn table_element(&self, i: usize) -> Option<&str> {
        let idx = match self.strategy {
            PlayheadStrategy::Emulated => i,
            PlayheadStrategy::Native => 0,
        };
        self.target.elements().get(idx).map(String::as_str)
    }

    fn current(&self, element: Option<&str>, property: &str) -> Option<PropertyValue> {
        self.driver.current_value(element?, property)
    }

    /// Resolve the declared blocks into records.
    fn build(&mut self) {
        let mut table = PropertyTable::new();
        let mut static_props: IndexMap<String, StaticProp> = IndexMap::new();
        let blocks = [
            (self.to.as_ref(), Field::End),
            (self.from.as_ref(), Field::Begin),
            (self.then.as_ref(), Field::Then),
        ];
        for (block, field) in blocks {
            let Some(block) = block else {
                continue;
            };
            for (raw, spec) in block.iter() {
                let name = camelize(raw);
                let is_transform = is_transform_property(&name);
                if is_transform && !self.caps.transforms {
                    log::debug!("transform property {name} dropped: driver has no transforms");
                    continue;
                }
                if STATIC_PROPERTIES.contains(&name.as_str()) {
                    let sp = static_props.entry(name).or_default();
                    let value = Some(spec.value.clone());
                    match field {
                        Field::End => {
                            sp.end = value.clone();
                            sp.then = value;
                            sp.mask |= MASK_END;
                        }
                        Field::Begin => {
                            sp.begin = value;
                            sp.mask |= MASK_BEGIN;
                        }
                        _ => {
                            sp.then = value;
                            sp.mask |= MASK_THEN;
                        }
                    }
                    continue;
                }
                let rec = table.entry(name).or_default();
                *rec.field_mut(field) = Some(spec.value.clone());
                rec.is_transform = is_transform;
                if self.caps.multi_easing && field != Field::Then && spec.easing.is_some() {
                    rec.easing = spec.easing.clone();
                }
            }
        }

        let mut data = TweenData {
            has_begin: table.values().any(|r| r.begin.is_some()),
            has_end: table.values().any(|r| r.end.is_some()),
            has_then: table.values().any(|r| r.then.is_some()),
            has_tween: !table.is_empty(),
            has_statics: !static_props.is_empty(),
            static_props,
            ..TweenData::default()
        };
        let table = sort_transforms(table);
        data.tables = match self.strategy {
            PlayheadStrategy::Emulated => vec![table; self.target.len()],
            PlayheadStrategy::Native => vec![table],
        };
        self.data = data;
    }

    /// Resolve static values per element, filling undeclared boundaries from the target.
    fn fetch_statics(&mut self) {
        let mut statics = Vec::with_capacity(self.target.len());
        for element in self.target.elements() {
            let mut sv = StaticValues::default();
            for (name, sp) in &self.data.static_props {
                let fill = sp.mask > 0 && sp.mask < MASK_ALL;
                let cur = || {
                    if fill {
                        self.driver.current_value(element, name)
                    } else {
                        None
                    }
                };
                let begin = sp.begin.clone().or_else(cur);
                let end = sp.end.clone().or_else(cur);
                let then = sp.then.clone().or_else(cur);
                let tween = [&begin, &end]
                    .into_iter()
                    .flatten()
                    .find(|v| !is_hidden(v))
                    .cloned();
                for (block, value) in [
                    (&mut sv.begin, begin),
                    (&mut sv.end, end),
                    (&mut sv.then, then),
                    (&mut sv.tween, tween),
                ] {
                    if let Some(v) = value {
                        block.insert(name.clone(), v, None);
                    }
                }
            }
            statics.push(sv);
        }
        self.data.statics = statics;
    }

    fn apply_statics(&mut self, slots: &[StaticSlot]) {
        if !self.data.has_statics {
            return;
        }
        for (i, sv) in self.data.statics.iter().enumerate() {
            let mut block = PropertyBlock::new();
            for slot in slots {
                block.extend(sv.slot(*slot));
            }
            if block.is_empty() {
                continue;
            }
            if let Some(target) = self.target.element(i) {
                self.driver.start(&target, &block, 0.0, &self.easing);
            }
        }
    }

    /// Remember what the target showed before the first `from` was applied.
    fn fetch_begin_pre(&mut self) {
        for i in 0..self.data.tables.len() {
            let element = self.table_element(i).map(str::to_owned);
            let values: Vec<_> = self.data.tables[i]
                .keys()
                .map(|name| self.current(element.as_deref(), name))
                .collect();
            for (rec, cur) in self.data.tables[i].values_mut().zip(values) {
                rec.pre = cur.clone();
                if rec.end.is_none() {
                    rec.end = cur;
                }
            }
        }
        self.data.has_pre = true;
    }

    /// Fill begin from the target; `overwrite` replaces declared values too.
    fn fetch_begin(&mut self, overwrite: bool) {
        for i in 0..self.data.tables.len() {
            let element = self.table_element(i).map(str::to_owned);
            let values: Vec<_> = self.data.tables[i]
                .keys()
                .map(|name| self.current(element.as_deref(), name))
                .collect();
            for (rec, cur) in self.data.tables[i].values_mut().zip(values) {
                if overwrite || rec.begin.is_none() {
                    rec.begin = cur.clone();
                }
                if rec.end.is_none() {
                    rec.end = cur;
                }
            }
        }
    }

    /// Apply one column instantly.
    fn set_column(&mut self, field: Field) {
        if field == Field::Begin && self.data.has_begin && !self.data.begin_ready {
            self.fetch_begin_pre();
        }
        for i in 0..self.data.tables.len() {
            if !has_column(&self.data.tables[i], field) {
                continue;
            }
            let values = column_values(&self.data.tables[i], field, false);
            let target = self.table_target(i);
            self.driver.start(&target, &values, 0.0, &self.easing);
        }
        match field {
            Field::Begin if !self.data.begin_ready => {
                self.fetch_begin(true);
                self.data.begin_ready = true;
            }
            Field::End => self.data.end_ready = true,
            Field::Then => self.data.then_ready = true,
            _ => {}
        }
    }

    fn stop_handles(&mut self) {
        for h in self.handles.drain(..) {
            self.driver.stop(h);
        }
    }
}

fn is_hidden(v: &PropertyValue) -> bool {
    matches!(v.as_str(), Some("none") | Some("hidden"))
}

/// Curve for the rest of a segment: mirrored when running backward, rebased on what is left.
pub(crate) fn real_easing(
    easing: &Easing,
    default: &str,
    local_fwd: bool,
    position: f64,
    duration: f64,
) -> Easing {
    let ctrl = easing
        .control_points()
        .or_else(|| {
            log::warn!("unknown easing {easing:?}, using {default}");
            named_easing(default)
        })
        .unwrap_or([0.25, 0.25, 0.75, 0.75]);
    let (ctrl, elapsed) = if local_fwd {
        (ctrl, position)
    } else {
        (reverse_bezier(ctrl), duration - position)
    };
    if duration > 0.0 {
        Easing::Bezier(rebase_bezier(ctrl, elapsed / duration))
    } else {
        Easing::Bezier(ctrl)
    }
}

impl Engine {
    fn tween_body(&mut self, id: NodeId) -> Option<&mut TweenBody> {
        self.node_mut(id).and_then(Node::tween_mut)
    }

    fn set_block(&mut self, id: NodeId, field: Field, values: PropertyBlock) -> Result<()> {
        let node = self.require_kind(id, NodeKind::Tween)?;
        if let Some(t) = node.tween_mut() {
            match field {
                Field::Begin => t.from = Some(values),
                Field::Then => t.then = Some(values),
                _ => t.to = Some(values),
            }
        }
        self.touch(id);
        Ok(())
    }

    /// Values to animate towards.
    pub fn to(&mut self, id: NodeId, values: PropertyBlock) -> Result<()> {
        self.set_block(id, Field::End, values)
    }

    /// Values to animate from, applied when the tween starts.
    pub fn from(&mut self, id: NodeId, values: PropertyBlock) -> Result<()> {
        self.set_block(id, Field::Begin, values)
    }

    pub fn from_to(&mut self, id: NodeId, from: PropertyBlock, to: PropertyBlock) -> Result<()> {
        self.set_block(id, Field::Begin, from)?;
        self.set_block(id, Field::End, to)
    }

    /// Values applied after forward completion.
    pub fn then(&mut self, id: NodeId, values: PropertyBlock) -> Result<()> {
        self.set_block(id, Field::Then, values)
    }

    /// Apply values immediately: a zero-duration `to`, played.
    pub fn set(&mut self, id: NodeId, values: PropertyBlock) -> Result<()> {
        self.set_block(id, Field::End, values)?;
        self.set_duration(id, 0.0)?;
        self.play(id);
        Ok(())
    }

    pub(crate) fn prepare_tween(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        if node.ready {
            return;
        }
        node.ready = true;
        if let Some(t) = node.tween_mut() {
            t.build();
            log::trace!(
                "tween {id} prepared: {} table(s), statics={}",
                t.data.tables.len(),
                t.data.has_statics
            );
        }
    }

    pub(crate) fn set_tween(&mut self, id: NodeId, field: Field) {
        if let Some(t) = self.tween_body(id) {
            t.set_column(field);
        }
    }

    fn apply_statics(&mut self, id: NodeId, slots: &[StaticSlot]) {
        if let Some(t) = self.tween_body(id) {
            t.apply_statics(slots);
        }
    }

    pub(crate) fn run_tween(&mut self, id: NodeId) {
        let now = self.ticker.now();
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let d = node.duration_ms();
        node.head.running = true;
        node.head.delay_dummy = None;
        if let Some(t) = node.tween_mut() {
            t.fetch_statics();
            t.apply_statics(&[StaticSlot::Tween]);
        }
        if d > 0.0 {
            self.start_progress(id);
        }
        log::debug!("tween {id} runs ({d}ms)");
        self.emit(id, Channel::BeginHook);
        if self.tween_body(id).is_some_and(|t| t.data.has_begin) {
            self.set_tween(id, Field::Begin);
        }
        if let Some(head) = self.head_mut(id) {
            head.start_time = now;
        }
        self.play_segment(id);
    }

    /// Start primitives for what is left of the current segment.
    pub(crate) fn play_segment(&mut self, id: NodeId) {
        let speed = self.real_speed_of(id);
        let default = self.cfg.default_easing.clone();
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let d = node.duration_ms();
        let local_fwd = node.head.local_fwd;
        let position = node.head.position;
        let real = node.head.remaining(d) / speed;
        let Some(t) = node.tween_mut() else {
            return;
        };
        let field = if local_fwd { Field::End } else { Field::Begin };
        if !t.data.begin_ready {
            t.fetch_begin(true);
            t.data.begin_ready = true;
        }

        let easing = real_easing(&t.easing, &default, local_fwd, position, d);
        for i in 0..t.data.tables.len() {
            let mut values = column_values(&t.data.tables[i], field, t.caps.multi_easing);
            values.map_easings(|e| real_easing(e, &default, local_fwd, position, d));
            let target = t.table_target(i);
            let h = t.driver.start(&target, &values, real, &easing);
            t.handles.push(h);
        }
        t.segment_speed = speed;
        t.segment_fwd = local_fwd;
        t.time_scale = 1.0;
        t.data.end_ready = true;

        log::trace!("tween {id} segment {real}ms (fwd={local_fwd})");
        if real > 0.0 {
            self.ticker
                .add_once(TickKey::Segment(id), real, id, Channel::EndHook);
        } else {
            self.emit(id, Channel::EndHook);
        }
    }

    pub(crate) fn pause_tween_segment(&mut self, id: NodeId) {
        self.ticker.remove(TickKey::Segment(id));
        let Some(t) = self.tween_body(id) else {
            return;
        };
        match t.strategy {
            PlayheadStrategy::Emulated => t.stop_handles(),
            PlayheadStrategy::Native => {
                for h in &t.handles {
                    t.driver.pause(*h);
                }
            }
        }
    }

    pub(crate) fn resume_tween_segment(&mut self, id: NodeId) {
        let speed = self.real_speed_of(id);
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let d = node.duration_ms();
        let local_fwd = node.head.local_fwd;
        let real = node.head.remaining(d) / speed;
        let Some(t) = node.tween_mut() else {
            return;
        };
        let in_place = t.strategy == PlayheadStrategy::Native
            && !t.handles.is_empty()
            && t.segment_fwd == local_fwd;
        if !in_place {
            t.stop_handles();
            self.play_segment(id);
            return;
        }

        for h in &t.handles {
            t.driver.resume(*h);
        }
        let factor = speed / t.segment_speed;
        if factor != t.time_scale {
            let handles = t.handles.clone();
            let scaled = handles
                .iter()
                .all(|h| t.driver.set_time_scale(*h, factor));
            if !scaled {
                log::debug!("tween {id}: driver cannot rescale, restarting segment");
                t.stop_handles();
                self.play_segment(id);
                return;
            }
            t.time_scale = factor;
        }
        if real > 0.0 {
            self.ticker
                .add_once(TickKey::Segment(id), real, id, Channel::EndHook);
        } else {
            self.emit(id, Channel::EndHook);
        }
    }

    /// Drop the primitives and the completion of the current segment.
    pub(crate) fn release_segment(&mut self, id: NodeId) {
        self.ticker.remove(TickKey::Segment(id));
        if let Some(t) = self.tween_body(id) {
            t.stop_handles();
        }
    }

    /// Snap to a boundary.
    pub(crate) fn back_tween_values(&mut self, id: NodeId, field: Field) {
        self.release_segment(id);
        if field != Field::Pre {
            self.set_tween(id, field);
        }
        self.post_tween(id, field);
    }

    /// Boundary values before a segment starts from its edge.
    pub(crate) fn pre_tween(&mut self, id: NodeId, fwd: bool) {
        let d = self.node(id).map_or(Span::ZERO, |n| n.duration);
        let Some(t) = self.tween_body(id) else {
            return;
        };
        let (field, slot) = if fwd {
            (Field::Begin, StaticSlot::Begin)
        } else {
            (Field::End, StaticSlot::End)
        };
        if t.data.has_statics && d > Span::ZERO {
            t.apply_statics(&[slot, StaticSlot::Tween]);
        }
        t.set_column(field);
    }

    /// Values after a segment completes at `field`.
    pub(crate) fn post_tween(&mut self, id: NodeId, field: Field) {
        let offset = self.head(id).map_or(0.0, |h| h.offset);
        let Some(t) = self.tween_body(id) else {
            return;
        };
        match field {
            Field::End | Field::Then => {
                if t.data.has_then {
                    t.set_column(Field::Then);
                }
                t.apply_statics(&[StaticSlot::End, StaticSlot::Then]);
            }
            Field::Begin | Field::Pre => {
                if t.data.has_pre && (field == Field::Pre || offset != 0.0) {
                    t.set_column(Field::Pre);
                }
                t.apply_statics(&[StaticSlot::Begin]);
            }
        }
    }

    pub(crate) fn tween_data(&self, id: NodeId) -> Option<&TweenData> {
        self.node(id).and_then(Node::tween).map(|t| &t.data)
    }
}
