#![allow(dead_code)]
//! Engine: node arena, driver registry, ticker and the public API.
//!
//! Methods:
//! - creation: tween, timeline, animate
//! - configuration setters (fail fast on bad ids) and queries (None for unknown ids)
//! - event registration and dispatch (core handlers first, then the user handler)
//! - named macros (see `macros`)
//! - clock: tick, run, now
//!
//! Playback controls live in `controls`, tween and timeline internals in their own modules.

use crate::config::Config;
use crate::driver::{Driver, DriverRegistry, Target};
use crate::easing::Easing;
use crate::error::{Result, TimelineError};
use crate::events::{Channel, CoreAction, CoreKey, EventName, Handler};
use crate::ids::{IdAllocator, NodeId};
use crate::macros::MacroRegistry;
use crate::node::{Body, Node, NodeKind};
use crate::options::{parse_loops, parse_speed, AnimOptions, SpeedValue};
use crate::playhead::{PlaybackState, Playhead};
use crate::ticker::{Clock, SystemClock, TickKey, Ticker};
use crate::time::{parse_time, round3, Span, TimeValue};
use crate::tween::TweenBody;
use hashbrown::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Owner of every animatable. Nodes refer to each other by [`NodeId`].
pub struct Engine {
    pub(crate) cfg: Config,
    pub(crate) ids: IdAllocator,
    pub(crate) nodes: HashMap<NodeId, Node>,
    drivers: DriverRegistry,
    pub(crate) macros: MacroRegistry,
    pub(crate) ticker: Ticker,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("cfg", &self.cfg)
            .field("nodes", &self.nodes.len())
            .field("drivers", &self.drivers.names())
            .field("macros", &self.macros.names())
            .field("ticking", &self.ticker.is_active())
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Engine {
    /// Engine on the wall clock with only the `null` driver registered.
    pub fn new(cfg: Config) -> Self {
        Self::with_parts(cfg, DriverRegistry::new(), Rc::new(SystemClock::new()))
    }

    pub fn with_clock(cfg: Config, clock: Rc<dyn Clock>) -> Self {
        Self::with_parts(cfg, DriverRegistry::new(), clock)
    }

    /// An invalid configuration is replaced by the defaults.
    pub fn with_parts(cfg: Config, drivers: DriverRegistry, clock: Rc<dyn Clock>) -> Self {
        let cfg = match cfg.validate() {
            Ok(()) => cfg,
            Err(e) => {
                log::warn!("{e}; using default configuration");
                Config::default()
            }
        };
        Self {
            cfg,
            ids: IdAllocator::new(),
            nodes: HashMap::new(),
            drivers,
            macros: MacroRegistry::new(),
            ticker: Ticker::new(clock),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Clock backends should sample; it stays pinned to the scheduled time while a tick
    /// replays overdue work.
    pub fn clock(&self) -> Rc<dyn Clock> {
        self.ticker.pinned_clock()
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    pub fn register_driver<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Driver> + 'static,
    {
        self.drivers.register(name, factory);
        self
    }

    // ---------------------------------------------------------------------
    // Arena helpers
    // ---------------------------------------------------------------------

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    #[inline]
    pub(crate) fn head(&self, id: NodeId) -> Option<&Playhead> {
        self.nodes.get(&id).map(|n| &n.head)
    }

    #[inline]
    pub(crate) fn head_mut(&mut self, id: NodeId) -> Option<&mut Playhead> {
        self.nodes.get_mut(&id).map(|n| &mut n.head)
    }

    pub(crate) fn kind_of(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(Node::kind)
    }

    fn require(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or(TimelineError::NodeNotFound { id })
    }

    pub(crate) fn require_kind(&mut self, id: NodeId, expected: NodeKind) -> Result<&mut Node> {
        let node = self.require(id)?;
        let actual = node.kind();
        if actual != expected {
            return Err(TimelineError::WrongNodeKind {
                id,
                expected: expected.name().into(),
                actual: actual.name().into(),
            });
        }
        Ok(node)
    }

    /// Milliseconds to the display unit, rounded to three decimals.
    #[inline]
    pub(crate) fn to_display(&self, ms: f64) -> f64 {
        round3(self.cfg.time_unit.from_ms(ms))
    }

    #[inline]
    pub(crate) fn parse_time(&self, value: &TimeValue) -> f64 {
        parse_time(value, self.cfg.time_unit)
    }

    /// Product of the speeds of a node and all its ancestors.
    pub(crate) fn real_speed_of(&self, id: NodeId) -> f64 {
        let mut speed = 1.0;
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(node) = self.nodes.get(&c) else {
                break;
            };
            speed *= node.speed;
            cur = node.parent;
        }
        speed
    }

    /// Mark a node and its ancestors as needing preparation. Fillers never invalidate.
    pub(crate) fn invalidate(&mut self, id: NodeId) {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(node) = self.nodes.get_mut(&c) else {
                break;
            };
            if node.kind() == NodeKind::Dummy {
                break;
            }
            node.ready = false;
            cur = node.parent;
        }
    }

    /// Invalidate unless already started.
    pub(crate) fn touch(&mut self, id: NodeId) {
        if self.head(id).is_some_and(|h| !h.running) {
            self.invalidate(id);
        }
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    fn insert_node(&mut self, duration: f64, body: Body) -> NodeId {
        let id = self.ids.alloc();
        let mut node = Node::new(id, duration, body);
        match node.kind() {
            NodeKind::Dummy => {
                for name in [EventName::End, EventName::Reverse] {
                    let ch = Channel::Event(name);
                    node.events
                        .set_core(ch, CoreKey::ResetPosition, CoreAction::ResetPosition);
                    node.events
                        .set_core(ch, CoreKey::Progress, CoreAction::StopProgress);
                }
            }
            _ => {
                node.events
                    .set_core(Channel::BeginHook, CoreKey::Lifecycle, CoreAction::TweenBegin);
                node.events
                    .set_core(Channel::EndHook, CoreKey::Lifecycle, CoreAction::TweenEnd);
                for name in [EventName::End, EventName::Reverse] {
                    node.events
                        .set_core(Channel::Event(name), CoreKey::Progress, CoreAction::StopProgress);
                }
            }
        }
        self.nodes.insert(id, node);
        id
    }

    /// New tween driven by the named backend.
    pub fn tween(&mut self, driver: &str) -> Result<NodeId> {
        let (backend, strategy) = self.drivers.create(driver)?;
        let easing = Easing::from(self.cfg.default_easing.clone());
        let body = TweenBody::new(backend, strategy, easing);
        let id = self.insert_node(self.cfg.default_duration_ms(), Body::Tween(Box::new(body)));
        log::debug!("tween {id} created on driver {driver} ({strategy:?})");
        Ok(id)
    }

    pub fn timeline(&mut self) -> NodeId {
        let id = self.insert_node(0.0, Body::Timeline(Box::default()));
        log::debug!("timeline {id} created");
        id
    }

    pub(crate) fn dummy(&mut self, parent: NodeId, duration: f64) -> NodeId {
        let id = self.insert_node(duration, Body::Dummy);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(parent);
            node.ready = true;
        }
        log::trace!("filler {id} ({duration}ms) for {parent}");
        id
    }

    /// Tween on the default driver configured from `options`, started unless `paused` is set.
    pub fn animate(&mut self, options: &AnimOptions) -> Result<NodeId> {
        let driver = self.cfg.default_driver.clone();
        let id = self.tween(&driver)?;
        self.set_options(id, options)?;
        if !options.paused.unwrap_or(false) {
            self.play(id);
        }
        Ok(id)
    }

    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------

    pub fn set_target(&mut self, id: NodeId, target: impl Into<Target>) -> Result<()> {
        let target = target.into();
        let node = self.require(id)?;
        match &mut node.body {
            Body::Tween(t) => t.target = target,
            Body::Timeline(t) => t.target = Some(target),
            Body::Dummy => {
                return Err(TimelineError::WrongNodeKind {
                    id,
                    expected: NodeKind::Tween.name().into(),
                    actual: NodeKind::Dummy.name().into(),
                })
            }
        }
        self.touch(id);
        Ok(())
    }

    /// Tween duration; timelines derive theirs from their children.
    pub fn set_duration(&mut self, id: NodeId, value: impl Into<TimeValue>) -> Result<()> {
        let ms = self.parse_time(&value.into());
        self.require_kind(id, NodeKind::Tween)?.duration = Span::Finite(ms);
        self.touch(id);
        Ok(())
    }

    pub fn set_delay(&mut self, id: NodeId, value: impl Into<TimeValue>) -> Result<()> {
        let ms = self.parse_time(&value.into());
        self.require(id)?.delay = ms;
        self.touch(id);
        Ok(())
    }

    /// Loop count; negative or infinite values loop forever.
    pub fn set_loops(&mut self, id: NodeId, value: f64) -> Result<()> {
        self.require(id)?.loops = parse_loops(value);
        self.touch(id);
        Ok(())
    }

    pub fn set_loops_delay(&mut self, id: NodeId, value: impl Into<TimeValue>) -> Result<()> {
        let ms = self.parse_time(&value.into());
        self.require(id)?.loops_delay = ms;
        self.touch(id);
        Ok(())
    }

    pub fn set_yoyo(&mut self, id: NodeId, value: bool) -> Result<()> {
        self.require(id)?.yoyo = value;
        self.touch(id);
        Ok(())
    }

    /// Invalid or non-positive speeds become 1. A playing node continues at the new speed.
    pub fn set_speed(&mut self, id: NodeId, value: impl Into<SpeedValue>) -> Result<()> {
        let speed = parse_speed(&value.into());
        self.require(id)?;
        self.change_speed(id, speed);
        Ok(())
    }

    pub fn set_easing(&mut self, id: NodeId, easing: impl Into<Easing>) -> Result<()> {
        let easing = easing.into();
        let node = self.require_kind(id, NodeKind::Tween)?;
        if let Some(t) = node.tween_mut() {
            t.easing = easing;
        }
        self.touch(id);
        Ok(())
    }

    /// Apply an options object. Timelines ignore the tween-only fields.
    pub fn set_options(&mut self, id: NodeId, options: &AnimOptions) -> Result<()> {
        let kind = self.require(id)?.kind();
        if let Some(v) = &options.delay {
            self.set_delay(id, v.clone())?;
        }
        if let Some(v) = options.loops {
            self.set_loops(id, v)?;
        }
        if let Some(v) = &options.loops_delay {
            self.set_loops_delay(id, v.clone())?;
        }
        if let Some(v) = options.yoyo {
            self.set_yoyo(id, v)?;
        }
        if let Some(v) = &options.target {
            self.set_target(id, v.clone())?;
        }
        if let Some(v) = &options.speed {
            self.set_speed(id, v.clone())?;
        }
        if kind != NodeKind::Tween {
            if options.has_tween_fields() {
                log::debug!("tween-only options ignored on {kind} {id}");
            }
            return Ok(());
        }
        if let Some(v) = &options.easing {
            self.set_easing(id, v.clone())?;
        }
        if let Some(v) = &options.duration {
            self.set_duration(id, v.clone())?;
        }
        if let Some(t) = self.node_mut(id).and_then(Node::tween_mut) {
            if let Some(v) = &options.from {
                t.from = Some(v.clone());
            }
            if let Some(v) = &options.to {
                t.to = Some(v.clone());
            }
            if let Some(v) = &options.then {
                t.then = Some(v.clone());
            }
        }
        self.touch(id);
        Ok(())
    }

    pub fn set_options_json(&mut self, id: NodeId, value: &serde_json::Value) -> Result<()> {
        let options = AnimOptions::from_json(value)?;
        self.set_options(id, &options)
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// Register the handler for an event name or alias, replacing any previous one.
    /// Unknown names are ignored and return false.
    pub fn on<F>(&mut self, id: NodeId, event: &str, handler: F) -> bool
    where
        F: FnMut(&mut Engine, NodeId) + 'static,
    {
        let Some(name) = EventName::from_alias(event) else {
            log::warn!("unknown event {event:?} ignored on {id}");
            return false;
        };
        let Some(node) = self.nodes.get_mut(&id) else {
            log::warn!("on({event}) for unknown node {id}");
            return false;
        };
        node.events.set_user(name, Box::new(handler) as Handler);
        if name == EventName::Progress && !node.head.paused && node.head.running {
            self.start_progress(id);
        }
        true
    }

    /// Clear the user handler of an event.
    pub fn off(&mut self, id: NodeId, event: &str) -> bool {
        let Some(name) = EventName::from_alias(event) else {
            log::warn!("unknown event {event:?} ignored on {id}");
            return false;
        };
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.events.clear_user(name);
                true
            }
            None => false,
        }
    }

    pub(crate) fn has_handlers(&self, id: NodeId, channel: Channel) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|n| n.events.has_handlers(channel))
    }

    /// Run the core handlers of a channel in order, then the user handler.
    pub(crate) fn emit(&mut self, id: NodeId, channel: Channel) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let actions = node.events.core_actions(channel);
        for action in actions {
            self.apply_core(id, action);
        }
        if let Channel::Event(name) = channel {
            self.run_user_handler(id, name);
        }
    }

    fn run_user_handler(&mut self, id: NodeId, name: EventName) {
        let Some((mut handler, generation)) = self
            .nodes
            .get_mut(&id)
            .and_then(|n| n.events.take_user(name))
        else {
            return;
        };
        handler(self, id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.events.restore_user(name, handler, generation);
        }
    }

    fn apply_core(&mut self, source: NodeId, action: CoreAction) {
        match action {
            CoreAction::TweenBegin => self.on_tween_begin(source),
            CoreAction::TweenEnd => {
                self.release_segment(source);
                self.on_tween_end(source);
            }
            CoreAction::StopProgress => self.stop_progress(source),
            CoreAction::ResetPosition => {
                if let Some(node) = self.nodes.get_mut(&source) {
                    let d = node.duration_ms();
                    node.head.reset_position(d);
                }
            }
            CoreAction::ChildDone {
                timeline,
                dir,
                time,
                is_key,
            } => self.child_done(timeline, dir, time, Some(source), is_key),
            CoreAction::DelayElapsed { owner, then } => self.delay_elapsed(owner, source, then),
            CoreAction::ForwardProgress { owner } => {
                self.emit(owner, Channel::Event(EventName::Progress))
            }
        }
    }

    // ---------------------------------------------------------------------
    // Preparation and teardown
    // ---------------------------------------------------------------------

    /// Resolve derived state if needed. Returns the total duration in milliseconds.
    pub(crate) fn prepare_node(&mut self, id: NodeId) -> Span {
        match self.kind_of(id) {
            Some(NodeKind::Tween) => self.prepare_tween(id),
            Some(NodeKind::Timeline) => self.prepare_timeline(id),
            _ => {}
        }
        self.node(id).map_or(Span::ZERO, Node::total_duration)
    }

    /// Prepare a tween or timeline now. Returns its total duration in the display unit.
    pub fn prepare(&mut self, id: NodeId) -> Option<Span> {
        self.node(id)?;
        let total = self.prepare_node(id);
        Some(total.to_unit(self.cfg.time_unit))
    }

    /// Release a node: cancels its scheduled work, detaches it from its parent and, for a
    /// timeline, detaches its children.
    pub fn destroy(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            log::warn!("destroy of unknown node {id}");
            return;
        };
        let parent = node.parent;
        if let Some(dummy) = node.head.delay_dummy {
            self.remove_dummy(dummy);
        }
        self.release_segment(id);
        self.ticker.remove_node(id);

        if let Some(p) = parent {
            if let Some(t) = self.node_mut(p).and_then(Node::timeline_mut) {
                t.detach(id);
                self.invalidate(p);
            }
        }
        if let Some(mut node) = self.nodes.remove(&id) {
            if let Body::Timeline(t) = &mut node.body {
                for dummy in t.dummies.drain(..) {
                    self.ticker.remove_node(dummy);
                    self.nodes.remove(&dummy);
                }
                for child in t.child_nodes() {
                    if let Some(c) = self.nodes.get_mut(&child) {
                        c.parent = None;
                        c.ready = false;
                        for name in [EventName::End, EventName::Reverse] {
                            c.events.unset_core(Channel::Event(name), CoreKey::Timeline);
                        }
                    }
                }
            }
        }
        log::debug!("node {id} destroyed");
    }

    pub(crate) fn remove_dummy(&mut self, id: NodeId) {
        if self.kind_of(id) == Some(NodeKind::Dummy) {
            self.ticker.remove_node(id);
            self.nodes.remove(&id);
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.kind_of(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Current playhead position in the display unit.
    pub fn time(&self, id: NodeId) -> Option<f64> {
        let node = self.node(id)?;
        let pos = node
            .head
            .virtual_position(self.ticker.now(), self.real_speed_of(id));
        Some(self.to_display(pos))
    }

    /// Position over duration, clamped to [0, 1]. Zero-length nodes report 1 once completed.
    pub fn progress(&self, id: NodeId) -> Option<f64> {
        let node = self.node(id)?;
        let p = match node.duration {
            Span::Infinite => 0.0,
            Span::Finite(d) if d <= 0.0 => {
                if node.head.play_allowed {
                    0.0
                } else {
                    1.0
                }
            }
            Span::Finite(d) => {
                let pos = node
                    .head
                    .virtual_position(self.ticker.now(), self.real_speed_of(id));
                (pos / d).clamp(0.0, 1.0)
            }
        };
        Some(round3(p))
    }

    /// Own duration in the display unit. For timelines it is current after `prepare`.
    pub fn duration(&self, id: NodeId) -> Option<Span> {
        Some(self.node(id)?.duration.to_unit(self.cfg.time_unit))
    }

    /// Duration including loops and loops delays, divided by speed. Prepares the node first.
    pub fn total_duration(&mut self, id: NodeId) -> Option<Span> {
        self.prepare(id)
    }

    pub fn delay(&self, id: NodeId) -> Option<f64> {
        Some(self.to_display(self.node(id)?.delay))
    }

    pub fn loops(&self, id: NodeId) -> Option<i32> {
        Some(self.node(id)?.loops)
    }

    pub fn loops_delay(&self, id: NodeId) -> Option<f64> {
        Some(self.to_display(self.node(id)?.loops_delay))
    }

    pub fn yoyo(&self, id: NodeId) -> Option<bool> {
        Some(self.node(id)?.yoyo)
    }

    pub fn speed(&self, id: NodeId) -> Option<f64> {
        Some(self.node(id)?.speed)
    }

    pub fn real_speed(&self, id: NodeId) -> Option<f64> {
        self.node(id)?;
        Some(self.real_speed_of(id))
    }

    pub fn is_paused(&self, id: NodeId) -> Option<bool> {
        Some(self.head(id)?.paused)
    }

    pub fn is_reversed(&self, id: NodeId) -> Option<bool> {
        Some(!self.head(id)?.fwd)
    }

    pub fn is_running(&self, id: NodeId) -> Option<bool> {
        Some(self.head(id)?.running)
    }

    pub fn state(&self, id: NodeId) -> Option<PlaybackState> {
        Some(self.head(id)?.state())
    }

    // ---------------------------------------------------------------------
    // Clock
    // ---------------------------------------------------------------------

    /// Current time of the engine clock in milliseconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.ticker.now()
    }

    #[inline]
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_active()
    }

    /// Fire everything due up to the clock's current time, in due order, then the per-frame
    /// work. Returns whether work remains scheduled.
    pub fn tick(&mut self) -> bool {
        let target = self.ticker.clock_now();
        while let Some((due, entry)) = self.ticker.pop_due(target) {
            self.ticker.set_cursor(Some(due));
            log::trace!("tick {:?} at {due}", entry.key);
            self.emit(entry.node, entry.channel);
        }
        self.ticker.set_cursor(None);
        for entry in self.ticker.every_frame() {
            if self.ticker.is_live(&entry) {
                self.emit(entry.node, entry.channel);
            }
        }
        self.ticker.is_active()
    }

    /// Block, ticking every `frame_interval_ms` (or sooner when work is due), until idle.
    pub fn run(&mut self) {
        let frame = self.cfg.frame_interval_ms as f64;
        while self.tick() {
            let has_frames = !self.ticker.every_frame().is_empty();
            let wait = match self.ticker.next_due_in() {
                Some(d) if !has_frames => d.min(frame),
                _ => frame,
            };
            std::thread::sleep(Duration::from_secs_f64(wait.max(1.0) / 1000.0));
        }
    }

    pub(crate) fn start_progress(&mut self, id: NodeId) {
        let ch = Channel::Event(EventName::Progress);
        if self.has_handlers(id, ch) {
            self.ticker.add_every_frame(TickKey::Progress(id), id, ch);
        }
    }

    pub(crate) fn stop_progress(&mut self, id: NodeId) {
        self.ticker.remove(TickKey::Progress(id));
    }
}
