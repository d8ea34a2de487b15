//! Playback controls and the emulated playhead.
//!
//! Every control is a no-op when its gate does not hold: `play` needs forward motion to be
//! allowed, `reverse` backward motion, `resume` a paused node whose requested direction is
//! allowed. Delays and loops delays are emulated by filler nodes parented to their owner, so
//! they follow the owner's effective speed and direction.

use crate::engine::Engine;
use crate::events::{AfterDelay, Channel, CoreAction, CoreKey, EventName};
use crate::ids::NodeId;
use crate::node::NodeKind;
use crate::property::Field;
use crate::ticker::TickKey;

impl Engine {
    /// Play forward from the current position.
    pub fn play(&mut self, id: NodeId) {
        let Some(head) = self.head_mut(id) else {
            log::warn!("play: unknown node {id}");
            return;
        };
        if !head.play_allowed {
            return;
        }
        head.reverse_allowed = true;
        if !head.fwd {
            self.pause(id);
            self.swap_dir(id);
        }
        self.resume(id);
    }

    /// Play backward from the current position.
    pub fn reverse(&mut self, id: NodeId) {
        let Some(head) = self.head_mut(id) else {
            log::warn!("reverse: unknown node {id}");
            return;
        };
        if !head.reverse_allowed {
            return;
        }
        head.play_allowed = true;
        if head.fwd {
            self.pause(id);
            self.swap_dir(id);
        }
        self.resume(id);
    }

    pub fn pause(&mut self, id: NodeId) {
        match self.kind_of(id) {
            Some(NodeKind::Dummy) => self.pause_dummy(id),
            Some(_) => self.pause_animatable(id),
            None => log::warn!("pause: unknown node {id}"),
        }
    }

    /// Continue in the current direction.
    pub fn resume(&mut self, id: NodeId) {
        match self.kind_of(id) {
            Some(NodeKind::Dummy) => self.resume_dummy(id),
            Some(_) => self.resume_animatable(id),
            None => log::warn!("resume: unknown node {id}"),
        }
    }

    /// Jump to the forward start with fresh loop counters and play.
    pub fn restart(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else {
            log::warn!("restart: unknown node {id}");
            return;
        };
        if let Some(t) = node.timeline_mut() {
            t.clear_pending_key();
        }
        self.pause(id);
        self.drop_delay(id);
        self.set_dir(id, true);
        self.back_inner(id);
        self.resume(id);
    }

    /// Pause and snap to the boundary of the current direction.
    pub fn back(&mut self, id: NodeId) {
        if !self.contains(id) {
            log::warn!("back: unknown node {id}");
            return;
        }
        self.pause(id);
        self.back_inner(id);
    }

    pub(crate) fn back_inner(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let fwd = node.head.fwd;
        if node.loops != 0 {
            if fwd {
                node.head.loops_count = 0;
            } else if node.loops != -1 {
                node.head.loops_count = node.loops;
            }
        }
        let running = node.head.running;
        if running {
            self.back_position(id);
        }
        if let Some(head) = self.head_mut(id) {
            head.play_allowed = fwd;
            head.reverse_allowed = !fwd;
        }
    }

    /// Move to the start of the local direction and re-apply the matching boundary values.
    pub(crate) fn back_position(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let d = node.duration_ms();
        let head = &mut node.head;
        head.position = if head.local_fwd { 0.0 } else { d };
        let field = if !head.local_fwd {
            Field::End
        } else if head.offset != 0.0 && node.tween().is_some_and(|t| t.data.has_pre) {
            Field::Pre
        } else {
            Field::Begin
        };
        if node.head.running {
            self.drop_delay(id);
            self.back_tween(id, field);
        }
    }

    pub(crate) fn change_speed(&mut self, id: NodeId, speed: f64) {
        let Some(node) = self.node(id) else {
            return;
        };
        let running = node.head.running;
        let playing = !node.head.paused;
        let changed = node.speed != speed;
        if !running {
            self.invalidate(id);
        }
        if !changed {
            return;
        }
        if playing {
            self.pause(id);
        }
        if let Some(node) = self.node_mut(id) {
            node.speed = speed;
        }
        if playing {
            self.resume(id);
        }
    }

    // ---------------------------------------------------------------------
    // Tweens and timelines
    // ---------------------------------------------------------------------

    fn pause_animatable(&mut self, id: NodeId) {
        let now = self.ticker.now();
        let speed = self.real_speed_of(id);
        let Some(node) = self.node(id) else {
            return;
        };
        if !node.ready {
            return;
        }
        self.stop_progress(id);
        let Some(node) = self.node_mut(id) else {
            return;
        };
        if let Some(dummy) = node.head.delay_dummy {
            node.head.paused = true;
            self.pause_dummy(dummy);
            return;
        }
        if node.head.paused {
            return;
        }
        let d = node.duration_ms();
        node.head.paused = true;
        node.head.fold_elapsed(now, speed);
        node.head.position = node.head.position.clamp(0.0, d);
        log::debug!("{} {id} paused at {}", node.kind(), node.head.position);
        self.pause_tween(id);
    }

    fn resume_animatable(&mut self, id: NodeId) {
        let Some(head) = self.head_mut(id) else {
            return;
        };
        if !(head.paused && head.direction_allowed()) {
            return;
        }
        head.paused = false;
        self.prepare_node(id);

        let now = self.ticker.now();
        let Some(node) = self.node_mut(id) else {
            return;
        };
        if let Some(dummy) = node.head.delay_dummy {
            self.resume_dummy(dummy);
            return;
        }
        let d = node.duration_ms();
        let head = &mut node.head;
        head.start_time = now;
        if d > 0.0 {
            head.play_allowed = true;
            head.reverse_allowed = true;
        }
        if head.running {
            let at_start = head.at_segment_start(d);
            let local_fwd = head.local_fwd;
            let is_tween = node.kind() == NodeKind::Tween;
            if d > 0.0 {
                self.start_progress(id);
            }
            self.emit(id, Channel::BeginHook);
            if is_tween && at_start {
                self.pre_tween(id, local_fwd);
            }
            self.resume_tween(id);
        } else {
            head.loops_count = 0;
            let delay = node.delay;
            if delay > 0.0 {
                self.emulate_delay(id, delay, AfterDelay::Run, None);
            } else {
                self.run_node(id);
            }
        }
    }

    /// First real start, after any initial delay.
    pub(crate) fn run_node(&mut self, id: NodeId) {
        match self.kind_of(id) {
            Some(NodeKind::Tween) => self.run_tween(id),
            Some(NodeKind::Timeline) => self.run_timeline(id),
            _ => {}
        }
    }

    pub(crate) fn pause_tween(&mut self, id: NodeId) {
        match self.kind_of(id) {
            Some(NodeKind::Tween) => self.pause_tween_segment(id),
            Some(NodeKind::Timeline) => self.pause_timeline_children(id),
            _ => {}
        }
    }

    pub(crate) fn resume_tween(&mut self, id: NodeId) {
        match self.kind_of(id) {
            Some(NodeKind::Tween) => self.resume_tween_segment(id),
            Some(NodeKind::Timeline) => self.resume_timeline_children(id),
            _ => {}
        }
    }

    pub(crate) fn back_tween(&mut self, id: NodeId, field: Field) {
        match self.kind_of(id) {
            Some(NodeKind::Tween) => self.back_tween_values(id, field),
            Some(NodeKind::Timeline) => self.back_timeline_children(id),
            _ => {}
        }
    }

    pub(crate) fn on_tween_begin(&mut self, id: NodeId) {
        let Some(head) = self.head(id) else {
            return;
        };
        if head.position == 0.0 && head.local_fwd && head.loops_count == 0 {
            log::debug!("node {id} begins");
            self.emit(id, Channel::Event(EventName::Begin));
        }
    }

    /// A play segment finished: complete, or loop.
    pub(crate) fn on_tween_end(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let d = node.duration_ms();
        node.head.reset_position(d);
        let fwd = node.head.fwd;
        let count = node.head.loops_count;
        let loops = node.loops;
        // a zero-length endless loop would never yield
        let degenerate = loops < 0 && d == 0.0 && node.loops_delay == 0.0;

        if fwd && (count == loops || degenerate) {
            self.post_tween(id, Field::End);
            self.set_local_dir(id, true);
            if let Some(head) = self.head_mut(id) {
                head.play_allowed = false;
                head.position = d;
                head.time_override = Some(d);
            }
            log::debug!("node {id} ended");
            self.emit(id, Channel::Event(EventName::End));
            if let Some(head) = self.head_mut(id) {
                head.time_override = None;
            }
        } else if !fwd && count == 0 {
            self.post_tween(id, Field::Begin);
            self.set_local_dir(id, false);
            if let Some(head) = self.head_mut(id) {
                head.reverse_allowed = false;
                head.position = 0.0;
                head.time_override = Some(0.0);
            }
            log::debug!("node {id} rewound");
            self.emit(id, Channel::Event(EventName::Reverse));
            if let Some(head) = self.head_mut(id) {
                head.time_override = None;
            }
        } else if loops != 0 {
            self.loop_check(id);
        }
    }

    fn loop_check(&mut self, id: NodeId) {
        self.drop_delay(id);
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let fwd = node.head.fwd;
        let yoyo = node.yoyo;
        let loops_delay = node.loops_delay;
        if fwd {
            node.head.loops_count = node.head.loops_count.saturating_add(1);
        } else {
            if yoyo {
                self.swap_local_dir(id);
            }
            self.emit(id, Channel::Event(EventName::Loop));
        }
        log::debug!("node {id} loops");

        if loops_delay > 0.0 {
            if !fwd && !yoyo {
                self.back_position(id);
            }
            if let Some(head) = self.head_mut(id) {
                head.paused = false;
            }
            self.emulate_delay(id, loops_delay, AfterDelay::LoopFwd, Some(AfterDelay::LoopRev));
        } else if fwd {
            self.loop_fwd(id);
        } else {
            self.loop_rev(id);
        }
    }

    fn loop_fwd(&mut self, id: NodeId) {
        self.emit(id, Channel::Event(EventName::Loop));
        if self.node(id).is_some_and(|n| n.yoyo) {
            self.swap_local_dir(id);
        }
        self.restart_inner(id);
    }

    fn loop_rev(&mut self, id: NodeId) {
        if let Some(head) = self.head_mut(id) {
            head.loops_count = head.loops_count.saturating_sub(1).max(0);
        }
        self.restart_inner(id);
    }

    fn restart_inner(&mut self, id: NodeId) {
        self.drop_delay(id);
        self.pause(id);
        self.back_position(id);
        self.resume(id);
    }

    // ---------------------------------------------------------------------
    // Delays
    // ---------------------------------------------------------------------

    /// Wait `delay` ms on a filler, then continue with `then` (or `reverse` when the owner
    /// turns around during a loops delay).
    pub(crate) fn emulate_delay(
        &mut self,
        owner: NodeId,
        delay: f64,
        then: AfterDelay,
        reverse: Option<AfterDelay>,
    ) {
        let Some(fwd) = self.head(owner).map(|h| h.fwd) else {
            return;
        };
        let has_progress = self.has_handlers(owner, Channel::Event(EventName::Progress));
        let dummy = self.dummy(owner, delay);
        if let Some(head) = self.head_mut(owner) {
            head.delay_dummy = Some(dummy);
        }
        let Some(node) = self.node_mut(dummy) else {
            return;
        };
        node.events.set_core(
            Channel::Event(EventName::End),
            CoreKey::Delay,
            CoreAction::DelayElapsed { owner, then },
        );
        node.events.set_core(
            Channel::Event(EventName::Reverse),
            CoreKey::Delay,
            CoreAction::DelayElapsed {
                owner,
                then: reverse.unwrap_or(AfterDelay::Rewind),
            },
        );
        if reverse.is_some() {
            let head = &mut node.head;
            head.position = if fwd { 0.0 } else { delay };
            head.play_allowed = head.position < delay;
            head.reverse_allowed = head.position > 0.0;
            if has_progress {
                node.events.set_core(
                    Channel::Event(EventName::Progress),
                    CoreKey::Progress,
                    CoreAction::ForwardProgress { owner },
                );
            }
        }
        log::trace!("node {owner} waits {delay}ms on {dummy}");
        if fwd || reverse.is_none() {
            self.play(dummy);
        } else {
            self.reverse(dummy);
        }
    }

    pub(crate) fn delay_elapsed(&mut self, owner: NodeId, dummy: NodeId, then: AfterDelay) {
        if let Some(head) = self.head_mut(owner) {
            if head.delay_dummy == Some(dummy) {
                head.delay_dummy = None;
            }
        }
        self.remove_dummy(dummy);
        if !self.contains(owner) {
            return;
        }
        match then {
            AfterDelay::Run => self.run_node(owner),
            AfterDelay::LoopFwd => self.loop_fwd(owner),
            AfterDelay::LoopRev => self.loop_rev(owner),
            AfterDelay::Rewind => {
                if let Some(head) = self.head_mut(owner) {
                    head.paused = true;
                    head.position = 0.0;
                    head.play_allowed = true;
                    head.reverse_allowed = false;
                }
            }
        }
    }

    /// Cancel a pending delay filler.
    pub(crate) fn drop_delay(&mut self, id: NodeId) {
        let Some(dummy) = self.head_mut(id).and_then(|h| h.delay_dummy.take()) else {
            return;
        };
        self.remove_dummy(dummy);
    }

    // ---------------------------------------------------------------------
    // Fillers
    // ---------------------------------------------------------------------

    fn pause_dummy(&mut self, id: NodeId) {
        let now = self.ticker.now();
        let speed = self.real_speed_of(id);
        let Some(head) = self.head(id) else {
            return;
        };
        if head.paused {
            return;
        }
        self.stop_progress(id);
        self.ticker.remove(TickKey::Segment(id));
        if let Some(node) = self.node_mut(id) {
            let d = node.duration_ms();
            node.head.paused = true;
            node.head.fold_elapsed(now, speed);
            node.head.position = node.head.position.clamp(0.0, d);
        }
    }

    fn resume_dummy(&mut self, id: NodeId) {
        let now = self.ticker.now();
        let speed = self.real_speed_of(id);
        let Some(node) = self.node_mut(id) else {
            return;
        };
        if !node.head.paused {
            return;
        }
        let d = node.duration_ms();
        let head = &mut node.head;
        head.running = true;
        head.paused = false;
        let local_fwd = head.local_fwd;
        let begins = local_fwd && head.position == 0.0;
        let real = head.remaining(d) / speed;
        head.start_time = now;
        if begins {
            self.emit(id, Channel::Event(EventName::Begin));
        }
        let done = Channel::Event(if local_fwd {
            EventName::End
        } else {
            EventName::Reverse
        });
        if real <= 0.0 {
            self.emit(id, done);
        } else {
            self.ticker.add_once(TickKey::Segment(id), real, id, done);
            self.start_progress(id);
        }
    }

    // ---------------------------------------------------------------------
    // Direction
    // ---------------------------------------------------------------------

    pub(crate) fn set_dir(&mut self, id: NodeId, fwd: bool) {
        if let Some(head) = self.head_mut(id) {
            head.fwd = fwd;
        }
        self.set_local_dir(id, fwd);
    }

    pub(crate) fn swap_dir(&mut self, id: NodeId) {
        if let Some(head) = self.head_mut(id) {
            head.fwd = !head.fwd;
        }
        self.swap_local_dir(id);
    }

    /// Set the segment direction, carrying it to a pending delay and to timeline children.
    pub(crate) fn set_local_dir(&mut self, id: NodeId, fwd: bool) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        node.head.local_fwd = fwd;
        let dummy = node.head.delay_dummy;
        let children = node
            .timeline()
            .map(|t| t.children_list.clone())
            .unwrap_or_default();
        if let Some(d) = dummy {
            self.set_dir(d, fwd);
        }
        for child in children {
            self.set_dir(child, fwd);
        }
    }

    pub(crate) fn swap_local_dir(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        node.head.local_fwd = !node.head.local_fwd;
        let dummy = node.head.delay_dummy;
        let children = node
            .timeline()
            .map(|t| t.children_list.clone())
            .unwrap_or_default();
        if let Some(d) = dummy {
            self.swap_dir(d);
        }
        for child in children {
            self.swap_dir(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::driver::memory::{DriverCall, MemoryDriver, Scene};
    use crate::engine::Engine;
    use crate::playhead::PlaybackState;
    use crate::property::PropertyBlock;
    use crate::ticker::ManualClock;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn approx(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    fn setup() -> (ManualClock, Engine) {
        let clock = ManualClock::new();
        let engine = Engine::with_clock(Config::default(), Rc::new(clock.clone()));
        (clock, engine)
    }

    fn record(engine: &mut Engine, id: crate::NodeId) -> Rc<RefCell<Vec<&'static str>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["begin", "end", "reverse", "loop"] {
            let l = log.clone();
            engine.on(id, name, move |_, _| l.borrow_mut().push(name));
        }
        log
    }

    #[test]
    fn play_runs_to_completion() {
        let (clock, mut engine) = setup();
        let tw = engine.tween("null").unwrap();
        engine.set_duration(tw, 1000.0).unwrap();
        let log = record(&mut engine, tw);
        engine.play(tw);
        assert_eq!(*log.borrow(), vec!["begin"]);
        assert_eq!(engine.state(tw), Some(PlaybackState::Playing));

        clock.advance(400.0);
        engine.tick();
        approx(engine.time(tw).unwrap(), 400.0, 1e-9);
        clock.advance(700.0);
        assert!(!engine.tick());
        assert_eq!(*log.borrow(), vec!["begin", "end"]);
        assert_eq!(engine.time(tw), Some(1000.0));
        assert_eq!(engine.progress(tw), Some(1.0));
        assert_eq!(engine.state(tw), Some(PlaybackState::Ended));

        // forward motion is disabled until back/restart
        engine.play(tw);
        assert_eq!(engine.is_paused(tw), Some(true));
    }

    #[test]
    fn reverse_before_start_leaves_the_backend_alone() {
        let (_clock, mut engine) = setup();
        let scene = Scene::new(engine.clock());
        let s = scene.clone();
        engine.register_driver("memory", move || Box::new(MemoryDriver::new(s.clone())));
        let tw = engine.tween("memory").unwrap();
        engine.set_target(tw, "box").unwrap();
        engine.set_duration(tw, 1000.0).unwrap();
        engine
            .to(tw, PropertyBlock::new().with("left", 100.0))
            .unwrap();
        let tl = engine.timeline();
        let child = engine.tween("memory").unwrap();
        engine.set_target(child, "box").unwrap();
        engine.add(tl, child, None::<f64>).unwrap();

        engine.reverse(tw);
        engine.reverse(tl);
        assert!(scene.borrow().calls().is_empty());
        assert_eq!(scene.borrow().live_primitives(), 0);
        assert_eq!(engine.is_paused(tw), Some(true));
        assert_eq!(engine.is_reversed(tw), Some(false));

        engine.play(tw);
        assert!(scene
            .borrow()
            .calls()
            .iter()
            .any(|c| matches!(c, DriverCall::Start { .. })));
    }

    #[test]
    fn reverse_is_gated_until_started() {
        let (clock, mut engine) = setup();
        let tw = engine.tween("null").unwrap();
        engine.set_duration(tw, 1000.0).unwrap();
        let log = record(&mut engine, tw);
        engine.reverse(tw);
        assert_eq!(engine.is_paused(tw), Some(true));

        engine.play(tw);
        clock.advance(600.0);
        engine.tick();
        engine.reverse(tw);
        assert_eq!(engine.is_reversed(tw), Some(true));
        approx(engine.time(tw).unwrap(), 600.0, 1e-9);
        clock.advance(600.0);
        engine.tick();
        assert_eq!(*log.borrow(), vec!["begin", "reverse"]);
        assert_eq!(engine.time(tw), Some(0.0));
        assert_eq!(engine.state(tw), Some(PlaybackState::Rewound));
        engine.reverse(tw);
        assert_eq!(engine.is_paused(tw), Some(true));
    }

    #[test]
    fn pause_and_resume_conserve_position() {
        let (clock, mut engine) = setup();
        let tw = engine.tween("null").unwrap();
        engine.set_duration(tw, 1000.0).unwrap();
        engine.play(tw);
        clock.advance(300.0);
        engine.pause(tw);
        clock.advance(5000.0);
        assert!(!engine.tick());
        approx(engine.time(tw).unwrap(), 300.0, 1e-9);
        engine.resume(tw);
        clock.advance(200.0);
        engine.tick();
        approx(engine.time(tw).unwrap(), 500.0, 1e-9);
        clock.advance(500.0);
        engine.tick();
        assert_eq!(engine.state(tw), Some(PlaybackState::Ended));
    }

    #[test]
    fn loops_with_yoyo_fire_in_order() {
        let (clock, mut engine) = setup();
        let tw = engine.tween("null").unwrap();
        engine.set_duration(tw, 100.0).unwrap();
        engine.set_loops(tw, 3.0).unwrap();
        engine.set_yoyo(tw, true).unwrap();
        let log = record(&mut engine, tw);
        engine.play(tw);
        for _ in 0..10 {
            clock.advance(50.0);
            engine.tick();
        }
        assert_eq!(*log.borrow(), vec!["begin", "loop", "loop", "loop", "end"]);
        assert_eq!(engine.progress(tw), Some(1.0));
        assert_eq!(engine.is_reversed(tw), Some(false));
    }

    #[test]
    fn delay_and_loops_delay_use_fillers() {
        let (clock, mut engine) = setup();
        let tw = engine.tween("null").unwrap();
        engine.set_duration(tw, 100.0).unwrap();
        engine.set_delay(tw, 50.0).unwrap();
        engine.set_loops(tw, 1.0).unwrap();
        engine.set_loops_delay(tw, 30.0).unwrap();
        assert_eq!(engine.total_duration(tw), Some(crate::Span::Finite(230.0)));
        let log = record(&mut engine, tw);
        engine.play(tw);
        assert_eq!(engine.state(tw), Some(PlaybackState::Delayed));
        clock.advance(49.0);
        engine.tick();
        assert!(log.borrow().is_empty());
        clock.advance(1.0);
        engine.tick();
        assert_eq!(*log.borrow(), vec!["begin"]);
        clock.advance(100.0);
        engine.tick();
        assert_eq!(engine.state(tw), Some(PlaybackState::Delayed));
        clock.advance(30.0);
        engine.tick();
        assert_eq!(*log.borrow(), vec!["begin", "loop"]);
        clock.advance(100.0);
        engine.tick();
        assert_eq!(*log.borrow(), vec!["begin", "loop", "end"]);
        assert!(!engine.is_ticking());
    }

    #[test]
    fn speed_scales_segments_and_delays() {
        let (clock, mut engine) = setup();
        let tw = engine.tween("null").unwrap();
        engine.set_duration(tw, 1000.0).unwrap();
        engine.set_delay(tw, 200.0).unwrap();
        engine.set_speed(tw, 2.0).unwrap();
        engine.play(tw);
        clock.advance(100.0);
        engine.tick();
        assert_eq!(engine.state(tw), Some(PlaybackState::Playing));
        clock.advance(250.0);
        engine.tick();
        approx(engine.time(tw).unwrap(), 500.0, 1e-9);
        engine.set_speed(tw, "half").unwrap();
        clock.advance(500.0);
        engine.tick();
        approx(engine.time(tw).unwrap(), 750.0, 1e-9);
        clock.advance(500.0);
        engine.tick();
        assert_eq!(engine.state(tw), Some(PlaybackState::Ended));
    }

    #[test]
    fn restart_from_end_handler() {
        let (clock, mut engine) = setup();
        let tw = engine.tween("null").unwrap();
        engine.set_duration(tw, 100.0).unwrap();
        let runs = Rc::new(RefCell::new(0));
        let r = runs.clone();
        engine.on(tw, "end", move |e, id| {
            *r.borrow_mut() += 1;
            if *r.borrow() < 3 {
                e.restart(id);
            }
        });
        engine.play(tw);
        for _ in 0..5 {
            clock.advance(100.0);
            engine.tick();
        }
        assert_eq!(*runs.borrow(), 3);
        assert!(!engine.is_ticking());
    }

    #[test]
    fn back_snaps_and_reenables_direction() {
        let (clock, mut engine) = setup();
        let tw = engine.tween("null").unwrap();
        engine.set_duration(tw, 100.0).unwrap();
        engine.play(tw);
        clock.advance(150.0);
        engine.tick();
        assert_eq!(engine.state(tw), Some(PlaybackState::Ended));
        engine.back(tw);
        assert_eq!(engine.time(tw), Some(0.0));
        engine.play(tw);
        assert_eq!(engine.state(tw), Some(PlaybackState::Playing));
    }

    #[test]
    fn zero_duration_progress() {
        let (_clock, mut engine) = setup();
        let tw = engine.tween("null").unwrap();
        engine.set_duration(tw, 0.0).unwrap();
        assert_eq!(engine.progress(tw), Some(0.0));
        engine.play(tw);
        assert_eq!(engine.progress(tw), Some(1.0));
    }
}
