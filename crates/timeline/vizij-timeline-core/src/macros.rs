//! Named macros: reusable tween configuration run against a tween on demand.
//!
//! A macro receives the engine, the tween it runs on and the caller's arguments. Timelines
//! can create a tween, place it and run a macro on it in one step.

use crate::engine::Engine;
use crate::error::{Result, TimelineError};
use crate::ids::NodeId;
use crate::node::NodeKind;
use crate::position::Position;
use hashbrown::HashMap;
use serde_json::Value;
use std::rc::Rc;

pub type Macro = Rc<dyn Fn(&mut Engine, NodeId, &[Value]) -> Result<()>>;

/// Macros by name. Names are case-sensitive; registering again replaces.
#[derive(Default)]
pub struct MacroRegistry {
    entries: HashMap<String, Macro>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Engine, NodeId, &[Value]) -> Result<()> + 'static,
    {
        log::debug!("macro registered: {name}");
        self.entries.insert(name.to_string(), Rc::new(f));
        self
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Macro> {
        self.entries.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Engine {
    pub fn register_macro<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Engine, NodeId, &[Value]) -> Result<()> + 'static,
    {
        self.macros.register(name, f);
        self
    }

    /// Run a registered macro on a tween.
    pub fn exec(&mut self, tween: NodeId, name: &str, args: &[Value]) -> Result<()> {
        self.require_kind(tween, NodeKind::Tween)?;
        let Some(m) = self.macros.get(name) else {
            return Err(TimelineError::MacroNotFound {
                name: name.to_string(),
            });
        };
        log::trace!("macro {name} on tween {tween}");
        m(self, tween, args)
    }

    /// Create a tween on the default driver, place it and run a macro on it. The tween
    /// inherits the timeline's target.
    pub fn add_exec(
        &mut self,
        tl: NodeId,
        name: &str,
        args: &[Value],
        position: impl Into<Position>,
    ) -> Result<NodeId> {
        let target = self
            .require_kind(tl, NodeKind::Timeline)?
            .timeline()
            .and_then(|t| t.target.clone());
        if !self.macros.contains(name) {
            return Err(TimelineError::MacroNotFound {
                name: name.to_string(),
            });
        }
        let driver = self.cfg.default_driver.clone();
        let tw = self.tween(&driver)?;
        if let Some(target) = target {
            self.set_target(tw, target)?;
        }
        self.add(tl, tw, position)?;
        self.exec(tw, name, args)?;
        Ok(tw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::driver::memory::{MemoryDriver, Scene};
    use crate::property::PropertyBlock;
    use crate::ticker::ManualClock;
    use crate::time::Span;
    use serde_json::json;
    use std::cell::RefCell;

    fn approx(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    fn setup() -> (ManualClock, Rc<RefCell<Scene>>, Engine) {
        let clock = ManualClock::new();
        let cfg = Config {
            default_driver: "memory".into(),
            default_easing: "linear".into(),
            ..Config::default()
        };
        let mut engine = Engine::with_clock(cfg, Rc::new(clock.clone()));
        let scene = Scene::new(engine.clock());
        let s = scene.clone();
        engine.register_driver("memory", move || Box::new(MemoryDriver::new(s.clone())));
        engine.register_macro("fadeTo", |e, tw, args| {
            let opacity = args.first().and_then(Value::as_f64).unwrap_or(0.0);
            let duration = args.get(1).and_then(Value::as_f64).unwrap_or(100.0);
            e.set_duration(tw, duration)?;
            e.to(tw, PropertyBlock::new().with("opacity", opacity))
        });
        (clock, scene, engine)
    }

    #[test]
    fn exec_configures_the_tween() {
        let (clock, scene, mut engine) = setup();
        scene.borrow_mut().set("box", "opacity", 1.0);
        let tw = engine.tween("memory").unwrap();
        engine.set_target(tw, "box").unwrap();
        engine.exec(tw, "fadeTo", &[json!(0.0), json!(200)]).unwrap();
        assert_eq!(engine.duration(tw), Some(Span::Finite(200.0)));

        engine.play(tw);
        clock.advance(100.0);
        engine.tick();
        approx(scene.borrow().number("box", "opacity").unwrap(), 0.5, 1e-3);
    }

    #[test]
    fn timeline_exec_places_a_new_tween() {
        let (clock, scene, mut engine) = setup();
        scene.borrow_mut().set("box", "opacity", 0.0);
        let tl = engine.timeline();
        engine.set_target(tl, "box").unwrap();
        let first = engine.add_exec(tl, "fadeTo", &[json!(1.0)], None::<f64>).unwrap();
        let second = engine.add_exec(tl, "fadeTo", &[json!(0.5), json!(50)], "+=50").unwrap();
        assert_eq!(engine.parent(first), Some(tl));
        assert_eq!(
            engine.placement(tl, second),
            Some((Span::Finite(150.0), Span::Finite(200.0)))
        );
        assert_eq!(engine.total_duration(tl), Some(Span::Finite(200.0)));

        engine.play(tl);
        clock.advance(250.0);
        engine.tick();
        approx(scene.borrow().number("box", "opacity").unwrap(), 0.5, 1e-3);
    }

    #[test]
    fn unknown_macros_and_wrong_kinds_fail_fast() {
        let (_clock, _scene, mut engine) = setup();
        let tw = engine.tween("memory").unwrap();
        let tl = engine.timeline();
        assert_eq!(
            engine.exec(tw, "spin", &[]),
            Err(TimelineError::MacroNotFound {
                name: "spin".into()
            })
        );
        assert!(matches!(
            engine.exec(tl, "fadeTo", &[]),
            Err(TimelineError::WrongNodeKind { .. })
        ));
        assert!(engine.add_exec(tl, "spin", &[], None::<f64>).is_err());
        assert_eq!(engine.keyframes(tl).map(|k| k.len()), Some(0));
    }

    #[test]
    fn registering_again_replaces() {
        let mut reg = MacroRegistry::new();
        reg.register("a", |_, _, _| Ok(()));
        reg.register("a", |_, _, _| Ok(()));
        reg.register("B", |_, _, _| Ok(()));
        assert_eq!(reg.names(), vec!["B".to_string(), "a".to_string()]);
        assert!(!reg.contains("b"));
    }
}
