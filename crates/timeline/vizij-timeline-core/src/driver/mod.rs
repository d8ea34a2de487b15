//! Backend drivers: the primitive surface a rendering engine exposes to the playhead.
//!
//! A driver starts, pauses, resumes and stops interpolation primitives. It never decides
//! when a segment is over; completion is always detected by the ticker.

pub mod memory;

use crate::easing::Easing;
use crate::error::{Result, TimelineError};
use crate::property::{PropertyBlock, PropertyValue};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

pub use memory::{DriverCall, MemoryDriver, Scene};

/// What a backend can do natively.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Pause/resume and time scaling of a running primitive, including multi-target handles.
    pub native_playhead: bool,
    /// Per-property easing inside a single primitive.
    pub multi_easing: bool,
    /// Transform components as individual properties.
    pub transforms: bool,
}

/// How the playhead drives a backend, chosen once from its capabilities.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayheadStrategy {
    /// Primitives are stopped on pause and restarted with the remaining duration on resume.
    Emulated,
    /// Primitives are paused and resumed in place.
    Native,
}

impl PlayheadStrategy {
    pub fn for_capabilities(caps: Capabilities) -> Self {
        if caps.native_playhead {
            PlayheadStrategy::Native
        } else {
            PlayheadStrategy::Emulated
        }
    }
}

/// Opaque primitive handle issued by a driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(pub u64);

/// Elements a tween animates. Empty for fillers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TargetRepr", into = "Vec<String>")]
pub struct Target(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum TargetRepr {
    One(String),
    Many(Vec<String>),
}

impl From<TargetRepr> for Target {
    fn from(r: TargetRepr) -> Self {
        match r {
            TargetRepr::One(s) => Target(vec![s]),
            TargetRepr::Many(v) => Target(v),
        }
    }
}

impl From<Target> for Vec<String> {
    fn from(t: Target) -> Self {
        t.0
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target(vec![s.to_string()])
    }
}

impl From<Vec<&str>> for Target {
    fn from(v: Vec<&str>) -> Self {
        Target(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for Target {
    fn from(v: Vec<String>) -> Self {
        Target(v)
    }
}

impl Target {
    pub fn none() -> Self {
        Self::default()
    }

    #[inline]
    pub fn elements(&self) -> &[String] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// One-element target for per-element playback.
    pub fn element(&self, i: usize) -> Option<Target> {
        self.0.get(i).map(|e| Target(vec![e.clone()]))
    }
}

/// Primitive operations of a rendering backend.
pub trait Driver {
    fn capabilities(&self) -> Capabilities;

    /// Interpolate `values` on `target` over `duration_ms` (0 applies instantly).
    fn start(
        &mut self,
        target: &Target,
        values: &PropertyBlock,
        duration_ms: f64,
        easing: &Easing,
    ) -> Handle;

    fn pause(&mut self, handle: Handle);

    fn resume(&mut self, handle: Handle);

    /// Freeze the primitive where it is and forget it.
    fn stop(&mut self, handle: Handle);

    /// Current value of a property on one element.
    fn current_value(&self, element: &str, property: &str) -> Option<PropertyValue>;

    /// Rescale a running primitive. Returns false when unsupported.
    fn set_time_scale(&mut self, _handle: Handle, _factor: f64) -> bool {
        false
    }
}

/// Driver with no visual effect, used for fillers and target-less tweens.
#[derive(Debug, Default)]
pub struct NullDriver {
    next: u64,
}

impl Driver for NullDriver {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn start(&mut self, _: &Target, _: &PropertyBlock, _: f64, _: &Easing) -> Handle {
        self.next += 1;
        Handle(self.next)
    }

    fn pause(&mut self, _: Handle) {}

    fn resume(&mut self, _: Handle) {}

    fn stop(&mut self, _: Handle) {}

    fn current_value(&self, _: &str, _: &str) -> Option<PropertyValue> {
        None
    }
}

pub type DriverFactory = Box<dyn Fn() -> Box<dyn Driver>>;

struct Registration {
    factory: DriverFactory,
    strategy: PlayheadStrategy,
}

/// Named backend factories. Names are case-insensitive.
pub struct DriverRegistry {
    entries: HashMap<String, Registration>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistry {
    /// Registry with the built-in `null` driver.
    pub fn new() -> Self {
        let mut reg = Self {
            entries: HashMap::new(),
        };
        reg.register("null", || Box::new(NullDriver::default()));
        reg
    }

    /// Register (or replace) a backend. Its playhead strategy is fixed here.
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Driver> + 'static,
    {
        let strategy = PlayheadStrategy::for_capabilities(factory().capabilities());
        log::debug!("driver registered: {name} ({strategy:?})");
        self.entries.insert(
            name.to_ascii_lowercase(),
            Registration {
                factory: Box::new(factory),
                strategy,
            },
        );
        self
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn strategy(&self, name: &str) -> Result<PlayheadStrategy> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|r| r.strategy)
            .ok_or_else(|| TimelineError::DriverNotFound {
                name: name.to_string(),
            })
    }

    /// Instantiate a backend.
    pub fn create(&self, name: &str) -> Result<(Box<dyn Driver>, PlayheadStrategy)> {
        let reg = self
            .entries
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| TimelineError::DriverNotFound {
                name: name.to_string(),
            })?;
        Ok(((reg.factory)(), reg.strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NativeStub;

    impl Driver for NativeStub {
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                native_playhead: true,
                ..Capabilities::default()
            }
        }
        fn start(&mut self, _: &Target, _: &PropertyBlock, _: f64, _: &Easing) -> Handle {
            Handle(0)
        }
        fn pause(&mut self, _: Handle) {}
        fn resume(&mut self, _: Handle) {}
        fn stop(&mut self, _: Handle) {}
        fn current_value(&self, _: &str, _: &str) -> Option<PropertyValue> {
            None
        }
    }

    #[test]
    fn strategy_follows_capabilities() {
        let mut reg = DriverRegistry::new();
        reg.register("Native", || Box::new(NativeStub));
        assert_eq!(reg.strategy("native").unwrap(), PlayheadStrategy::Native);
        assert_eq!(reg.strategy("NULL").unwrap(), PlayheadStrategy::Emulated);
        assert_eq!(reg.names(), vec!["native".to_string(), "null".to_string()]);
    }

    #[test]
    fn unknown_driver_fails_fast() {
        let reg = DriverRegistry::new();
        let err = reg.create("gsap").err().unwrap();
        assert_eq!(
            err,
            TimelineError::DriverNotFound {
                name: "gsap".into()
            }
        );
    }

    #[test]
    fn target_from_json_string_or_list() {
        let one: Target = serde_json::from_str(r#""box""#).unwrap();
        let many: Target = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(one.elements(), &["box".to_string()]);
        assert_eq!(many.len(), 2);
        assert_eq!(many.element(1), Some(Target::from("b")));
    }
}
