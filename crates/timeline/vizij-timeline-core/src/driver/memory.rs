//! In-memory reference backend.
//!
//! A [`Scene`] stores property values per element and evaluates running primitives against
//! its clock, so hosts without a renderer (and tests) can observe what a timeline does.

use super::{Capabilities, Driver, Handle, Target};
use crate::easing::{ease, Easing};
use crate::property::{PropertyBlock, PropertyValue};
use crate::ticker::Clock;
use hashbrown::HashMap;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Every primitive operation received, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum DriverCall {
    Start {
        handle: Handle,
        target: Vec<String>,
        values: PropertyBlock,
        duration_ms: f64,
    },
    Pause(Handle),
    Resume(Handle),
    Stop(Handle),
    TimeScale(Handle, f64),
}

#[derive(Clone, Debug)]
struct Track {
    element: String,
    property: String,
    from: Option<PropertyValue>,
    to: PropertyValue,
    easing: Option<[f64; 4]>,
}

#[derive(Clone, Debug)]
struct Primitive {
    tracks: Vec<Track>,
    duration: f64,
    started: f64,
    /// Scaled time accumulated before `started`.
    base: f64,
    scale: f64,
    paused: bool,
}

impl Primitive {
    fn elapsed(&self, now: f64) -> f64 {
        if self.paused {
            self.base
        } else {
            self.base + (now - self.started) * self.scale
        }
    }

    fn ratio(&self, now: f64) -> f64 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed(now) / self.duration).clamp(0.0, 1.0)
        }
    }
}

/// Property store shared by every [`MemoryDriver`] created from it.
pub struct Scene {
    clock: Rc<dyn Clock>,
    values: HashMap<String, IndexMap<String, PropertyValue>>,
    primitives: IndexMap<Handle, Primitive>,
    calls: Vec<DriverCall>,
    next: u64,
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("values", &self.values)
            .field("primitives", &self.primitives.len())
            .field("calls", &self.calls.len())
            .finish()
    }
}

impl Scene {
    pub fn new(clock: Rc<dyn Clock>) -> Rc<RefCell<Scene>> {
        Rc::new(RefCell::new(Scene {
            clock,
            values: HashMap::new(),
            primitives: IndexMap::new(),
            calls: Vec::new(),
            next: 0,
        }))
    }

    /// Seed a value, as if styled before any animation.
    pub fn set(&mut self, element: &str, property: &str, value: impl Into<PropertyValue>) {
        self.values
            .entry(element.to_string())
            .or_default()
            .insert(property.to_string(), value.into());
    }

    /// Current value, including any running interpolation.
    pub fn value(&self, element: &str, property: &str) -> Option<PropertyValue> {
        let now = self.clock.now_ms();
        // the most recently started primitive wins
        for prim in self.primitives.values().rev() {
            if let Some(track) = prim
                .tracks
                .iter()
                .find(|t| t.element == element && t.property == property)
            {
                return Some(interpolate(track, prim.ratio(now)));
            }
        }
        self.values.get(element)?.get(property).cloned()
    }

    /// Numeric shortcut for [`Scene::value`].
    pub fn number(&self, element: &str, property: &str) -> Option<f64> {
        self.value(element, property)?.as_f64()
    }

    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Primitives started and not yet stopped.
    pub fn live_primitives(&self) -> usize {
        self.primitives.len()
    }

    fn commit(&mut self, handle: Handle) {
        let now = self.clock.now_ms();
        if let Some(prim) = self.primitives.shift_remove(&handle) {
            let ratio = prim.ratio(now);
            for track in &prim.tracks {
                let v = interpolate(track, ratio);
                self.set(&track.element, &track.property, v);
            }
        }
    }

    /// Detach (element, property) from older primitives, freezing its current value.
    fn release(&mut self, element: &str, property: &str) {
        if let Some(v) = self.value(element, property) {
            self.set(element, property, v);
        }
        for prim in self.primitives.values_mut() {
            prim.tracks
                .retain(|t| !(t.element == element && t.property == property));
        }
        self.primitives.retain(|_, p| !p.tracks.is_empty());
    }
}

fn relative(to: &PropertyValue, from: Option<f64>) -> Option<f64> {
    let s = to.as_str()?.trim();
    let (sign, rest) = if let Some(r) = s.strip_prefix("+=") {
        (1.0, r)
    } else if let Some(r) = s.strip_prefix("-=") {
        (-1.0, r)
    } else {
        return None;
    };
    let delta: f64 = rest.trim().parse().ok()?;
    Some(from.unwrap_or(0.0) + sign * delta)
}

fn interpolate(track: &Track, ratio: f64) -> PropertyValue {
    let from_num = track.from.as_ref().and_then(PropertyValue::as_f64);
    let to_num = relative(&track.to, from_num).or_else(|| track.to.as_f64());
    match to_num {
        Some(b) => {
            let a = from_num.unwrap_or(0.0);
            let t = match track.easing {
                Some(c) => ease(c, ratio),
                None => ratio,
            };
            PropertyValue::Number(a + (b - a) * t)
        }
        // text switches at the end
        None => match (&track.from, ratio >= 1.0) {
            (Some(from), false) => from.clone(),
            _ => track.to.clone(),
        },
    }
}

/// Backend writing into a shared [`Scene`].
pub struct MemoryDriver {
    scene: Rc<RefCell<Scene>>,
    caps: Capabilities,
}

impl MemoryDriver {
    /// Emulated playhead: pause/resume are never called, primitives are restarted instead.
    pub fn new(scene: Rc<RefCell<Scene>>) -> Self {
        Self {
            scene,
            caps: Capabilities {
                native_playhead: false,
                multi_easing: false,
                transforms: true,
            },
        }
    }

    /// Native playhead with per-property easing.
    pub fn native(scene: Rc<RefCell<Scene>>) -> Self {
        Self {
            scene,
            caps: Capabilities {
                native_playhead: true,
                multi_easing: true,
                transforms: true,
            },
        }
    }
}

impl Driver for MemoryDriver {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn start(
        &mut self,
        target: &Target,
        values: &PropertyBlock,
        duration_ms: f64,
        easing: &Easing,
    ) -> Handle {
        let mut scene = self.scene.borrow_mut();
        scene.next += 1;
        let handle = Handle(scene.next);
        let now = scene.clock.now_ms();
        let default_curve = easing.control_points();

        let mut tracks = Vec::new();
        for element in target.elements() {
            for (property, spec) in values.iter() {
                let from = scene.value(element, property);
                if from.is_none() && relative(&spec.value, None).is_some() {
                    // nothing to offset
                    continue;
                }
                scene.release(element, property);
                let curve = match (&spec.easing, self.caps.multi_easing) {
                    (Some(e), true) => e.control_points().or(default_curve),
                    _ => default_curve,
                };
                tracks.push(Track {
                    element: element.clone(),
                    property: property.clone(),
                    from,
                    to: spec.value.clone(),
                    easing: curve,
                });
            }
        }

        scene.calls.push(DriverCall::Start {
            handle,
            target: target.elements().to_vec(),
            values: values.clone(),
            duration_ms,
        });
        scene.primitives.insert(
            handle,
            Primitive {
                tracks,
                duration: duration_ms.max(0.0),
                started: now,
                base: 0.0,
                scale: 1.0,
                paused: false,
            },
        );
        if duration_ms <= 0.0 {
            scene.commit(handle);
        }
        handle
    }

    fn pause(&mut self, handle: Handle) {
        let mut scene = self.scene.borrow_mut();
        let now = scene.clock.now_ms();
        scene.calls.push(DriverCall::Pause(handle));
        if let Some(p) = scene.primitives.get_mut(&handle) {
            if !p.paused {
                p.base = p.elapsed(now);
                p.paused = true;
            }
        }
    }

    fn resume(&mut self, handle: Handle) {
        let mut scene = self.scene.borrow_mut();
        let now = scene.clock.now_ms();
        scene.calls.push(DriverCall::Resume(handle));
        if let Some(p) = scene.primitives.get_mut(&handle) {
            if p.paused {
                p.started = now;
                p.paused = false;
            }
        }
    }

    fn stop(&mut self, handle: Handle) {
        let mut scene = self.scene.borrow_mut();
        scene.calls.push(DriverCall::Stop(handle));
        scene.commit(handle);
    }

    fn current_value(&self, element: &str, property: &str) -> Option<PropertyValue> {
        self.scene.borrow().value(element, property)
    }

    fn set_time_scale(&mut self, handle: Handle, factor: f64) -> bool {
        let mut scene = self.scene.borrow_mut();
        let now = scene.clock.now_ms();
        scene.calls.push(DriverCall::TimeScale(handle, factor));
        if let Some(p) = scene.primitives.get_mut(&handle) {
            p.base = p.elapsed(now);
            p.started = now;
            p.scale = factor;
        }
        true
    }
}
