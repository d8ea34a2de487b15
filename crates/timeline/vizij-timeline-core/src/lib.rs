#![allow(dead_code)]
//! Vizij Timeline Core (backend-agnostic)
//!
//! Tweens and timelines over pluggable animation backends. The engine owns every node in an
//! arena keyed by [`NodeId`], emulates a playhead for backends that lack one, and drives
//! timelines through a keyframe scheduler whose gaps are covered by zero-effect fillers.
//! All scheduling goes through one ticker sampling a swappable [`Clock`].

pub mod config;
pub mod controls;
pub mod driver;
pub mod easing;
pub mod engine;
pub mod error;
pub mod events;
pub mod ids;
pub mod keyframes;
pub mod macros;
pub mod node;
pub mod options;
pub mod playhead;
pub mod position;
pub mod property;
pub mod ticker;
pub mod time;
pub mod timeline;
pub mod tween;

// Re-exports for consumers (backends and hosts)
pub use config::Config;
pub use driver::memory::{DriverCall, MemoryDriver, Scene};
pub use driver::{
    Capabilities, Driver, DriverRegistry, Handle, NullDriver, PlayheadStrategy, Target,
};
pub use easing::Easing;
pub use engine::Engine;
pub use error::{Result, TimelineError};
pub use events::EventName;
pub use ids::NodeId;
pub use keyframes::KeyframeInfo;
pub use macros::{Macro, MacroRegistry};
pub use node::NodeKind;
pub use options::{AnimOptions, SpeedValue};
pub use playhead::PlaybackState;
pub use position::Position;
pub use property::{PropertyBlock, PropertySpec, PropertyValue};
pub use ticker::{Clock, ManualClock, SystemClock};
pub use time::{Span, TimeUnit, TimeValue};
pub use timeline::Callback;
