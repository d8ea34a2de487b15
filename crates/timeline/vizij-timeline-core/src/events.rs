#![allow(dead_code)]
//! Event names, user handlers, and the ordered internal handlers that wire nodes together.
//!
//! Every channel runs its internal handlers first, in registration order, then the single
//! user handler if any. Internal handlers are plain data ([`CoreAction`]) interpreted by the
//! engine, so registering one never borrows the engine.

use crate::engine::Engine;
use crate::ids::NodeId;
use crate::keyframes::{Dir, KeyTime};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five public events.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventName {
    Begin,
    End,
    Reverse,
    Progress,
    Loop,
}

impl EventName {
    pub const ALL: [EventName; 5] = [
        EventName::Begin,
        EventName::End,
        EventName::Reverse,
        EventName::Progress,
        EventName::Loop,
    ];

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::End => "end",
            Self::Reverse => "reverse",
            Self::Progress => "progress",
            Self::Loop => "loop",
        }
    }

    /// Canonical name or any of its aliases.
    pub fn from_alias(alias: &str) -> Option<Self> {
        let name = match alias {
            "begin" | "onBegin" | "start" | "onStart" => Self::Begin,
            "end" | "onEnd" | "complete" | "onComplete" | "finish" | "onFinish" | "done" => {
                Self::End
            }
            "progress" | "onProgress" | "update" | "onUpdate" => Self::Progress,
            "loop" | "onLoop" | "onRepeat" => Self::Loop,
            "reverse" | "onReverse" | "onReverseComplete" => Self::Reverse,
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// User callback: receives the engine and the id of the node that emitted the event.
pub type Handler = Box<dyn FnMut(&mut Engine, NodeId)>;

/// Dispatch slot: a public event or one of the two internal segment hooks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Channel {
    Event(EventName),
    /// A play segment is about to start.
    BeginHook,
    /// A play segment finished.
    EndHook,
}

impl From<EventName> for Channel {
    fn from(name: EventName) -> Self {
        Channel::Event(name)
    }
}

/// Identity of an internal handler; registering the same key again replaces the action.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum CoreKey {
    Lifecycle,
    Progress,
    Timeline,
    ResetPosition,
    Delay,
}

/// What runs after a delay or loops delay filler elapses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum AfterDelay {
    Run,
    LoopFwd,
    LoopRev,
    /// Reversed back through the initial delay before the first run.
    Rewind,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum CoreAction {
    TweenBegin,
    TweenEnd,
    StopProgress,
    ResetPosition,
    ChildDone {
        timeline: NodeId,
        dir: Dir,
        time: KeyTime,
        is_key: bool,
    },
    DelayElapsed {
        owner: NodeId,
        then: AfterDelay,
    },
    ForwardProgress {
        owner: NodeId,
    },
}

#[derive(Copy, Clone, Debug)]
struct CoreHandler {
    key: CoreKey,
    action: CoreAction,
}

struct UserSlot {
    handler: Option<Handler>,
    generation: u64,
}

#[derive(Default)]
pub(crate) struct EventRegistry {
    user: HashMap<EventName, UserSlot>,
    core: HashMap<Channel, Vec<CoreHandler>>,
    generation: u64,
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("user", &self.user.keys().collect::<Vec<_>>())
            .field("core", &self.core)
            .finish()
    }
}

impl EventRegistry {
    pub fn set_user(&mut self, name: EventName, handler: Handler) {
        self.generation += 1;
        self.user.insert(
            name,
            UserSlot {
                handler: Some(handler),
                generation: self.generation,
            },
        );
    }

    pub fn clear_user(&mut self, name: EventName) {
        self.user.remove(&name);
    }

    #[inline]
    pub fn has_user(&self, name: EventName) -> bool {
        self.user.contains_key(&name)
    }

    /// Borrow the user handler out of its slot for the duration of a call.
    pub fn take_user(&mut self, name: EventName) -> Option<(Handler, u64)> {
        let slot = self.user.get_mut(&name)?;
        let generation = slot.generation;
        slot.handler.take().map(|h| (h, generation))
    }

    /// Put a handler back unless it was cleared or replaced while it ran.
    pub fn restore_user(&mut self, name: EventName, handler: Handler, generation: u64) {
        if let Some(slot) = self.user.get_mut(&name) {
            if slot.generation == generation && slot.handler.is_none() {
                slot.handler = Some(handler);
            }
        }
    }

    pub fn set_core(&mut self, channel: Channel, key: CoreKey, action: CoreAction) {
        let list = self.core.entry(channel).or_default();
        match list.iter_mut().find(|h| h.key == key) {
            Some(existing) => existing.action = action,
            None => list.push(CoreHandler { key, action }),
        }
    }

    pub fn unset_core(&mut self, channel: Channel, key: CoreKey) {
        if let Some(list) = self.core.get_mut(&channel) {
            list.retain(|h| h.key != key);
        }
    }

    /// Snapshot of the internal actions for a channel, in order.
    pub fn core_actions(&self, channel: Channel) -> Vec<CoreAction> {
        self.core
            .get(&channel)
            .map(|list| list.iter().map(|h| h.action).collect())
            .unwrap_or_default()
    }

    pub fn has_handlers(&self, channel: Channel) -> bool {
        let core = self.core.get(&channel).is_some_and(|l| !l.is_empty());
        match channel {
            Channel::Event(name) => core || self.has_user(name),
            _ => core,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_map_to_canonical_names() {
        assert_eq!(EventName::from_alias("onComplete"), Some(EventName::End));
        assert_eq!(EventName::from_alias("done"), Some(EventName::End));
        assert_eq!(EventName::from_alias("start"), Some(EventName::Begin));
        assert_eq!(EventName::from_alias("onUpdate"), Some(EventName::Progress));
        assert_eq!(EventName::from_alias("onRepeat"), Some(EventName::Loop));
        assert_eq!(
            EventName::from_alias("onReverseComplete"),
            Some(EventName::Reverse)
        );
        assert_eq!(EventName::from_alias("wobble"), None);
        for name in EventName::ALL {
            assert_eq!(EventName::from_alias(name.name()), Some(name));
        }
    }

    #[test]
    fn core_handlers_replace_in_place() {
        let mut reg = EventRegistry::default();
        let end = Channel::Event(EventName::End);
        reg.set_core(end, CoreKey::Progress, CoreAction::StopProgress);
        reg.set_core(end, CoreKey::ResetPosition, CoreAction::ResetPosition);
        reg.set_core(end, CoreKey::Progress, CoreAction::TweenEnd);
        assert_eq!(
            reg.core_actions(end),
            vec![CoreAction::TweenEnd, CoreAction::ResetPosition]
        );
        reg.unset_core(end, CoreKey::Progress);
        assert_eq!(reg.core_actions(end), vec![CoreAction::ResetPosition]);
        assert!(reg.has_handlers(end));
        assert!(!reg.has_handlers(Channel::EndHook));
    }

    #[test]
    fn replaced_handler_is_not_restored() {
        let mut reg = EventRegistry::default();
        reg.set_user(EventName::Loop, Box::new(|_, _| {}));
        let (old, generation) = reg.take_user(EventName::Loop).unwrap();
        assert!(reg.has_handlers(Channel::Event(EventName::Loop)));
        reg.set_user(EventName::Loop, Box::new(|_, _| {}));
        reg.restore_user(EventName::Loop, old, generation);
        // the replacement stays
        let (_, current) = reg.take_user(EventName::Loop).unwrap();
        assert_ne!(current, generation);
    }
}
