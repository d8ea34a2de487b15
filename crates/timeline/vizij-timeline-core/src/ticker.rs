#![allow(dead_code)]
//! Clock sources and the frame scheduler.
//!
//! The ticker keeps id-keyed entries: one-shots that fire once their due time passes and
//! per-frame entries that fire on every tick until removed. Adding an entry under an existing
//! key replaces it; removing is idempotent.

use crate::events::Channel;
use crate::ids::NodeId;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic time source in milliseconds.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Wall clock measured from construction.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Externally driven clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum TickKey {
    /// Completion of a play segment, delay or filler.
    Segment(NodeId),
    /// Per-frame progress emission.
    Progress(NodeId),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Schedule {
    Once { due: f64 },
    EveryFrame,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TickEntry {
    pub key: TickKey,
    pub schedule: Schedule,
    pub node: NodeId,
    pub channel: Channel,
    seq: u64,
}

/// Clock seen by backends: the ticker's pinned time while due entries replay, the wrapped
/// clock otherwise.
pub struct PinnedClock {
    inner: Rc<dyn Clock>,
    cursor: Rc<Cell<Option<f64>>>,
}

impl Clock for PinnedClock {
    fn now_ms(&self) -> f64 {
        self.cursor.get().unwrap_or_else(|| self.inner.now_ms())
    }
}

pub(crate) struct Ticker {
    clock: Rc<dyn Clock>,
    entries: Vec<TickEntry>,
    seq: u64,
    /// While due entries are replayed, "now" is pinned to the entry's due time.
    cursor: Rc<Cell<Option<f64>>>,
}

impl Ticker {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Vec::new(),
            seq: 0,
            cursor: Rc::new(Cell::new(None)),
        }
    }

    #[inline]
    pub fn now(&self) -> f64 {
        self.cursor.get().unwrap_or_else(|| self.clock.now_ms())
    }

    #[inline]
    pub fn clock_now(&self) -> f64 {
        self.clock.now_ms()
    }

    #[inline]
    pub fn set_cursor(&mut self, cursor: Option<f64>) {
        self.cursor.set(cursor);
    }

    /// Clock handle that follows the cursor.
    pub fn pinned_clock(&self) -> Rc<dyn Clock> {
        Rc::new(PinnedClock {
            inner: self.clock.clone(),
            cursor: self.cursor.clone(),
        })
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn add_once(&mut self, key: TickKey, delay_ms: f64, node: NodeId, channel: Channel) {
        let due = self.now() + delay_ms.max(0.0);
        self.push(key, Schedule::Once { due }, node, channel);
    }

    pub fn add_every_frame(&mut self, key: TickKey, node: NodeId, channel: Channel) {
        self.push(key, Schedule::EveryFrame, node, channel);
    }

    fn push(&mut self, key: TickKey, schedule: Schedule, node: NodeId, channel: Channel) {
        self.remove(key);
        self.seq += 1;
        log::trace!("ticker add {key:?} {schedule:?}");
        self.entries.push(TickEntry {
            key,
            schedule,
            node,
            channel,
            seq: self.seq,
        });
    }

    pub fn remove(&mut self, key: TickKey) -> bool {
        match self.entries.iter().position(|e| e.key == key) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn contains(&self, key: TickKey) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// Drop every entry belonging to `node`.
    pub fn remove_node(&mut self, node: NodeId) {
        self.entries.retain(|e| e.node != node);
    }

    /// Earliest one-shot due at or before `target`, ties broken by registration order.
    pub fn pop_due(&mut self, target: f64) -> Option<(f64, TickEntry)> {
        let mut best: Option<(usize, f64, u64)> = None;
        for (i, e) in self.entries.iter().enumerate() {
            if let Schedule::Once { due } = e.schedule {
                if due > target {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((_, d, s)) => due < d || (due == d && e.seq < s),
                };
                if better {
                    best = Some((i, due, e.seq));
                }
            }
        }
        best.map(|(i, due, _)| (due, self.entries.remove(i)))
    }

    /// Snapshot of per-frame entries in registration order.
    pub fn every_frame(&self) -> Vec<TickEntry> {
        self.entries
            .iter()
            .filter(|e| e.schedule == Schedule::EveryFrame)
            .copied()
            .collect()
    }

    /// Whether this exact registration is still live.
    pub fn is_live(&self, entry: &TickEntry) -> bool {
        self.entries.iter().any(|e| e.seq == entry.seq)
    }

    /// Time until the next one-shot is due, if any.
    pub fn next_due_in(&self) -> Option<f64> {
        let now = self.clock_now();
        self.entries
            .iter()
            .filter_map(|e| match e.schedule {
                Schedule::Once { due } => Some((due - now).max(0.0)),
                Schedule::EveryFrame => None,
            })
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
    }
}
