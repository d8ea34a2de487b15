#![allow(dead_code)]
//! Identifiers and the allocator shared by every node kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a tween, timeline, callback or filler owned by an [`crate::Engine`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic allocator for NodeId.
/// Tweens, timelines, callbacks and fillers draw from one counter so ids never collide.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc(&mut self) -> NodeId {
        self.next = self.next.wrapping_add(1);
        NodeId(self.next)
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc(), NodeId(1));
        assert_eq!(alloc.alloc(), NodeId(2));
        alloc.reset();
        assert_eq!(alloc.alloc(), NodeId(1));
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(NodeId(7).to_string(), "#7");
    }
}
