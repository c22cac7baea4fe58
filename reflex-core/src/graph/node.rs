//! Graph Nodes
//!
//! Every observable thing in the engine (a raw composite, a ref, a computed)
//! is a node of the dependency graph, addressed by a [`TargetId`]. The id is a
//! back-reference only: holding it never keeps the node alive.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::reactive::Runtime;

/// Unique identifier for an observable node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owned identity of a graph node.
///
/// Allocates a fresh [`TargetId`] and, when dropped, removes every dependency
/// edge recorded against it. Embed one in any structure that calls `track`
/// on its own behalf.
#[derive(Debug)]
pub struct Identity {
    id: TargetId,
}

impl Identity {
    pub fn new() -> Self {
        Self { id: TargetId::new() }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Identity {
    fn drop(&mut self) {
        Runtime::forget_target(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_are_unique() {
        let id1 = TargetId::new();
        let id2 = TargetId::new();
        let id3 = TargetId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn target_ids_are_monotonic() {
        let first = TargetId::new();
        let second = TargetId::new();
        assert!(second.raw() > first.raw());
        assert_eq!(format!("{}", first), format!("#{}", first.raw()));
    }

    #[test]
    fn identity_owns_a_stable_id() {
        let identity = Identity::new();
        assert_eq!(identity.id(), identity.id());
        assert_ne!(identity.id(), Identity::new().id());
    }
}
