//! Dependency Store
//!
//! The forward edges of the graph: target → key → set of effects.
//!
//! # Algorithm
//!
//! Resolving a write to the set of effects that must re-run:
//!
//! 1. `Clear` resolves every effect recorded against the target.
//! 2. A write to `"length"` of an array resolves the effects of `"length"`
//!    and of every index at or beyond the new length.
//! 3. Otherwise the exact key is resolved, plus:
//!    - `Add` of an index on an array resolves `"length"`;
//!    - `Add`/`Delete` on a non-array resolves `Iterate`;
//!    - `Set` on a map resolves `Iterate`.
//!
//! Effects are kept in insertion order so that re-runs happen in the order
//! the effects first subscribed.

use fxhash::{FxBuildHasher, FxHashMap};
use indexmap::{IndexMap, IndexSet};

use super::key::DepKey;
use super::node::TargetId;
use super::ops::TriggerOp;
use crate::observable::{Shape, Value};
use crate::reactive::EffectId;

/// Effects depending on one (target, key) pair.
pub type Dep = IndexSet<EffectId, FxBuildHasher>;

type DepsMap = IndexMap<DepKey, Dep, FxBuildHasher>;

/// The global dependency graph, keyed by target identity.
#[derive(Debug, Default)]
pub struct DependencyStore {
    targets: FxHashMap<TargetId, DepsMap>,
}

impl DependencyStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            targets: FxHashMap::default(),
        }
    }

    /// Record that `effect` depends on `key` of `target`.
    ///
    /// Returns `false` when the edge already existed.
    pub fn add_edge(&mut self, target: TargetId, key: DepKey, effect: EffectId) -> bool {
        self.targets
            .entry(target)
            .or_default()
            .entry(key)
            .or_default()
            .insert(effect)
    }

    /// Remove a single edge, pruning empty entries.
    pub fn remove_edge(&mut self, target: TargetId, key: &DepKey, effect: EffectId) {
        let Some(deps) = self.targets.get_mut(&target) else {
            return;
        };
        if let Some(dep) = deps.get_mut(key) {
            dep.shift_remove(&effect);
            if dep.is_empty() {
                deps.shift_remove(key);
            }
        }
        if deps.is_empty() {
            self.targets.remove(&target);
        }
    }

    /// Drop every edge recorded against `target`.
    pub fn remove_target(&mut self, target: TargetId) {
        self.targets.remove(&target);
    }

    /// The effects currently depending on `key` of `target`.
    pub fn dependents(&self, target: TargetId, key: &DepKey) -> Option<&Dep> {
        self.targets.get(&target).and_then(|deps| deps.get(key))
    }

    /// Whether any effect depends on `target`.
    pub fn is_observed(&self, target: TargetId) -> bool {
        self.targets.contains_key(&target)
    }

    /// Number of targets with at least one dependent.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Resolve a write to the effects that depend on it.
    pub fn resolve(
        &self,
        target: TargetId,
        shape: Shape,
        op: TriggerOp,
        key: Option<&DepKey>,
        new_value: Option<&Value>,
    ) -> Vec<EffectId> {
        let Some(deps) = self.targets.get(&target) else {
            return Vec::new();
        };

        let mut resolved = Dep::default();
        let mut add = |dep: Option<&Dep>| {
            if let Some(dep) = dep {
                resolved.extend(dep.iter().copied());
            }
        };

        let is_array = shape == Shape::Array;
        let length_write = key
            .and_then(DepKey::as_key)
            .map(|key| key.is_length())
            .unwrap_or(false);

        if op == TriggerOp::Clear {
            for dep in deps.values() {
                add(Some(dep));
            }
        } else if length_write && is_array {
            let new_len = new_value.and_then(Value::as_length);
            for (dep_key, dep) in deps {
                let truncated = match dep_key.as_key() {
                    Some(key) if key.is_length() => true,
                    Some(key) => match (key.as_index(), new_len) {
                        (Some(index), Some(len)) => index >= len,
                        _ => false,
                    },
                    None => false,
                };
                if truncated {
                    add(Some(dep));
                }
            }
        } else {
            if let Some(key) = key {
                add(deps.get(key));
            }
            let index_key = key
                .and_then(DepKey::as_key)
                .map(|key| key.is_index())
                .unwrap_or(false);
            match op {
                TriggerOp::Add if is_array => {
                    if index_key {
                        add(deps.get(&DepKey::length()));
                    }
                }
                TriggerOp::Add | TriggerOp::Delete if !is_array => {
                    add(deps.get(&DepKey::Iterate));
                }
                TriggerOp::Set if shape == Shape::Map => {
                    add(deps.get(&DepKey::Iterate));
                }
                _ => {}
            }
        }

        resolved.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Key;

    fn key(name: &str) -> DepKey {
        DepKey::from(name)
    }

    #[test]
    fn add_and_remove_edges() {
        let mut store = DependencyStore::new();
        let target = TargetId::new();
        let effect = EffectId::new();

        assert!(store.add_edge(target, key("a"), effect));
        assert!(!store.add_edge(target, key("a"), effect));
        assert!(store.dependents(target, &key("a")).unwrap().contains(&effect));

        store.remove_edge(target, &key("a"), effect);
        assert!(store.dependents(target, &key("a")).is_none());
        assert!(!store.is_observed(target));
    }

    #[test]
    fn remove_target_drops_all_edges() {
        let mut store = DependencyStore::new();
        let target = TargetId::new();
        store.add_edge(target, key("a"), EffectId::new());
        store.add_edge(target, key("b"), EffectId::new());
        assert_eq!(store.target_count(), 1);

        store.remove_target(target);
        assert_eq!(store.target_count(), 0);
    }

    #[test]
    fn unobserved_target_resolves_nothing() {
        let store = DependencyStore::new();
        let resolved = store.resolve(
            TargetId::new(),
            Shape::Record,
            TriggerOp::Set,
            Some(&key("a")),
            None,
        );
        assert!(resolved.is_empty());
    }

    #[test]
    fn set_resolves_exact_key_only() {
        let mut store = DependencyStore::new();
        let target = TargetId::new();
        let on_a = EffectId::new();
        let on_b = EffectId::new();
        store.add_edge(target, key("a"), on_a);
        store.add_edge(target, key("b"), on_b);

        let resolved = store.resolve(target, Shape::Record, TriggerOp::Set, Some(&key("a")), None);
        assert_eq!(resolved, vec![on_a]);
    }

    #[test]
    fn array_add_resolves_length() {
        let mut store = DependencyStore::new();
        let target = TargetId::new();
        let on_length = EffectId::new();
        store.add_edge(target, DepKey::length(), on_length);

        let resolved = store.resolve(
            target,
            Shape::Array,
            TriggerOp::Add,
            Some(&DepKey::Prop(Key::Index(5))),
            None,
        );
        assert_eq!(resolved, vec![on_length]);
    }

    #[test]
    fn length_shrink_resolves_truncated_indices() {
        let mut store = DependencyStore::new();
        let target = TargetId::new();
        let kept = EffectId::new();
        let dropped = EffectId::new();
        let on_length = EffectId::new();
        let on_name = EffectId::new();
        store.add_edge(target, DepKey::Prop(Key::Index(0)), kept);
        store.add_edge(target, DepKey::Prop(Key::Index(2)), dropped);
        store.add_edge(target, DepKey::length(), on_length);
        store.add_edge(target, key("extra"), on_name);

        let resolved = store.resolve(
            target,
            Shape::Array,
            TriggerOp::Set,
            Some(&DepKey::length()),
            Some(&Value::from(1)),
        );
        assert_eq!(resolved.len(), 2);
        assert!(resolved.contains(&dropped));
        assert!(resolved.contains(&on_length));
    }

    #[test]
    fn record_add_and_delete_resolve_iterate() {
        let mut store = DependencyStore::new();
        let target = TargetId::new();
        let iterating = EffectId::new();
        store.add_edge(target, DepKey::Iterate, iterating);

        for op in [TriggerOp::Add, TriggerOp::Delete] {
            let resolved = store.resolve(target, Shape::Record, op, Some(&key("x")), None);
            assert_eq!(resolved, vec![iterating]);
        }
        let resolved = store.resolve(target, Shape::Record, TriggerOp::Set, Some(&key("x")), None);
        assert!(resolved.is_empty());
    }

    #[test]
    fn map_set_resolves_iterate() {
        let mut store = DependencyStore::new();
        let target = TargetId::new();
        let iterating = EffectId::new();
        store.add_edge(target, DepKey::Iterate, iterating);

        let resolved = store.resolve(target, Shape::Map, TriggerOp::Set, Some(&key("x")), None);
        assert_eq!(resolved, vec![iterating]);
    }

    #[test]
    fn clear_resolves_everything_once() {
        let mut store = DependencyStore::new();
        let target = TargetId::new();
        let effect = EffectId::new();
        store.add_edge(target, key("a"), effect);
        store.add_edge(target, key("b"), effect);
        store.add_edge(target, DepKey::Iterate, effect);

        let resolved = store.resolve(target, Shape::Set, TriggerOp::Clear, None, None);
        assert_eq!(resolved, vec![effect]);
    }
}
