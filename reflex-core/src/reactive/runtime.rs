//! Reactive Runtime
//!
//! The runtime connects reads and writes to effects. It owns the dependency
//! store and a registry of live effects.
//!
//! # How It Works
//!
//! 1. A read inside a running effect calls [`track`], which records an edge
//!    from (target, key) to the active effect and a reverse edge on the
//!    effect itself.
//!
//! 2. A write calls [`trigger`], which resolves the affected effects through
//!    the store, drops the one currently running (unless it allows
//!    recursion), and hands each remaining effect to its scheduler or runs it.
//!
//! # Thread Safety
//!
//! Everything here is thread-local. The engine is single-threaded and
//! synchronous; the push/pop discipline of the context stack is the only
//! synchronization it needs.

use std::cell::RefCell;

use fxhash::FxHashMap;
use tracing::trace;

use super::context::ReactiveContext;
use super::effect::{DepRef, ReactiveEffect, WeakEffect};
use super::EffectId;
use crate::graph::{DepKey, DependencyStore, TargetId, TrackOp, TriggerOp};
use crate::observable::{Shape, Value};

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

#[derive(Default)]
struct RuntimeState {
    store: DependencyStore,
    effects: FxHashMap<EffectId, WeakEffect>,
}

/// Passed to `on_track` hooks when an effect records a new dependency.
#[derive(Debug, Clone)]
pub struct TrackEvent {
    pub effect: EffectId,
    pub target: TargetId,
    pub op: TrackOp,
    pub key: DepKey,
}

/// A write, as seen by [`trigger`] and `on_trigger` hooks.
#[derive(Debug, Clone)]
pub struct TriggerEvent<'a> {
    pub target: TargetId,
    pub shape: Shape,
    pub op: TriggerOp,
    pub key: Option<DepKey>,
    pub new_value: Option<&'a Value>,
    pub old_value: Option<&'a Value>,
}

impl<'a> TriggerEvent<'a> {
    pub fn new(target: TargetId, shape: Shape, op: TriggerOp) -> Self {
        Self {
            target,
            shape,
            op,
            key: None,
            new_value: None,
            old_value: None,
        }
    }

    pub fn key(mut self, key: impl Into<DepKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn new_value(mut self, value: &'a Value) -> Self {
        self.new_value = Some(value);
        self
    }

    pub fn old_value(mut self, value: &'a Value) -> Self {
        self.old_value = Some(value);
        self
    }
}

/// The thread-local reactive runtime.
pub struct Runtime;

impl Runtime {
    pub(crate) fn register(effect: &ReactiveEffect) {
        RUNTIME.with(|runtime| {
            runtime
                .borrow_mut()
                .effects
                .insert(effect.id(), effect.downgrade());
        });
    }

    pub(crate) fn unregister(effect: EffectId) {
        let _ = RUNTIME.try_with(|runtime| {
            if let Ok(mut runtime) = runtime.try_borrow_mut() {
                runtime.effects.remove(&effect);
            }
        });
    }

    pub(crate) fn remove_edges(effect: EffectId, deps: &[DepRef]) {
        let _ = RUNTIME.try_with(|runtime| {
            if let Ok(mut runtime) = runtime.try_borrow_mut() {
                for dep in deps {
                    runtime.store.remove_edge(dep.target, &dep.key, effect);
                }
            }
        });
    }

    /// Drop every edge recorded against `target`.
    ///
    /// Called when an observable node goes away.
    pub fn forget_target(target: TargetId) {
        let _ = RUNTIME.try_with(|runtime| {
            if let Ok(mut runtime) = runtime.try_borrow_mut() {
                runtime.store.remove_target(target);
            }
        });
    }

    /// Whether any effect depends on `target`.
    pub fn is_observed(target: TargetId) -> bool {
        RUNTIME.with(|runtime| runtime.borrow().store.is_observed(target))
    }

    /// Number of effects depending on `key` of `target`.
    pub fn dependent_count(target: TargetId, key: &DepKey) -> usize {
        RUNTIME.with(|runtime| {
            runtime
                .borrow()
                .store
                .dependents(target, key)
                .map(|dep| dep.len())
                .unwrap_or(0)
        })
    }

    /// Number of live effects.
    pub fn effect_count() -> usize {
        RUNTIME.with(|runtime| runtime.borrow().effects.len())
    }

    /// Get the effect currently being run, if any.
    pub fn active_effect() -> Option<ReactiveEffect> {
        ReactiveContext::active_effect()
    }

    /// Check if reads would currently be tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::should_track() && ReactiveContext::is_active()
    }
}

/// Record that the active effect depends on `key` of `target`.
///
/// No-op when no effect is running or tracking is paused.
pub fn track(target: TargetId, op: TrackOp, key: DepKey) {
    if !ReactiveContext::should_track() {
        return;
    }
    let Some(effect) = ReactiveContext::active_effect() else {
        return;
    };
    // An effect that stopped itself mid-run collects nothing further
    if !effect.is_active() {
        return;
    }

    let added = RUNTIME.with(|runtime| {
        runtime
            .borrow_mut()
            .store
            .add_edge(target, key.clone(), effect.id())
    });
    if !added {
        return;
    }

    trace!(target = %target, key = %key, op = %op, effect = %effect.id(), "track");
    effect.record_dep(target, key.clone());

    if let Some(on_track) = effect.options().on_track.clone() {
        on_track(&TrackEvent {
            effect: effect.id(),
            target,
            op,
            key,
        });
    }
}

/// Re-run (or schedule) every effect affected by a write.
pub fn trigger(event: TriggerEvent<'_>) {
    let resolved = RUNTIME.with(|runtime| {
        let runtime = runtime.borrow();
        let ids = runtime.store.resolve(
            event.target,
            event.shape,
            event.op,
            event.key.as_ref(),
            event.new_value,
        );
        ids.iter()
            .filter_map(|id| runtime.effects.get(id).cloned())
            .collect::<Vec<_>>()
    });
    if resolved.is_empty() {
        return;
    }

    let active = ReactiveContext::active_effect_id();
    let effects: Vec<ReactiveEffect> = resolved
        .iter()
        .filter_map(WeakEffect::upgrade)
        .filter(|effect| Some(effect.id()) != active || effect.allows_recurse())
        .collect();

    trace!(
        target = %event.target,
        op = %event.op,
        key = ?event.key,
        effects = effects.len(),
        "trigger"
    );

    for effect in effects {
        // An earlier effect in this batch may have stopped this one
        if !effect.is_active() {
            continue;
        }
        if let Some(on_trigger) = effect.options().on_trigger.clone() {
            on_trigger(&event);
        }
        match effect.options().scheduler.clone() {
            Some(scheduler) => scheduler(&effect),
            None => {
                effect.run();
            }
        }
    }
}
