//! Effect Implementation
//!
//! An effect wraps a computation so that the reads it performs become
//! dependencies and writes to those dependencies run it again.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs once to establish its dependencies
//!    (unless it is lazy).
//!
//! 2. Each run first removes the effect from every dependency set it joined
//!    last time, then runs the computation with the effect on top of the
//!    context stack. Only what this run reads is tracked, so dependencies can
//!    shrink and change between runs.
//!
//! 3. When a dependency changes, the runtime hands the effect to its
//!    scheduler if it has one, or runs it directly.
//!
//! # Stopping
//!
//! [`ReactiveEffect::stop`] severs every edge and deactivates the effect.
//! A stopped effect is never run by the runtime again. Invoking it directly
//! still calls the raw computation, untracked, when no scheduler is set.
//!
//! # Ownership
//!
//! The runtime only holds weak handles. Dropping the last [`ReactiveEffect`]
//! handle is equivalent to stopping it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::debug;

use super::context::ReactiveContext;
use super::runtime::{Runtime, TrackEvent, TriggerEvent};
use super::EffectId;
use crate::graph::{DepKey, TargetId};
use crate::observable::Value;

/// The computation wrapped by an effect.
pub type EffectFn = Rc<dyn Fn() -> Value>;

/// Receives an effect whose dependencies changed and decides when to run it.
pub type Scheduler = Rc<dyn Fn(&ReactiveEffect)>;

type TrackHook = Rc<dyn Fn(&TrackEvent)>;
type TriggerHook = Rc<dyn Fn(&TriggerEvent<'_>)>;
type StopHook = Rc<dyn Fn()>;

/// Options accepted by [`effect`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    pub(crate) lazy: bool,
    pub(crate) scheduler: Option<Scheduler>,
    pub(crate) allow_recurse: bool,
    pub(crate) on_track: Option<TrackHook>,
    pub(crate) on_trigger: Option<TriggerHook>,
    pub(crate) on_stop: Option<StopHook>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the initial run.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Route re-runs through `scheduler` instead of running synchronously.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&ReactiveEffect) + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Let the effect be re-triggered by its own writes.
    ///
    /// The computation is then responsible for terminating the recursion.
    pub fn allow_recurse(mut self, allow: bool) -> Self {
        self.allow_recurse = allow;
        self
    }

    /// Called whenever the effect records a new dependency.
    pub fn on_track<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TrackEvent) + 'static,
    {
        self.on_track = Some(Rc::new(hook));
        self
    }

    /// Called whenever a write resolves to this effect, before it is run or
    /// scheduled.
    pub fn on_trigger<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TriggerEvent<'_>) + 'static,
    {
        self.on_trigger = Some(Rc::new(hook));
        self
    }

    /// Called once when the effect is stopped.
    pub fn on_stop<F>(mut self, hook: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.on_stop = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("allow_recurse", &self.allow_recurse)
            .field("on_track", &self.on_track.is_some())
            .field("on_trigger", &self.on_trigger.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// A reverse edge: one dependency set this effect belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DepRef {
    pub(crate) target: TargetId,
    pub(crate) key: DepKey,
}

/// A registered, re-runnable computation.
///
/// Cloning yields another handle to the same effect.
#[derive(Clone)]
pub struct ReactiveEffect {
    inner: Rc<EffectInner>,
}

struct EffectInner {
    id: EffectId,
    raw: EffectFn,
    active: Cell<bool>,
    deps: RefCell<SmallVec<[DepRef; 4]>>,
    options: EffectOptions,
    run_count: Cell<usize>,
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        let deps = std::mem::take(self.deps.get_mut());
        Runtime::remove_edges(self.id, &deps);
        Runtime::unregister(self.id);
    }
}

/// Non-owning effect handle held by the runtime registry.
#[derive(Clone)]
pub(crate) struct WeakEffect(Weak<EffectInner>);

impl WeakEffect {
    pub(crate) fn upgrade(&self) -> Option<ReactiveEffect> {
        self.0.upgrade().map(|inner| ReactiveEffect { inner })
    }
}

impl ReactiveEffect {
    fn new(raw: EffectFn, options: EffectOptions) -> Self {
        let effect = Self {
            inner: Rc::new(EffectInner {
                id: EffectId::new(),
                raw,
                active: Cell::new(true),
                deps: RefCell::new(SmallVec::new()),
                options,
                run_count: Cell::new(0),
            }),
        };
        Runtime::register(&effect);
        debug!(effect = %effect.id(), lazy = effect.inner.options.lazy, "effect created");
        effect
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// The wrapped computation.
    pub fn raw(&self) -> EffectFn {
        Rc::clone(&self.inner.raw)
    }

    /// `false` once the effect has been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn allows_recurse(&self) -> bool {
        self.inner.options.allow_recurse
    }

    pub fn has_scheduler(&self) -> bool {
        self.inner.options.scheduler.is_some()
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of dependency sets the effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    pub(crate) fn options(&self) -> &EffectOptions {
        &self.inner.options
    }

    /// Invoke the effect.
    ///
    /// Returns `None` when the invocation was suppressed: the effect is
    /// already running further up the stack (and does not allow recursion),
    /// or it is stopped and has a scheduler.
    pub fn run(&self) -> Option<Value> {
        let inner = &self.inner;
        if !inner.active.get() {
            return match inner.options.scheduler {
                Some(_) => None,
                None => Some((inner.raw)()),
            };
        }

        if !inner.options.allow_recurse && ReactiveContext::contains(inner.id) {
            return None;
        }

        self.cleanup();
        let _ctx = ReactiveContext::enter(self.clone());
        inner.run_count.set(inner.run_count.get() + 1);
        Some((inner.raw)())
    }

    /// Sever every dependency edge and deactivate the effect.
    pub fn stop(&self) {
        if !self.inner.active.get() {
            return;
        }
        self.cleanup();
        if let Some(on_stop) = self.inner.options.on_stop.clone() {
            on_stop();
        }
        self.inner.active.set(false);
        debug!(effect = %self.id(), "effect stopped");
    }

    pub(crate) fn record_dep(&self, target: TargetId, key: DepKey) {
        self.inner.deps.borrow_mut().push(DepRef { target, key });
    }

    pub(crate) fn downgrade(&self) -> WeakEffect {
        WeakEffect(Rc::downgrade(&self.inner))
    }

    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.inner.deps.borrow_mut());
        if !deps.is_empty() {
            Runtime::remove_edges(self.inner.id, &deps);
        }
    }
}

impl PartialEq for ReactiveEffect {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ReactiveEffect {}

impl fmt::Debug for ReactiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Register `f` as an effect.
///
/// Unless `options` is lazy, `f` runs once before this returns.
#[must_use = "dropping the handle stops the effect"]
pub fn effect<F, R>(f: F, options: EffectOptions) -> ReactiveEffect
where
    F: Fn() -> R + 'static,
    R: Into<Value>,
{
    create(Rc::new(move || f().into()), options)
}

/// Register the computation of an existing effect as a new effect.
///
/// The original effect is left untouched; the new one starts with no
/// dependencies of its own.
#[must_use = "dropping the handle stops the effect"]
pub fn effect_from(existing: &ReactiveEffect, options: EffectOptions) -> ReactiveEffect {
    create(existing.raw(), options)
}

/// Stop `effect`; see [`ReactiveEffect::stop`].
pub fn stop(effect: &ReactiveEffect) {
    effect.stop();
}

fn create(raw: EffectFn, options: EffectOptions) -> ReactiveEffect {
    let lazy = options.lazy;
    let effect = ReactiveEffect::new(raw, options);
    if !lazy {
        effect.run();
    }
    effect
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
