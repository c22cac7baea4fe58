//! Computed Implementation
//!
//! A computed value is a cached derivation: a lazy effect plus a dirty flag.
//!
//! # How Computed Values Work
//!
//! 1. Construction creates a lazy effect around the getter. Nothing runs.
//!
//! 2. Reading `value()` while dirty runs the effect, caches the result and
//!    clears the flag. Every read, dirty or not, tracks the computed's own
//!    `"value"` key.
//!
//! 3. When a source changes, the effect's scheduler runs instead of the
//!    getter. If the computed was clean, it becomes dirty and triggers its
//!    own `"value"` dependents.
//!
//! # Why This Matters
//!
//! Invalidation is lazy:
//!
//! - A source changes
//! - Computeds built on it are marked dirty, transitively
//! - Only the ones actually read again recompute

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::warn;

use super::effect::{effect, EffectOptions, ReactiveEffect};
use super::refs::{RefHandle, RefLike};
use super::runtime::{track, trigger, TriggerEvent};
use crate::error::{ReactiveError, Result};
use crate::graph::{DepKey, Identity, Key, TargetId, TrackOp, TriggerOp};
use crate::observable::{Shape, Value};

type Setter = Box<dyn Fn(Value)>;

/// A cached value derived from reactive sources.
///
/// Cloning yields another handle to the same computed.
#[derive(Clone)]
pub struct Computed {
    inner: Rc<ComputedInner>,
}

struct ComputedInner {
    identity: Identity,
    effect: ReactiveEffect,
    value: RefCell<Value>,
    dirty: Cell<bool>,
    setter: Option<Setter>,
}

impl Computed {
    fn new<G>(getter: G, setter: Option<Setter>) -> Self
    where
        G: Fn() -> Value + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner>| {
            let weak = weak.clone();
            let options = EffectOptions::new().lazy(true).scheduler(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate();
                }
            });
            ComputedInner {
                identity: Identity::new(),
                effect: effect(getter, options),
                value: RefCell::new(Value::Undefined),
                dirty: Cell::new(true),
                setter,
            }
        });
        Self { inner }
    }

    pub fn id(&self) -> TargetId {
        self.inner.identity.id()
    }

    /// Read the value, recomputing first if a source changed since the
    /// last read.
    pub fn value(&self) -> Value {
        let inner = &self.inner;
        if inner.dirty.get() {
            if let Some(fresh) = inner.effect.run() {
                inner.value.replace(fresh);
            }
            inner.dirty.set(false);
        }
        track(self.id(), TrackOp::Get, DepKey::value());
        inner.value.borrow().clone()
    }

    /// Pass `value` to the setter. Getter-only computeds log a warning and
    /// ignore the write.
    pub fn set_value(&self, value: impl Into<Value>) {
        if let Err(err) = self.try_set_value(value) {
            warn!(target = %self.id(), "{}", err);
        }
    }

    pub fn try_set_value(&self, value: impl Into<Value>) -> Result<()> {
        match &self.inner.setter {
            Some(setter) => {
                setter(value.into());
                Ok(())
            }
            None => Err(ReactiveError::ReadonlyComputed),
        }
    }

    /// Whether the computed has no setter.
    pub fn is_readonly(&self) -> bool {
        self.inner.setter.is_none()
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// The lazy effect wrapping the getter.
    pub fn effect(&self) -> &ReactiveEffect {
        &self.inner.effect
    }
}

impl ComputedInner {
    fn invalidate(&self) {
        if self.dirty.get() {
            return;
        }
        self.dirty.set(true);
        trigger(
            TriggerEvent::new(self.identity.id(), Shape::Record, TriggerOp::Set).key(Key::value()),
        );
    }
}

impl RefLike for Computed {
    fn id(&self) -> TargetId {
        Computed::id(self)
    }

    fn value(&self) -> Value {
        Computed::value(self)
    }

    fn try_set_value(&self, value: Value) -> Result<()> {
        Computed::try_set_value(self, value)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("dirty", &self.is_dirty())
            .field("readonly", &self.is_readonly())
            .finish()
    }
}

impl From<Computed> for Value {
    fn from(computed: Computed) -> Self {
        Value::Ref(RefHandle::new(computed))
    }
}

/// A readonly computed value.
pub fn computed<F, R>(getter: F) -> Computed
where
    F: Fn() -> R + 'static,
    R: Into<Value>,
{
    Computed::new(move || getter().into(), None)
}

/// A computed value whose writes are passed to `setter`.
pub fn writable_computed<F, R, S>(getter: F, setter: S) -> Computed
where
    F: Fn() -> R + 'static,
    R: Into<Value>,
    S: Fn(Value) + 'static,
{
    Computed::new(move || getter().into(), Some(Box::new(setter)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
