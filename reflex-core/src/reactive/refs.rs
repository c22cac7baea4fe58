//! Ref Implementation
//!
//! Refs are single-slot observable cells. They skip the proxy layer and
//! call `track`/`trigger` against their own identity under the `"value"`
//! key.
//!
//! # The Ref Family
//!
//! - [`Ref`] stores a value. Composite values are wrapped reactive unless
//!   the ref is shallow.
//! - [`ObjectRef`] stores nothing. It reads and writes one property of
//!   another value, inheriting whatever tracking that value does.
//! - [`CustomRef`] delegates to user functions, which decide when to call
//!   the [`CustomRefHooks`] they were given.
//!
//! All of them, and `Computed`, implement [`RefLike`] and convert into
//! [`Value::Ref`].
//!
//! # Example
//!
//! ```rust
//! use reflex_core::reactive::{effect, r#ref, EffectOptions};
//!
//! let count = r#ref(0);
//! let reader = count.clone();
//! let _log = effect(move || println!("{:?}", reader.value()), EffectOptions::new());
//!
//! count.set_value(1); // prints "1"
//! count.set_value(1); // unchanged, prints nothing
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use super::runtime::{track, trigger, TriggerEvent};
use crate::error::{ReactiveError, Result};
use crate::graph::{DepKey, Identity, Key, TargetId, TrackOp, TriggerOp};
use crate::observable::{has_changed, reactive, to_raw, Shape, Value};

/// The shared interface of every ref-family cell.
pub trait RefLike {
    /// Identity under which the cell is tracked.
    fn id(&self) -> TargetId;

    /// Read the current value.
    fn value(&self) -> Value;

    /// Write a new value, or report why it was rejected.
    fn try_set_value(&self, value: Value) -> Result<()>;

    /// Write a new value. Rejected writes are logged and ignored.
    fn set_value(&self, value: Value) {
        if let Err(err) = self.try_set_value(value) {
            warn!(target = %self.id(), "{}", err);
        }
    }
}

fn track_value(id: TargetId) {
    track(id, TrackOp::Get, DepKey::value());
}

fn trigger_value(id: TargetId, new_value: &Value, old_value: &Value) {
    trigger(
        TriggerEvent::new(id, Shape::Record, TriggerOp::Set)
            .key(Key::value())
            .new_value(new_value)
            .old_value(old_value),
    );
}

/// A type-erased ref, as stored in [`Value::Ref`].
#[derive(Clone)]
pub struct RefHandle(Rc<dyn RefLike>);

impl RefHandle {
    pub fn new(cell: impl RefLike + 'static) -> Self {
        Self(Rc::new(cell))
    }

    pub fn id(&self) -> TargetId {
        self.0.id()
    }

    pub fn value(&self) -> Value {
        self.0.value()
    }

    pub fn set_value(&self, value: impl Into<Value>) {
        self.0.set_value(value.into());
    }

    pub fn try_set_value(&self, value: impl Into<Value>) -> Result<()> {
        self.0.try_set_value(value.into())
    }

    /// Whether both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &RefHandle) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for RefHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefHandle({})", self.id())
    }
}

// ----------------------------------------------------------------------------
// Ref
// ----------------------------------------------------------------------------

/// A boxed observable value.
#[derive(Clone)]
pub struct Ref {
    inner: Rc<RefInner>,
}

struct RefInner {
    identity: Identity,
    /// The last value assigned, unwrapped.
    raw: RefCell<Value>,
    /// What reads return: `raw`, wrapped reactive unless shallow.
    value: RefCell<Value>,
    shallow: bool,
}

fn convert(value: &Value) -> Value {
    if value.is_object() {
        reactive(value)
    } else {
        value.clone()
    }
}

impl Ref {
    fn create(value: Value, shallow: bool) -> Self {
        let (raw, value) = if shallow {
            (value.clone(), value)
        } else {
            let raw = to_raw(&value);
            let converted = convert(&raw);
            (raw, converted)
        };
        Self {
            inner: Rc::new(RefInner {
                identity: Identity::new(),
                raw: RefCell::new(raw),
                value: RefCell::new(value),
                shallow,
            }),
        }
    }

    pub fn id(&self) -> TargetId {
        self.inner.identity.id()
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    /// Read the value, tracking it.
    pub fn value(&self) -> Value {
        track_value(self.id());
        self.inner.value.borrow().clone()
    }

    /// Read the value without tracking it.
    pub fn value_untracked(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Assign a new value. Triggers only if it differs (`Object.is`) from
    /// the previous assignment.
    pub fn set_value(&self, value: impl Into<Value>) {
        let value = value.into();
        let raw = if self.inner.shallow {
            value
        } else {
            to_raw(&value)
        };
        if !has_changed(&raw, &self.inner.raw.borrow()) {
            return;
        }

        let converted = if self.inner.shallow {
            raw.clone()
        } else {
            convert(&raw)
        };
        let old_value = self.inner.raw.replace(raw);
        self.inner.value.replace(converted.clone());
        trigger_value(self.id(), &converted, &old_value);
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl RefLike for Ref {
    fn id(&self) -> TargetId {
        Ref::id(self)
    }

    fn value(&self) -> Value {
        Ref::value(self)
    }

    fn try_set_value(&self, value: Value) -> Result<()> {
        Ref::set_value(self, value);
        Ok(())
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.id())
            .field("value", &self.value_untracked())
            .field("shallow", &self.inner.shallow)
            .finish()
    }
}

/// Create a ref. Composite values are wrapped reactive.
pub fn r#ref(value: impl Into<Value>) -> Ref {
    Ref::create(value.into(), false)
}

/// Create a ref that stores composite values as given.
pub fn shallow_ref(value: impl Into<Value>) -> Ref {
    Ref::create(value.into(), true)
}

/// Re-run everything depending on `r` without changing it.
///
/// Use after mutating the inside of a shallow ref's value.
pub fn trigger_ref(r: &Ref) {
    let value = r.value_untracked();
    trigger_value(r.id(), &value, &value);
}

// ----------------------------------------------------------------------------
// ObjectRef
// ----------------------------------------------------------------------------

/// A ref aliasing `source[key]`.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Rc<ObjectRefInner>,
}

struct ObjectRefInner {
    identity: Identity,
    source: Value,
    key: Key,
}

impl ObjectRef {
    pub fn key(&self) -> &Key {
        &self.inner.key
    }

    pub fn source(&self) -> &Value {
        &self.inner.source
    }

    pub fn value(&self) -> Value {
        self.inner.source.get(&self.inner.key)
    }

    pub fn set_value(&self, value: impl Into<Value>) {
        RefLike::set_value(self, value.into());
    }
}

impl RefLike for ObjectRef {
    fn id(&self) -> TargetId {
        self.inner.identity.id()
    }

    fn value(&self) -> Value {
        ObjectRef::value(self)
    }

    fn try_set_value(&self, value: Value) -> Result<()> {
        let key = self.inner.key.clone();
        match &self.inner.source {
            Value::Proxy(proxy) => proxy.try_set(key, value),
            Value::Object(target) => target.write(&key, value).map(|_| ()),
            other => Err(ReactiveError::NotComposite(other.clone())),
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("source", &self.inner.source)
            .field("key", &self.inner.key)
            .finish()
    }
}

/// A ref reading and writing `source[key]`.
pub fn to_ref(source: &Value, key: impl Into<Key>) -> ObjectRef {
    ObjectRef {
        inner: Rc::new(ObjectRefInner {
            identity: Identity::new(),
            source: source.clone(),
            key: key.into(),
        }),
    }
}

/// One [`ObjectRef`] per current key of `source`.
///
/// The keys are read from the raw data, so this does not track.
pub fn to_refs(source: &Value) -> IndexMap<Key, ObjectRef> {
    to_raw(source)
        .keys()
        .into_iter()
        .map(|key| (key.clone(), to_ref(source, key)))
        .collect()
}

// ----------------------------------------------------------------------------
// CustomRef
// ----------------------------------------------------------------------------

/// The track/trigger callbacks handed to a [`custom_ref`] factory.
#[derive(Debug, Clone, Copy)]
pub struct CustomRefHooks {
    id: TargetId,
}

impl CustomRefHooks {
    /// Record that the active effect reads this ref.
    pub fn track(&self) {
        track_value(self.id);
    }

    /// Re-run everything that read this ref.
    pub fn trigger(&self) {
        trigger_value(self.id, &Value::Undefined, &Value::Undefined);
    }
}

type CustomGet = Box<dyn Fn() -> Value>;
type CustomSet = Box<dyn Fn(Value)>;

/// A ref whose reads and writes are user functions.
#[derive(Clone)]
pub struct CustomRef {
    inner: Rc<CustomRefInner>,
}

struct CustomRefInner {
    identity: Identity,
    get: CustomGet,
    set: CustomSet,
}

impl CustomRef {
    pub fn value(&self) -> Value {
        (self.inner.get)()
    }

    pub fn set_value(&self, value: impl Into<Value>) {
        (self.inner.set)(value.into());
    }
}

impl RefLike for CustomRef {
    fn id(&self) -> TargetId {
        self.inner.identity.id()
    }

    fn value(&self) -> Value {
        CustomRef::value(self)
    }

    fn try_set_value(&self, value: Value) -> Result<()> {
        CustomRef::set_value(self, value);
        Ok(())
    }
}

impl fmt::Debug for CustomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomRef({})", self.inner.identity.id())
    }
}

/// Build a ref from a factory receiving its track/trigger hooks and
/// returning its getter and setter.
pub fn custom_ref<F, G, S>(factory: F) -> CustomRef
where
    F: FnOnce(CustomRefHooks) -> (G, S),
    G: Fn() -> Value + 'static,
    S: Fn(Value) + 'static,
{
    let identity = Identity::new();
    let (get, set) = factory(CustomRefHooks { id: identity.id() });
    CustomRef {
        inner: Rc::new(CustomRefInner {
            identity,
            get: Box::new(get),
            set: Box::new(set),
        }),
    }
}

// ----------------------------------------------------------------------------
// Utilities
// ----------------------------------------------------------------------------

pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The value inside a ref, or `value` itself.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(handle) => handle.value(),
        other => other.clone(),
    }
}

/// A view over `source` whose reads unwrap refs and whose writes of a
/// plain value into a ref slot assign through the ref.
#[derive(Debug, Clone)]
pub struct RefsView {
    source: Value,
}

impl RefsView {
    pub fn source(&self) -> &Value {
        &self.source
    }

    pub fn get(&self, key: impl Into<Key>) -> Value {
        unref(&self.source.get(key))
    }

    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        match self.source.get(&key) {
            Value::Ref(slot) if !is_ref(&value) => {
                slot.set_value(value);
                true
            }
            _ => self.source.set(key, value),
        }
    }
}

pub fn proxy_refs(source: &Value) -> RefsView {
    RefsView {
        source: source.clone(),
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(RefHandle::new(r))
    }
}

impl From<ObjectRef> for Value {
    fn from(r: ObjectRef) -> Self {
        Value::Ref(RefHandle::new(r))
    }
}

impl From<CustomRef> for Value {
    fn from(r: CustomRef) -> Self {
        Value::Ref(RefHandle::new(r))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
