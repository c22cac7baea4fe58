//! Observable Proxy Factory
//!
//! Wraps raw composites in interception layers. Every read through a
//! [`Proxy`] calls `track`, every write calls `trigger`.
//!
//! # Variants
//!
//! | factory            | writes   | nested values       |
//! |--------------------|----------|---------------------|
//! | [`reactive`]         | tracked  | wrapped reactive    |
//! | [`shallow_reactive`] | tracked  | returned as stored  |
//! | [`readonly`]         | rejected | wrapped readonly    |
//! | [`shallow_readonly`] | rejected | returned as stored  |
//!
//! # Caching
//!
//! Two identity-keyed caches hold one wrapper per target: the mutable cache
//! (shared by `reactive` and `shallow_reactive`) and the readonly cache.
//! Wrapping the same target twice yields the same wrapper as long as the
//! first one is alive. Cache entries are weak and are removed when their
//! target is dropped.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use fxhash::FxHashMap;

use super::target::{Target, TargetType};
use super::value::Value;
use crate::graph::{Key, TargetId};

thread_local! {
    static REACTIVE_MAP: RefCell<FxHashMap<TargetId, Weak<ProxyInner>>> =
        RefCell::new(FxHashMap::default());
    static READONLY_MAP: RefCell<FxHashMap<ReadonlyKey, Weak<ProxyInner>>> =
        RefCell::new(FxHashMap::default());
}

/// Readonly wrappers of a raw target and of its reactive wrapper are
/// distinct, so the readonly cache is keyed by both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ReadonlyKey {
    target: TargetId,
    over_reactive: bool,
}

/// Sentinel keys answered by every wrapper without tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactiveFlag {
    Skip,
    IsReactive,
    IsReadonly,
    IsShallow,
    Raw,
}

impl ReactiveFlag {
    pub const fn key(self) -> &'static str {
        match self {
            ReactiveFlag::Skip => "__v_skip",
            ReactiveFlag::IsReactive => "__v_isReactive",
            ReactiveFlag::IsReadonly => "__v_isReadonly",
            ReactiveFlag::IsShallow => "__v_isShallow",
            ReactiveFlag::Raw => "__v_raw",
        }
    }

    pub fn parse(key: &Key) -> Option<Self> {
        let Key::Name(name) = key else {
            return None;
        };
        [
            ReactiveFlag::Skip,
            ReactiveFlag::IsReactive,
            ReactiveFlag::IsReadonly,
            ReactiveFlag::IsShallow,
            ReactiveFlag::Raw,
        ]
        .into_iter()
        .find(|flag| flag.key() == &**name)
    }
}

/// An observable wrapper around a [`Target`].
///
/// Cloning yields another handle to the same wrapper; equality is identity.
#[derive(Clone)]
pub struct Proxy {
    pub(super) inner: Rc<ProxyInner>,
}

pub(super) struct ProxyInner {
    pub(super) target: Target,
    pub(super) readonly: bool,
    pub(super) shallow: bool,
    /// The reactive wrapper a readonly wrapper was built over, if any.
    /// Reads go through it so they are still tracked.
    pub(super) base: Option<Proxy>,
}

impl Proxy {
    /// The raw target behind this wrapper.
    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    pub fn id(&self) -> TargetId {
        self.inner.target.id()
    }

    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    /// Answer a sentinel read.
    pub fn flag(&self, flag: ReactiveFlag) -> Value {
        match flag {
            ReactiveFlag::Skip => Value::Bool(self.inner.target.is_skipped()),
            ReactiveFlag::IsReactive => Value::Bool(!self.inner.readonly),
            ReactiveFlag::IsReadonly => Value::Bool(self.inner.readonly),
            ReactiveFlag::IsShallow => Value::Bool(self.inner.shallow),
            ReactiveFlag::Raw if self.is_cached() => match &self.inner.base {
                Some(base) => Value::Proxy(base.clone()),
                None => Value::Object(self.inner.target.clone()),
            },
            ReactiveFlag::Raw => Value::Undefined,
        }
    }

    /// Whether this wrapper is the one its cache holds for its target.
    fn is_cached(&self) -> bool {
        let cached = if self.inner.readonly {
            let key = ReadonlyKey {
                target: self.id(),
                over_reactive: self.inner.base.is_some(),
            };
            READONLY_MAP.with(|map| map.borrow().get(&key).and_then(Weak::upgrade))
        } else {
            REACTIVE_MAP.with(|map| map.borrow().get(&self.id()).and_then(Weak::upgrade))
        };
        cached.map_or(false, |inner| Rc::ptr_eq(&inner, &self.inner))
    }

    /// Wrap a value read through this proxy the way the variant requires.
    pub(super) fn wrap(&self, value: Value) -> Value {
        if self.inner.shallow || !value.is_object() {
            return value;
        }
        if self.inner.readonly {
            readonly(&value)
        } else {
            reactive(&value)
        }
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Proxy {}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match (self.inner.readonly, self.inner.shallow) {
            (false, false) => "Reactive",
            (false, true) => "ShallowReactive",
            (true, false) => "Readonly",
            (true, true) => "ShallowReadonly",
        };
        write!(f, "{}({} {})", kind, self.inner.target.shape(), self.id())
    }
}

/// Drop every cache entry for `target`. Called when the target goes away.
pub(crate) fn evict(target: TargetId) {
    let _ = REACTIVE_MAP.try_with(|map| {
        if let Ok(mut map) = map.try_borrow_mut() {
            map.remove(&target);
        }
    });
    let _ = READONLY_MAP.try_with(|map| {
        if let Ok(mut map) = map.try_borrow_mut() {
            for over_reactive in [false, true] {
                map.remove(&ReadonlyKey {
                    target,
                    over_reactive,
                });
            }
        }
    });
}

fn cached_or_insert<K>(
    cache: &'static std::thread::LocalKey<RefCell<FxHashMap<K, Weak<ProxyInner>>>>,
    key: K,
    create: impl FnOnce() -> ProxyInner,
) -> Proxy
where
    K: std::hash::Hash + Eq,
{
    cache.with(|map| {
        let mut map = map.borrow_mut();
        if let Some(inner) = map.get(&key).and_then(Weak::upgrade) {
            return Proxy { inner };
        }
        let inner = Rc::new(create());
        map.insert(key, Rc::downgrade(&inner));
        Proxy { inner }
    })
}

/// The single constructor behind the four factories.
fn create_reactive_object(value: &Value, readonly: bool, shallow: bool) -> Value {
    match value {
        Value::Proxy(existing) => {
            // Only a readonly wrap of a reactive wrapper builds something new
            if !(readonly && !existing.inner.readonly) {
                return value.clone();
            }
            let base = existing.clone();
            let key = ReadonlyKey {
                target: base.id(),
                over_reactive: true,
            };
            Value::Proxy(cached_or_insert(&READONLY_MAP, key, || ProxyInner {
                target: base.inner.target.clone(),
                readonly: true,
                shallow,
                base: Some(base),
            }))
        }
        Value::Object(target) => {
            if target.target_type() == TargetType::Invalid {
                return value.clone();
            }
            let create = || ProxyInner {
                target: target.clone(),
                readonly,
                shallow,
                base: None,
            };
            let proxy = if readonly {
                let key = ReadonlyKey {
                    target: target.id(),
                    over_reactive: false,
                };
                cached_or_insert(&READONLY_MAP, key, create)
            } else {
                cached_or_insert(&REACTIVE_MAP, target.id(), create)
            };
            Value::Proxy(proxy)
        }
        _ => Value::Undefined,
    }
}

/// Deeply reactive wrapper of a composite.
///
/// Primitives yield `Undefined`; frozen or skipped composites and existing
/// wrappers are returned unchanged.
pub fn reactive(value: &Value) -> Value {
    create_reactive_object(value, false, false)
}

/// Reactive wrapper that tracks only the first level.
pub fn shallow_reactive(value: &Value) -> Value {
    create_reactive_object(value, false, true)
}

/// Deeply readonly wrapper. Writes are rejected with a warning.
pub fn readonly(value: &Value) -> Value {
    create_reactive_object(value, true, false)
}

pub fn shallow_readonly(value: &Value) -> Value {
    create_reactive_object(value, true, true)
}

/// Whether `value` is a reactive wrapper, or a readonly wrapper over one.
pub fn is_reactive(value: &Value) -> bool {
    let Value::Proxy(proxy) = value else {
        return false;
    };
    if is_readonly(value) {
        return is_reactive(&proxy.flag(ReactiveFlag::Raw));
    }
    proxy.flag(ReactiveFlag::IsReactive) == Value::Bool(true)
}

pub fn is_readonly(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) => proxy.flag(ReactiveFlag::IsReadonly) == Value::Bool(true),
        _ => false,
    }
}

pub fn is_shallow(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) => proxy.flag(ReactiveFlag::IsShallow) == Value::Bool(true),
        _ => false,
    }
}

pub fn is_proxy(value: &Value) -> bool {
    is_reactive(value) || is_readonly(value)
}

/// Peel every wrapper layer off `value`.
pub fn to_raw(value: &Value) -> Value {
    let mut current = value.clone();
    while let Value::Proxy(proxy) = &current {
        match proxy.flag(ReactiveFlag::Raw) {
            Value::Undefined => break,
            raw => current = raw,
        }
    }
    current
}

/// Set the skip marker on the composite behind `value`, so the factories
/// return it unchanged from now on.
pub fn mark_raw(value: &Value) -> Value {
    match value {
        Value::Object(target) => {
            target.mark_raw();
        }
        Value::Proxy(proxy) => {
            proxy.target().mark_raw();
        }
        _ => {}
    }
    value.clone()
}
