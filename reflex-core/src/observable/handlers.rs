//! Base interception for every wrapper: property reads and writes, key
//! tests, deletion and enumeration.
//!
//! Readonly wrappers never track (their data cannot change through them)
//! unless they were built over a reactive wrapper, in which case reads are
//! delegated to it and tracked there.

use tracing::warn;

use super::proxy::{to_raw, Proxy, ReactiveFlag};
use super::target::Shape;
use super::value::{has_changed, Value};
use crate::error::{ReactiveError, Result};
use crate::graph::{DepKey, Key, TrackOp, TriggerOp};
use crate::reactive::{track, trigger, TriggerEvent};

/// Log a rejected operation and fall back to `fallback`.
pub(super) fn report<T>(result: Result<T>, fallback: T) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!("{}", err);
            fallback
        }
    }
}

impl Proxy {
    /// Read `key`, tracking it and wrapping composite results.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        if let Some(flag) = ReactiveFlag::parse(&key) {
            return self.flag(flag);
        }
        if let Some(base) = &self.inner.base {
            return self.wrap(base.get(key));
        }

        let target = &self.inner.target;
        let value = target.get(&key);
        if !self.inner.readonly {
            track(target.id(), TrackOp::Get, DepKey::Prop(key));
        }
        self.wrap(value)
    }

    /// Write `key`, triggering `Add` for a new key or `Set` for a changed
    /// value.
    ///
    /// On a readonly wrapper the write is rejected with a warning and
    /// `true` is returned. Other rejected writes return `false`.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(err @ ReactiveError::ReadonlyTarget { .. }) => {
                warn!(target = %self.id(), "{}", err);
                true
            }
            Err(err) => {
                warn!(target = %self.id(), "{}", err);
                false
            }
        }
    }

    pub fn try_set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        if self.inner.readonly {
            return Err(ReactiveError::ReadonlyTarget { op: "set", key });
        }
        let value = value.into();
        let value = if self.inner.shallow {
            value
        } else {
            to_raw(&value)
        };

        let target = &self.inner.target;
        let written = target.write(&key, value.clone())?;
        let event = TriggerEvent::new(target.id(), target.shape(), TriggerOp::Add)
            .key(key)
            .new_value(&value);
        if !written.had_key {
            trigger(event);
        } else if has_changed(&value, &written.old_value) {
            trigger(TriggerEvent {
                op: TriggerOp::Set,
                ..event.old_value(&written.old_value)
            });
        }
        Ok(())
    }

    /// Whether `key` is present, tracked as `Has`.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if let Some(base) = &self.inner.base {
            return base.has(key);
        }
        let target = &self.inner.target;
        let present = target.has(&key);
        if !self.inner.readonly {
            track(target.id(), TrackOp::Has, DepKey::Prop(key));
        }
        present
    }

    /// Remove `key`. Returns whether it was present.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        report(self.try_delete(key), false)
    }

    pub fn try_delete(&self, key: impl Into<Key>) -> Result<bool> {
        let key = key.into();
        if self.inner.readonly {
            return Err(ReactiveError::ReadonlyTarget { op: "delete", key });
        }
        let target = &self.inner.target;
        let had_key = target.has(&key);
        let removed = target.remove(&key)?;
        if had_key {
            let old_value = removed.unwrap_or_default();
            trigger(
                TriggerEvent::new(target.id(), target.shape(), TriggerOp::Delete)
                    .key(key)
                    .old_value(&old_value),
            );
        }
        Ok(had_key)
    }

    /// Record a dependency on the set of keys: `"length"` for arrays,
    /// `Iterate` for everything else.
    fn track_iteration(&self) {
        if self.inner.readonly {
            return;
        }
        let target = &self.inner.target;
        let key = if target.shape() == Shape::Array {
            DepKey::length()
        } else {
            DepKey::Iterate
        };
        track(target.id(), TrackOp::Iterate, key);
    }

    /// Number of entries, or the length of an array.
    pub fn len(&self) -> usize {
        if let Some(base) = &self.inner.base {
            return base.len();
        }
        self.track_iteration();
        self.inner.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<Key> {
        if let Some(base) = &self.inner.base {
            return base.keys();
        }
        self.track_iteration();
        self.inner.target.keys()
    }

    pub fn values(&self) -> Vec<Value> {
        let values = match &self.inner.base {
            Some(base) => base.values(),
            None => {
                self.track_iteration();
                self.inner.target.values()
            }
        };
        values.into_iter().map(|value| self.wrap(value)).collect()
    }

    pub fn entries(&self) -> Vec<(Key, Value)> {
        let entries = match &self.inner.base {
            Some(base) => base.entries(),
            None => {
                self.track_iteration();
                self.inner.target.entries()
            }
        };
        entries
            .into_iter()
            .map(|(key, value)| (key, self.wrap(value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::{reactive, readonly, shallow_reactive, Target};
    use crate::reactive::{effect, EffectOptions};
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_effect(f: impl Fn() + 'static) -> (crate::reactive::ReactiveEffect, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let handle = effect(
            move || {
                runs_clone.set(runs_clone.get() + 1);
                f();
            },
            EffectOptions::new(),
        );
        (handle, runs)
    }

    #[test]
    fn get_tracks_and_set_triggers() {
        let state = reactive(&Value::from(Target::record_from([("a", 1)])));
        let seen = Rc::new(Cell::new(0.0));
        let (_effect, runs) = {
            let state = state.clone();
            let seen = seen.clone();
            counting_effect(move || seen.set(state.get("a").as_f64().unwrap_or(0.0)))
        };

        assert!(state.set("a", 2));
        assert_eq!(runs.get(), 2);
        assert_eq!(seen.get(), 2.0);

        // Same value, no re-run
        assert!(state.set("a", 2));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nested_composites_are_wrapped_lazily() {
        let inner = Target::record_from([("x", 1)]);
        let outer = Target::record_from([("inner", inner.clone())]);
        let state = reactive(&Value::from(outer));

        let nested = state.get("inner");
        assert!(crate::observable::is_reactive(&nested));
        assert_eq!(nested, reactive(&Value::from(inner)));
    }

    #[test]
    fn shallow_wrappers_return_raw_nested_values() {
        let inner = Target::record();
        let state = shallow_reactive(&Value::from(Target::record_from([("inner", inner.clone())])));
        assert_eq!(state.get("inner"), Value::from(inner));
    }

    #[test]
    fn readonly_writes_warn_and_keep_state() {
        let raw = Value::from(Target::record_from([("x", 1)]));
        let locked = readonly(&raw);

        assert!(locked.set("x", 5));
        assert_eq!(raw.get("x"), Value::from(1));

        let Value::Proxy(proxy) = &locked else {
            panic!("expected a proxy");
        };
        assert!(matches!(
            proxy.try_set("x", 5),
            Err(ReactiveError::ReadonlyTarget { .. })
        ));
        assert!(!locked.as_proxy().unwrap().delete("x"));
        assert!(raw.has("x"));
    }

    #[test]
    fn adding_a_key_reruns_iterators() {
        let state = reactive(&Value::from(Target::record()));
        let (_effect, runs) = {
            let state = state.clone();
            counting_effect(move || {
                state.keys();
            })
        };

        state.set("a", 1);
        assert_eq!(runs.get(), 2);
        // Updating an existing key leaves the key set alone
        state.set("a", 2);
        assert_eq!(runs.get(), 2);
        state.as_proxy().unwrap().delete("a");
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn has_tracks_presence() {
        let state = reactive(&Value::from(Target::record()));
        let (_effect, runs) = {
            let state = state.clone();
            counting_effect(move || {
                state.has("a");
            })
        };

        state.set("a", 1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn readonly_reads_do_not_track() {
        let locked = readonly(&Value::from(Target::record_from([("a", 1)])));
        let effect = {
            let locked = locked.clone();
            effect(move || locked.get("a"), EffectOptions::new())
        };
        assert_eq!(effect.dependency_count(), 0);
    }

    #[test]
    fn readonly_over_reactive_still_tracks() {
        let raw = Value::from(Target::record_from([("a", 1)]));
        let state = reactive(&raw);
        let view = readonly(&state);
        let (_effect, runs) = {
            let view = view.clone();
            counting_effect(move || {
                view.get("a");
            })
        };

        state.set("a", 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn oversized_index_write_is_rejected_without_trigger() {
        let arr = reactive(&Value::from(Target::array_from([1, 2, 3])));
        let (_effect, runs) = {
            let arr = arr.clone();
            counting_effect(move || {
                arr.get("length");
            })
        };

        assert!(!arr.set(usize::MAX, 9));
        assert!(matches!(
            arr.as_proxy().unwrap().try_set(10_000_000_000usize, 9),
            Err(ReactiveError::InvalidKey { .. })
        ));
        assert_eq!(arr.len(), Some(3));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn stored_values_stay_raw() {
        let child = Value::from(Target::record());
        let state = reactive(&Value::from(Target::record()));
        state.set("child", reactive(&child));

        assert_eq!(crate::observable::to_raw(&state).get("child"), child);
    }
}
