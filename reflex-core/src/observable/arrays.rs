//! Array instrumentations.
//!
//! Search methods track `"length"` and every index in one pass, then search
//! the raw elements. A miss is retried with the needle unwrapped, so a
//! wrapper finds its raw counterpart.
//!
//! Mutators run with tracking paused. They snapshot the raw elements,
//! mutate in place, and trigger the difference: `Add` for new indices,
//! `Set` for changed ones and a `"length"` write when the array shrank.

use tracing::warn;

use super::proxy::{to_raw, Proxy};
use super::value::{has_changed, Value};
use crate::error::{ReactiveError, Result};
use crate::graph::{DepKey, Key, TrackOp, TriggerOp};
use crate::reactive::{track, trigger, TrackingPaused, TriggerEvent};

impl Proxy {
    fn array_elements(&self, op: &'static str) -> Result<Vec<Value>> {
        let target = &self.inner.target;
        target.array_snapshot().ok_or(ReactiveError::Unsupported {
            op,
            shape: target.shape(),
        })
    }

    fn search<F>(&self, op: &'static str, needle: &Value, matches: F) -> Result<Option<usize>>
    where
        F: Fn(&[Value], &Value) -> Option<usize>,
    {
        if let Some(base) = &self.inner.base {
            return base.search(op, needle, matches);
        }
        let elements = self.array_elements(op)?;
        if !self.inner.readonly {
            let id = self.id();
            track(id, TrackOp::Get, DepKey::length());
            for index in 0..elements.len() {
                track(id, TrackOp::Get, DepKey::Prop(Key::Index(index)));
            }
        }
        Ok(matches(&elements, needle).or_else(|| matches(&elements, &to_raw(needle))))
    }

    /// Whether any element is `SameValueZero` to `needle`.
    pub fn includes(&self, needle: impl Into<Value>) -> bool {
        let found = self.search("includes", &needle.into(), |elements, needle| {
            elements.iter().position(|item| item.same_value_zero(needle))
        });
        super::handlers::report(found, None).is_some()
    }

    /// First index strictly equal to `needle`.
    pub fn index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        let found = self.search("indexOf", &needle.into(), |elements, needle| {
            elements.iter().position(|item| item.strict_equals(needle))
        });
        super::handlers::report(found, None)
    }

    /// Last index strictly equal to `needle`.
    pub fn last_index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        let found = self.search("lastIndexOf", &needle.into(), |elements, needle| {
            elements.iter().rposition(|item| item.strict_equals(needle))
        });
        super::handlers::report(found, None)
    }

    /// Values stored by mutators follow the same rule as `set`.
    fn stored(&self, value: Value) -> Value {
        if self.inner.shallow {
            value
        } else {
            to_raw(&value)
        }
    }

    fn mutate<R>(&self, op: &'static str, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R> {
        if self.inner.readonly {
            let err = ReactiveError::ReadonlyMutation { op };
            warn!(target = %self.id(), "{}", err);
            return Err(err);
        }

        let _paused = TrackingPaused::new();
        let target = &self.inner.target;
        let before = self.array_elements(op)?;
        let result = target.with_array_mut(op, f)?;
        let after = self.array_elements(op)?;

        let id = target.id();
        let shape = target.shape();
        for (index, value) in after.iter().enumerate() {
            let key = Key::Index(index);
            match before.get(index) {
                None => trigger(
                    TriggerEvent::new(id, shape, TriggerOp::Add)
                        .key(key)
                        .new_value(value),
                ),
                Some(old) if has_changed(value, old) => trigger(
                    TriggerEvent::new(id, shape, TriggerOp::Set)
                        .key(key)
                        .new_value(value)
                        .old_value(old),
                ),
                Some(_) => {}
            }
        }
        if after.len() < before.len() {
            let new_len = Value::from(after.len());
            let old_len = Value::from(before.len());
            trigger(
                TriggerEvent::new(id, shape, TriggerOp::Set)
                    .key(Key::length())
                    .new_value(&new_len)
                    .old_value(&old_len),
            );
        }
        Ok(result)
    }

    /// Append `items`, returning the new length.
    pub fn push<V: Into<Value>>(&self, items: impl IntoIterator<Item = V>) -> Result<usize> {
        let items: Vec<Value> = items.into_iter().map(|v| self.stored(v.into())).collect();
        self.mutate("push", move |elements| {
            elements.extend(items);
            elements.len()
        })
    }

    /// Remove and return the last element (`Undefined` when empty).
    pub fn pop(&self) -> Result<Value> {
        let popped = self.mutate("pop", |elements| elements.pop())?;
        Ok(popped.map(|value| self.wrap(value)).unwrap_or_default())
    }

    /// Remove and return the first element (`Undefined` when empty).
    pub fn shift(&self) -> Result<Value> {
        let shifted = self.mutate("shift", |elements| {
            if elements.is_empty() {
                None
            } else {
                Some(elements.remove(0))
            }
        })?;
        Ok(shifted.map(|value| self.wrap(value)).unwrap_or_default())
    }

    /// Prepend `items`, returning the new length.
    pub fn unshift<V: Into<Value>>(&self, items: impl IntoIterator<Item = V>) -> Result<usize> {
        let items: Vec<Value> = items.into_iter().map(|v| self.stored(v.into())).collect();
        self.mutate("unshift", move |elements| {
            elements.splice(0..0, items);
            elements.len()
        })
    }

    /// Remove `delete_count` elements starting at `start` and insert
    /// `items` in their place. Both bounds are clamped to the length.
    pub fn splice<V: Into<Value>>(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = V>,
    ) -> Result<Vec<Value>> {
        let items: Vec<Value> = items.into_iter().map(|v| self.stored(v.into())).collect();
        let removed = self.mutate("splice", move |elements| {
            let start = start.min(elements.len());
            let end = start + delete_count.min(elements.len() - start);
            elements.splice(start..end, items).collect::<Vec<_>>()
        })?;
        Ok(removed.into_iter().map(|value| self.wrap(value)).collect())
    }
}
