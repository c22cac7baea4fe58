//! Interception specific to map and set targets.
//!
//! Keyed access (`get`, `set`, `has`, `delete`) and enumeration share the
//! base handlers; a map `set` that replaces a value also re-runs iterators,
//! which the dependency store handles. What is left here are the
//! operations only collections have.

use super::handlers::report;
use super::proxy::Proxy;
use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::graph::{Key, TriggerOp};
use crate::reactive::{trigger, TriggerEvent};

impl Proxy {
    /// Add `member` to a set. Returns whether it was new.
    pub fn add(&self, member: impl Into<Key>) -> bool {
        report(self.try_add(member), false)
    }

    pub fn try_add(&self, member: impl Into<Key>) -> Result<bool> {
        if self.inner.readonly {
            return Err(ReactiveError::ReadonlyMutation { op: "add" });
        }
        let member = member.into();
        let target = &self.inner.target;
        let added = target.insert(member.clone())?;
        if added {
            let value = Value::from(member.clone());
            trigger(
                TriggerEvent::new(target.id(), target.shape(), TriggerOp::Add)
                    .key(member)
                    .new_value(&value),
            );
        }
        Ok(added)
    }

    /// Remove every entry of a map or set, re-running every effect that
    /// depends on any part of it. Returns whether anything was removed.
    pub fn clear(&self) -> bool {
        report(self.try_clear(), false)
    }

    pub fn try_clear(&self) -> Result<bool> {
        if self.inner.readonly {
            return Err(ReactiveError::ReadonlyMutation { op: "clear" });
        }
        let target = &self.inner.target;
        let had_entries = target.clear()?;
        if had_entries {
            trigger(TriggerEvent::new(target.id(), target.shape(), TriggerOp::Clear));
        }
        Ok(had_entries)
    }
}
