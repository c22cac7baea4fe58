//! Errors reported by checked (`try_*`) operations.
//!
//! The unchecked counterparts never fail: they log the error at warn level
//! and leave state untouched.

use thiserror::Error;

use crate::graph::{Key, TargetId};
use crate::observable::{Shape, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    #[error("{op} operation on key \"{key}\" failed: target is readonly")]
    ReadonlyTarget { op: &'static str, key: Key },

    #[error("{op} operation failed: target is readonly")]
    ReadonlyMutation { op: &'static str },

    #[error("write operation failed: computed value is readonly")]
    ReadonlyComputed,

    #[error("{op} is not supported on {shape} targets")]
    Unsupported { op: &'static str, shape: Shape },

    #[error("key \"{key}\" is not valid on {shape} targets")]
    InvalidKey { key: Key, shape: Shape },

    #[error("{0:?} is not a composite")]
    NotComposite(Value),

    #[error("invalid array length {0:?}")]
    InvalidLength(Value),

    #[error("target {0} is frozen")]
    Frozen(TargetId),

    #[error("cyclic structure at target {0}")]
    Cyclic(TargetId),
}

pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;
