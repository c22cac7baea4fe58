//! Dependency Graph
//!
//! This module holds the data side of the engine: what an observable node is
//! called ([`TargetId`]), which of its slots a computation read ([`Key`],
//! [`DepKey`]), what kind of access happened ([`TrackOp`], [`TriggerOp`]),
//! and the forward edges from (target, key) to effects
//! ([`DependencyStore`]).
//!
//! # Design Decisions
//!
//! 1. Targets are addressed by id, never by reference, so the store cannot
//!    extend the lifetime of the objects it describes. Owners of an
//!    [`Identity`] purge their edges when they are dropped.
//!
//! 2. Effects are addressed by id as well. The runtime keeps a registry of
//!    weak effect handles; an id whose effect is gone simply resolves to
//!    nothing.
//!
//! 3. Reverse edges (effect → the deps it belongs to) live on the effect, so
//!    that cleanup before a re-run is proportional to what the effect read.

mod key;
mod node;
mod ops;
mod store;

pub use key::{DepKey, Key, LENGTH, VALUE};
pub use node::{Identity, TargetId};
pub use ops::{TrackOp, TriggerOp};
pub use store::{Dep, DependencyStore};
