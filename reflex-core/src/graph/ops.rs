//! Operation taxonomy.
//!
//! Names the kind of read passed to `track` and the kind of write passed to
//! `trigger`.

use std::fmt;

/// The kind of read that created a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// The kind of write that invalidated dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum TriggerOp {
    /// A key that did not exist before was written.
    Add,
    /// An existing key changed value.
    Set,
    /// An existing key was removed.
    Delete,
    /// Every entry of a collection was removed.
    Clear,
}

impl fmt::Display for TrackOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrackOp::Get => "get",
            TrackOp::Has => "has",
            TrackOp::Iterate => "iterate",
        })
    }
}

impl fmt::Display for TriggerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerOp::Add => "add",
            TriggerOp::Set => "set",
            TriggerOp::Delete => "delete",
            TriggerOp::Clear => "clear",
        })
    }
}
