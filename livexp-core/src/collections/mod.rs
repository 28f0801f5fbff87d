//! Observable Collections
//!
//! An `ObservableSet` is a live expression whose value is an immutable set
//! snapshot. `LiveSetVariable` is the mutable leaf: edits go to a backing
//! set and mark it dirty, and a refresh takes a new snapshot only when the
//! backing set actually changed. `live_sets` holds the derived sets.

pub mod live_sets;
mod set;

pub use set::{ImmutableSet, LiveSetVariable, ObservableSet, SetElement};
