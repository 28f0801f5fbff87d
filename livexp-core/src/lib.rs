//! Livexp Core
//!
//! This crate provides the core runtime for live expressions: values that
//! are pure functions of other observable values, recompute themselves when
//! their inputs change, and tell subscribers about it.
//! It implements:
//!
//! - Live expression nodes, variables and combinators
//! - Scheduled (debounced) refresh and notification on a background lane
//! - Observable sets with batched edits and set algebra
//! - Composite nodes: aggregates, validators, boolean or
//! - A one-way disposal lifecycle that tears down subscriptions
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: The `LiveExpression` node and everything built directly on it
//! - `schedule`: The `Scheduler` seam and its manual and tokio lanes
//! - `collections`: Observable sets
//! - `composite`: Nodes aggregating child nodes
//! - `dispose`: The disposal lifecycle shared by all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use livexp_core::reactive::LiveVariable;
//!
//! // Create a variable
//! let x = LiveVariable::new(1);
//!
//! // Create a derived value
//! let y = x.apply(|v| v * 2);
//!
//! // Subscribe to it
//! y.add_listener(|_, value| println!("y = {value}"));   // prints "y = 2"
//!
//! // Update the variable
//! x.set_value(5);
//! // Listener runs, prints "y = 10"
//! ```

pub mod collections;
pub mod composite;
pub mod config;
pub mod dispose;
pub mod error;
pub mod reactive;
pub mod schedule;

pub use collections::{live_sets, ImmutableSet, LiveSetVariable, ObservableSet};
pub use composite::{CompositeExpression, CompositeValidator, OrExpression, Severity, ValidationResult};
pub use config::EngineConfig;
pub use dispose::{Disposable, DisposableScope, OnDispose, Subscription};
pub use error::{BoxError, LiveError};
pub use reactive::{DelegatingLiveExp, LiveExpression, LiveValue, LiveVariable};
pub use schedule::{AsyncMode, ManualScheduler, Scheduler, TokioScheduler};
