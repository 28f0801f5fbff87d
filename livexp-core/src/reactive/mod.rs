//! Live Expressions
//!
//! This module implements the core of the engine: nodes that cache a value,
//! recompute it on request, and notify listeners when it changes.
//!
//! # Concepts
//!
//! ## Live Expressions
//!
//! A `LiveExpression` holds the last value its compute function produced.
//! Reading it never computes; `refresh()` does. When a refresh produces a
//! value different from the cached one, listeners are notified.
//!
//! ## Dependencies
//!
//! Dependencies are declared explicitly with `depends_on`: the dependent
//! subscribes to the dependency and refreshes itself on every change. The
//! edge is removed when the dependent is disposed.
//!
//! ## Variables
//!
//! A `LiveVariable` is a leaf node whose value is set from the outside.
//!
//! # Implementation Notes
//!
//! There is no global runtime. Each node owns its listeners and dispose
//! handlers, and a change cascades through the graph by plain function
//! calls. A thread-local refresh stack records which nodes are refreshing
//! so that runaway cascades are caught in debug builds.

mod builder;
mod combinators;
mod context;
mod delegating;
mod expression;
mod listener;
mod variable;

pub use builder::Builder;
pub use context::RefreshContext;
pub use delegating::DelegatingLiveExp;
pub use expression::{LiveExpression, LiveValue, WeakExpression};
pub use listener::{Listener, ListenerId, NodeId};
pub use variable::LiveVariable;

pub(crate) use expression::{Lane, Strategy};
