//! Error types for the live expression engine.
//!
//! Most of the engine cannot fail: refreshes either complete or propagate a
//! panic from the compute function to the caller. The errors here cover
//! construction-time problems (a scheduled mode without a scheduler, no
//! tokio runtime to run on) and configuration loading.

use thiserror::Error;

/// Boxed error returned by fallible compute functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by the engine.
#[derive(Debug, Error)]
pub enum LiveError {
    /// A node asked for scheduled execution but no scheduler was supplied.
    #[error("{0} mode is async but no scheduler was configured")]
    MissingScheduler(&'static str),

    /// `TokioScheduler::current` was called outside of a tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// The engine configuration could not be parsed.
    #[error("invalid engine config: {0}")]
    Config(#[from] serde_json::Error),
}
