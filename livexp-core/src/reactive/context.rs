//! Refresh Context
//!
//! The refresh context tracks which nodes are currently refreshing on this
//! thread. A refresh that changes a value notifies its listeners, which
//! refresh their own nodes, so one `set_value` can nest several frames deep.
//!
//! # Cycles
//!
//! The engine does not detect dependency cycles; a cycle whose values keep
//! changing recurses without bound. Debug builds assert that the nesting
//! stays under `EngineConfig::max_cascade_depth` so such a cycle fails with a
//! readable message instead of a stack overflow. Release builds only track
//! the frames.

use std::cell::RefCell;

use super::NodeId;
use crate::config;

thread_local! {
    static REFRESH_STACK: RefCell<Vec<NodeId>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the frame when dropped.
///
/// This keeps the stack balanced even if a compute function panics.
pub struct RefreshContext {
    node: NodeId,
}

impl RefreshContext {
    /// Enter a refresh frame for `node`.
    pub fn enter(node: NodeId) -> Self {
        let depth = REFRESH_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&node) {
                tracing::trace!(%node, depth = stack.len(), "re-entrant refresh");
            }
            stack.push(node);
            stack.len()
        });
        let frame = Self { node };

        debug_assert!(
            depth <= config::max_cascade_depth(),
            "refresh cascade of node {} is {} frames deep; check for a depends_on cycle",
            node,
            depth
        );

        frame
    }

    /// Number of refresh frames active on this thread.
    pub fn depth() -> usize {
        REFRESH_STACK.with(|stack| stack.borrow().len())
    }

    /// The innermost node being refreshed, if any.
    pub fn current_node() -> Option<NodeId> {
        REFRESH_STACK.with(|stack| stack.borrow().last().copied())
    }

    /// Whether `node` is somewhere on this thread's refresh stack.
    pub fn is_refreshing(node: NodeId) -> bool {
        REFRESH_STACK.with(|stack| stack.borrow().contains(&node))
    }
}

impl Drop for RefreshContext {
    fn drop(&mut self) {
        REFRESH_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(node) = popped {
                debug_assert_eq!(
                    node, self.node,
                    "RefreshContext mismatch: expected {:?}, got {:?}",
                    self.node, node
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_node() {
        let id = NodeId::new();

        assert_eq!(RefreshContext::depth(), 0);
        assert!(RefreshContext::current_node().is_none());

        {
            let _ctx = RefreshContext::enter(id);
            assert_eq!(RefreshContext::depth(), 1);
            assert_eq!(RefreshContext::current_node(), Some(id));
            assert!(RefreshContext::is_refreshing(id));
        }

        assert_eq!(RefreshContext::depth(), 0);
        assert!(!RefreshContext::is_refreshing(id));
    }

    #[test]
    fn nested_frames() {
        let outer = NodeId::new();
        let inner = NodeId::new();

        {
            let _outer = RefreshContext::enter(outer);
            {
                let _inner = RefreshContext::enter(inner);
                assert_eq!(RefreshContext::current_node(), Some(inner));
                assert!(RefreshContext::is_refreshing(outer));
                assert_eq!(RefreshContext::depth(), 2);
            }
            assert_eq!(RefreshContext::current_node(), Some(outer));
        }

        assert!(RefreshContext::current_node().is_none());
    }

    #[test]
    fn frame_pops_on_panic() {
        let id = NodeId::new();
        let result = std::panic::catch_unwind(|| {
            let _ctx = RefreshContext::enter(id);
            panic!("compute failed");
        });

        assert!(result.is_err());
        assert_eq!(RefreshContext::depth(), 0);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn oscillating_cycle_trips_installed_depth_limit() {
        use crate::config::EngineConfig;
        use crate::reactive::LiveExpression;
        use std::sync::{Arc, OnceLock};

        EngineConfig {
            max_cascade_depth: 32,
            ..EngineConfig::default()
        }
        .install();
        assert_eq!(config::max_cascade_depth(), 32);

        let back: Arc<OnceLock<LiveExpression<i64>>> = Arc::default();
        let a = {
            let back = back.clone();
            LiveExpression::new(0, move || back.get().map_or(0, |b| b.get_value() + 1))
        };
        let b = a.apply(|v| v + 1);
        let _ = back.set(b.clone());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            a.depends_on(&b);
        }));
        EngineConfig::default().install();

        let payload = result.expect_err("cycle should trip the depth guard");
        let message = payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert!(message.contains("check for a depends_on cycle"), "{message}");
        assert_eq!(RefreshContext::depth(), 0);
    }
}
