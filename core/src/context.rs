//! Process-lifetime state shared by the pipelines and the event context

use core::sync::atomic::{AtomicBool, Ordering};

use crate::topology::TopologyState;

/// Running flag plus topology snapshot
///
/// Boards place one of these in a `static` (or `StaticCell`) and hand
/// `&'static` references to every task.
pub struct NodeContext {
    running: AtomicBool,
    topology: TopologyState,
}

impl Default for NodeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeContext {
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            topology: TopologyState::new(),
        }
    }

    /// Pipelines keep looping while this is true
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask both pipelines to exit at their next iteration boundary
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn resume(&self) {
        self.running.store(true, Ordering::Release);
    }

    pub fn topology(&self) -> &TopologyState {
        &self.topology
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_and_resume() {
        let ctx = NodeContext::new();
        assert!(ctx.is_running());
        ctx.stop();
        assert!(!ctx.is_running());
        ctx.resume();
        assert!(ctx.is_running());
    }
}
