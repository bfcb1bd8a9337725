// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Engine event notification system.
//!
//! Listeners observe what the polling thread does (edges, overruns, link
//! faults) without being on the wait path. They run on the polling thread
//! and must return quickly.
//!
//! Callbacks fire after the cycle has released the plant link, so a
//! listener may read from the engine. The emitter stays read-locked while
//! it dispatches: registering or removing a listener from inside a
//! callback deadlocks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::plant::error::PlantError;
use crate::plant::signal::Edge;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Trait for components that want to observe the polling engine.
///
/// All methods have default no-op implementations, so listeners can
/// selectively override only the events they care about.
pub trait CellListener: Send + Sync {
    /// Called once per detected edge, at the end of the cycle that
    /// notified its signal.
    fn on_edge(&self, _edge: Edge, _cycle: u64) {}

    /// Called when a cycle took longer than the configured period.
    fn on_cycle_overrun(&self, _elapsed: Duration) {}

    /// Called when a read or write toward the plant failed this cycle.
    fn on_link_fault(&self, _error: &PlantError) {}

    /// Called when the polling thread starts or stops.
    fn on_running_change(&self, _running: bool) {}
}

/// Manages registered listeners and dispatches events.
pub struct CellEventEmitter {
    listeners: Vec<(ListenerId, Arc<dyn CellListener>)>,
}

impl Default for CellEventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl CellEventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Register a listener to receive events.
    /// Returns an ID that can be used to unregister the listener.
    pub fn register(&mut self, listener: Arc<dyn CellListener>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.push((id, listener));
        id
    }

    pub fn unregister(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn notify_edge(&self, edge: Edge, cycle: u64) {
        for (_, listener) in &self.listeners {
            listener.on_edge(edge, cycle);
        }
    }

    pub fn notify_cycle_overrun(&self, elapsed: Duration) {
        for (_, listener) in &self.listeners {
            listener.on_cycle_overrun(elapsed);
        }
    }

    pub fn notify_link_fault(&self, error: &PlantError) {
        for (_, listener) in &self.listeners {
            listener.on_link_fault(error);
        }
    }

    pub fn notify_running_change(&self, running: bool) {
        for (_, listener) in &self.listeners {
            listener.on_running_change(running);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct TestListener {
        edge_seen: AtomicBool,
        fault_seen: AtomicBool,
    }

    impl TestListener {
        fn new() -> Self {
            Self {
                edge_seen: AtomicBool::new(false),
                fault_seen: AtomicBool::new(false),
            }
        }
    }

    impl CellListener for TestListener {
        fn on_edge(&self, _edge: Edge, _cycle: u64) {
            self.edge_seen.store(true, Ordering::Relaxed);
        }

        fn on_link_fault(&self, _error: &PlantError) {
            self.fault_seen.store(true, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_register_and_notify() {
        let mut emitter = CellEventEmitter::new();
        let listener = Arc::new(TestListener::new());
        let id = emitter.register(listener.clone());

        assert_eq!(emitter.listener_count(), 1);

        emitter.notify_edge(Edge::GripperClosed, 3);
        assert!(listener.edge_seen.load(Ordering::Relaxed));
        assert!(!listener.fault_seen.load(Ordering::Relaxed));

        emitter.notify_link_fault(&PlantError::Stale("gripper_closed"));
        assert!(listener.fault_seen.load(Ordering::Relaxed));

        emitter.unregister(id);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_multiple_listeners() {
        let mut emitter = CellEventEmitter::new();
        let listener1 = Arc::new(TestListener::new());
        let listener2 = Arc::new(TestListener::new());

        emitter.register(listener1.clone());
        emitter.register(listener2.clone());

        emitter.notify_edge(Edge::ReachedSupply, 1);

        assert!(listener1.edge_seen.load(Ordering::Relaxed));
        assert!(listener2.edge_seen.load(Ordering::Relaxed));
    }
}
