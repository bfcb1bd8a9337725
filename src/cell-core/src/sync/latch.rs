// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::atomic::{AtomicBool, Ordering};

/// Persisted boolean flag, set and cleared explicitly.
///
/// Unlike [`super::EventSignal`] a latch remembers: it answers "did this
/// happen since the last clear", not "did this happen while I waited".
/// No operation blocks.
#[derive(Debug, Default)]
pub struct StatusLatch {
    state: AtomicBool,
}

impl StatusLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.state.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.state.store(false, Ordering::SeqCst);
    }

    pub fn set_to(&self, state: bool) {
        self.state.store(state, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }

    /// Read and clear in one step. Returns whether the latch was set.
    pub fn take(&self) -> bool {
        self.state.swap(false, Ordering::SeqCst)
    }
}
