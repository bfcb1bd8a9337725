// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! One-shot, non-latching wakeup signal.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Broadcast wakeup with no memory.
///
/// Threads blocked in [`EventSignal::wait`] at the moment of a
/// [`EventSignal::notify`] are released; a notify with nobody waiting is
/// lost. This mirrors an edge sampled at discrete instants: if nobody was
/// looking, it did not happen.
///
/// Internally every notify bumps a generation counter. A waiter records
/// the generation when it registers and returns once the counter moves,
/// so spurious condvar wakeups never surface as notifications.
#[derive(Debug, Default)]
pub struct EventSignal {
    generation: Mutex<u64>,
    cv: Condvar,
}

/// Interest in an [`EventSignal`] registered ahead of the wait itself.
///
/// Obtained from [`EventSignal::arm`]. Any notify issued after `arm`
/// returned is observed by the armed wait, even if it fires before
/// [`Armed::wait`] is called.
#[derive(Debug)]
#[must_use = "an armed signal does nothing until waited on"]
pub struct Armed<'a> {
    signal: &'a EventSignal,
    seen: u64,
}

impl EventSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the next notify.
    pub fn wait(&self) {
        self.arm().wait();
    }

    /// Block until the next notify or until `timeout` elapses.
    ///
    /// Returns `true` if a notify arrived within the window.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.arm().wait_for(timeout)
    }

    /// Wake every thread currently waiting. Never blocks beyond the
    /// internal lock.
    pub fn notify(&self) {
        {
            let mut generation = self.generation.lock();
            *generation = generation.wrapping_add(1);
        }
        self.cv.notify_all();
    }

    /// Register interest now; wait later.
    pub fn arm(&self) -> Armed<'_> {
        Armed {
            signal: self,
            seen: *self.generation.lock(),
        }
    }

    /// Number of notifies issued so far (wrapping).
    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }
}

impl Armed<'_> {
    /// Block until a notify issued after arming.
    pub fn wait(self) {
        let mut generation = self.signal.generation.lock();
        while *generation == self.seen {
            self.signal.cv.wait(&mut generation);
        }
    }

    /// Block until a notify issued after arming, or until `timeout`.
    ///
    /// A timeout too large to express as a deadline waits without one.
    pub fn wait_for(self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut generation = self.signal.generation.lock();
        while *generation == self.seen {
            if self
                .signal
                .cv
                .wait_until(&mut generation, deadline)
                .timed_out()
            {
                return *generation != self.seen;
            }
        }
        true
    }

    /// Non-blocking check: has a notify happened since arming?
    pub fn fired(&self) -> bool {
        *self.signal.generation.lock() != self.seen
    }
}
