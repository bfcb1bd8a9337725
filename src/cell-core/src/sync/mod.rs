// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Blocking synchronization primitives shared by the polling engine and
//! application threads.
//!
//! - [`EventSignal`]: edge wakeup, forgotten if nobody waits.
//! - [`StatusLatch`]: remembered flag, never blocks.
//! - [`Mailbox`]: one-value handoff with blocking receive.

pub mod event;
pub mod latch;
pub mod mailbox;

pub use event::{Armed, EventSignal};
pub use latch::StatusLatch;
pub use mailbox::Mailbox;
