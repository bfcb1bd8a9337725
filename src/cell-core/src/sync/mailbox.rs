// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Single-slot handoff with blocking receive.
///
/// `send` stores the value and wakes blocked receivers; `receive` blocks
/// until a value is present and consumes it. The slot holds at most one
/// value: a value sent while nobody is receiving stays pending until the
/// next `receive`, and a second `send` before that overwrites it. There is
/// no queue; callers that cannot afford to lose an intermediate value need
/// a channel instead.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    cv: Condvar,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            cv: Condvar::new(),
        }
    }

    /// Store `value`, replacing any undelivered one, and wake receivers.
    /// Returns the value that was overwritten, if any.
    pub fn send(&self, value: T) -> Option<T> {
        let replaced = self.slot.lock().replace(value);
        self.cv.notify_all();
        replaced
    }

    /// Block until a value is available and take it.
    pub fn receive(&self) -> T {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            self.cv.wait(&mut slot);
        }
    }

    /// Block until a value is available or `timeout` elapses.
    ///
    /// A timeout too large to express as a deadline blocks like `receive`.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.receive());
        };
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.take() {
                return Some(value);
            }
            if self.cv.wait_until(&mut slot, deadline).timed_out() {
                return slot.take();
            }
        }
    }

    pub fn try_receive(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn has_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_send_then_receive() {
        let mailbox = Mailbox::new();
        assert!(mailbox.send(7).is_none());
        assert_eq!(mailbox.receive(), 7);
    }

    #[test]
    fn test_second_receive_blocks() {
        let mailbox = Mailbox::new();
        mailbox.send("part");
        assert_eq!(mailbox.receive(), "part");
        assert_eq!(mailbox.receive_timeout(Duration::from_millis(30)), None);
        assert!(!mailbox.has_pending());
    }

    #[test]
    fn test_send_overwrites_pending_value() {
        let mailbox = Mailbox::new();
        mailbox.send(1);
        assert_eq!(mailbox.send(2), Some(1));
        assert_eq!(mailbox.try_receive(), Some(2));
        assert_eq!(mailbox.try_receive(), None);
    }

    #[test]
    fn test_blocked_receiver_is_woken_by_send() {
        let mailbox = Arc::new(Mailbox::new());
        let receiver = {
            let mailbox = mailbox.clone();
            thread::spawn(move || mailbox.receive())
        };
        thread::sleep(Duration::from_millis(30));
        mailbox.send(String::from("handoff"));
        assert_eq!(receiver.join().unwrap(), "handoff");
    }

    #[test]
    fn test_receive_timeout_gets_value_sent_during_wait() {
        let mailbox = Arc::new(Mailbox::new());
        let sender = {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                mailbox.send(3u8);
            })
        };
        assert_eq!(mailbox.receive_timeout(Duration::from_secs(2)), Some(3));
        sender.join().unwrap();
    }

    #[test]
    fn test_receive_timeout_unbounded() {
        let mailbox = Arc::new(Mailbox::new());
        mailbox.send(1);
        assert_eq!(mailbox.receive_timeout(Duration::MAX), Some(1));

        let sender = {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                mailbox.send(2);
            })
        };
        assert_eq!(mailbox.receive_timeout(Duration::MAX), Some(2));
        sender.join().unwrap();
    }
}
