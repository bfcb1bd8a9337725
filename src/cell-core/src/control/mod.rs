// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Control sequences on top of the polling engine.
//!
//! A control sequence is an explicit state machine: each call to
//! [`ControlSequence::step`] performs the blocking work of one state and
//! names the next one. [`SequenceRunner`] drives it, counts transitions and
//! honours a stop latch between steps.

pub mod assisted;

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::engine::{EngineError, PollingEngine};
use crate::plant::signal::{Edge, Level};
use crate::plant::snapshot::SignalFrame;
use crate::sync::StatusLatch;

pub use assisted::AssistedCell;

/// Protocol violations and aborts surfaced by a control sequence.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("unexpected plant state: {0}")]
    UnexpectedState(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("sequence stopped")]
    Stopped,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<S> {
    Next(S),
    Done,
}

pub trait ControlSequence {
    type State: fmt::Debug;

    fn name(&self) -> &str;

    fn initial(&self) -> Self::State;

    /// Perform the work of `state` and return the state to enter next.
    fn step(&mut self, state: Self::State) -> Result<Step<Self::State>, ControlError>;
}

/// Totals reported when a sequence completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub transitions: u64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SequenceRunner {
    stop: Option<Arc<StatusLatch>>,
}

impl SequenceRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort with [`ControlError::Stopped`] before the next step once
    /// `latch` is set.
    pub fn with_stop(mut self, latch: Arc<StatusLatch>) -> Self {
        self.stop = Some(latch);
        self
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|latch| latch.is_set())
    }

    /// Drive `sequence` to completion on the current thread.
    pub fn run<S: ControlSequence>(&self, sequence: &mut S) -> Result<RunSummary, ControlError> {
        let started = Instant::now();
        let mut transitions = 0u64;
        let mut state = sequence.initial();
        info!("{}: starting in {:?}", sequence.name(), state);

        loop {
            if self.stop_requested() {
                warn!("{}: stop requested in {:?}", sequence.name(), state);
                return Err(ControlError::Stopped);
            }
            match sequence.step(state) {
                Ok(Step::Next(next)) => {
                    transitions += 1;
                    debug!("{}: -> {:?}", sequence.name(), next);
                    state = next;
                }
                Ok(Step::Done) => break,
                Err(err) => {
                    error!("{}: {}", sequence.name(), err);
                    return Err(err);
                }
            }
        }

        let summary = RunSummary {
            transitions,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "{}: done after {} transitions in {} ms",
            sequence.name(),
            summary.transitions,
            summary.elapsed_ms
        );
        Ok(summary)
    }
}

/// Run `sequence` on its own thread, named after the sequence.
pub fn spawn_sequence<S>(
    mut sequence: S,
    runner: SequenceRunner,
) -> io::Result<JoinHandle<Result<RunSummary, ControlError>>>
where
    S: ControlSequence + Send + 'static,
{
    thread::Builder::new()
        .name(sequence.name().to_string())
        .spawn(move || runner.run(&mut sequence))
}

/// Bounded-sleep polling for conditions that have no edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
            timeout: None,
        }
    }
}

impl PollOptions {
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Sleep in `options.interval` slices until `level` reads true.
pub fn poll_level(
    engine: &PollingEngine,
    level: Level,
    options: PollOptions,
) -> Result<(), ControlError> {
    // An unrepresentable deadline polls without one.
    let deadline = options.timeout.and_then(|t| Instant::now().checked_add(t));
    while !engine.read(level) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ControlError::Timeout(format!("{:?}", level)));
        }
        thread::sleep(options.interval);
    }
    Ok(())
}

/// Wait for `edge` unless the published frame already satisfies `holds`.
///
/// The signal is armed before the frame is checked. Frames are published
/// before their edges fire, so either the check sees the new state or the
/// armed wait sees the edge.
pub fn await_edge(
    engine: &PollingEngine,
    edge: Edge,
    holds: impl Fn(&SignalFrame) -> bool,
    timeout: Option<Duration>,
) -> Result<(), ControlError> {
    let armed = engine.event(edge).arm();
    if holds(&engine.frame()) {
        return Ok(());
    }
    let fired = match timeout {
        Some(timeout) => armed.wait_for(timeout),
        None => {
            armed.wait();
            true
        }
    };
    if fired {
        Ok(())
    } else {
        Err(ControlError::Timeout(format!("{:?}", edge)))
    }
}
