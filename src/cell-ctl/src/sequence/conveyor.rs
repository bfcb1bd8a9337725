// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Two cooperating tasks around the supply conveyor.
//!
//! The supply task runs the conveyor until an object reaches the barrier,
//! starts recognition and then waits for demand. The watcher polls the
//! recognition flag, posts the recognised type to a mailbox and raises the
//! demand signal. It keeps raising demand every period while the flag stays
//! up, so a supply task that arms late still wakes.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use cell_core::control::{spawn_sequence, RunSummary};
use cell_core::{
    Command, ControlError, ControlSequence, DynResult, Edge, EventSignal, Level, Mailbox,
    ObjectType, PollingEngine, Position, SequenceRunner, StatusLatch, Step,
};

use super::{feed_until_barrier, hold_until, join, move_to, timed_out, SequenceParams};

/// Slice the supply task waits on demand before re-checking its deadline.
const DEMAND_SLICE: Duration = Duration::from_millis(10);
/// Watcher polling period.
const WATCH_PERIOD: Duration = Duration::from_millis(10);

/// State shared by the two tasks.
#[derive(Debug, Default)]
pub struct Channels {
    pub demand: EventSignal,
    pub reports: Mailbox<ObjectType>,
    /// Set once the supply task has finished; the watcher exits on it.
    pub shutdown: StatusLatch,
    pub handled: AtomicU32,
    pub reported: AtomicU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyState {
    Home,
    Running,
    AwaitDemand,
    Discard(Option<ObjectType>),
}

pub struct SupplyTask {
    engine: Arc<PollingEngine>,
    channels: Arc<Channels>,
    params: SequenceParams,
}

impl SupplyTask {
    pub fn new(engine: Arc<PollingEngine>, channels: Arc<Channels>, params: SequenceParams) -> Self {
        Self {
            engine,
            channels,
            params,
        }
    }
}

impl ControlSequence for SupplyTask {
    type State = SupplyState;

    fn name(&self) -> &str {
        "supply"
    }

    fn initial(&self) -> SupplyState {
        SupplyState::Home
    }

    fn step(&mut self, state: SupplyState) -> Result<Step<SupplyState>, ControlError> {
        let timeout = self.params.timeout;

        let next = match state {
            SupplyState::Home => {
                move_to(&self.engine, Position::Supply, timeout)?;
                SupplyState::Running
            }
            SupplyState::Running => {
                feed_until_barrier(&self.engine, timeout)?;
                self.engine.set(Command::Recognize, true);
                SupplyState::AwaitDemand
            }
            SupplyState::AwaitDemand => {
                let started = Instant::now();
                while !self.channels.demand.wait_for(DEMAND_SLICE) {
                    if timeout.is_some_and(|t| started.elapsed() >= t) {
                        self.engine.set(Command::Recognize, false);
                        return Err(timed_out("recognition demand"));
                    }
                }
                let report = self.channels.reports.try_receive();
                self.engine.set(Command::Recognize, false);
                SupplyState::Discard(report)
            }
            SupplyState::Discard(report) => {
                match report {
                    Some(kind) => info!("Discarding {}", kind),
                    None => warn!("Discarding unrecognised object"),
                }
                hold_until(&self.engine, Command::Grip, Edge::GripperClosed, timeout)?;
                hold_until(&self.engine, Command::Release, Edge::GripperOpened, timeout)?;
                let handled = self.channels.handled.fetch_add(1, Ordering::SeqCst) + 1;
                if handled >= self.params.loops {
                    return Ok(Step::Done);
                }
                SupplyState::Running
            }
        };
        Ok(Step::Next(next))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Reporting,
}

pub struct RecognitionWatcher {
    engine: Arc<PollingEngine>,
    channels: Arc<Channels>,
}

impl RecognitionWatcher {
    pub fn new(engine: Arc<PollingEngine>, channels: Arc<Channels>) -> Self {
        Self { engine, channels }
    }

    /// Sleep one period at a time until `level` reads `expected`.
    ///
    /// `false` once shutdown was requested.
    fn watch(&self, level: Level, expected: bool, mut each: impl FnMut()) -> bool {
        loop {
            if self.channels.shutdown.is_set() {
                return false;
            }
            if self.engine.read(level) == expected {
                return true;
            }
            each();
            thread::sleep(WATCH_PERIOD);
        }
    }
}

impl ControlSequence for RecognitionWatcher {
    type State = WatchState;

    fn name(&self) -> &str {
        "watcher"
    }

    fn initial(&self) -> WatchState {
        WatchState::Idle
    }

    fn step(&mut self, state: WatchState) -> Result<Step<WatchState>, ControlError> {
        match state {
            WatchState::Idle => {
                if !self.watch(Level::RecognitionDone, true, || {}) {
                    return Ok(Step::Done);
                }
                match self.engine.object_type() {
                    Some(kind) => {
                        debug!("Reporting {}", kind);
                        self.channels.reports.send(kind);
                    }
                    None => warn!("Recognition finished without a known type"),
                }
                self.channels.reported.fetch_add(1, Ordering::SeqCst);
                self.channels.demand.notify();
                Ok(Step::Next(WatchState::Reporting))
            }
            WatchState::Reporting => {
                let channels = Arc::clone(&self.channels);
                if !self.watch(Level::RecognitionDone, false, || channels.demand.notify()) {
                    return Ok(Step::Done);
                }
                Ok(Step::Next(WatchState::Idle))
            }
        }
    }
}

/// Run both tasks until the supply task has handled `params.loops` objects.
pub fn run(
    engine: Arc<PollingEngine>,
    params: SequenceParams,
    runner: SequenceRunner,
) -> DynResult<RunSummary> {
    run_with(engine, params, runner, Arc::new(Channels::default()))
}

pub(crate) fn run_with(
    engine: Arc<PollingEngine>,
    params: SequenceParams,
    runner: SequenceRunner,
    channels: Arc<Channels>,
) -> DynResult<RunSummary> {
    let watcher = spawn_sequence(
        RecognitionWatcher::new(Arc::clone(&engine), Arc::clone(&channels)),
        SequenceRunner::new(),
    );
    let supply = join(spawn_sequence(
        SupplyTask::new(engine, Arc::clone(&channels), params),
        runner,
    ));

    channels.shutdown.set();
    let watched = join(watcher)?;
    info!(
        "Watcher reported {} objects over {} transitions",
        channels.reported.load(Ordering::SeqCst),
        watched.transitions
    );
    supply
}
