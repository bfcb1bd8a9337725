// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Full assembly procedure written directly against the polling engine.

use std::sync::Arc;

use tracing::info;

use cell_core::control::{poll_level, PollOptions};
use cell_core::{
    Command, ControlError, ControlSequence, Edge, Level, ObjectType, Operation, PollingEngine,
    Position, Step,
};

use super::{feed_until_barrier, hold_until, move_to, recognize, stop_evac_conveyor, SequenceParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    Home,
    Feed,
    Recognize,
    Grip,
    Dispatch,
    ToAssembly,
    Operate(Operation),
    Verify,
    AwaitEvacuation,
    ReturnFromAssembly,
    ToEvacuation,
    StopEvacConveyor,
    Drop,
    ReturnFromEvacuation,
}

/// Picks objects off the supply conveyor and feeds them to operations
/// 1, 2, 3 in rotation. Objects that do not fit the next operation go to
/// the evacuation conveyor. Completes after `loops` full assemblies.
pub struct AssemblySequence {
    engine: Arc<PollingEngine>,
    params: SequenceParams,
    next_op: Operation,
    recognized: Option<ObjectType>,
    assemblies: u32,
    evacuated: u32,
}

impl AssemblySequence {
    pub fn new(engine: Arc<PollingEngine>, params: SequenceParams) -> Self {
        Self {
            engine,
            params,
            next_op: Operation::Op1,
            recognized: None,
            assemblies: 0,
            evacuated: 0,
        }
    }

    pub fn assemblies(&self) -> u32 {
        self.assemblies
    }

    pub fn evacuated(&self) -> u32 {
        self.evacuated
    }

    fn poll(&self, level: Level) -> Result<(), ControlError> {
        poll_level(
            &self.engine,
            level,
            PollOptions::with_timeout(self.params.timeout),
        )
    }

    /// Hold `cmd` while polling `level`, releasing it on every outcome.
    fn pulse(&self, cmd: Command, level: Level) -> Result<(), ControlError> {
        self.engine.set(cmd, true);
        let done = self.poll(level);
        self.engine.set(cmd, false);
        done
    }

    fn fits_next_operation(&self) -> bool {
        let needed = self.next_op.part();
        self.recognized == Some(needed) && self.engine.read(Level::part(needed))
    }
}

impl ControlSequence for AssemblySequence {
    type State = AssemblyState;

    fn name(&self) -> &str {
        "assembly"
    }

    fn initial(&self) -> AssemblyState {
        AssemblyState::Home
    }

    fn step(&mut self, state: AssemblyState) -> Result<Step<AssemblyState>, ControlError> {
        let engine = Arc::clone(&self.engine);
        let timeout = self.params.timeout;

        let next = match state {
            AssemblyState::Home => {
                move_to(&engine, Position::Supply, timeout)?;
                AssemblyState::Feed
            }
            AssemblyState::Feed => {
                feed_until_barrier(&engine, timeout)?;
                AssemblyState::Recognize
            }
            AssemblyState::Recognize => {
                self.recognized = recognize(&engine, timeout)?;
                match self.recognized {
                    Some(kind) => info!("Recognised {}", kind),
                    None => info!("Recognised nothing known"),
                }
                AssemblyState::Grip
            }
            AssemblyState::Grip => {
                hold_until(&engine, Command::Grip, Edge::GripperClosed, timeout)?;
                AssemblyState::Dispatch
            }
            AssemblyState::Dispatch => {
                if self.fits_next_operation() {
                    AssemblyState::ToAssembly
                } else {
                    info!(
                        "Evacuating {:?}, {} needs {}",
                        self.recognized,
                        self.next_op,
                        self.next_op.part()
                    );
                    AssemblyState::ToEvacuation
                }
            }
            AssemblyState::ToAssembly => {
                move_to(&engine, Position::Assembly, timeout)?;
                AssemblyState::Operate(self.next_op)
            }
            AssemblyState::Operate(op) => {
                self.pulse(op.command(), op.done_level())?;
                info!("{} done", op);
                self.next_op = op.next();
                if op == Operation::Op3 {
                    AssemblyState::Verify
                } else {
                    AssemblyState::ReturnFromAssembly
                }
            }
            AssemblyState::Verify => {
                self.pulse(Command::Verify, Level::AssemblyOk)?;
                AssemblyState::AwaitEvacuation
            }
            AssemblyState::AwaitEvacuation => {
                self.poll(Level::AssemblyEvacuated)?;
                self.assemblies += 1;
                info!("Assembly {}/{} complete", self.assemblies, self.params.loops);
                AssemblyState::ReturnFromAssembly
            }
            AssemblyState::ReturnFromAssembly => {
                move_to(&engine, Position::Supply, timeout)?;
                if self.assemblies >= self.params.loops {
                    info!(
                        "{} assemblies built, {} objects evacuated",
                        self.assemblies(),
                        self.evacuated()
                    );
                    return Ok(Step::Done);
                }
                AssemblyState::Feed
            }
            AssemblyState::ToEvacuation => {
                move_to(&engine, Position::Evacuation, timeout)?;
                AssemblyState::StopEvacConveyor
            }
            AssemblyState::StopEvacConveyor => {
                stop_evac_conveyor(&engine, timeout)?;
                AssemblyState::Drop
            }
            AssemblyState::Drop => {
                hold_until(&engine, Command::Release, Edge::GripperOpened, timeout)?;
                self.evacuated += 1;
                engine.set(Command::AdvanceConveyor2, true);
                AssemblyState::ReturnFromEvacuation
            }
            AssemblyState::ReturnFromEvacuation => {
                move_to(&engine, Position::Supply, timeout)?;
                AssemblyState::Feed
            }
        };
        Ok(Step::Next(next))
    }
}
