// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Assembly procedure on top of [`AssistedCell`]: gripper and operation
//! commands block until the plant confirms them.

use std::sync::Arc;

use tracing::{info, warn};

use cell_core::{
    AssistedCell, Command, ControlError, ControlSequence, Edge, PollingEngine, Position, Step,
};

use super::{feed_until_barrier, move_to, recognize, SequenceParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleState {
    Home,
    Feed,
    Recognize,
    Grip,
    Dispatch,
    ToAssembly,
    Operate,
    ReturnFromAssembly,
    ToEvacuation,
    Drop,
    ReturnFromEvacuation,
}

/// Completes after `loops` operations.
pub struct SimpleSequence {
    engine: Arc<PollingEngine>,
    cell: AssistedCell<Arc<PollingEngine>>,
    params: SequenceParams,
    operations: u32,
}

impl SimpleSequence {
    pub fn new(engine: Arc<PollingEngine>, params: SequenceParams) -> Self {
        Self {
            cell: AssistedCell::new(Arc::clone(&engine)).with_timeout(params.timeout),
            engine,
            params,
            operations: 0,
        }
    }

    pub fn operations(&self) -> u32 {
        self.operations
    }
}

impl ControlSequence for SimpleSequence {
    type State = SimpleState;

    fn name(&self) -> &str {
        "simple"
    }

    fn initial(&self) -> SimpleState {
        SimpleState::Home
    }

    fn step(&mut self, state: SimpleState) -> Result<Step<SimpleState>, ControlError> {
        let timeout = self.params.timeout;
        let engine = Arc::clone(&self.engine);

        let next = match state {
            SimpleState::Home => {
                move_to(&engine, Position::Supply, timeout)?;
                SimpleState::Feed
            }
            SimpleState::Feed => {
                feed_until_barrier(&engine, timeout)?;
                SimpleState::Recognize
            }
            SimpleState::Recognize => {
                recognize(&engine, timeout)?;
                SimpleState::Grip
            }
            SimpleState::Grip => {
                self.cell.grip()?;
                SimpleState::Dispatch
            }
            SimpleState::Dispatch => match engine.object_type() {
                None => {
                    warn!("Held object has no recognised type");
                    return Err(ControlError::UnexpectedState(
                        "no assembly or evacuation signal".to_string(),
                    ));
                }
                Some(_) if self.cell.needs_assembly() => SimpleState::ToAssembly,
                Some(kind) => {
                    info!("Evacuating {}", kind);
                    SimpleState::ToEvacuation
                }
            },
            SimpleState::ToAssembly => {
                move_to(&engine, Position::Assembly, timeout)?;
                SimpleState::Operate
            }
            SimpleState::Operate => {
                let op = self.cell.run_operation()?;
                self.operations += 1;
                info!("{} done ({}/{})", op, self.operations(), self.params.loops);
                SimpleState::ReturnFromAssembly
            }
            SimpleState::ReturnFromAssembly => {
                move_to(&engine, Position::Supply, timeout)?;
                if self.operations >= self.params.loops {
                    return Ok(Step::Done);
                }
                SimpleState::Feed
            }
            SimpleState::ToEvacuation => {
                move_to(&engine, Position::Evacuation, timeout)?;
                // The stop edge needs at least one cycle after the command,
                // so waiting right after the write cannot miss it.
                self.cell.set(Command::AdvanceConveyor2, false);
                self.cell.wait(Edge::EvacConveyorStopped)?;
                SimpleState::Drop
            }
            SimpleState::Drop => {
                self.cell.release()?;
                self.cell.set(Command::AdvanceConveyor2, true);
                SimpleState::ReturnFromEvacuation
            }
            SimpleState::ReturnFromEvacuation => {
                move_to(&engine, Position::Supply, timeout)?;
                SimpleState::Feed
            }
        };
        Ok(Step::Next(next))
    }
}
