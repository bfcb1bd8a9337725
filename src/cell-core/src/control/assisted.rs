// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Blocking conveniences layered over a [`PollingEngine`].

use std::ops::Deref;
use std::time::Duration;

use tracing::{debug, info};

use crate::control::{poll_level, ControlError, PollOptions};
use crate::engine::PollingEngine;
use crate::plant::command::Command;
use crate::plant::signal::{Edge, Level, Operation};

/// Engine wrapper whose gripper and operation commands block until the
/// plant reports completion. Also tracks the 1 → 2 → 3 operation rotation.
///
/// `E` is any handle to the engine: a plain reference for scoped use, an
/// `Arc` when the cell moves to another thread.
pub struct AssistedCell<E> {
    engine: E,
    next_op: Operation,
    timeout: Option<Duration>,
}

impl<E: Deref<Target = PollingEngine>> AssistedCell<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            next_op: Operation::Op1,
            timeout: None,
        }
    }

    /// Bound every blocking call by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn next_operation(&self) -> Operation {
        self.next_op
    }

    fn poll(&self, level: Level) -> Result<(), ControlError> {
        poll_level(&self.engine, level, PollOptions::with_timeout(self.timeout))
    }

    fn hold_until(&self, cmd: Command, edge: Edge) -> Result<(), ControlError> {
        if self.engine.assert_until(cmd, edge, self.timeout) {
            Ok(())
        } else {
            Err(ControlError::Timeout(format!("{:?}", edge)))
        }
    }

    /// Close the gripper and wait until it reports closed.
    pub fn grip(&self) -> Result<(), ControlError> {
        self.hold_until(Command::Grip, Edge::GripperClosed)
    }

    /// Open the gripper and wait until it reports open.
    pub fn release(&self) -> Result<(), ControlError> {
        self.hold_until(Command::Release, Edge::GripperOpened)
    }

    /// Run the next operation of the rotation and wait for it to finish.
    ///
    /// Operation 3 completes the assembly: it is followed by verification
    /// and by waiting for the finished assembly to leave the station.
    pub fn run_operation(&mut self) -> Result<Operation, ControlError> {
        let op = self.next_op;
        let cmd = op.command();

        info!("Running {}", op);
        self.engine.set(cmd, true);
        let done = self.poll(op.done_level());
        self.engine.set(cmd, false);
        done?;

        if op == Operation::Op3 {
            debug!("Verifying assembly");
            self.engine.set(Command::Verify, true);
            let verified = self.poll(Level::AssemblyOk);
            self.engine.set(Command::Verify, false);
            verified?;
            self.poll(Level::AssemblyEvacuated)?;
            info!("Assembly evacuated");
        }

        self.next_op = op.next();
        Ok(op)
    }

    /// The held object is the one the next operation consumes.
    pub fn needs_assembly(&self) -> bool {
        self.engine.read(Level::part(self.next_op.part()))
    }

    /// The held object is not useful for the next operation.
    pub fn needs_evacuation(&self) -> bool {
        !self.needs_assembly()
    }

    pub fn set(&self, cmd: Command, on: bool) {
        self.engine.set(cmd, on);
    }

    pub fn wait(&self, edge: Edge) -> Result<(), ControlError> {
        if self.engine.wait(edge, self.timeout) {
            Ok(())
        } else {
            Err(ControlError::Timeout(format!("{:?}", edge)))
        }
    }

    pub fn read(&self, level: Level) -> bool {
        self.engine.read(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use parking_lot::Mutex;

    use crate::engine::policies::NoRetry;
    use crate::engine::EngineConfig;
    use crate::plant::command::CommandState;
    use crate::plant::signal::Input;
    use crate::testing::{FakeLink, FakePlant};

    fn engine() -> (PollingEngine, Arc<Mutex<FakePlant>>) {
        let (link, plant) = FakeLink::new();
        let engine = PollingEngine::new(
            link,
            EngineConfig {
                settle: Duration::ZERO,
                retry: Arc::new(NoRetry),
                initial_commands: CommandState::new(),
                feeder: None,
                ..EngineConfig::default()
            },
        );
        engine.start(Duration::from_millis(5)).unwrap();
        (engine, plant)
    }

    /// Play the plant side of one operation: report completion once the
    /// command shows up on the outputs.
    fn complete_when_commanded(plant: Arc<Mutex<FakePlant>>, op: Operation) -> thread::JoinHandle<()> {
        thread::spawn(move || loop {
            {
                let mut plant = plant.lock();
                if plant.outputs.get(&op.command().output()) == Some(&1) {
                    plant.inputs.set(Input::OperationDone, op.raw());
                    if op == Operation::Op3 {
                        plant.inputs.set(Input::AssemblyOk, 1);
                        plant.inputs.set(Input::AssemblyEvacuated, 1);
                    }
                    return;
                }
            }
            thread::sleep(Duration::from_millis(2));
        })
    }

    #[test]
    fn test_grip_blocks_until_closed() {
        let (engine, plant) = engine();
        plant.lock().grip_delay = Some(2);
        let cell = AssistedCell::new(&engine).with_timeout(Some(Duration::from_secs(1)));
        cell.grip().unwrap();
        assert!(engine.frame().gripper_closed());
        assert!(!engine.command(Command::Grip));
    }

    #[test]
    fn test_release_times_out_without_plant() {
        let (engine, _plant) = engine();
        let cell = AssistedCell::new(&engine).with_timeout(Some(Duration::from_millis(30)));
        assert!(matches!(cell.release(), Err(ControlError::Timeout(_))));
        assert!(!engine.command(Command::Release));
    }

    #[test]
    fn test_operations_rotate() {
        let (engine, plant) = engine();
        let mut cell = AssistedCell::new(&engine).with_timeout(Some(Duration::from_secs(1)));

        for expected in [Operation::Op1, Operation::Op2, Operation::Op3] {
            let player = complete_when_commanded(Arc::clone(&plant), expected);
            assert_eq!(cell.run_operation().unwrap(), expected);
            player.join().unwrap();
            assert!(!engine.command(expected.command()));
        }
        assert_eq!(cell.next_operation(), Operation::Op1);
        assert!(!engine.command(Command::Verify));
    }

    #[test]
    fn test_failed_operation_keeps_rotation() {
        let (engine, _plant) = engine();
        let mut cell = AssistedCell::new(&engine).with_timeout(Some(Duration::from_millis(30)));
        assert!(cell.run_operation().is_err());
        assert_eq!(cell.next_operation(), Operation::Op1);
        assert!(!engine.command(Command::RunOp1));
    }

    #[test]
    fn test_classification_follows_next_operation() {
        let (engine, plant) = engine();
        plant.lock().inputs.set(Input::ObjectType, 1);
        thread::sleep(Duration::from_millis(20));

        let cell = AssistedCell::new(&engine);
        assert!(cell.needs_assembly());
        assert!(!cell.needs_evacuation());

        plant.lock().inputs.set(Input::ObjectType, 3);
        thread::sleep(Duration::from_millis(20));
        assert!(cell.needs_evacuation());
    }

    #[test]
    fn test_waits_delegate_to_engine() {
        let (engine, plant) = engine();
        let cell = AssistedCell::new(&engine).with_timeout(Some(Duration::from_secs(1)));

        let mover = {
            let plant = Arc::clone(&plant);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                plant
                    .lock()
                    .inputs
                    .set(Input::RobotPosition, crate::Position::Evacuation.raw());
            })
        };
        cell.wait(Edge::ReachedEvacuation).unwrap();
        mover.join().unwrap();

        cell.set(Command::Verify, true);
        assert!(engine.command(Command::Verify));
        assert!(!cell.read(Level::AssemblyOk));
    }
}
