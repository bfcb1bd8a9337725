// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::plant::signal::{Input, Level, ObjectType, Operation, Position};

/// One sample of every monitored input, as raw plant values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalFrame {
    values: [i32; Input::COUNT],
}

impl SignalFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, input: Input) -> i32 {
        self.values[input.index()]
    }

    pub fn set(&mut self, input: Input, value: i32) {
        self.values[input.index()] = value;
    }

    /// Builder-style [`SignalFrame::set`].
    pub fn with(mut self, input: Input, value: i32) -> Self {
        self.set(input, value);
        self
    }

    fn flag(&self, input: Input) -> bool {
        self.get(input) != 0
    }

    pub fn optical_barrier(&self) -> bool {
        self.flag(Input::OpticalBarrier)
    }

    pub fn gripper_closed(&self) -> bool {
        self.flag(Input::GripperClosed)
    }

    pub fn position(&self) -> Option<Position> {
        Position::from_raw(self.get(Input::RobotPosition))
    }

    pub fn evac_conveyor_stopped(&self) -> bool {
        self.flag(Input::EvacConveyorStopped)
    }

    pub fn object_type(&self) -> Option<ObjectType> {
        ObjectType::from_raw(self.get(Input::ObjectType))
    }

    pub fn operation_done(&self) -> Option<Operation> {
        Operation::from_raw(self.get(Input::OperationDone))
    }

    /// Evaluate a level condition against this frame.
    pub fn level(&self, level: Level) -> bool {
        match level {
            Level::RecognitionDone => self.flag(Input::RecognitionDone),
            Level::Part1 => self.object_type() == Some(ObjectType::P1),
            Level::Part2 => self.object_type() == Some(ObjectType::P2),
            Level::Part3 => self.object_type() == Some(ObjectType::P3),
            Level::Op1Done => self.operation_done() == Some(Operation::Op1),
            Level::Op2Done => self.operation_done() == Some(Operation::Op2),
            Level::Op3Done => self.operation_done() == Some(Operation::Op3),
            Level::AssemblyOk => self.flag(Input::AssemblyOk),
            Level::AssemblyEvacuated => self.flag(Input::AssemblyEvacuated),
        }
    }
}

impl Serialize for SignalFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Input::COUNT))?;
        for input in Input::ALL {
            map.serialize_entry(input.wire_name(), &self.get(input))?;
        }
        map.end()
    }
}

/// Current and previous samples, owned by the polling thread.
///
/// Only the two most recent samples are kept; `previous` exists solely for
/// edge detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlantSnapshot {
    pub current: SignalFrame,
    pub previous: SignalFrame,
}

impl PlantSnapshot {
    /// Seed both samples with the initial read so the first cycle cannot
    /// report a transition that never happened.
    pub fn new(initial: SignalFrame) -> Self {
        Self {
            current: initial,
            previous: initial,
        }
    }

    /// Install a fresh sample, shifting the current one to `previous`.
    pub fn push(&mut self, sample: SignalFrame) {
        self.previous = self.current;
        self.current = sample;
    }

    /// Forget the previous sample once edges have been evaluated.
    pub fn settle(&mut self) {
        self.previous = self.current;
    }
}
