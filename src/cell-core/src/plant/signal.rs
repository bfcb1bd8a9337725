// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Plant inputs and their typed interpretations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Monitored plant input. Values are streamed as raw integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Input {
    OpticalBarrier,
    GripperClosed,
    RobotPosition,
    EvacConveyorStopped,
    RecognitionDone,
    ObjectType,
    OperationDone,
    AssemblyOk,
    AssemblyEvacuated,
}

impl Input {
    pub const COUNT: usize = 9;

    pub const ALL: [Input; Input::COUNT] = [
        Input::OpticalBarrier,
        Input::GripperClosed,
        Input::RobotPosition,
        Input::EvacConveyorStopped,
        Input::RecognitionDone,
        Input::ObjectType,
        Input::OperationDone,
        Input::AssemblyOk,
        Input::AssemblyEvacuated,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Signal name on the plant side.
    pub fn wire_name(self) -> &'static str {
        match self {
            Input::OpticalBarrier => "optical_barrier_state",
            Input::GripperClosed => "gripper_closed",
            Input::RobotPosition => "current_position",
            Input::EvacConveyorStopped => "evac_conveyor_stopped",
            Input::RecognitionDone => "end_identification",
            Input::ObjectType => "box_type",
            Input::OperationDone => "end_operation",
            Input::AssemblyOk => "assembly_ok",
            Input::AssemblyEvacuated => "assembly_evacuated",
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Robot station. Raw value 0 (or anything else) means in transit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Assembly = 1,
    Supply = 2,
    Evacuation = 3,
}

impl Position {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Position::Assembly),
            2 => Some(Position::Supply),
            3 => Some(Position::Evacuation),
            _ => None,
        }
    }

    pub fn raw(self) -> i32 {
        self as i32
    }
}

/// Object class reported by recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    P1 = 1,
    P2 = 2,
    P3 = 3,
}

impl ObjectType {
    pub const ALL: [ObjectType; 3] = [ObjectType::P1, ObjectType::P2, ObjectType::P3];

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(ObjectType::P1),
            2 => Some(ObjectType::P2),
            3 => Some(ObjectType::P3),
            _ => None,
        }
    }

    pub fn raw(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.raw())
    }
}

/// Assembly operation. Operations run in the order 1, 2, 3, each one
/// consuming the object type of the same number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Op1 = 1,
    Op2 = 2,
    Op3 = 3,
}

impl Operation {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Operation::Op1),
            2 => Some(Operation::Op2),
            3 => Some(Operation::Op3),
            _ => None,
        }
    }

    pub fn raw(self) -> i32 {
        self as i32
    }

    /// Following operation in the 1 → 2 → 3 → 1 rotation.
    pub fn next(self) -> Self {
        match self {
            Operation::Op1 => Operation::Op2,
            Operation::Op2 => Operation::Op3,
            Operation::Op3 => Operation::Op1,
        }
    }

    /// Object type this operation consumes.
    pub fn part(self) -> ObjectType {
        match self {
            Operation::Op1 => ObjectType::P1,
            Operation::Op2 => ObjectType::P2,
            Operation::Op3 => ObjectType::P3,
        }
    }

    pub fn command(self) -> crate::Command {
        match self {
            Operation::Op1 => crate::Command::RunOp1,
            Operation::Op2 => crate::Command::RunOp2,
            Operation::Op3 => crate::Command::RunOp3,
        }
    }

    /// Level flag reporting completion of this operation.
    pub fn done_level(self) -> Level {
        match self {
            Operation::Op1 => Level::Op1Done,
            Operation::Op2 => Level::Op2Done,
            Operation::Op3 => Level::Op3Done,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OP{}", self.raw())
    }
}

/// Edge-triggered event derived from an input transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    /// Optical barrier became obstructed.
    ObjectDetected,
    GripperClosed,
    GripperOpened,
    ReachedAssembly,
    ReachedSupply,
    ReachedEvacuation,
    EvacConveyorStopped,
}

impl Edge {
    pub const COUNT: usize = 7;

    pub const ALL: [Edge; Edge::COUNT] = [
        Edge::ObjectDetected,
        Edge::GripperClosed,
        Edge::GripperOpened,
        Edge::ReachedAssembly,
        Edge::ReachedSupply,
        Edge::ReachedEvacuation,
        Edge::EvacConveyorStopped,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Edge raised when the robot arrives at `position`.
    pub fn reached(position: Position) -> Self {
        match position {
            Position::Assembly => Edge::ReachedAssembly,
            Position::Supply => Edge::ReachedSupply,
            Position::Evacuation => Edge::ReachedEvacuation,
        }
    }
}

/// Level-held condition read without blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    RecognitionDone,
    Part1,
    Part2,
    Part3,
    Op1Done,
    Op2Done,
    Op3Done,
    AssemblyOk,
    AssemblyEvacuated,
}

impl Level {
    /// Level flag that is true when the object type is `part`.
    pub fn part(part: ObjectType) -> Self {
        match part {
            ObjectType::P1 => Level::Part1,
            ObjectType::P2 => Level::Part2,
            ObjectType::P3 => Level::Part3,
        }
    }
}
