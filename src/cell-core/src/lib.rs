// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod control;
pub mod engine;
pub mod plant;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use control::{AssistedCell, ControlError, ControlSequence, SequenceRunner, Step};
pub use engine::{EngineConfig, EngineError, EngineStats, PollingEngine};
pub use plant::command::{Command, CommandState, Output};
pub use plant::error::{PlantError, PlantResult};
pub use plant::signal::{Edge, Input, Level, ObjectType, Operation, Position};
pub use plant::snapshot::SignalFrame;
pub use plant::{PlantInfo, PlantLink};
pub use sync::{EventSignal, Mailbox, StatusLatch};
