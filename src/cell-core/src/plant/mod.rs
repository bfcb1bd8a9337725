// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

pub mod command;
pub mod error;
pub mod signal;
pub mod snapshot;

use command::Output;
use error::PlantResult;
use signal::Input;

/// Static info describing a plant backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantInfo {
    pub vendor: String,
    pub model: String,
    pub revision: String,
    /// Whether the backend runs a simulation that must be started and
    /// stopped explicitly.
    pub simulated: bool,
}

/// Session with the assembly cell.
///
/// The polling engine is the only caller: it owns the link, calls
/// `connect` / `resolve_handles` / `begin_streaming` / `start_simulation`
/// once at start, then `read_signal` / `write_signal` every cycle, and
/// `stop_simulation` / `disconnect` at stop. Reads return the last streamed
/// value and must not block; writes are fire-and-forget level outputs.
pub trait PlantLink: Send {
    fn info(&self) -> &PlantInfo;

    fn connect(&mut self, address: &str, port: u16) -> PlantResult<()>;

    /// Locate the plant objects the link needs before streaming.
    fn resolve_handles(&mut self) -> PlantResult<()> {
        Ok(())
    }

    /// Ask the plant to stream `input`. Must be called once per monitored
    /// input before cyclic reads are meaningful.
    fn begin_streaming(&mut self, input: Input) -> PlantResult<()>;

    /// Last streamed value, or [`error::PlantError::Stale`] when none is
    /// available this cycle.
    fn read_signal(&mut self, input: Input) -> PlantResult<i32>;

    fn write_signal(&mut self, output: Output, value: i32) -> PlantResult<()>;

    fn start_simulation(&mut self) -> PlantResult<()> {
        Ok(())
    }

    fn stop_simulation(&mut self) -> PlantResult<()> {
        Ok(())
    }

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}
