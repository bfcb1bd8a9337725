// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Scripted plant link shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::plant::command::{Command, Output};
use crate::plant::error::{PlantError, PlantResult};
use crate::plant::signal::Input;
use crate::plant::snapshot::SignalFrame;
use crate::plant::{PlantInfo, PlantLink};

/// Plant state scripted by the tests.
#[derive(Default)]
pub(crate) struct FakePlant {
    pub inputs: SignalFrame,
    pub connected: bool,
    pub connects: u32,
    pub refuse_connects: u32,
    pub missing_handle: bool,
    pub streaming: usize,
    pub simulation_running: bool,
    pub simulation_stops: u32,
    pub stale: Vec<Input>,
    /// Reject every write.
    pub fail_writes: bool,
    /// Stall each read by this long.
    pub read_delay: Option<Duration>,
    pub outputs: HashMap<Output, i32>,
    pub added: Vec<i32>,
    /// Close the gripper after this many cycles of `take = 1`.
    pub grip_delay: Option<u32>,
    pub grip_cycles: u32,
}

pub(crate) struct FakeLink {
    info: PlantInfo,
    plant: Arc<Mutex<FakePlant>>,
}

impl FakeLink {
    pub fn new() -> (Box<dyn PlantLink>, Arc<Mutex<FakePlant>>) {
        let plant = Arc::new(Mutex::new(FakePlant::default()));
        let link = FakeLink {
            info: PlantInfo {
                vendor: "Test".into(),
                model: "Scripted".into(),
                revision: "0".into(),
                simulated: true,
            },
            plant: Arc::clone(&plant),
        };
        (Box::new(link), plant)
    }
}

impl PlantLink for FakeLink {
    fn info(&self) -> &PlantInfo {
        &self.info
    }

    fn connect(&mut self, address: &str, port: u16) -> PlantResult<()> {
        let mut plant = self.plant.lock();
        plant.connects += 1;
        if plant.refuse_connects > 0 {
            plant.refuse_connects -= 1;
            return Err(PlantError::connection(address, port, "refused"));
        }
        plant.connected = true;
        Ok(())
    }

    fn resolve_handles(&mut self) -> PlantResult<()> {
        if self.plant.lock().missing_handle {
            return Err(PlantError::HandleResolution("appro_proximity_sensor#".into()));
        }
        Ok(())
    }

    fn begin_streaming(&mut self, _input: Input) -> PlantResult<()> {
        self.plant.lock().streaming += 1;
        Ok(())
    }

    fn read_signal(&mut self, input: Input) -> PlantResult<i32> {
        let delay = self.plant.lock().read_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        let plant = self.plant.lock();
        if plant.stale.contains(&input) {
            return Err(PlantError::Stale(input.wire_name()));
        }
        Ok(plant.inputs.get(input))
    }

    fn write_signal(&mut self, output: Output, value: i32) -> PlantResult<()> {
        let mut plant = self.plant.lock();
        if plant.fail_writes {
            return Err(PlantError::write(output.wire_name(), "rejected"));
        }
        plant.outputs.insert(output, value);
        if output == Output::AddObject {
            plant.added.push(value);
        }
        if output == Command::Grip.output() && value != 0 {
            plant.grip_cycles += 1;
            if Some(plant.grip_cycles) == plant.grip_delay {
                plant.inputs.set(Input::GripperClosed, 1);
            }
        }
        Ok(())
    }

    fn start_simulation(&mut self) -> PlantResult<()> {
        self.plant.lock().simulation_running = true;
        Ok(())
    }

    fn stop_simulation(&mut self) -> PlantResult<()> {
        let mut plant = self.plant.lock();
        plant.simulation_running = false;
        plant.simulation_stops += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.plant.lock().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.plant.lock().connected
    }
}
