// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Simulated assembly cell for development and testing.
//!
//! Models the cell in memory and advances it on every link call from a
//! monotonic clock, optionally sped up by a time scale. No simulator
//! process required.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use cell_core::plant::error::{PlantError, PlantResult};
use cell_core::{Command, Input, ObjectType, Operation, Output, PlantInfo, PlantLink, Position};

use crate::PlantOptions;

/// Durations of the simulated processes, in model time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTimings {
    /// Belt running time from the drop point to the optical barrier.
    pub conveyor_travel: Duration,
    pub recognition: Duration,
    /// Robot travel between two neighbouring stations.
    pub robot_travel: Duration,
    pub gripper: Duration,
    pub operation: Duration,
    pub verify: Duration,
    /// Time for a verified assembly to leave the station.
    pub evacuation: Duration,
    /// Run-down time of the evacuation conveyor.
    pub evac_stop: Duration,
}

impl Default for SimTimings {
    fn default() -> Self {
        Self {
            conveyor_travel: Duration::from_millis(2000),
            recognition: Duration::from_millis(300),
            robot_travel: Duration::from_millis(800),
            gripper: Duration::from_millis(200),
            operation: Duration::from_millis(600),
            verify: Duration::from_millis(300),
            evacuation: Duration::from_millis(500),
            evac_stop: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Parcel {
    kind: ObjectType,
    /// Remaining belt running time to the barrier.
    distance: Duration,
}

fn right_of(station: Position) -> Option<Position> {
    match station {
        Position::Assembly => Some(Position::Supply),
        Position::Supply => Some(Position::Evacuation),
        Position::Evacuation => None,
    }
}

fn left_of(station: Position) -> Option<Position> {
    match station {
        Position::Assembly => None,
        Position::Supply => Some(Position::Assembly),
        Position::Evacuation => Some(Position::Supply),
    }
}

/// Cell state advanced in explicit time steps.
#[derive(Debug, Clone)]
pub struct CellModel {
    timings: SimTimings,
    now: Duration,

    supply_running: bool,
    parcels: VecDeque<Parcel>,

    reccam: bool,
    recognition_due: Option<Duration>,
    end_identification: bool,
    box_type: i32,

    station: Position,
    motion: Option<(Position, Duration)>,
    go_right: bool,
    go_left: bool,

    gripper_closed: bool,
    /// Pending gripper motion: `(closing, due)`.
    gripper_due: Option<(bool, Duration)>,
    held: Option<ObjectType>,

    op_commands: [bool; 3],
    operation_due: Option<(Operation, Duration)>,
    end_operation: i32,

    verif: bool,
    verify_due: Option<Duration>,
    assembly_ok: bool,
    evacuation_due: Option<Duration>,
    assembly_evacuated: bool,

    evac_running: bool,
    evac_stop_due: Option<Duration>,
    evac_stopped: bool,

    consumed: u32,
    evacuated: u32,
}

impl CellModel {
    /// Robot parked at the assembly station, gripper open, evacuation
    /// conveyor running, supply belt empty.
    pub fn new(timings: SimTimings) -> Self {
        Self {
            timings,
            now: Duration::ZERO,
            supply_running: false,
            parcels: VecDeque::new(),
            reccam: false,
            recognition_due: None,
            end_identification: false,
            box_type: 0,
            station: Position::Assembly,
            motion: None,
            go_right: false,
            go_left: false,
            gripper_closed: false,
            gripper_due: None,
            held: None,
            op_commands: [false; 3],
            operation_due: None,
            end_operation: 0,
            verif: false,
            verify_due: None,
            assembly_ok: false,
            evacuation_due: None,
            assembly_evacuated: false,
            evac_running: true,
            evac_stop_due: None,
            evac_stopped: false,
            consumed: 0,
            evacuated: 0,
        }
    }

    pub fn timings(&self) -> &SimTimings {
        &self.timings
    }

    /// Parts consumed by operations so far.
    pub fn consumed(&self) -> u32 {
        self.consumed
    }

    /// Parts dropped at the evacuation station so far.
    pub fn evacuated(&self) -> u32 {
        self.evacuated
    }

    pub fn parcels_waiting(&self) -> usize {
        self.parcels.len()
    }

    fn object_at_barrier(&self) -> Option<ObjectType> {
        self.parcels
            .front()
            .filter(|p| p.distance.is_zero())
            .map(|p| p.kind)
    }

    fn parked_at(&self, station: Position) -> bool {
        self.motion.is_none() && self.station == station
    }

    fn due(&self, at: Option<Duration>) -> bool {
        at.is_some_and(|at| self.now >= at)
    }

    /// Advance model time by `dt`.
    pub fn step(&mut self, dt: Duration) {
        self.now += dt;

        // The belt stalls while the front parcel sits at the barrier, so
        // parcels keep their spacing.
        if self.supply_running {
            let gap = self.parcels.front().map_or(dt, |p| p.distance);
            let advance = dt.min(gap);
            for parcel in self.parcels.iter_mut() {
                parcel.distance = parcel.distance.saturating_sub(advance);
            }
        }

        if self.due(self.recognition_due) {
            self.recognition_due = None;
            self.end_identification = true;
            self.box_type = self.object_at_barrier().map_or(0, ObjectType::raw);
            debug!("Recognition done: box_type={}", self.box_type);
        }

        if let Some((target, at)) = self.motion {
            if self.now >= at {
                self.station = target;
                self.motion = None;
                debug!("Robot reached {:?}", target);
            }
        }

        if let Some((closing, at)) = self.gripper_due {
            if self.now >= at {
                self.gripper_due = None;
                self.gripper_closed = closing;
                if closing {
                    if self.parked_at(Position::Supply) && self.object_at_barrier().is_some() {
                        self.held = self.parcels.pop_front().map(|p| p.kind);
                    }
                } else if let Some(part) = self.held.take() {
                    if self.parked_at(Position::Evacuation) {
                        self.evacuated += 1;
                    }
                    debug!("Dropped {}", part);
                }
            }
        }

        if let Some((op, at)) = self.operation_due {
            if self.now >= at {
                self.operation_due = None;
                self.end_operation = op.raw();
                if self.held.take().is_some() {
                    self.consumed += 1;
                }
                self.gripper_closed = false;
                debug!("{} done", op);
            }
        }

        if self.due(self.verify_due) {
            self.verify_due = None;
            self.assembly_ok = true;
        }

        if self.due(self.evacuation_due) {
            self.evacuation_due = None;
            self.assembly_ok = false;
            self.assembly_evacuated = true;
        }

        if self.due(self.evac_stop_due) {
            self.evac_stop_due = None;
            self.evac_stopped = true;
        }
    }

    fn start_motion(&mut self, target: Option<Position>) {
        if self.motion.is_some() {
            return;
        }
        if let Some(target) = target {
            self.motion = Some((target, self.now + self.timings.robot_travel));
        }
    }

    /// Apply one output write.
    pub fn apply(&mut self, output: Output, value: i32) {
        let cmd = match output {
            Output::AddObject => {
                if let Some(kind) = ObjectType::from_raw(value) {
                    self.parcels.push_back(Parcel {
                        kind,
                        distance: self.timings.conveyor_travel,
                    });
                }
                return;
            }
            Output::Command(cmd) => cmd,
        };
        let on = value != 0;

        match cmd {
            Command::AdvanceConveyor1 => self.supply_running = on,
            Command::AdvanceConveyor2 => {
                if on {
                    self.evac_running = true;
                    self.evac_stopped = false;
                    self.evac_stop_due = None;
                } else if self.evac_running {
                    self.evac_running = false;
                    self.evac_stop_due = Some(self.now + self.timings.evac_stop);
                }
            }
            Command::Recognize => {
                if on != self.reccam {
                    self.end_identification = false;
                    self.recognition_due = on.then(|| self.now + self.timings.recognition);
                }
                self.reccam = on;
            }
            Command::MoveRight => {
                if on && !self.go_right {
                    self.start_motion(right_of(self.station));
                }
                self.go_right = on;
            }
            Command::MoveLeft => {
                if on && !self.go_left {
                    self.start_motion(left_of(self.station));
                }
                self.go_left = on;
            }
            Command::Grip => {
                if on && !self.gripper_closed && self.gripper_due.is_none() {
                    self.gripper_due = Some((true, self.now + self.timings.gripper));
                }
            }
            Command::Release => {
                if on && self.gripper_closed && self.gripper_due.is_none() {
                    self.gripper_due = Some((false, self.now + self.timings.gripper));
                }
            }
            Command::RunOp1 | Command::RunOp2 | Command::RunOp3 => {
                let op = match cmd {
                    Command::RunOp1 => Operation::Op1,
                    Command::RunOp2 => Operation::Op2,
                    _ => Operation::Op3,
                };
                let idx = op.raw() as usize - 1;
                let rising = on && !self.op_commands[idx];
                if rising && self.parked_at(Position::Assembly) && self.operation_due.is_none() {
                    self.end_operation = 0;
                    self.assembly_evacuated = false;
                    self.operation_due = Some((op, self.now + self.timings.operation));
                }
                self.op_commands[idx] = on;
            }
            Command::Verify => {
                if on && !self.verif {
                    self.assembly_ok = false;
                    self.assembly_evacuated = false;
                    self.verify_due = Some(self.now + self.timings.verify);
                } else if !on && self.verif {
                    self.verify_due = None;
                    if self.assembly_ok {
                        self.evacuation_due = Some(self.now + self.timings.evacuation);
                    }
                }
                self.verif = on;
            }
        }
    }

    /// Current raw value of `input`.
    pub fn read(&self, input: Input) -> i32 {
        match input {
            Input::OpticalBarrier => i32::from(self.object_at_barrier().is_some()),
            Input::GripperClosed => i32::from(self.gripper_closed),
            Input::RobotPosition => match self.motion {
                Some(_) => 0,
                None => self.station.raw(),
            },
            Input::EvacConveyorStopped => i32::from(self.evac_stopped),
            Input::RecognitionDone => i32::from(self.end_identification),
            Input::ObjectType => self.box_type,
            Input::OperationDone => self.end_operation,
            Input::AssemblyOk => i32::from(self.assembly_ok),
            Input::AssemblyEvacuated => i32::from(self.assembly_evacuated),
        }
    }
}

/// [`PlantLink`] over a [`CellModel`] driven by wall-clock time.
pub struct SimulatedCell {
    info: PlantInfo,
    timings: SimTimings,
    time_scale: f64,
    model: CellModel,
    connected: bool,
    simulating: bool,
    streaming: HashSet<Input>,
    clock: Option<Instant>,
}

impl SimulatedCell {
    pub fn new(options: &PlantOptions) -> Self {
        Self {
            info: PlantInfo {
                vendor: "cell-rs".to_string(),
                model: "simulated cell".to_string(),
                revision: env!("CARGO_PKG_VERSION").to_string(),
                simulated: true,
            },
            timings: options.timings,
            time_scale: options.time_scale,
            model: CellModel::new(options.timings),
            connected: false,
            simulating: false,
            streaming: HashSet::new(),
            clock: None,
        }
    }

    fn advance(&mut self) {
        if !self.simulating {
            return;
        }
        let now = Instant::now();
        if let Some(last) = self.clock {
            self.model.step(now.duration_since(last).mul_f64(self.time_scale));
        }
        self.clock = Some(now);
    }

    fn ensure_connected(&self) -> PlantResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(PlantError::NotConnected)
        }
    }
}

impl PlantLink for SimulatedCell {
    fn info(&self) -> &PlantInfo {
        &self.info
    }

    fn connect(&mut self, address: &str, port: u16) -> PlantResult<()> {
        if address.is_empty() || port == 0 {
            return Err(PlantError::connection(address, port, "invalid endpoint"));
        }
        self.connected = true;
        info!(
            "Simulated cell attached as {}:{} (time scale {})",
            address, port, self.time_scale
        );
        Ok(())
    }

    fn resolve_handles(&mut self) -> PlantResult<()> {
        self.ensure_connected()
    }

    fn begin_streaming(&mut self, input: Input) -> PlantResult<()> {
        self.ensure_connected()?;
        self.streaming.insert(input);
        Ok(())
    }

    fn read_signal(&mut self, input: Input) -> PlantResult<i32> {
        self.ensure_connected()?;
        if !self.streaming.contains(&input) {
            return Err(PlantError::Stale(input.wire_name()));
        }
        self.advance();
        Ok(self.model.read(input))
    }

    fn write_signal(&mut self, output: Output, value: i32) -> PlantResult<()> {
        self.ensure_connected()?;
        self.advance();
        self.model.apply(output, value);
        Ok(())
    }

    fn start_simulation(&mut self) -> PlantResult<()> {
        self.ensure_connected()?;
        self.model = CellModel::new(self.timings);
        self.simulating = true;
        self.clock = Some(Instant::now());
        Ok(())
    }

    fn stop_simulation(&mut self) -> PlantResult<()> {
        self.advance();
        self.simulating = false;
        self.clock = None;
        debug!(
            "Simulation stopped: {} parts consumed, {} evacuated",
            self.model.consumed(),
            self.model.evacuated()
        );
        Ok(())
    }

    fn disconnect(&mut self) {
        self.simulating = false;
        self.clock = None;
        self.streaming.clear();
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn model() -> CellModel {
        CellModel::new(SimTimings::default())
    }

    /// Step in 10 ms slices so completion checks see every state.
    fn run(model: &mut CellModel, total: Duration) {
        let mut left = total;
        while !left.is_zero() {
            let dt = left.min(10 * MS);
            model.step(dt);
            left -= dt;
        }
    }

    fn cmd(model: &mut CellModel, cmd: Command, on: bool) {
        model.apply(cmd.output(), i32::from(on));
    }

    fn move_to(model: &mut CellModel, dir: Command) {
        cmd(model, dir, true);
        run(model, model.timings().robot_travel);
        cmd(model, dir, false);
    }

    /// Robot at supply holding an object of `kind`.
    fn holding(kind: ObjectType) -> CellModel {
        let mut m = model();
        move_to(&mut m, Command::MoveRight);
        m.apply(Output::AddObject, kind.raw());
        cmd(&mut m, Command::AdvanceConveyor1, true);
        let d = m.timings().conveyor_travel;
        run(&mut m, d);
        cmd(&mut m, Command::Grip, true);
        let d = m.timings().gripper;
        run(&mut m, d);
        cmd(&mut m, Command::Grip, false);
        assert_eq!(m.read(Input::GripperClosed), 1);
        m
    }

    #[test]
    fn test_conveyor_carries_object_to_barrier() {
        let mut m = model();
        m.apply(Output::AddObject, 2);
        run(&mut m, Duration::from_secs(5));
        // Belt not running yet.
        assert_eq!(m.read(Input::OpticalBarrier), 0);

        cmd(&mut m, Command::AdvanceConveyor1, true);
        let d = m.timings().conveyor_travel - 100 * MS;
        run(&mut m, d);
        assert_eq!(m.read(Input::OpticalBarrier), 0);
        run(&mut m, 100 * MS);
        assert_eq!(m.read(Input::OpticalBarrier), 1);
    }

    #[test]
    fn test_parcels_keep_spacing_behind_barrier() {
        let mut m = model();
        cmd(&mut m, Command::AdvanceConveyor1, true);
        m.apply(Output::AddObject, 1);
        run(&mut m, Duration::from_millis(500));
        m.apply(Output::AddObject, 2);
        run(&mut m, Duration::from_secs(10));
        assert_eq!(m.parcels_waiting(), 2);

        move_to(&mut m, Command::MoveRight);
        cmd(&mut m, Command::Grip, true);
        let d = m.timings().gripper;
        run(&mut m, d);
        // The second parcel is still half a second away.
        assert_eq!(m.read(Input::OpticalBarrier), 0);
        run(&mut m, Duration::from_millis(500));
        assert_eq!(m.read(Input::OpticalBarrier), 1);
    }

    #[test]
    fn test_recognition_reports_type() {
        let mut m = model();
        m.apply(Output::AddObject, 3);
        cmd(&mut m, Command::AdvanceConveyor1, true);
        let d = m.timings().conveyor_travel;
        run(&mut m, d);

        cmd(&mut m, Command::Recognize, true);
        assert_eq!(m.read(Input::RecognitionDone), 0);
        let d = m.timings().recognition;
        run(&mut m, d);
        assert_eq!(m.read(Input::RecognitionDone), 1);
        assert_eq!(m.read(Input::ObjectType), 3);

        cmd(&mut m, Command::Recognize, false);
        assert_eq!(m.read(Input::RecognitionDone), 0);
        assert_eq!(m.read(Input::ObjectType), 3);
    }

    #[test]
    fn test_recognition_without_object_reports_no_type() {
        let mut m = model();
        cmd(&mut m, Command::Recognize, true);
        let d = m.timings().recognition;
        run(&mut m, d);
        assert_eq!(m.read(Input::RecognitionDone), 1);
        assert_eq!(m.read(Input::ObjectType), 0);
    }

    #[test]
    fn test_robot_moves_one_station_per_command() {
        let mut m = model();
        assert_eq!(m.read(Input::RobotPosition), Position::Assembly.raw());

        cmd(&mut m, Command::MoveRight, true);
        run(&mut m, 100 * MS);
        assert_eq!(m.read(Input::RobotPosition), 0);
        let d = m.timings().robot_travel;
        run(&mut m, d);
        // Held command does not carry the robot past the next station.
        let d = m.timings().robot_travel;
        run(&mut m, d);
        assert_eq!(m.read(Input::RobotPosition), Position::Supply.raw());
        cmd(&mut m, Command::MoveRight, false);

        move_to(&mut m, Command::MoveRight);
        assert_eq!(m.read(Input::RobotPosition), Position::Evacuation.raw());

        // Nothing to the right of evacuation.
        cmd(&mut m, Command::MoveRight, true);
        assert_eq!(m.read(Input::RobotPosition), Position::Evacuation.raw());
        cmd(&mut m, Command::MoveRight, false);

        move_to(&mut m, Command::MoveLeft);
        assert_eq!(m.read(Input::RobotPosition), Position::Supply.raw());
    }

    #[test]
    fn test_grip_at_supply_picks_object() {
        let m = holding(ObjectType::P1);
        assert_eq!(m.read(Input::OpticalBarrier), 0);
        assert_eq!(m.parcels_waiting(), 0);
    }

    #[test]
    fn test_operation_consumes_part() {
        let mut m = holding(ObjectType::P1);
        move_to(&mut m, Command::MoveLeft);
        assert_eq!(m.read(Input::RobotPosition), Position::Assembly.raw());

        cmd(&mut m, Command::RunOp1, true);
        let d = m.timings().operation - 10 * MS;
        run(&mut m, d);
        assert_eq!(m.read(Input::OperationDone), 0);
        run(&mut m, 10 * MS);
        assert_eq!(m.read(Input::OperationDone), 1);
        assert_eq!(m.read(Input::GripperClosed), 0);
        assert_eq!(m.consumed(), 1);
        cmd(&mut m, Command::RunOp1, false);
        assert_eq!(m.read(Input::OperationDone), 1);
    }

    #[test]
    fn test_operation_needs_assembly_station() {
        let mut m = model();
        move_to(&mut m, Command::MoveRight);
        cmd(&mut m, Command::RunOp2, true);
        let d = m.timings().operation * 2;
        run(&mut m, d);
        assert_eq!(m.read(Input::OperationDone), 0);
    }

    #[test]
    fn test_verify_then_evacuate() {
        let mut m = model();
        cmd(&mut m, Command::Verify, true);
        let d = m.timings().verify;
        run(&mut m, d);
        assert_eq!(m.read(Input::AssemblyOk), 1);
        assert_eq!(m.read(Input::AssemblyEvacuated), 0);

        cmd(&mut m, Command::Verify, false);
        let d = m.timings().evacuation;
        run(&mut m, d);
        assert_eq!(m.read(Input::AssemblyEvacuated), 1);
        assert_eq!(m.read(Input::AssemblyOk), 0);

        // A new verification clears the previous result.
        cmd(&mut m, Command::Verify, true);
        assert_eq!(m.read(Input::AssemblyEvacuated), 0);
    }

    #[test]
    fn test_evac_conveyor_runs_down() {
        let mut m = model();
        cmd(&mut m, Command::AdvanceConveyor2, true);
        cmd(&mut m, Command::AdvanceConveyor2, false);
        let d = m.timings().evac_stop - 10 * MS;
        run(&mut m, d);
        // Repeated writes of the same level do not restart the timer.
        cmd(&mut m, Command::AdvanceConveyor2, false);
        assert_eq!(m.read(Input::EvacConveyorStopped), 0);
        run(&mut m, 10 * MS);
        assert_eq!(m.read(Input::EvacConveyorStopped), 1);

        cmd(&mut m, Command::AdvanceConveyor2, true);
        assert_eq!(m.read(Input::EvacConveyorStopped), 0);
    }

    #[test]
    fn test_drop_at_evacuation() {
        let mut m = holding(ObjectType::P2);
        move_to(&mut m, Command::MoveRight);
        cmd(&mut m, Command::Release, true);
        let d = m.timings().gripper;
        run(&mut m, d);
        assert_eq!(m.read(Input::GripperClosed), 0);
        assert_eq!(m.evacuated(), 1);
    }

    #[test]
    fn test_link_requires_connection_and_streaming() {
        let mut link = SimulatedCell::new(&PlantOptions::default());
        assert_eq!(
            link.read_signal(Input::GripperClosed),
            Err(PlantError::NotConnected)
        );

        link.connect("127.0.0.1", 19997).unwrap();
        assert_eq!(
            link.read_signal(Input::GripperClosed),
            Err(PlantError::Stale("gripper_closed"))
        );

        link.begin_streaming(Input::GripperClosed).unwrap();
        link.start_simulation().unwrap();
        assert_eq!(link.read_signal(Input::GripperClosed), Ok(0));

        link.disconnect();
        assert!(!link.is_connected());
    }

    #[test]
    fn test_link_rejects_empty_address() {
        let mut link = SimulatedCell::new(&PlantOptions::default());
        assert!(matches!(
            link.connect("", 19997),
            Err(PlantError::Connection { .. })
        ));
    }

    #[test]
    fn test_link_advances_with_scaled_time() {
        let options = PlantOptions {
            time_scale: 100.0,
            ..PlantOptions::default()
        };
        let mut link = SimulatedCell::new(&options);
        link.connect("127.0.0.1", 19997).unwrap();
        link.begin_streaming(Input::RobotPosition).unwrap();
        link.start_simulation().unwrap();

        link.write_signal(Command::MoveRight.output(), 1).unwrap();
        assert_eq!(link.read_signal(Input::RobotPosition), Ok(0));
        // 800 ms of travel at 100x.
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(
            link.read_signal(Input::RobotPosition),
            Ok(Position::Supply.raw())
        );
    }
}
