// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Control sequences driving the assembly cell.

pub mod assembly;
pub mod conveyor;
pub mod simple;

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cell_core::control::{await_edge, poll_level, spawn_sequence, PollOptions, RunSummary};
use cell_core::{
    Command, ControlError, DynResult, Edge, Level, ObjectType, PollingEngine, Position,
    SequenceRunner,
};

use assembly::AssemblySequence;
use simple::SimpleSequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SequenceKind {
    /// Full assembly written against the raw engine
    #[default]
    Assembly,
    /// Same procedure on top of the blocking command wrapper
    Simple,
    /// Supply task and recognition watcher on separate threads
    Conveyor,
}

impl SequenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SequenceKind::Assembly => "assembly",
            SequenceKind::Simple => "simple",
            SequenceKind::Conveyor => "conveyor",
        }
    }
}

impl fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceParams {
    /// Completions before the sequence reports done.
    pub loops: u32,
    /// Bound on each blocking wait; `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            loops: 2,
            timeout: None,
        }
    }
}

/// Run the selected sequence to completion on its own thread(s).
pub fn run(
    kind: SequenceKind,
    engine: Arc<PollingEngine>,
    params: SequenceParams,
    runner: SequenceRunner,
) -> DynResult<RunSummary> {
    info!("Running {} sequence ({} loops)", kind, params.loops);
    let summary = match kind {
        SequenceKind::Assembly => join(spawn_sequence(
            AssemblySequence::new(engine, params),
            runner,
        ))?,
        SequenceKind::Simple => join(spawn_sequence(SimpleSequence::new(engine, params), runner))?,
        SequenceKind::Conveyor => conveyor::run(engine, params, runner)?,
    };
    Ok(summary)
}

pub(crate) fn join(
    spawned: io::Result<JoinHandle<Result<RunSummary, ControlError>>>,
) -> DynResult<RunSummary> {
    let handle = spawned.map_err(|e| format!("Cannot spawn sequence thread: {}", e))?;
    let summary = handle
        .join()
        .map_err(|_| "Sequence thread panicked".to_string())??;
    Ok(summary)
}

pub(crate) fn timed_out(what: impl fmt::Debug) -> ControlError {
    ControlError::Timeout(format!("{:?}", what))
}

/// Move the robot to the adjacent station `target`.
///
/// The move command is held until the arrival edge fires. Stations that are
/// not neighbours of the current one are rejected: every hop needs its own
/// rising command.
pub fn move_to(
    engine: &PollingEngine,
    target: Position,
    timeout: Option<Duration>,
) -> Result<(), ControlError> {
    let current = engine
        .position()
        .ok_or_else(|| ControlError::UnexpectedState("robot is between stations".to_string()))?;
    let cmd = match target.raw() - current.raw() {
        0 => return Ok(()),
        1 => Command::MoveRight,
        -1 => Command::MoveLeft,
        _ => {
            return Err(ControlError::UnexpectedState(format!(
                "cannot reach {:?} from {:?} in one move",
                target, current
            )))
        }
    };
    debug!("Moving {:?} -> {:?}", current, target);
    hold_until(engine, cmd, Edge::reached(target), timeout)
}

/// Run the supply conveyor until an object blocks the optical barrier, then
/// stop it.
pub fn feed_until_barrier(
    engine: &PollingEngine,
    timeout: Option<Duration>,
) -> Result<(), ControlError> {
    engine.set(Command::AdvanceConveyor1, true);
    let arrived = await_edge(
        engine,
        Edge::ObjectDetected,
        |frame| frame.optical_barrier(),
        timeout,
    );
    engine.set(Command::AdvanceConveyor1, false);
    arrived
}

/// Trigger the camera and return the recognised type once it reports done.
///
/// `None` when the camera found nothing it knows.
pub fn recognize(
    engine: &PollingEngine,
    timeout: Option<Duration>,
) -> Result<Option<ObjectType>, ControlError> {
    engine.set(Command::Recognize, true);
    let done = poll_level(
        engine,
        Level::RecognitionDone,
        PollOptions::with_timeout(timeout),
    );
    let kind = engine.object_type();
    engine.set(Command::Recognize, false);
    done?;
    Ok(kind)
}

/// Stop the evacuation conveyor and wait until it has run down.
pub fn stop_evac_conveyor(
    engine: &PollingEngine,
    timeout: Option<Duration>,
) -> Result<(), ControlError> {
    engine.set(Command::AdvanceConveyor2, false);
    await_edge(
        engine,
        Edge::EvacConveyorStopped,
        |frame| frame.evac_conveyor_stopped(),
        timeout,
    )
}

/// Hold `cmd` until `edge` fires.
pub(crate) fn hold_until(
    engine: &PollingEngine,
    cmd: Command,
    edge: Edge,
    timeout: Option<Duration>,
) -> Result<(), ControlError> {
    if engine.assert_until(cmd, edge, timeout) {
        Ok(())
    } else {
        Err(timed_out(edge))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use cell_backend::{PlantOptions, SimulatedCell};
    use cell_core::engine::feeder::{FeedPattern, FeederConfig};
    use cell_core::engine::policies::NoRetry;
    use cell_core::{CommandState, EngineConfig, PollingEngine};

    pub const CYCLE: Duration = Duration::from_millis(5);
    pub const TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

    /// Simulated cell running 20x faster than wall clock.
    pub fn sim_engine(pattern: FeedPattern, seed: u64) -> Arc<PollingEngine> {
        let link = SimulatedCell::new(&PlantOptions {
            time_scale: 20.0,
            ..PlantOptions::default()
        });
        let engine = PollingEngine::new(
            Box::new(link),
            EngineConfig {
                settle: Duration::ZERO,
                retry: Arc::new(NoRetry),
                initial_commands: CommandState::with_conveyors_running(),
                feeder: Some(FeederConfig {
                    pattern,
                    interval: Duration::from_millis(40),
                    seed,
                }),
                ..EngineConfig::default()
            },
        );
        let engine = Arc::new(engine);
        engine.start(CYCLE).unwrap();
        engine
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{sim_engine, TIMEOUT};
    use super::*;
    use cell_core::engine::feeder::FeedPattern;

    #[test]
    fn test_sequence_kind_names() {
        assert_eq!(SequenceKind::Conveyor.to_string(), "conveyor");
        let parsed: SequenceKind = serde_json::from_str("\"simple\"").unwrap();
        assert_eq!(parsed, SequenceKind::Simple);
    }

    #[test]
    fn test_move_to_adjacent_station() {
        let engine = sim_engine(FeedPattern::RoundRobin, 1);
        assert_eq!(engine.position(), Some(Position::Assembly));
        move_to(&engine, Position::Supply, TIMEOUT).unwrap();
        assert_eq!(engine.position(), Some(Position::Supply));
        assert!(!engine.command(Command::MoveRight));
        move_to(&engine, Position::Supply, TIMEOUT).unwrap();
        engine.stop();
    }

    #[test]
    fn test_move_to_rejects_two_hops() {
        let engine = sim_engine(FeedPattern::RoundRobin, 1);
        let err = move_to(&engine, Position::Evacuation, TIMEOUT).unwrap_err();
        assert!(matches!(err, ControlError::UnexpectedState(_)));
        engine.stop();
    }

    #[test]
    fn test_feed_and_recognize() {
        let engine = sim_engine(FeedPattern::RoundRobin, 1);
        feed_until_barrier(&engine, TIMEOUT).unwrap();
        assert!(engine.frame().optical_barrier());
        assert!(!engine.command(Command::AdvanceConveyor1));

        let kind = recognize(&engine, TIMEOUT).unwrap();
        assert_eq!(kind, Some(ObjectType::P1));
        assert!(!engine.command(Command::Recognize));
        engine.stop();
    }

    #[test]
    fn test_stop_evac_conveyor() {
        let engine = sim_engine(FeedPattern::RoundRobin, 1);
        assert!(!engine.frame().evac_conveyor_stopped());
        stop_evac_conveyor(&engine, TIMEOUT).unwrap();
        assert!(engine.frame().evac_conveyor_stopped());
        engine.stop();
    }
}
