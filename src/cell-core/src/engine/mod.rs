// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Cyclic polling engine.
//!
//! One dedicated thread samples every plant input each cycle, publishes the
//! level view, turns transitions into [`EventSignal`] notifications and
//! writes the commanded outputs back. Application threads only touch the
//! shared command set, the published frame and the event bank.

pub mod edges;
pub mod events;
pub mod feeder;
pub mod policies;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::plant::command::{Command, CommandState, Output};
use crate::plant::error::{PlantError, PlantResult};
use crate::plant::signal::{Edge, Input, Level, ObjectType, Position};
use crate::plant::snapshot::{PlantSnapshot, SignalFrame};
use crate::plant::{PlantInfo, PlantLink};
use crate::sync::EventSignal;

use edges::{detect_edges, EventBank};
use events::{CellEventEmitter, CellListener, ListenerId};
use feeder::{FeederConfig, ObjectFeeder};
use policies::{ExponentialBackoff, RetryPolicy};

pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 19997;
pub const DEFAULT_CYCLE: Duration = Duration::from_millis(25);

const POLL_THREAD_NAME: &str = "cell-poll";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("polling engine is already running")]
    AlreadyRunning,

    #[error("invalid cycle period: {0:?}")]
    InvalidCycle(Duration),

    #[error("plant startup failed: {0}")]
    Startup(#[from] PlantError),

    #[error("cannot spawn polling thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Engine construction parameters.
#[derive(Clone)]
pub struct EngineConfig {
    pub address: String,
    pub port: u16,
    /// Pause between starting the simulation and the first read.
    pub settle: Duration,
    /// Policy for the connect step only.
    pub retry: Arc<dyn RetryPolicy>,
    /// Command set asserted from the first cycle on.
    pub initial_commands: CommandState,
    /// Object feeder; `None` leaves the supply conveyor empty.
    pub feeder: Option<FeederConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            settle: Duration::from_secs(1),
            retry: Arc::new(ExponentialBackoff::default_plant()),
            initial_commands: CommandState::with_conveyors_running(),
            feeder: Some(FeederConfig::default()),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("settle", &self.settle)
            .field("retry_attempts", &self.retry.max_attempts())
            .field("initial_commands", &self.initial_commands)
            .field("feeder", &self.feeder)
            .finish()
    }
}

/// Counters accumulated over the engine lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub cycles: u64,
    pub overruns: u64,
    pub edges: u64,
    pub read_failures: u64,
    pub write_failures: u64,
    pub objects_fed: u64,
}

#[derive(Default)]
struct Counters {
    cycles: AtomicU64,
    overruns: AtomicU64,
    edges: AtomicU64,
    read_failures: AtomicU64,
    write_failures: AtomicU64,
    objects_fed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn snapshot(&self) -> EngineStats {
        EngineStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            edges: self.edges.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            objects_fed: self.objects_fed.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the engine handle and the polling thread.
struct Shared {
    running: AtomicBool,
    commands: Mutex<CommandState>,
    frame: Mutex<SignalFrame>,
    events: EventBank,
    emitter: RwLock<CellEventEmitter>,
    counters: Counters,
}

impl Shared {
    /// Read every input. A failed read keeps the value from `last`.
    fn sample(
        &self,
        link: &mut dyn PlantLink,
        last: SignalFrame,
        faults: &mut Vec<PlantError>,
    ) -> SignalFrame {
        let mut frame = last;
        for input in Input::ALL {
            match link.read_signal(input) {
                Ok(value) => frame.set(input, value),
                Err(err) => {
                    debug!("Read of {} failed, keeping {}: {}", input, last.get(input), err);
                    Counters::bump(&self.counters.read_failures);
                    faults.push(err);
                }
            }
        }
        frame
    }

    fn write(
        &self,
        link: &mut dyn PlantLink,
        output: Output,
        value: i32,
        faults: &mut Vec<PlantError>,
    ) {
        if let Err(err) = link.write_signal(output, value) {
            warn!("Write of {} failed: {}", output.wire_name(), err);
            Counters::bump(&self.counters.write_failures);
            faults.push(err);
        }
    }

    /// Hand one cycle's faults and edges to the listeners.
    ///
    /// Called with the plant link released.
    fn report(&self, cycle: u64, edges: &[Edge], faults: &[PlantError]) {
        if edges.is_empty() && faults.is_empty() {
            return;
        }
        let emitter = self.emitter.read();
        for err in faults {
            emitter.notify_link_fault(err);
        }
        for &edge in edges {
            emitter.notify_edge(edge, cycle);
        }
    }

    fn publish(&self, frame: SignalFrame) {
        *self.frame.lock() = frame;
    }
}

/// Polling engine bound to one plant link.
///
/// Constructed explicitly and shared by reference or `Arc` with the
/// threads that drive the cell.
pub struct PollingEngine {
    config: EngineConfig,
    shared: Arc<Shared>,
    link: Arc<Mutex<Box<dyn PlantLink>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PollingEngine {
    pub fn new(link: Box<dyn PlantLink>, config: EngineConfig) -> Self {
        let shared = Shared {
            running: AtomicBool::new(false),
            commands: Mutex::new(config.initial_commands),
            frame: Mutex::new(SignalFrame::default()),
            events: EventBank::new(),
            emitter: RwLock::new(CellEventEmitter::new()),
            counters: Counters::default(),
        };
        Self {
            config,
            shared: Arc::new(shared),
            link: Arc::new(Mutex::new(link)),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn info(&self) -> PlantInfo {
        self.link.lock().info().clone()
    }

    /// Open the plant session and spawn the polling thread.
    ///
    /// On failure the link is disconnected and no thread is left behind.
    /// A zero cycle is rejected before the plant is touched.
    pub fn start(&self, cycle: Duration) -> Result<(), EngineError> {
        if cycle.is_zero() || Instant::now().checked_add(cycle).is_none() {
            return Err(EngineError::InvalidCycle(cycle));
        }
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        let mut faults = Vec::new();
        let initial = {
            let mut link = self.link.lock();
            if let Err(err) = self.open(link.as_mut()) {
                error!("Plant startup failed: {}", err);
                link.disconnect();
                return Err(EngineError::Startup(err));
            }
            self.shared
                .sample(link.as_mut(), SignalFrame::default(), &mut faults)
        };
        self.shared.publish(initial);
        self.shared.report(0, &[], &faults);
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let link = Arc::clone(&self.link);
        let feeder = self.config.feeder.map(ObjectFeeder::new);
        let spawned = thread::Builder::new()
            .name(POLL_THREAD_NAME.to_string())
            .spawn(move || run_cycles(link, shared, cycle, feeder, initial));

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                drop(worker);
                info!("Polling engine started ({:?} cycle)", cycle);
                self.shared.emitter.read().notify_running_change(true);
                Ok(())
            }
            Err(err) => {
                error!("Cannot spawn polling thread: {}", err);
                self.shared.running.store(false, Ordering::SeqCst);
                self.close();
                Err(EngineError::Spawn(err))
            }
        }
    }

    fn open(&self, link: &mut dyn PlantLink) -> PlantResult<()> {
        let retry = &self.config.retry;
        let mut attempt = 1;
        loop {
            match link.connect(&self.config.address, self.config.port) {
                Ok(()) => break,
                Err(err) if retry.should_retry(attempt, &err) => {
                    let delay = retry.delay(attempt - 1);
                    warn!(
                        "Connect attempt {}/{} failed: {} (retrying in {:?})",
                        attempt,
                        retry.max_attempts(),
                        err,
                        delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
        info!(
            "Connected to {} {} at {}:{}",
            link.info().vendor,
            link.info().model,
            self.config.address,
            self.config.port
        );

        link.resolve_handles()?;
        for input in Input::ALL {
            link.begin_streaming(input)?;
        }
        link.start_simulation()?;
        if !self.config.settle.is_zero() {
            thread::sleep(self.config.settle);
        }
        Ok(())
    }

    fn close(&self) {
        let mut link = self.link.lock();
        if !link.is_connected() {
            return;
        }
        if let Err(err) = link.stop_simulation() {
            warn!("Stopping simulation failed: {}", err);
        }
        link.disconnect();
    }

    /// Stop the polling thread and close the plant session.
    ///
    /// Idempotent; a no-op if the engine never started.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };
        self.shared.running.store(false, Ordering::SeqCst);
        if handle.join().is_err() {
            error!("Polling thread panicked");
        }
        self.close();
        drop(worker);
        self.shared.emitter.read().notify_running_change(false);
        info!("Polling engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Assert or release a command. Reaches the plant on the next cycle's
    /// write phase.
    pub fn set(&self, cmd: Command, on: bool) {
        self.shared.commands.lock().set(cmd, on);
    }

    pub fn command(&self, cmd: Command) -> bool {
        self.shared.commands.lock().get(cmd)
    }

    pub fn commands(&self) -> CommandState {
        *self.shared.commands.lock()
    }

    pub fn event(&self, edge: Edge) -> &EventSignal {
        self.shared.events.signal(edge)
    }

    /// Block until the next occurrence of `edge`. Returns `false` on
    /// timeout.
    pub fn wait(&self, edge: Edge, timeout: Option<Duration>) -> bool {
        let signal = self.event(edge);
        match timeout {
            Some(timeout) => signal.wait_for(timeout),
            None => {
                signal.wait();
                true
            }
        }
    }

    /// Assert `cmd`, wait for `edge`, then release `cmd`.
    ///
    /// The wait is armed before the command is asserted, so an edge raised
    /// by the very next cycle is not missed.
    pub fn assert_until(&self, cmd: Command, edge: Edge, timeout: Option<Duration>) -> bool {
        let armed = self.event(edge).arm();
        self.set(cmd, true);
        let fired = match timeout {
            Some(timeout) => armed.wait_for(timeout),
            None => {
                armed.wait();
                true
            }
        };
        self.set(cmd, false);
        fired
    }

    pub fn read(&self, level: Level) -> bool {
        self.shared.frame.lock().level(level)
    }

    /// Latest published frame. All levels of one frame come from the same
    /// cycle.
    pub fn frame(&self) -> SignalFrame {
        *self.shared.frame.lock()
    }

    pub fn object_type(&self) -> Option<ObjectType> {
        self.frame().object_type()
    }

    pub fn position(&self) -> Option<Position> {
        self.frame().position()
    }

    pub fn stats(&self) -> EngineStats {
        self.shared.counters.snapshot()
    }

    pub fn add_listener(&self, listener: Arc<dyn CellListener>) -> ListenerId {
        self.shared.emitter.write().register(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.shared.emitter.write().unregister(id);
    }
}

impl Drop for PollingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_cycles(
    link: Arc<Mutex<Box<dyn PlantLink>>>,
    shared: Arc<Shared>,
    cycle: Duration,
    mut feeder: Option<ObjectFeeder>,
    initial: SignalFrame,
) {
    info!("Polling thread started");
    let mut snapshot = PlantSnapshot::new(initial);
    let mut deadline = Instant::now() + cycle;

    while shared.running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();
        let mut faults = Vec::new();
        let (n, edges) = {
            let mut link = link.lock();
            let link = link.as_mut();

            let sample = shared.sample(link, snapshot.current, &mut faults);
            snapshot.push(sample);
            shared.publish(snapshot.current);

            let n = Counters::bump(&shared.counters.cycles);
            let edges = detect_edges(&snapshot.previous, &snapshot.current);
            for &edge in &edges {
                debug!("Edge {:?} at cycle {}", edge, n);
                shared.events.notify(edge);
                Counters::bump(&shared.counters.edges);
            }
            snapshot.settle();

            let commands = *shared.commands.lock();
            if let Some(feeder) = feeder.as_mut() {
                let running = commands.get(Command::AdvanceConveyor1);
                if let Some(kind) = feeder.tick(cycle_start, running) {
                    debug!("Feeding object {}", kind);
                    shared.write(link, Output::AddObject, kind.raw(), &mut faults);
                    Counters::bump(&shared.counters.objects_fed);
                }
            }
            for (cmd, on) in commands.iter() {
                shared.write(link, cmd.output(), i32::from(on), &mut faults);
            }
            (n, edges)
        };
        shared.report(n, &edges, &faults);

        let now = Instant::now();
        if now > deadline {
            let elapsed = now - cycle_start;
            warn!("Cycle overrun: {:?} (target: {:?})", elapsed, cycle);
            Counters::bump(&shared.counters.overruns);
            shared.emitter.read().notify_cycle_overrun(elapsed);
            deadline = now + cycle;
        } else {
            thread::sleep(deadline - now);
            deadline += cycle;
        }
    }

    info!("Polling thread stopped");
}
