// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod sequence;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{error, info};

use cell_app::{init_logging, normalize_name, ConfigFile};
use cell_backend::{register_builtin_backends_on, RegistrationContext};
use cell_core::control::RunSummary;
use cell_core::{
    CommandState, DynResult, EngineStats, PlantInfo, PollingEngine, SequenceRunner, SignalFrame,
};

use config::CellConfig;
use sequence::SequenceKind;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - assembly cell controller");

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Plant backend to use (e.g. sim)
    #[arg(short = 'b', long = "backend")]
    backend: Option<String>,
    /// Polling cycle period in milliseconds
    #[arg(long = "cycle-ms")]
    cycle_ms: Option<u64>,
    /// Control sequence to run
    #[arg(short = 's', long = "sequence", value_enum)]
    sequence: Option<SequenceKind>,
    /// Completions before the sequence stops
    #[arg(short = 'n', long = "loops")]
    loops: Option<u32>,
    /// Simulation speed-up for simulated backends
    #[arg(long = "time-scale")]
    time_scale: Option<f64>,
    /// Feeder RNG seed (0 draws from OS entropy)
    #[arg(long = "seed")]
    seed: Option<u64>,
    /// End-of-run report format
    #[arg(long = "report", value_enum, default_value_t = ReportFormat::Text)]
    report: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

/// Fold CLI arguments over the file configuration. CLI wins.
fn apply_cli(cli: &Cli, cfg: &mut CellConfig) {
    if let Some(ref backend) = cli.backend {
        cfg.plant.backend = backend.clone();
    }
    if let Some(cycle_ms) = cli.cycle_ms {
        cfg.engine.cycle_ms = cycle_ms;
    }
    if let Some(kind) = cli.sequence {
        cfg.sequence.name = kind;
    }
    if let Some(loops) = cli.loops {
        cfg.sequence.loops = loops;
    }
    if let Some(time_scale) = cli.time_scale {
        cfg.plant.time_scale = time_scale;
    }
    if let Some(seed) = cli.seed {
        cfg.feeder.seed = seed;
    }
}

fn resolve_backend(cfg: &CellConfig, registry: &RegistrationContext) -> DynResult<String> {
    let backend = normalize_name(&cfg.plant.backend);
    if !registry.is_backend_registered(&backend) {
        return Err(format!(
            "Unknown plant backend: {} (available: {})",
            backend,
            registry.registered_backends().join(", ")
        )
        .into());
    }
    Ok(backend)
}

/// End-of-run report printed with `--report json`.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    sequence: SequenceKind,
    backend: &'a str,
    plant: PlantInfo,
    summary: RunSummary,
    stats: EngineStats,
    frame: SignalFrame,
    commands: CommandState,
}

fn main() -> DynResult<()> {
    let mut registry = RegistrationContext::new();
    register_builtin_backends_on(&mut registry);

    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", CellConfig::example_combined_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = CellConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        CellConfig::load_from_default_paths()?
    };
    apply_cli(&cli, &mut cfg);
    cfg.validate()
        .map_err(|e| format!("Invalid cell-ctl configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let backend = resolve_backend(&cfg, &registry)?;
    info!(
        "Starting cell-ctl (backend: {}, plant: {}:{}, cycle: {} ms, sequence: {})",
        backend, cfg.plant.address, cfg.plant.port, cfg.engine.cycle_ms, cfg.sequence.name
    );

    let link = registry.build_link(&backend, &cfg.plant_options())?;
    let engine = Arc::new(PollingEngine::new(link, cfg.engine_config()));
    engine.start(cfg.cycle())?;

    let outcome = sequence::run(
        cfg.sequence.name,
        Arc::clone(&engine),
        cfg.sequence_params(),
        SequenceRunner::new(),
    );
    engine.stop();

    let summary = match outcome {
        Ok(summary) => summary,
        Err(err) => {
            error!("{} sequence failed: {}", cfg.sequence.name, err);
            return Err(err);
        }
    };
    let stats = engine.stats();

    match cli.report {
        ReportFormat::Text => info!(
            "Finished in {} ms: {} transitions, {} cycles, {} overruns, {} edges, {} objects fed",
            summary.elapsed_ms,
            summary.transitions,
            stats.cycles,
            stats.overruns,
            stats.edges,
            stats.objects_fed
        ),
        ReportFormat::Json => {
            let report = RunReport {
                sequence: cfg.sequence.name,
                backend: &backend,
                plant: engine.info(),
                summary,
                stats,
                frame: engine.frame(),
                commands: engine.commands(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
