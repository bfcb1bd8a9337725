// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for cell-ctl.
//!
//! Config is loaded from the `[cell-ctl]` section of `cell-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./cell-rs.toml`
//! 3. `~/.config/cell-rs/cell-rs.toml`
//! 4. `/etc/cell-rs/cell-rs.toml`

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cell_app::{parse_millis, ConfigFile};
use cell_backend::PlantOptions;
use cell_core::engine::feeder::{FeedPattern, FeederConfig};
use cell_core::engine::policies::ExponentialBackoff;
use cell_core::engine::{DEFAULT_ADDRESS, DEFAULT_PORT};
use cell_core::{CommandState, EngineConfig};

use crate::sequence::{SequenceKind, SequenceParams};

/// Top-level cell-ctl configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Plant backend and endpoint
    pub plant: PlantConfig,
    /// Polling engine timing and connection retry
    pub engine: EngineSettings,
    /// Object feeder on the supply conveyor
    pub feeder: FeederSettings,
    /// Control sequence to run
    pub sequence: SequenceConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantConfig {
    /// Registered backend name (e.g. "sim")
    pub backend: String,
    /// Simulator remote API address
    pub address: String,
    pub port: u16,
    /// Model seconds per wall-clock second for simulated backends
    pub time_scale: f64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            backend: "sim".to_string(),
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            time_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Polling cycle period in milliseconds
    pub cycle_ms: u64,
    /// Pause after starting the simulation, in milliseconds
    pub settle_ms: u64,
    /// Connect attempts before giving up
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    pub retry_base_delay_ms: u64,
    /// Upper bound for the backoff delay in milliseconds
    pub retry_max_delay_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cycle_ms: 25,
            settle_ms: 1000,
            max_retries: 3,
            retry_base_delay_ms: 250,
            retry_max_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeederSettings {
    pub enabled: bool,
    pub pattern: FeedPattern,
    /// Delay between drops while the supply conveyor runs, in milliseconds
    pub interval_ms: u64,
    /// RNG seed; 0 draws from OS entropy
    pub seed: u64,
}

impl Default for FeederSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            pattern: FeedPattern::Random,
            interval_ms: 1000,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub name: SequenceKind,
    /// Completions before the sequence stops (assemblies, operations or
    /// recognised objects depending on the sequence)
    pub loops: u32,
    /// Bound on every blocking wait in milliseconds; 0 waits forever
    pub timeout_ms: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            name: SequenceKind::Assembly,
            loops: 2,
            timeout_ms: 0,
        }
    }
}

impl CellConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if self.plant.backend.trim().is_empty() {
            return Err("[plant].backend must not be empty".to_string());
        }
        if self.plant.address.trim().is_empty() {
            return Err("[plant].address must not be empty".to_string());
        }
        if self.plant.port == 0 {
            return Err("[plant].port must be > 0".to_string());
        }
        if !self.plant.time_scale.is_finite() || self.plant.time_scale <= 0.0 {
            return Err("[plant].time_scale must be a positive number".to_string());
        }

        if self.engine.cycle_ms == 0 {
            return Err("[engine].cycle_ms must be > 0".to_string());
        }
        if self.engine.max_retries == 0 {
            return Err("[engine].max_retries must be > 0".to_string());
        }
        if self.engine.retry_base_delay_ms == 0 {
            return Err("[engine].retry_base_delay_ms must be > 0".to_string());
        }
        if self.engine.retry_max_delay_ms < self.engine.retry_base_delay_ms {
            return Err(
                "[engine].retry_max_delay_ms must be >= retry_base_delay_ms".to_string(),
            );
        }

        if self.feeder.enabled && self.feeder.interval_ms == 0 {
            return Err("[feeder].interval_ms must be > 0 when the feeder is enabled".to_string());
        }

        if self.sequence.loops == 0 {
            return Err("[sequence].loops must be > 0".to_string());
        }
        Ok(())
    }

    pub fn cycle(&self) -> Duration {
        Duration::from_millis(self.engine.cycle_ms)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let feeder = self.feeder.enabled.then(|| FeederConfig {
            pattern: self.feeder.pattern,
            interval: Duration::from_millis(self.feeder.interval_ms),
            seed: self.feeder.seed,
        });
        EngineConfig {
            address: self.plant.address.clone(),
            port: self.plant.port,
            settle: Duration::from_millis(self.engine.settle_ms),
            retry: Arc::new(ExponentialBackoff::new(
                self.engine.max_retries,
                Duration::from_millis(self.engine.retry_base_delay_ms),
                Duration::from_millis(self.engine.retry_max_delay_ms),
            )),
            initial_commands: CommandState::with_conveyors_running(),
            feeder,
        }
    }

    pub fn plant_options(&self) -> PlantOptions {
        PlantOptions {
            time_scale: self.plant.time_scale,
            ..PlantOptions::default()
        }
    }

    pub fn sequence_params(&self) -> SequenceParams {
        SequenceParams {
            loops: self.sequence.loops,
            timeout: parse_millis(self.sequence.timeout_ms),
        }
    }

    /// Generate an example configuration wrapped under the `[cell-ctl]`
    /// section header, suitable for use in a combined `cell-rs.toml` file.
    pub fn example_combined_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "cell-ctl")]
            inner: CellConfig,
        }
        let example = CellConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            sequence: SequenceConfig {
                timeout_ms: 30_000,
                ..SequenceConfig::default()
            },
            ..CellConfig::default()
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for CellConfig {
    fn section_key() -> &'static str {
        "cell-ctl"
    }
}
