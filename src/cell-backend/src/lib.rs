// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::HashMap;

use cell_core::{DynResult, PlantLink};

mod sim;

pub use sim::{CellModel, SimTimings, SimulatedCell};

/// Parameters handed to a backend factory.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantOptions {
    /// Model seconds per wall-clock second (simulated backends only).
    pub time_scale: f64,
    pub timings: SimTimings,
}

impl Default for PlantOptions {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            timings: SimTimings::default(),
        }
    }
}

pub type BackendFactory = fn(&PlantOptions) -> DynResult<Box<dyn PlantLink>>;

/// Context for registering and instantiating plant backends.
#[derive(Clone)]
pub struct RegistrationContext {
    factories: HashMap<String, BackendFactory>,
}

impl RegistrationContext {
    /// Create a new empty registration context.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory under a stable name (e.g. "sim").
    pub fn register_backend(&mut self, name: &str, factory: BackendFactory) {
        let key = normalize_name(name);
        self.factories.insert(key, factory);
    }

    pub fn is_backend_registered(&self, name: &str) -> bool {
        let key = normalize_name(name);
        self.factories.contains_key(&key)
    }

    /// List registered backend names.
    pub fn registered_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate the named backend.
    pub fn build_link(&self, name: &str, options: &PlantOptions) -> DynResult<Box<dyn PlantLink>> {
        let key = normalize_name(name);
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| format!("Unknown plant backend: {}", name))?;
        factory(options)
    }
}

impl Default for RegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Register all built-in backends on a context.
pub fn register_builtin_backends_on(context: &mut RegistrationContext) {
    context.register_backend("sim", sim_factory);
}

fn sim_factory(options: &PlantOptions) -> DynResult<Box<dyn PlantLink>> {
    if !(options.time_scale.is_finite() && options.time_scale > 0.0) {
        return Err(format!("invalid time scale: {}", options.time_scale).into());
    }
    Ok(Box::new(SimulatedCell::new(options)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registration() {
        let mut ctx = RegistrationContext::new();
        register_builtin_backends_on(&mut ctx);
        assert_eq!(ctx.registered_backends(), vec!["sim".to_string()]);
        assert!(ctx.is_backend_registered("SIM"));
        assert!(ctx.is_backend_registered("s-i-m"));
    }

    #[test]
    fn test_build_sim_link() {
        let mut ctx = RegistrationContext::new();
        register_builtin_backends_on(&mut ctx);
        let link = ctx.build_link("sim", &PlantOptions::default()).unwrap();
        assert!(link.info().simulated);
        assert!(!link.is_connected());
    }

    #[test]
    fn test_unknown_backend() {
        let ctx = RegistrationContext::new();
        let err = ctx
            .build_link("vrep", &PlantOptions::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("vrep"));
    }

    #[test]
    fn test_invalid_time_scale() {
        let mut ctx = RegistrationContext::new();
        register_builtin_backends_on(&mut ctx);
        let options = PlantOptions {
            time_scale: 0.0,
            ..PlantOptions::default()
        };
        assert!(ctx.build_link("sim", &options).is_err());
    }
}
