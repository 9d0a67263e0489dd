//! Run configuration.
use std::{fs, path::Path};

use chip8::{prelude::*, KeySnapshot};
use serde::Deserialize;

use crate::error::AppError;

/// Number of instructions executed when the config doesn't say.
pub const DEFAULT_STEPS: usize = 1000;

/// Settings for a single headless run, loaded from a YAML file.
///
/// ```yaml
/// vm:
///   clock_frequency: 500
///   rng_seed: 42
/// steps: 2000
/// keys: [5]
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub vm: Chip8Conf,
    /// Scheduling quanta to run before stopping.
    pub steps: Option<usize>,
    /// Keys held down for the whole run.
    pub keys: Vec<KeyCode>,
}

impl RunConfig {
    pub fn from_file(filepath: impl AsRef<Path>) -> Result<Self, AppError> {
        let file = fs::File::open(filepath.as_ref())?;
        let config: RunConfig = serde_yaml::from_reader(file)?;
        log::debug!("loaded run config: {:#?}", config);
        Ok(config)
    }

    pub fn step_budget(&self) -> usize {
        self.steps.unwrap_or(DEFAULT_STEPS)
    }

    pub fn key_snapshot(&self) -> KeySnapshot {
        KeyCode::snapshot(&self.keys)
    }
}
