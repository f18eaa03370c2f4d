use crate::arena::Arena;
use crate::engine::step_count;
use crate::utils::{FINITE, NON_NEGATIVE, POSITIVE, check_num};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub init: InitConfig,
    pub output: OutputConfig,
}

/// Arena and walk parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Side length of the square arena.
    pub side_length: f64,
    /// Speed of the agent (distance per unit time).
    pub speed: f64,
    /// Standard deviation of the per-step heading change (radians).
    pub heading_noise_sd: f64,
    /// Total simulated time.
    pub t_max: f64,
    /// Time step.
    pub dt: f64,
}

/// Initial state of the agent.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    pub position: [f64; 2],
    pub heading: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base seed of the random number generator. Drawn at random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Number of occupancy histogram bins per axis.
    pub hist_bins: usize,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let model = &self.model;
        check_num(model.side_length, POSITIVE).context("invalid side length")?;
        check_num(model.speed, NON_NEGATIVE).context("invalid speed")?;
        check_num(model.heading_noise_sd, POSITIVE)
            .context("invalid heading noise standard deviation")?;
        step_count(model.t_max, model.dt).context("invalid duration")?;

        let init = &self.init;
        check_num(init.position[0], FINITE).context("invalid initial x coordinate")?;
        check_num(init.position[1], FINITE).context("invalid initial y coordinate")?;
        check_num(init.heading, FINITE).context("invalid initial heading")?;
        if !Arena::new(model.side_length)?.contains(init.position) {
            bail!("initial position {:?} must lie inside the arena", init.position);
        }

        check_num(self.output.hist_bins, 1..=1024).context("invalid number of histogram bins")?;

        Ok(())
    }
}
