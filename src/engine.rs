use crate::arena::Arena;
use crate::config::Config;
use crate::model::{Agent, Sample};
use crate::utils::{POSITIVE, check_num};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Normal;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    ops::Bound,
    path::Path,
};

/// Maximum number of headings tried per step before the walk is abandoned.
pub const MAX_ATTEMPTS: usize = 1000;

/// Factor applied to the heading noise after every rejected heading.
pub const NOISE_WIDENING: f64 = 1.05;

/// Upper limit on the number of samples of a single trajectory.
pub const MAX_STEP_COUNT: usize = 1 << 28;

/// Terminal state of a generated trajectory.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum Status {
    /// All requested samples were produced.
    Complete,
    /// No in-bounds heading was found for sample `step`, so only samples
    /// `0..step` were produced.
    Trapped { step: usize },
}

/// Discretized path of the agent.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    /// Number of samples requested (`floor(t_max / dt)`).
    pub step_count: usize,
    pub samples: Vec<Sample>,
    pub status: Status,
}

impl Trajectory {
    pub fn positions(&self) -> impl Iterator<Item = [f64; 2]> + '_ {
        self.samples.iter().map(Sample::position)
    }

    pub fn headings(&self) -> impl Iterator<Item = f64> + Clone + '_ {
        self.samples.iter().map(|smp| smp.heading)
    }

    pub fn is_truncated(&self) -> bool {
        self.samples.len() < self.step_count
    }
}

/// Generate a correlated random walk of `agent` inside `arena`.
///
/// Each new heading is drawn from a normal distribution centered on the
/// previous heading. Headings that would move the agent out of the arena are
/// rejected and the noise is widened by [`NOISE_WIDENING`] for the next try,
/// then reset to `heading_noise_sd` once a step is accepted. After
/// [`MAX_ATTEMPTS`] rejections in a row the walk stops and the returned
/// trajectory is marked [`Status::Trapped`].
///
/// The initial position must lie inside the arena, so that every recorded
/// sample is in bounds. A start outside the arena is rejected rather than
/// reported as a walk trapped at step 1.
///
/// # Errors
/// Returns an error if `heading_noise_sd` or `t_max` is not finite and
/// positive, if `dt` is not in `(0, t_max]`, if `floor(t_max / dt)` is not in
/// `1..=MAX_STEP_COUNT` (see [`step_count`]), or if the initial position of
/// the agent is outside the arena. Trapped walks are not errors.
pub fn generate<R: Rng + ?Sized>(
    agent: &Agent,
    arena: &Arena,
    heading_noise_sd: f64,
    t_max: f64,
    dt: f64,
    rng: &mut R,
) -> Result<Trajectory> {
    check_num(heading_noise_sd, POSITIVE).context("invalid heading noise standard deviation")?;
    let step_count = step_count(t_max, dt)?;

    let position = agent.position();
    if !arena.contains(position) {
        bail!("initial position {position:?} must lie inside the arena");
    }

    let step_len = agent.speed() * dt;

    let mut samples = Vec::with_capacity(step_count);
    samples.push(Sample::new(position, agent.heading()));
    let mut status = Status::Complete;

    for step in 1..step_count {
        let prev = samples[step - 1];
        match sample_step(&prev, arena, step_len, heading_noise_sd, rng)? {
            Some(smp) => samples.push(smp),
            None => {
                log::warn!("no valid heading found in {MAX_ATTEMPTS} attempts at step {step}");
                status = Status::Trapped { step };
                break;
            }
        }
    }

    Ok(Trajectory {
        step_count,
        samples,
        status,
    })
}

/// Number of samples of a walk lasting `t_max` with time step `dt`.
///
/// # Errors
/// Returns an error if `t_max` is not finite and positive, if `dt` is not in
/// `(0, t_max]`, or if the result exceeds [`MAX_STEP_COUNT`].
pub fn step_count(t_max: f64, dt: f64) -> Result<usize> {
    check_num(t_max, POSITIVE).context("invalid maximum time")?;
    check_num(dt, (Bound::Excluded(0.0), Bound::Included(t_max))).context("invalid time step")?;

    // Truncated, not rounded.
    let step_count = (t_max / dt).floor() as usize;
    check_num(step_count, 1..=MAX_STEP_COUNT).context("invalid number of steps")?;
    Ok(step_count)
}

fn sample_step<R: Rng + ?Sized>(
    prev: &Sample,
    arena: &Arena,
    step_len: f64,
    heading_noise_sd: f64,
    rng: &mut R,
) -> Result<Option<Sample>> {
    let mut std_dev = heading_noise_sd;
    for _ in 0..MAX_ATTEMPTS {
        // Widening a huge noise can overflow; no wider distribution is left to try.
        if !std_dev.is_finite() {
            break;
        }
        let heading = Normal::new(prev.heading, std_dev)?.sample(rng);
        let position = [
            prev.x + step_len * heading.cos(),
            prev.y + step_len * heading.sin(),
        ];
        if arena.contains(position) {
            return Ok(Some(Sample::new(position, heading)));
        }
        // Widen the heading distribution to escape corners.
        std_dev *= NOISE_WIDENING;
    }
    Ok(None)
}

/// Trajectory together with the generator state that produced it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Record {
    pub seed: u64,
    pub stream: u64,
    pub trajectory: Trajectory,
}

impl Record {
    /// Load a record previously written by [`Engine::run_simulation`].
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let record = decode::from_read(&mut reader).context("failed to deserialize record")?;
        Ok(record)
    }
}

/// Simulation engine.
///
/// Holds the configuration and a random number generator seeded from
/// `(seed, stream)`, so every run can be reproduced from its record.
pub struct Engine {
    cfg: Config,
    seed: u64,
    stream: u64,
    rng: ChaCha12Rng,
}

impl Engine {
    pub fn new(cfg: Config, seed: u64, stream: u64) -> Self {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        Self {
            cfg,
            seed,
            stream,
            rng,
        }
    }

    /// Generate a trajectory and save it to a binary file.
    pub fn run_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<Trajectory> {
        let model = &self.cfg.model;
        let init = &self.cfg.init;

        let arena = Arena::new(model.side_length).context("failed to construct arena")?;
        let agent = Agent::new(model.speed, init.position, init.heading)
            .context("failed to construct agent")?;

        let trajectory = generate(
            &agent,
            &arena,
            model.heading_noise_sd,
            model.t_max,
            model.dt,
            &mut self.rng,
        )
        .context("failed to generate trajectory")?;

        match trajectory.status {
            Status::Complete => log::info!("completed {} steps", trajectory.step_count),
            Status::Trapped { step } => log::warn!(
                "trajectory truncated at step {step} of {}",
                trajectory.step_count
            ),
        }

        let record = Record {
            seed: self.seed,
            stream: self.stream,
            trajectory,
        };

        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &record).context("failed to serialize record")?;
        writer.flush().context("failed to flush writer stream")?;

        Ok(record.trajectory)
    }
}
