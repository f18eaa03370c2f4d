use serde::{Deserialize, Serialize};

/// Online mean and standard deviation (Welford's algorithm).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;
        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;
        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        let (mean, std_dev) = match self.n_vals {
            0 => (f64::NAN, f64::NAN),
            1 => (self.mean, f64::NAN),
            n_vals => (self.mean, (self.diff_2_sum / (n_vals - 1) as f64).sqrt()),
        };
        AccumulatorReport {
            n_vals: self.n_vals,
            mean,
            std_dev,
        }
    }
}

/// Correlated series of values, such as a quantity sampled along a walk.
pub struct TimeSeries {
    vals: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
    pub is_equil: bool,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self { vals: Vec::new() }
    }

    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    /// Summarize the series after discarding the initial transient.
    pub fn report(&self) -> TimeSeriesReport {
        let n_vals = self.vals.len();
        let i_equil = equilibration_index(&self.vals);
        let equil_vals = &self.vals[i_equil..];
        TimeSeriesReport {
            mean: mean(equil_vals),
            std_dev: variance(equil_vals).sqrt(),
            sem: blocking_sem(equil_vals),
            is_equil: n_vals > 0 && i_equil != n_vals / 2,
        }
    }
}

fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

fn variance(vals: &[f64]) -> f64 {
    if vals.len() < 2 {
        return f64::NAN;
    }
    let mean = mean(vals);
    let diff_2_sum: f64 = vals.iter().map(|&val| (val - mean).powi(2)).sum();
    diff_2_sum / (vals.len() - 1) as f64
}

/// Standard error of the mean by the Flyvbjerg-Petersen blocking method.
///
/// The series is repeatedly halved by averaging neighbouring pairs; the
/// first block size whose squared SEM estimate exceeds every later estimate
/// minus its error is taken as the plateau.
fn blocking_sem(vals: &[f64]) -> f64 {
    let mut blocks = vals.to_vec();
    let mut ests = Vec::new();
    let mut errs = Vec::new();

    while blocks.len() >= 2 {
        let n_blocks = blocks.len() as f64;
        let est = variance(&blocks) / n_blocks;
        ests.push(est);
        errs.push(est * (2.0 / (n_blocks - 1.0)).sqrt());

        blocks = blocks
            .chunks_exact(2)
            .map(|pair| 0.5 * (pair[0] + pair[1]))
            .collect();
    }

    for idx in 0..ests.len() {
        let max_low = ests[idx..]
            .iter()
            .zip(&errs[idx..])
            .map(|(est, err)| est - err)
            .fold(f64::NEG_INFINITY, f64::max);
        if ests[idx] > max_low {
            return ests[idx].sqrt();
        }
    }

    ests.last().copied().unwrap_or(f64::NAN).sqrt()
}

/// Start of the equilibrated part of the series (marginal standard error rule).
///
/// Candidates are `n / 2^k`; when no candidate gives a finite error the
/// default `n / 2` is returned, which the report reads as "not equilibrated".
fn equilibration_index(vals: &[f64]) -> usize {
    let n_vals = vals.len();
    let default = n_vals / 2;
    if n_vals == 0 {
        return default;
    }

    let n_cands = n_vals.ilog2() + 1;
    let mut min_mse = f64::INFINITY;
    let mut opt_idx = default;
    for k in (1..=n_cands).rev() {
        let idx = n_vals >> k;
        let tail = &vals[idx..];
        let n_tail = tail.len();
        let mse = variance(tail) * (n_tail - 1) as f64 / n_tail.pow(2) as f64;
        if mse < min_mse {
            min_mse = mse;
            opt_idx = idx;
        }
    }
    opt_idx
}
