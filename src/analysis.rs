use crate::arena::Arena;
use crate::config::Config;
use crate::engine::{Record, Status};
use crate::stats::{Accumulator, TimeSeries};
use crate::utils::wrap_angle;
use anyhow::{Context, Result};
use rmp_serde::encode;
use serde::Serialize;
use serde_value::Value;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Observable computed from a stored trajectory.
pub trait Obs {
    fn name(&self) -> &'static str;
    fn update(&mut self, record: &Record) -> Result<()>;
    fn report(&self) -> Result<Value>;
}

fn to_value<T: Serialize>(report: T) -> Result<Value> {
    serde_value::to_value(report).context("failed to convert report to value")
}

#[derive(Serialize)]
struct SummaryReport {
    step_count: usize,
    n_samples: usize,
    truncated: bool,
    trapped_step: Option<usize>,
}

/// Length and terminal state of the walk.
pub struct Summary {
    report: Option<SummaryReport>,
}

impl Summary {
    pub fn new() -> Self {
        Self { report: None }
    }
}

impl Obs for Summary {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn update(&mut self, record: &Record) -> Result<()> {
        let trajectory = &record.trajectory;
        let trapped_step = match trajectory.status {
            Status::Complete => None,
            Status::Trapped { step } => Some(step),
        };
        self.report = Some(SummaryReport {
            step_count: trajectory.step_count,
            n_samples: trajectory.samples.len(),
            truncated: trajectory.is_truncated(),
            trapped_step,
        });
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        to_value(&self.report)
    }
}

/// Heading change between consecutive samples, wrapped into `(-pi, pi]`.
pub struct TurnAngle {
    acc: Accumulator,
}

impl TurnAngle {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for TurnAngle {
    fn name(&self) -> &'static str {
        "turn_angle"
    }

    fn update(&mut self, record: &Record) -> Result<()> {
        let headings = record.trajectory.headings();
        for (prev, next) in headings.clone().zip(headings.skip(1)) {
            self.acc.add(wrap_angle(next - prev));
        }
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        to_value(self.acc.report())
    }
}

/// Distance from the agent to the nearest wall along the walk.
pub struct WallDist {
    arena: Arena,
    time_series: TimeSeries,
}

impl WallDist {
    pub fn new(arena: Arena) -> Self {
        Self {
            arena,
            time_series: TimeSeries::new(),
        }
    }
}

impl Obs for WallDist {
    fn name(&self) -> &'static str {
        "wall_dist"
    }

    fn update(&mut self, record: &Record) -> Result<()> {
        for pos in record.trajectory.positions() {
            self.time_series.push(self.arena.wall_distance(pos));
        }
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        to_value(self.time_series.report())
    }
}

/// Fraction of samples in each cell of a square grid over the arena.
///
/// Rows run along y and columns along x, both from the negative bound.
pub struct Occupancy {
    arena: Arena,
    n_bins: usize,
    counts: Vec<Vec<usize>>,
    n_samples: usize,
}

impl Occupancy {
    pub fn new(arena: Arena, n_bins: usize) -> Self {
        Self {
            arena,
            n_bins,
            counts: vec![vec![0; n_bins]; n_bins],
            n_samples: 0,
        }
    }

    fn bin(&self, coord: f64) -> usize {
        let frac = (coord + self.arena.half_side()) / self.arena.side_length();
        // Points on the upper bound belong to the last bin.
        ((frac * self.n_bins as f64).floor() as usize).min(self.n_bins - 1)
    }
}

impl Obs for Occupancy {
    fn name(&self) -> &'static str {
        "occupancy"
    }

    fn update(&mut self, record: &Record) -> Result<()> {
        for [x, y] in record.trajectory.positions() {
            let (i_row, i_col) = (self.bin(y), self.bin(x));
            self.counts[i_row][i_col] += 1;
            self.n_samples += 1;
        }
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        let total = self.n_samples.max(1) as f64;
        let fracs: Vec<Vec<f64>> = self
            .counts
            .iter()
            .map(|row| row.iter().map(|&count| count as f64 / total).collect())
            .collect();
        to_value(fracs)
    }
}

/// Collects observables of a single run and writes their reports.
pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: &Config) -> Result<Self> {
        let arena = Arena::new(cfg.model.side_length).context("failed to construct arena")?;
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(Summary::new()),
            Box::new(TurnAngle::new()),
            Box::new(WallDist::new(arena)),
            Box::new(Occupancy::new(arena, cfg.output.hist_bins)),
        ];
        Ok(Self { obs_ptr_vec })
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let record = Record::load(file).context("failed to load record")?;
        self.add_record(&record)
    }

    pub fn add_record(&mut self, record: &Record) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(record)
                .with_context(|| format!("failed to update {}", obs.name()))?;
        }
        Ok(())
    }

    pub fn reports(&self) -> Result<BTreeMap<&'static str, Value>> {
        self.obs_ptr_vec
            .iter()
            .map(|obs| obs.report().map(|value| (obs.name(), value)))
            .collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let reports = self.reports()?;

        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write_named(&mut writer, &reports).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Trajectory;
    use crate::model::Sample;

    fn record(samples: Vec<Sample>, status: Status) -> Record {
        Record {
            seed: 0,
            stream: 0,
            trajectory: Trajectory {
                step_count: 4,
                samples,
                status,
            },
        }
    }

    fn value_f64(value: &Value) -> f64 {
        match value {
            Value::F64(val) => *val,
            other => panic!("expected f64, found {other:?}"),
        }
    }

    fn field<'a>(value: &'a Value, key: &str) -> &'a Value {
        match value {
            Value::Map(map) => &map[&Value::String(key.to_string())],
            other => panic!("expected map, found {other:?}"),
        }
    }

    #[test]
    fn turn_angle_wraps_heading_changes() {
        use std::f64::consts::PI;
        let samples = vec![
            Sample::new([0.0, 0.0], 0.0),
            Sample::new([0.0, 0.0], 2.0 * PI + 0.1),
            Sample::new([0.0, 0.0], 2.0 * PI + 0.3),
        ];
        let mut obs = TurnAngle::new();
        obs.update(&record(samples, Status::Complete)).unwrap();
        let report = obs.report().unwrap();
        assert!((value_f64(field(&report, "mean")) - 0.15).abs() < 1e-9);
    }

    #[test]
    fn occupancy_bins_cover_bounds() {
        let arena = Arena::new(2.0).unwrap();
        let samples = vec![
            Sample::new([-1.0, -1.0], 0.0),
            Sample::new([1.0, 1.0], 0.0),
            Sample::new([0.1, -0.9], 0.0),
            Sample::new([0.9, -0.1], 0.0),
        ];
        let mut obs = Occupancy::new(arena, 2);
        obs.update(&record(samples, Status::Complete)).unwrap();
        assert_eq!(obs.counts, vec![vec![1, 2], vec![0, 1]]);
    }

    #[test]
    fn summary_reports_trapped_step() {
        let samples = vec![Sample::new([0.0, 0.0], 0.0)];
        let mut obs = Summary::new();
        obs.update(&record(samples, Status::Trapped { step: 1 }))
            .unwrap();
        let report = obs.report().unwrap();
        let report = match report {
            Value::Option(Some(inner)) => *inner,
            other => other,
        };
        assert_eq!(
            field(&report, "trapped_step"),
            &Value::Option(Some(Box::new(Value::U64(1))))
        );
        assert_eq!(field(&report, "n_samples"), &Value::U64(1));
        assert_eq!(field(&report, "truncated"), &Value::Bool(true));
    }

    #[test]
    fn analyzer_reports_every_observable() {
        let cfg: Config = toml::from_str(
            r#"
[model]
side_length = 2.0
speed = 1.0
heading_noise_sd = 0.1
t_max = 4.0
dt = 1.0

[init]
position = [0.0, 0.0]
heading = 0.0

[output]
hist_bins = 4
"#,
        )
        .unwrap();
        let samples = vec![
            Sample::new([0.0, 0.0], 0.0),
            Sample::new([1.0, 0.0], 0.0),
        ];
        let mut analyzer = Analyzer::new(&cfg).unwrap();
        analyzer
            .add_record(&record(samples, Status::Trapped { step: 2 }))
            .unwrap();
        let reports = analyzer.reports().unwrap();
        let names: Vec<_> = reports.keys().copied().collect();
        assert_eq!(names, ["occupancy", "summary", "turn_angle", "wall_dist"]);
    }
}
