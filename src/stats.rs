use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Online mean, variance and range of a stream of values (Welford).
#[derive(Debug, Clone)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;

        self.min = self.min.min(val);
        self.max = self.max.max(val);
    }

    pub fn report(&self) -> AccumulatorReport {
        let empty = self.n_vals == 0;
        AccumulatorReport {
            count: self.n_vals,
            mean: if empty { f64::NAN } else { self.mean },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
            min: if empty { f64::NAN } else { self.min },
            max: if empty { f64::NAN } else { self.max },
        }
    }
}

/// Population-style series, which may stop early when a run ends.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    vals: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    pub len: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub last: f64,
    /// Number of local maxima, i.e. completed oscillation cycles.
    pub n_peaks: usize,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    pub fn report(&self) -> TimeSeriesReport {
        let mut acc = Accumulator::new();
        self.vals.iter().for_each(|&val| acc.add(val));
        let summary = acc.report();

        TimeSeriesReport {
            len: self.vals.len(),
            mean: summary.mean,
            std_dev: summary.std_dev,
            min: summary.min,
            max: summary.max,
            last: self.vals.last().copied().unwrap_or(f64::NAN),
            n_peaks: count_peaks(&self.vals),
        }
    }
}

/// Count strict local maxima, treating a flat top as a single peak.
fn count_peaks(vals: &[f64]) -> usize {
    let mut steps = vals
        .windows(2)
        .map(|pair| pair[1].partial_cmp(&pair[0]))
        .filter(|ord| *ord != Some(Ordering::Equal));

    let mut n_peaks = 0;
    let mut prev = steps.next();
    for ord in steps {
        if prev == Some(Some(Ordering::Greater)) && ord == Some(Ordering::Less) {
            n_peaks += 1;
        }
        prev = Some(ord);
    }
    n_peaks
}
