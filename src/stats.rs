//! Aggregate counts, the reproduction-number proxy and running statistics.

use crate::model::{Agent, State};
use serde::{Deserialize, Serialize};

/// Number of agents per compartment at one step boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub s: usize,
    pub e: usize,
    pub i: usize,
    pub r: usize,
    pub d: usize,
}

impl StateCounts {
    /// Count agents per compartment.
    pub fn tally(agt_vec: &[Agent]) -> Self {
        let mut counts = [0usize; 5];
        for agt in agt_vec {
            counts[agt.state.index()] += 1;
        }
        Self {
            s: counts[0],
            e: counts[1],
            i: counts[2],
            r: counts[3],
            d: counts[4],
        }
    }

    pub fn total(&self) -> usize {
        self.s + self.e + self.i + self.r + self.d
    }

    pub fn get(&self, state: State) -> usize {
        match state {
            State::Susceptible => self.s,
            State::Exposed => self.e,
            State::Infectious => self.i,
            State::Recovered => self.r,
            State::Deceased => self.d,
        }
    }
}

/// Instantaneous reproduction-number proxy.
///
/// `(new_infections / dt) / infectious * infectious_mean`, and exactly zero
/// when no agent is infectious. Deliberately coarse: it is sensitive to `dt`
/// and to live changes of `infectious_mean`, and is kept in this exact form
/// for compatibility with downstream consumers.
pub fn reproduction_number(
    new_infections: usize,
    infectious: usize,
    dt: f64,
    infectious_mean: f64,
) -> f64 {
    if infectious > 0 {
        (new_infections as f64 / dt) / infectious as f64 * infectious_mean
    } else {
        0.0
    }
}

/// Per-step stats record written to trajectory files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub step: usize,
    pub counts: StateCounts,
    pub rt: f64,
}

/// Online mean and standard deviation (Welford).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
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
        AccumulatorReport {
            mean: self.mean,
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rt_is_zero_without_infectious_agents() {
        assert_eq!(reproduction_number(3, 0, 0.5, 7.0), 0.0);
    }

    #[test]
    fn rt_matches_reference_formula() {
        // 4 new infections, 2 infectious, dt 0.5, mean period 7:
        // (4 / 0.5) / 2 * 7 = 28.
        let rt = reproduction_number(4, 2, 0.5, 7.0);
        assert!((rt - 28.0).abs() < 1e-12);
    }

    #[test]
    fn accumulator_matches_direct_computation() {
        let vals = [1.0, 2.0, 3.0, 4.0];
        let mut acc = Accumulator::new();
        for &val in &vals {
            acc.add(val);
        }
        let report = acc.report();
        assert!((report.mean - 2.5).abs() < 1e-12);
        // Sample variance of 1..4 is 5/3.
        assert!((report.std_dev - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn accumulator_std_dev_needs_two_values() {
        let mut acc = Accumulator::new();
        acc.add(1.0);
        assert!(acc.report().std_dev.is_nan());
    }
}
