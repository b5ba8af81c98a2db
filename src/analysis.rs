use crate::config::Config;
use crate::stats::{Accumulator, Frame};
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

pub trait Obs {
    fn update(&mut self, frame: &Frame) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Compartment counts of the last frame seen.
pub struct FinalCounts {
    last: Option<Frame>,
}

impl FinalCounts {
    pub fn new() -> Self {
        Self { last: None }
    }
}

impl Obs for FinalCounts {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        self.last = Some(frame.clone());
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        match &self.last {
            Some(frame) => serde_json::json!({
                "final_counts": frame.counts,
                "final_step": frame.step,
            }),
            None => serde_json::json!({ "final_counts": null }),
        }
    }
}

/// Largest infectious count over the run and the step it occurred at.
pub struct PeakInfectious {
    peak: usize,
    peak_step: usize,
}

impl PeakInfectious {
    pub fn new() -> Self {
        Self {
            peak: 0,
            peak_step: 0,
        }
    }
}

impl Obs for PeakInfectious {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        if frame.counts.i > self.peak {
            self.peak = frame.counts.i;
            self.peak_step = frame.step;
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "peak_infectious": self.peak,
            "peak_step": self.peak_step,
        })
    }
}

/// Fraction of the population no longer susceptible at the last frame.
pub struct AttackRate {
    last: Option<Frame>,
}

impl AttackRate {
    pub fn new() -> Self {
        Self { last: None }
    }
}

impl Obs for AttackRate {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        self.last = Some(frame.clone());
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let rate = self.last.as_ref().map(|frame| {
            let total = frame.counts.total();
            if total > 0 {
                1.0 - frame.counts.s as f64 / total as f64
            } else {
                f64::NAN
            }
        });
        serde_json::json!({ "attack_rate": rate })
    }
}

/// Mean and spread of the recorded reproduction-number proxy.
pub struct RtSeries {
    acc: Accumulator,
}

impl RtSeries {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for RtSeries {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        self.acc.add(frame.rt);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "rt": self.acc.report() })
    }
}

pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        let mut obs_ptr_vec: Vec<Box<dyn Obs>> = Vec::new();
        obs_ptr_vec.push(Box::new(FinalCounts::new()));
        obs_ptr_vec.push(Box::new(PeakInfectious::new()));
        obs_ptr_vec.push(Box::new(AttackRate::new()));
        obs_ptr_vec.push(Box::new(RtSeries::new()));
        Self { cfg, obs_ptr_vec }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for _ in 0..self.cfg.output.saves_per_file {
            let frame: Frame = decode::from_read(&mut reader).context("failed to read frame")?;
            for obs in &mut self.obs_ptr_vec {
                obs.update(&frame).context("failed to update observable")?;
            }
        }
        Ok(())
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        serde_json::to_writer_pretty(writer, &reports)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StateCounts;

    fn frame(step: usize, s: usize, i: usize, rt: f64) -> Frame {
        Frame {
            step,
            counts: StateCounts {
                s,
                e: 0,
                i,
                r: 100 - s - i,
                d: 0,
            },
            rt,
        }
    }

    #[test]
    fn peak_tracks_maximum_and_step() {
        let mut obs = PeakInfectious::new();
        obs.update(&frame(1, 90, 5, 1.0)).unwrap();
        obs.update(&frame(2, 70, 25, 2.0)).unwrap();
        obs.update(&frame(3, 60, 10, 0.5)).unwrap();

        let report = obs.report();
        assert_eq!(report["peak_infectious"], 25);
        assert_eq!(report["peak_step"], 2);
    }

    #[test]
    fn attack_rate_uses_last_frame() {
        let mut obs = AttackRate::new();
        obs.update(&frame(1, 90, 5, 1.0)).unwrap();
        obs.update(&frame(2, 40, 20, 2.0)).unwrap();

        let report = obs.report();
        let rate = report["attack_rate"].as_f64().unwrap();
        assert!((rate - 0.6).abs() < 1e-12);
    }

    #[test]
    fn rt_series_reports_mean() {
        let mut obs = RtSeries::new();
        for rt in [1.0, 2.0, 3.0] {
            obs.update(&frame(0, 50, 10, rt)).unwrap();
        }

        let report = obs.report();
        let mean = report["rt"]["mean"].as_f64().unwrap();
        assert!((mean - 2.0).abs() < 1e-12);
    }
}
