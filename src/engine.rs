use crate::config::{Config, MobilityParams, ModelParams};
use crate::grid::SpatialIndex;
use crate::model::{Agent, AgentView, Decision, State};
use crate::motion;
use crate::stats::{Frame, StateCounts, reproduction_number};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Gamma, Normal, Uniform};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Number of agents seeded directly into the infectious compartment.
const N_PATIENT_ZERO: usize = 1;

/// Read-only snapshot of all rate, period and mobility parameters taken at
/// step entry.
///
/// The caller may overwrite the live [`Config`] between steps; snapshotting
/// here keeps one step from seeing two different values of the same
/// parameter. Every fallible distribution is built up front, before any
/// agent is touched, so a step either runs to completion or aborts without
/// committing anything.
struct StepParams {
    dt: f64,
    grid_size: f64,
    beta: f64,
    radius: f64,
    radius_sq: f64,
    vax_prob: f64,
    infectious_mean: f64,
    home_attraction: f64,
    random_force: f64,
    incubation_period: Normal<f64>,
    infectious_period: Normal<f64>,
    mortality: Bernoulli,
    detection: Bernoulli,
    compliance: Bernoulli,
}

impl StepParams {
    fn snapshot(cfg: &Config) -> Result<Self> {
        let model = &cfg.model;
        Ok(Self {
            dt: model.dt,
            grid_size: cfg.init.grid_size,
            beta: model.beta,
            radius: model.interaction_radius,
            radius_sq: model.interaction_radius * model.interaction_radius,
            vax_prob: model.vax_rate * model.dt,
            infectious_mean: model.infectious_mean,
            home_attraction: cfg.mobility.home_attraction,
            random_force: cfg.mobility.random_force,
            incubation_period: Normal::new(model.incubation_mean, model.incubation_std)?,
            infectious_period: Normal::new(model.infectious_mean, model.infectious_std)?,
            mortality: Bernoulli::new(model.mortality_rate)?,
            detection: Bernoulli::new(model.detection_prob)?,
            compliance: Bernoulli::new(model.isolation_compliance)?,
        })
    }
}

/// Simulation engine.
///
/// Holds the configuration, agent population, per-step history and random
/// number generator, and provides methods to initialize, step, run, save,
/// and load simulations. One step is Motion -> Index -> Decide -> Commit ->
/// Stats; callers only ever observe pre-step or post-step state.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    agt_vec: Vec<Agent>,
    counts_history: Vec<StateCounts>,
    rt_history: Vec<f64>,
    n_steps: usize,
    rng: ChaCha12Rng,

    #[serde(skip)]
    grid: SpatialIndex,
    #[serde(skip)]
    decisions: Vec<Decision>,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a random
    /// initial population.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let rng = ChaCha12Rng::try_from_os_rng()?;
        Self::with_rng(cfg, rng)
    }

    /// Create a new `Engine` with a fixed seed, for reproducible runs.
    pub fn from_seed(cfg: Config, seed: u64) -> Result<Self> {
        Self::with_rng(cfg, ChaCha12Rng::seed_from_u64(seed))
    }

    fn with_rng(cfg: Config, mut rng: ChaCha12Rng) -> Result<Self> {
        cfg.validate().context("failed to validate config")?;

        let pos_dist = Uniform::new(0.0, cfg.init.grid_size)?;
        let vel_dist = Uniform::new(-1.0, 1.0)?;
        let infectiousness_dist = Gamma::new(2.0, 0.5)?;
        let susceptibility_dist = Uniform::new(0.5, 1.5)?;
        let infectious_period =
            Normal::new(cfg.model.infectious_mean, cfg.model.infectious_std)?;

        let mut agt_vec = Vec::with_capacity(cfg.init.n_agt);
        for i_agt in 0..cfg.init.n_agt {
            let x = pos_dist.sample(&mut rng);
            let y = pos_dist.sample(&mut rng);

            let (state, state_timer) = if i_agt < N_PATIENT_ZERO {
                let timer: f64 = infectious_period.sample(&mut rng);
                (State::Infectious, timer.max(0.0))
            } else {
                (State::Susceptible, 0.0)
            };

            agt_vec.push(Agent {
                id: i_agt,
                x,
                y,
                vx: vel_dist.sample(&mut rng),
                vy: vel_dist.sample(&mut rng),
                home_x: x,
                home_y: y,
                infectiousness: infectiousness_dist.sample(&mut rng),
                susceptibility: susceptibility_dist.sample(&mut rng),
                state,
                state_timer,
                days_in_state: 0.0,
                is_isolated: false,
            });
        }

        // Step-0 snapshot, recorded before any step runs. No agent was
        // infected within the run yet, so the Rt entry is zero.
        let counts_history = vec![StateCounts::tally(&agt_vec)];
        let rt_history = vec![0.0];

        Ok(Self {
            cfg,
            agt_vec,
            counts_history,
            rt_history,
            n_steps: 0,
            rng,
            grid: SpatialIndex::new(),
            decisions: Vec::new(),
        })
    }

    /// Advance the simulation by exactly one `dt`-sized tick.
    ///
    /// All parameters are snapshotted (and all distributions built) at entry,
    /// so a failure aborts before any agent has been modified.
    pub fn step(&mut self) -> Result<()> {
        let par = StepParams::snapshot(&self.cfg).context("failed to snapshot parameters")?;

        for agt in &mut self.agt_vec {
            motion::advance(
                agt,
                par.grid_size,
                par.dt,
                par.home_attraction,
                par.random_force,
                &mut self.rng,
            );
        }

        self.grid.rebuild(&self.agt_vec, par.radius);

        let (new_infections, infectious) = self.decide(&par);
        self.commit(par.dt);

        self.n_steps += 1;
        self.record_stats(new_infections, infectious, par.dt, par.infectious_mean);

        Ok(())
    }

    /// Phase A: produce one [`Decision`] per agent.
    ///
    /// Reads only the states committed before this step, so no agent's
    /// decision can observe another agent's decision from the same step.
    /// Returns the step-scoped new-infection and currently-infectious
    /// counters.
    fn decide(&mut self, par: &StepParams) -> (usize, usize) {
        let mut new_infections = 0;
        let mut infectious = 0;

        self.decisions.clear();
        self.decisions.reserve(self.agt_vec.len());

        for agt in &self.agt_vec {
            let mut dec = Decision::keep(agt);

            match agt.state {
                State::Deceased | State::Recovered => {}
                State::Susceptible => {
                    if self.rng.random::<f64>() < par.vax_prob {
                        // Vaccination bypasses E and I.
                        dec.state = State::Recovered;
                    } else {
                        'scan: for cell in self.grid.moore_cells(agt.x, agt.y) {
                            for &i_ngb in cell {
                                let ngb = &self.agt_vec[i_ngb];
                                if ngb.state != State::Infectious || ngb.is_isolated {
                                    continue;
                                }
                                let dist_sq =
                                    (agt.x - ngb.x).powi(2) + (agt.y - ngb.y).powi(2);
                                if dist_sq > par.radius_sq {
                                    continue;
                                }

                                // Rate product, may exceed 1.
                                let prob =
                                    par.beta * ngb.infectiousness * agt.susceptibility * par.dt;
                                if self.rng.random::<f64>() < prob {
                                    dec.state = State::Exposed;
                                    let timer: f64 =
                                        par.incubation_period.sample(&mut self.rng);
                                    dec.timer = timer.max(0.0);
                                    new_infections += 1;
                                    // First qualifying neighbor wins.
                                    break 'scan;
                                }
                            }
                        }
                    }
                }
                State::Exposed => {
                    dec.timer -= par.dt;
                    if dec.timer <= 0.0 {
                        dec.state = State::Infectious;
                        let timer: f64 = par.infectious_period.sample(&mut self.rng);
                        dec.timer = timer.max(0.0);

                        if par.detection.sample(&mut self.rng)
                            && par.compliance.sample(&mut self.rng)
                        {
                            dec.is_isolated = true;
                        }
                    }
                }
                State::Infectious => {
                    infectious += 1;
                    dec.timer -= par.dt;
                    if dec.timer <= 0.0 {
                        dec.state = if par.mortality.sample(&mut self.rng) {
                            State::Deceased
                        } else {
                            State::Recovered
                        };
                        dec.is_isolated = false;
                    }
                }
            }

            self.decisions.push(dec);
        }

        (new_infections, infectious)
    }

    /// Phase B: apply every decision uniformly.
    fn commit(&mut self, dt: f64) {
        for (agt, dec) in self.agt_vec.iter_mut().zip(&self.decisions) {
            if agt.state != dec.state {
                agt.state = dec.state;
                agt.state_timer = dec.timer;
                agt.days_in_state = 0.0;
            } else {
                agt.state_timer = dec.timer;
                agt.days_in_state += dt;
            }
            agt.is_isolated = dec.is_isolated;
        }
    }

    fn record_stats(
        &mut self,
        new_infections: usize,
        infectious: usize,
        dt: f64,
        infectious_mean: f64,
    ) {
        self.counts_history.push(StateCounts::tally(&self.agt_vec));
        self.rt_history.push(reproduction_number(
            new_infections,
            infectious,
            dt,
            infectious_mean,
        ));
    }

    /// Replace the rate/period and mobility parameters on a live engine.
    ///
    /// Validated eagerly; picked up at the next step's entry. Structural
    /// parameters (population size, grid extent) require constructing a new
    /// engine instead.
    pub fn update_parameters(
        &mut self,
        model: ModelParams,
        mobility: MobilityParams,
    ) -> Result<()> {
        model.validate().context("invalid model parameters")?;
        mobility.validate().context("invalid mobility parameters")?;
        self.cfg.model = model;
        self.cfg.mobility = mobility;
        Ok(())
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// Number of steps performed since construction.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Per-agent view for rendering.
    pub fn agent_views(&self) -> Vec<AgentView> {
        self.agt_vec.iter().map(AgentView::from).collect()
    }

    /// Per-state counts at the current step boundary.
    pub fn current_counts(&self) -> StateCounts {
        StateCounts::tally(&self.agt_vec)
    }

    /// Full per-state count time series, one entry per step plus the
    /// initial snapshot.
    pub fn counts_history(&self) -> &[StateCounts] {
        &self.counts_history
    }

    /// Full reproduction-number history, parallel to the count series.
    pub fn rt_history(&self) -> &[f64] {
        &self.rt_history
    }

    /// Perform the simulation and save the resulting frames to a binary file.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        for i_save in 0..self.cfg.output.saves_per_file {
            for _ in 0..self.cfg.output.steps_per_save {
                self.step().context("failed to perform step")?;
            }

            let frame = Frame {
                step: self.n_steps,
                counts: self.current_counts(),
                rt: self.rt_history.last().copied().unwrap_or(0.0),
            };
            encode::write(&mut writer, &frame).context("failed to serialize frame")?;

            let progress = 100.0 * (i_save + 1) as f64 / self.cfg.output.saves_per_file as f64;
            log::info!("completed {progress:06.2}%");
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }
}
