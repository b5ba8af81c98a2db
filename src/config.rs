use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Disease and intervention parameters.
///
/// Every field may be overwritten between steps through
/// [`Engine::update_parameters`](crate::engine::Engine::update_parameters);
/// the engine snapshots them at step entry.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    /// Transmission rate per contact (scaled by heterogeneity and `dt`).
    pub beta: f64,

    /// Mean of the incubation period distribution.
    pub incubation_mean: f64,
    /// Standard deviation of the incubation period distribution.
    pub incubation_std: f64,
    /// Mean of the infectious period distribution.
    pub infectious_mean: f64,
    /// Standard deviation of the infectious period distribution.
    pub infectious_std: f64,

    /// Probability of death at the end of the infectious period.
    pub mortality_rate: f64,
    /// Vaccination rate per unit time (S -> R, bypassing E and I).
    pub vax_rate: f64,

    /// Probability of detecting an agent that turns infectious.
    pub detection_prob: f64,
    /// Probability that a detected agent complies with isolation.
    pub isolation_compliance: f64,

    /// Contact radius for transmission.
    pub interaction_radius: f64,
    /// Time step size.
    pub dt: f64,
}

/// Mobility parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MobilityParams {
    /// Strength of the pull towards the home position.
    pub home_attraction: f64,
    /// Intensity of the per-axis random walk.
    pub random_force: f64,
}

/// Structural parameters fixed at construction.
///
/// Changing these requires discarding the engine and constructing a new one,
/// since they determine the initial agent set.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitParams {
    /// Number of agents.
    pub n_agt: usize,
    /// Side length of the square world, positions live in `[0, grid_size]`.
    pub grid_size: f64,
}

/// Output cadence for batch runs.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputParams {
    /// Number of steps between trajectory saves.
    pub steps_per_save: usize,
    /// Number of saves written per trajectory file.
    pub saves_per_file: usize,
}

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelParams,
    pub mobility: MobilityParams,
    pub init: InitParams,
    pub output: OutputParams,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            beta: 1.0,
            incubation_mean: 5.0,
            incubation_std: 2.0,
            infectious_mean: 7.0,
            infectious_std: 3.0,
            mortality_rate: 0.02,
            vax_rate: 0.0,
            detection_prob: 0.0,
            isolation_compliance: 0.0,
            interaction_radius: 2.0,
            dt: 0.5,
        }
    }
}

impl Default for MobilityParams {
    fn default() -> Self {
        Self {
            home_attraction: 0.05,
            random_force: 1.0,
        }
    }
}

impl Default for InitParams {
    fn default() -> Self {
        Self {
            n_agt: 200,
            grid_size: 100.0,
        }
    }
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            steps_per_save: 1,
            saves_per_file: 64,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelParams::default(),
            mobility: MobilityParams::default(),
            init: InitParams::default(),
            output: OutputParams::default(),
        }
    }
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

        let config: Config =
            toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Validate all parameters eagerly.
    ///
    /// Called at construction and again whenever parameters are replaced on a
    /// live engine, so stepping never encounters an invalid value.
    pub fn validate(&self) -> Result<()> {
        self.model.validate().context("invalid model parameters")?;
        self.mobility
            .validate()
            .context("invalid mobility parameters")?;

        check_num(self.init.n_agt, 1..1_000_000).context("invalid number of agents")?;
        check_pos(self.init.grid_size).context("invalid grid size")?;

        check_num(self.output.steps_per_save, 1..10_000)
            .context("invalid number of steps per save")?;
        check_num(self.output.saves_per_file, 1..10_000)
            .context("invalid number of saves per file")?;

        Ok(())
    }
}

impl ModelParams {
    pub fn validate(&self) -> Result<()> {
        check_non_neg(self.beta).context("invalid transmission rate")?;

        check_pos(self.incubation_mean).context("invalid incubation period mean")?;
        check_non_neg(self.incubation_std).context("invalid incubation period std")?;
        check_pos(self.infectious_mean).context("invalid infectious period mean")?;
        check_non_neg(self.infectious_std).context("invalid infectious period std")?;

        check_prob(self.mortality_rate).context("invalid mortality rate")?;
        check_prob(self.vax_rate).context("invalid vaccination rate")?;
        check_prob(self.detection_prob).context("invalid detection probability")?;
        check_prob(self.isolation_compliance).context("invalid isolation compliance")?;

        check_pos(self.interaction_radius).context("invalid interaction radius")?;
        check_pos(self.dt).context("invalid step size")?;

        Ok(())
    }
}

impl MobilityParams {
    pub fn validate(&self) -> Result<()> {
        check_non_neg(self.home_attraction).context("invalid home attraction")?;
        check_non_neg(self.random_force).context("invalid random force")?;
        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_prob(num: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&num) {
        bail!("probability must be in the range [0.0, 1.0], but is {num}");
    }
    Ok(())
}

fn check_pos(num: f64) -> Result<()> {
    if !(num > 0.0) {
        bail!("number must be positive, but is {num}");
    }
    Ok(())
}

fn check_non_neg(num: f64) -> Result<()> {
    if !(num >= 0.0) {
        bail!("number must be non-negative, but is {num}");
    }
    Ok(())
}
