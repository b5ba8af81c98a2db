//! Simulation data types.

use serde::{Deserialize, Serialize};

/// Disease compartment of an agent.
///
/// `Recovered` and `Deceased` are absorbing: once entered, an agent never
/// leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    #[serde(rename = "S")]
    Susceptible,
    #[serde(rename = "E")]
    Exposed,
    #[serde(rename = "I")]
    Infectious,
    #[serde(rename = "R")]
    Recovered,
    #[serde(rename = "D")]
    Deceased,
}

impl State {
    /// Index of the compartment in count arrays, in S, E, I, R, D order.
    pub fn index(self) -> usize {
        match self {
            State::Susceptible => 0,
            State::Exposed => 1,
            State::Infectious => 2,
            State::Recovered => 3,
            State::Deceased => 4,
        }
    }
}

/// Agent of the simulation.
///
/// Position and velocity evolve under the mobility model; `home_x`/`home_y`
/// and the two heterogeneity scalars are sampled once at creation and never
/// change. `state_timer` is the remaining sojourn time, meaningful only in
/// the `Exposed` and `Infectious` compartments.
#[derive(Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,

    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,

    pub home_x: f64,
    pub home_y: f64,

    pub infectiousness: f64,
    pub susceptibility: f64,

    pub state: State,
    pub state_timer: f64,
    pub days_in_state: f64,
    pub is_isolated: bool,
}

/// Outcome of Phase A for a single agent.
///
/// Computed for every agent from the pre-step committed states only, then
/// applied uniformly in Phase B. Keeping it separate from [`Agent`] is what
/// keeps one agent's decision from leaking into another's within a step.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub state: State,
    pub timer: f64,
    pub is_isolated: bool,
}

impl Decision {
    /// The no-op decision: keep the committed state, timer and flag as-is.
    pub fn keep(agt: &Agent) -> Self {
        Self {
            state: agt.state,
            timer: agt.state_timer,
            is_isolated: agt.is_isolated,
        }
    }
}

/// Read-only per-agent view handed to external callers for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct AgentView {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub state: State,
    pub days_in_state: f64,
    pub is_isolated: bool,
}

impl From<&Agent> for AgentView {
    fn from(agt: &Agent) -> Self {
        Self {
            id: agt.id,
            x: agt.x,
            y: agt.y,
            state: agt.state,
            days_in_state: agt.days_in_state,
            is_isolated: agt.is_isolated,
        }
    }
}
