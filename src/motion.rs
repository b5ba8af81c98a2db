//! Mobility model: home attraction, random walk, damping and reflecting
//! boundaries.

use crate::model::{Agent, State};
use rand::Rng;

/// Fixed per-step velocity damping factor. Applied every step regardless of
/// the forces, which bounds speed growth structurally.
const DAMPING: f64 = 0.95;

/// Advance one agent's kinematic state by one step of size `dt`.
///
/// Deceased and isolated agents are skipped entirely: their position and
/// velocity stay frozen.
pub fn advance<R: Rng>(
    agt: &mut Agent,
    grid_size: f64,
    dt: f64,
    home_attraction: f64,
    random_force: f64,
    rng: &mut R,
) {
    if agt.state == State::Deceased || agt.is_isolated {
        return;
    }

    // Attraction to home.
    agt.vx += (agt.home_x - agt.x) * home_attraction * dt;
    agt.vy += (agt.home_y - agt.y) * home_attraction * dt;

    // Random walk, independent per axis.
    agt.vx += rng.random_range(-1.0..1.0) * random_force * dt;
    agt.vy += rng.random_range(-1.0..1.0) * random_force * dt;

    agt.vx *= DAMPING;
    agt.vy *= DAMPING;

    agt.x += agt.vx * dt;
    agt.y += agt.vy * dt;

    reflect_axis(&mut agt.x, &mut agt.vx, grid_size);
    reflect_axis(&mut agt.y, &mut agt.vy, grid_size);
}

/// Reflect a coordinate back into `[0, bound]`.
///
/// The position is mirrored across the violated boundary and the velocity
/// component's sign is flipped; coordinates inside the interval are left
/// untouched.
pub fn reflect_axis(pos: &mut f64, vel: &mut f64, bound: f64) {
    if *pos < 0.0 {
        *pos = -*pos;
        *vel = -*vel;
    } else if *pos > bound {
        *pos = 2.0 * bound - *pos;
        *vel = -*vel;
    }
}
