//! Uniform-cell spatial index for bounded-cost neighbor queries.

use crate::model::{Agent, State};
use std::collections::HashMap;

/// Spatial index over live agents, rebuilt from scratch every step.
///
/// Agents are bucketed into square cells whose side length is
/// `max(interaction_radius, 1.0)`, so a query over a cell and its eight
/// neighbors (the Moore neighborhood) is guaranteed to cover every agent
/// within the interaction radius. Buckets are kept in an arena and reused
/// across rebuilds; only the cell map is rehashed each step.
pub struct SpatialIndex {
    cell_size: f64,
    cells: HashMap<(i32, i32), usize>,
    buckets: Vec<Vec<usize>>,
    n_used: usize,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            cell_size: 1.0,
            cells: HashMap::new(),
            buckets: Vec::new(),
            n_used: 0,
        }
    }

    /// Side length of the cells used by the last rebuild.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Rebuild the index from current agent positions.
    ///
    /// Deceased agents are excluded: they can neither transmit nor be
    /// contacted. Bucket contents preserve agent-vector order, which the
    /// transmission scan depends on.
    pub fn rebuild(&mut self, agt_vec: &[Agent], interaction_radius: f64) {
        self.cell_size = interaction_radius.max(1.0);

        self.cells.clear();
        for bucket in &mut self.buckets[..self.n_used] {
            bucket.clear();
        }
        self.n_used = 0;

        for (i_agt, agt) in agt_vec.iter().enumerate() {
            if agt.state == State::Deceased {
                continue;
            }

            let key = self.cell_of(agt.x, agt.y);
            let slot = match self.cells.get(&key) {
                Some(&slot) => slot,
                None => {
                    let slot = self.n_used;
                    if slot == self.buckets.len() {
                        self.buckets.push(Vec::new());
                    }
                    self.n_used += 1;
                    self.cells.insert(key, slot);
                    slot
                }
            };
            self.buckets[slot].push(i_agt);
        }
    }

    /// Agent indices bucketed in the cell and its eight neighbors.
    ///
    /// Cells are visited in a fixed order (x offset outer, y offset inner)
    /// and each bucket in insertion order.
    pub fn moore_cells(&self, x: f64, y: f64) -> impl Iterator<Item = &[usize]> + '_ {
        let (cx, cy) = self.cell_of(x, y);
        (-1..=1)
            .flat_map(move |dx| (-1..=1).map(move |dy| (cx + dx, cy + dy)))
            .filter_map(move |key| {
                self.cells
                    .get(&key)
                    .map(|&slot| self.buckets[slot].as_slice())
            })
    }

    fn cell_of(&self, x: f64, y: f64) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_at(id: usize, x: f64, y: f64, state: State) -> Agent {
        Agent {
            id,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            home_x: x,
            home_y: y,
            infectiousness: 1.0,
            susceptibility: 1.0,
            state,
            state_timer: 0.0,
            days_in_state: 0.0,
            is_isolated: false,
        }
    }

    fn collect_neighbors(grid: &SpatialIndex, x: f64, y: f64) -> Vec<usize> {
        grid.moore_cells(x, y).flatten().copied().collect()
    }

    #[test]
    fn cell_size_has_unit_floor() {
        let agt_vec = vec![agent_at(0, 0.5, 0.5, State::Susceptible)];
        let mut grid = SpatialIndex::new();
        grid.rebuild(&agt_vec, 0.25);
        assert_eq!(grid.cell_size(), 1.0);

        grid.rebuild(&agt_vec, 3.0);
        assert_eq!(grid.cell_size(), 3.0);
    }

    #[test]
    fn excludes_deceased_agents() {
        let agt_vec = vec![
            agent_at(0, 1.0, 1.0, State::Infectious),
            agent_at(1, 1.1, 1.1, State::Deceased),
        ];
        let mut grid = SpatialIndex::new();
        grid.rebuild(&agt_vec, 2.0);

        let found = collect_neighbors(&grid, 1.0, 1.0);
        assert_eq!(found, vec![0]);
    }

    #[test]
    fn finds_neighbors_across_adjacent_cells() {
        // Radius 2 puts these in neighboring cells: (0, 0) and (1, 0).
        let agt_vec = vec![
            agent_at(0, 1.9, 1.0, State::Susceptible),
            agent_at(1, 2.1, 1.0, State::Infectious),
        ];
        let mut grid = SpatialIndex::new();
        grid.rebuild(&agt_vec, 2.0);

        let found = collect_neighbors(&grid, 1.9, 1.0);
        assert!(found.contains(&0));
        assert!(found.contains(&1));
    }

    #[test]
    fn bucket_preserves_agent_order() {
        let agt_vec = vec![
            agent_at(0, 0.2, 0.2, State::Susceptible),
            agent_at(1, 0.4, 0.4, State::Susceptible),
            agent_at(2, 0.6, 0.6, State::Susceptible),
        ];
        let mut grid = SpatialIndex::new();
        grid.rebuild(&agt_vec, 1.0);

        let found = collect_neighbors(&grid, 0.5, 0.5);
        assert_eq!(found, vec![0, 1, 2]);
    }

    #[test]
    fn rebuild_reuses_buckets() {
        let mut agt_vec = vec![
            agent_at(0, 1.0, 1.0, State::Susceptible),
            agent_at(1, 50.0, 50.0, State::Susceptible),
        ];
        let mut grid = SpatialIndex::new();
        grid.rebuild(&agt_vec, 2.0);

        // Move everyone and rebuild: no stale indices may survive.
        agt_vec[0].x = 80.0;
        agt_vec[0].y = 80.0;
        grid.rebuild(&agt_vec, 2.0);

        assert_eq!(collect_neighbors(&grid, 1.0, 1.0), Vec::<usize>::new());
        assert_eq!(collect_neighbors(&grid, 80.0, 80.0), vec![0]);
        assert_eq!(collect_neighbors(&grid, 50.0, 50.0), vec![1]);
    }
}
