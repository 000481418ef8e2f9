// Acorn: Iterative Multi-Layer PCB Autorouting
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! A* pathfinding over the routing grid.

use super::{PathWorkspace, Pathfinder, RouterParams, SparsePath};
use crate::input::InputConfig;
use crate::map::{Coord, RoutingGrid};
use crate::netlist::Net;

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Lateral step offsets on a routing layer: 4 orthogonal, 4 diagonal, 8 knight moves.
const LATERAL_MOVES: [(isize, isize); 16] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
    (2, 1),
    (2, -1),
    (-2, 1),
    (-2, -1),
    (1, 2),
    (1, -2),
    (-1, 2),
    (-1, -2),
];

#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    f: f64,
    index: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    // reversed ordering turns the max-heap into a min-heap; index breaks ties so that
    // exploration order is fully deterministic
    fn cmp(&self, other: &Self) -> Ordering {
        other.f.total_cmp(&self.f).then_with(|| other.index.cmp(&self.index))
    }
}
impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The provided pathfinder implementation: congestion-aware A* over the cell grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridRouter;

impl GridRouter {
    /// Create a new grid router.
    pub fn new() -> Self {
        Self
    }

    fn heuristic(inputs: &InputConfig, from: Coord, to: Coord) -> f64 {
        let dx = (from.x as isize - to.x as isize).abs() as f64;
        let dy = (from.y as isize - to.y as isize).abs() as f64;
        let dmin = dx.min(dy);
        let dmax = dx.max(dy);
        let lateral = inputs.cell_cost * (dmax - dmin) + inputs.diag_cost() * dmin;
        let layers = ((from.z as isize - to.z as isize).abs() / 2) as f64;
        lateral + layers * inputs.vert_cost
    }

    fn lateral_step_cost(
        grid: &RoutingGrid,
        inputs: &InputConfig,
        params: &RouterParams,
        target: Coord,
        dx: isize,
        dy: isize,
    ) -> f64 {
        let base = match dx.abs() + dy.abs() {
            1 => inputs.cell_cost,
            2 => inputs.diag_cost(),
            _ => inputs.knight_cost(),
        };
        let multiplier =
            if params.use_cost_multipliers { grid.trace_cost_multiplier(target) } else { 1.0 };
        base * multiplier
            + grid.cell(target).trace_congestion as f64 * params.trace_congestion_multiplier
    }

    fn vertical_step_cost(
        grid: &RoutingGrid,
        inputs: &InputConfig,
        params: &RouterParams,
        via: Coord,
        target: Coord,
    ) -> f64 {
        let (via_mult, trace_mult) = if params.use_cost_multipliers {
            (grid.via_cost_multiplier(via), grid.trace_cost_multiplier(target))
        } else {
            (1.0, 1.0)
        };
        inputs.vert_cost * via_mult
            + grid.cell(via).via_congestion as f64 * params.via_congestion_multiplier
            + inputs.cell_cost * trace_mult
            + grid.cell(target).trace_congestion as f64 * params.trace_congestion_multiplier
    }

    fn reconstruct(grid: &RoutingGrid, ws: &PathWorkspace, goal: usize) -> Vec<Coord> {
        let mut cells = Vec::new();
        let mut cur = goal;
        loop {
            let coord = grid.coord_from_index(cur);
            cells.push(coord);
            let parent = ws.parent[cur];
            if parent == usize::MAX {
                break;
            }
            let pc = grid.coord_from_index(parent);
            // vertical steps record only the two routing cells; re-insert the via cell
            if pc.x == coord.x && pc.y == coord.y && pc.z != coord.z {
                cells.push(Coord::new(coord.x, coord.y, (pc.z + coord.z) / 2));
            }
            cur = parent;
        }
        cells.reverse();
        cells
    }
}

impl Pathfinder for GridRouter {
    fn find_path(
        &self,
        grid: &RoutingGrid,
        inputs: &InputConfig,
        net: &Net,
        params: &RouterParams,
        ws: &mut PathWorkspace,
    ) -> SparsePath {
        let start = net.start;
        let goal = net.end;
        let start_idx = grid.cell_index(start);
        let goal_idx = grid.cell_index(goal);

        ws.begin_search();
        let generation = ws.generation;
        let mut open: BinaryHeap<OpenEntry> = BinaryHeap::new();
        let mut explored: u64 = 0;

        ws.g_score[start_idx] = 0.0;
        ws.parent[start_idx] = usize::MAX;
        ws.open_stamp[start_idx] = generation;
        open.push(OpenEntry { f: Self::heuristic(inputs, start, goal), index: start_idx });

        while let Some(OpenEntry { index, .. }) = open.pop() {
            if ws.closed_stamp[index] == generation {
                continue;
            }
            ws.closed_stamp[index] = generation;
            explored += 1;

            if index == goal_idx {
                return SparsePath {
                    cells: Self::reconstruct(grid, ws, goal_idx),
                    cost: ws.g_score[goal_idx],
                    explored,
                };
            }

            let coord = grid.coord_from_index(index);
            let g_here = ws.g_score[index];

            // lateral successors
            for &(dx, dy) in LATERAL_MOVES.iter() {
                let (x, y) = (coord.x as isize + dx, coord.y as isize + dy);
                if !grid.contains(x, y, coord.z as isize) {
                    continue;
                }
                let target = Coord::new(x as usize, y as usize, coord.z);
                if !grid.is_walkable(target) {
                    continue;
                }
                // a knight move needs its diagonal intermediate cell to be open, so that
                // contiguity reconstruction can fill the gap without entering a barrier
                if dx.abs() + dy.abs() == 3 {
                    let mid = Coord::new(
                        (coord.x as isize + dx.signum()) as usize,
                        (coord.y as isize + dy.signum()) as usize,
                        coord.z,
                    );
                    if !grid.is_walkable(mid) {
                        continue;
                    }
                }
                let step = Self::lateral_step_cost(grid, inputs, params, target, dx, dy);
                self.relax(grid, inputs, ws, &mut open, generation, index, target, g_here + step, goal);
            }

            // vertical successors through the adjacent via layers
            for &dz in &[-2isize, 2] {
                let z = coord.z as isize + dz;
                if !grid.contains(coord.x as isize, coord.y as isize, z) {
                    continue;
                }
                let via = Coord::new(coord.x, coord.y, (coord.z as isize + dz / 2) as usize);
                let target = Coord::new(coord.x, coord.y, z as usize);
                if !grid.is_walkable(via) || !grid.is_walkable(target) {
                    continue;
                }
                let step = Self::vertical_step_cost(grid, inputs, params, via, target);
                self.relax(grid, inputs, ws, &mut open, generation, index, target, g_here + step, goal);
            }
        }

        // open set exhausted without reaching the goal
        SparsePath { cells: Vec::new(), cost: 0.0, explored }
    }
}

impl GridRouter {
    #[allow(clippy::too_many_arguments)]
    fn relax(
        &self,
        grid: &RoutingGrid,
        inputs: &InputConfig,
        ws: &mut PathWorkspace,
        open: &mut BinaryHeap<OpenEntry>,
        generation: u32,
        from: usize,
        target: Coord,
        tentative: f64,
        goal: Coord,
    ) {
        let t_idx = grid.cell_index(target);
        if ws.closed_stamp[t_idx] == generation {
            return;
        }
        if ws.open_stamp[t_idx] != generation || tentative < ws.g_score[t_idx] {
            ws.open_stamp[t_idx] = generation;
            ws.g_score[t_idx] = tentative;
            ws.parent[t_idx] = from;
            open.push(OpenEntry {
                f: tentative + Self::heuristic(inputs, target, goal),
                index: t_idx,
            });
        }
    }
}
