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

//! # Pathfinder
//!
//! The single-net pathfinder is a *collaborator* of the iteration controller: it is called
//! once per non-child net per iteration, in parallel across the worker pool. Its contract
//! is the critical concurrency seam of the whole system:
//!
//! - it reads the grid (costs, barriers, congestion) but **never mutates it**;
//! - all of its mutable state lives in a per-thread [`PathWorkspace`];
//! - it returns the found path, its total cost and the number of explored cells.
//!
//! A returned total cost of zero means no path exists between the terminals; the
//! iteration controller treats this as fatal and aborts the run.
//!
//! [`GridRouter`] is the provided implementation: A* over the cell grid with 8-way and
//! knight lateral moves on routing layers and vertical moves through via layers, where
//! each step pays the base traversal cost (scaled by the cell's cost multiplier) plus the
//! cell's congestion scaled by the current congestion-sensitivity multiplier.

mod grid_router;
pub use grid_router::GridRouter;

use crate::input::InputConfig;
use crate::map::{Coord, RoutingGrid};
use crate::netlist::Net;

/// Global parameters the pathfinder reads for one iteration. Mutated only between
/// iterations, in the controller's single-threaded phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterParams {
    /// Scales trace congestion into path cost
    pub trace_congestion_multiplier: f64,
    /// Scales via congestion into path cost
    pub via_congestion_multiplier: f64,
    /// Whether user-defined cost multipliers apply (disabled for the rat's-nest iteration)
    pub use_cost_multipliers: bool,
}

/// The output of one pathfinding call: an ordered cell sequence which may contain gaps
/// from knight moves, plus cost and exploration statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparsePath {
    /// Path cells from start to end, inclusive. May skip cells across knight moves.
    pub cells: Vec<Coord>,
    /// Total path cost. Zero means no path was found.
    pub cost: f64,
    /// Number of cells explored by the search
    pub explored: u64,
}

/// The single-net pathfinding contract.
pub trait Pathfinder: Send + Sync {
    /// Find the cheapest path for `net` on the given grid. Reads the grid and writes only
    /// into `workspace`.
    fn find_path(
        &self,
        grid: &RoutingGrid,
        inputs: &InputConfig,
        net: &Net,
        params: &RouterParams,
        workspace: &mut PathWorkspace,
    ) -> SparsePath;
}

/// Per-thread scratch for the pathfinder. Sized once per worker to the number of grid
/// cells and reused across iterations; generation stamps avoid clearing between calls.
#[derive(Debug)]
pub struct PathWorkspace {
    pub(crate) g_score: Vec<f64>,
    pub(crate) parent: Vec<usize>,
    pub(crate) open_stamp: Vec<u32>,
    pub(crate) closed_stamp: Vec<u32>,
    pub(crate) generation: u32,
}

impl PathWorkspace {
    /// Allocate a workspace for a grid with `num_cells` cells.
    pub fn new(num_cells: usize) -> Self {
        Self {
            g_score: vec![0.0; num_cells],
            parent: vec![usize::MAX; num_cells],
            open_stamp: vec![0; num_cells],
            closed_stamp: vec![0; num_cells],
            generation: 0,
        }
    }

    /// Start a new search, invalidating all previous per-cell state.
    pub fn begin_search(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            // stamp wrap-around: reset everything once every u32::MAX searches
            self.open_stamp.iter_mut().for_each(|s| *s = 0);
            self.closed_stamp.iter_mut().for_each(|s| *s = 0);
            self.generation = 1;
        }
    }
}
