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

//! # Routing Map
//!
//! The routing map is a dense 3D array of [`Cell`]s. The `z` axis interleaves routing layers
//! and via layers: even `z` values are routing layers (where traces run laterally), odd `z`
//! values are the via layers connecting the routing layers directly above and below. A map
//! with `n` routing layers therefore has `2n - 1` z-slices.
//!
//! Each cell carries the static properties painted onto it at startup (design-rule ids,
//! barrier and proximity flags, cost-multiplier indices, pin-swap-zone id) and the two
//! congestion accumulators that provide the feedback between routing iterations. Congestion
//! is a property of the *cell*, not of an edge: the pathfinder reads a single scalar per
//! visited cell, and the iteration controller evaporates and re-deposits it between passes.
//!
//! The grid is owned by the iteration controller. During the parallel pathfinding phase it
//! is loaned out read-only; every mutating operation ([`RoutingGrid::evaporate`],
//! [`RoutingGrid::deposit_trace`], occupancy bookkeeping, zone painting) runs in the
//! controller's single-threaded phase.

mod grid;
pub use grid::{DesignRuleConflict, RoutingGrid};

/// A position on the routing map. `z` indexes routing *and* via layers interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    /// Horizontal position in cells
    pub x: usize,
    /// Vertical position in cells
    pub y: usize,
    /// Layer index (even: routing layer, odd: via layer)
    pub z: usize,
}

impl Coord {
    /// Create a new coordinate.
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Create a coordinate on a *routing* layer (`layer` counts routing layers only).
    pub fn on_routing_layer(x: usize, y: usize, layer: usize) -> Self {
        Self { x, y, z: 2 * layer }
    }

    /// Returns `true` if this coordinate lies on a routing layer.
    pub fn is_routing_layer(&self) -> bool {
        self.z % 2 == 0
    }

    /// The routing-layer index for coordinates on a routing layer.
    pub fn routing_layer(&self) -> usize {
        self.z / 2
    }

    /// Euclidean distance to `other`, ignoring the z axis.
    pub fn lateral_distance(&self, other: &Coord) -> f64 {
        let dx = self.x as f64 - other.x as f64;
        let dy = self.y as f64 - other.y as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A single cell of the routing map.
///
/// All static fields are small integers painted once at startup; the congestion counters
/// are the only fields that change while the routing loop runs. The `occupants` vector is
/// per-iteration scratch, cleared and rebuilt before every DRC analysis.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    /// Index of the design-rule set governing this cell
    pub rule_set: u8,
    /// Index of the design-rule subset within the set
    pub rule_subset: u8,
    /// Cell is a user-defined barrier (never walkable)
    pub barrier: bool,
    /// Cell is within half a line-width of a barrier or the map edge (never walkable)
    pub proximity: bool,
    /// Pin-swap-zone id (0 = not in a pin-swap zone)
    pub swap_zone: u8,
    /// Index into the trace cost-multiplier table
    pub trace_cost_index: u8,
    /// Index into the via cost-multiplier table
    pub via_cost_index: u8,
    /// Cell is adjacent to a net terminal
    pub near_terminal: bool,
    /// Accumulated trace congestion
    pub trace_congestion: f32,
    /// Accumulated via congestion
    pub via_congestion: f32,
    /// Nets traversing this cell in the current iteration (DRC scratch)
    pub occupants: Vec<u32>,
}

impl Cell {
    /// Returns `true` if a path may traverse this cell.
    pub fn is_walkable(&self) -> bool {
        !self.barrier && !self.proximity
    }
}
