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

//! The dense 3D cell array and its startup painting / per-iteration congestion operations.

use super::{Cell, Coord};
use crate::input::{BarrierZone, CostZone, DesignRuleSet, DesignRuleZone, InputConfig, PinSwapZone};

use log::*;

/// A conflict between the via diameters declared by two adjacent routing layers in
/// overlapping design-rule zones.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignRuleConflict {
    /// Horizontal position of the conflicting cell
    pub x: usize,
    /// Vertical position of the conflicting cell
    pub y: usize,
    /// The lower of the two conflicting routing layers
    pub lower_layer: usize,
    /// Via diameter going up from the lower layer
    pub via_up_diameter: f64,
    /// Via diameter going down from the upper layer
    pub via_down_diameter: f64,
}

/// The routing map: a dense 3D array of [`Cell`]s with interleaved routing and via layers.
#[derive(Debug, Clone)]
pub struct RoutingGrid {
    width: usize,
    height: usize,
    num_z: usize,
    num_routing_layers: usize,
    cells: Vec<Cell>,
    trace_cost_multipliers: Vec<f64>,
    via_cost_multipliers: Vec<f64>,
    cost_multipliers_used: bool,
    num_swap_zones: usize,
}

impl RoutingGrid {
    /// Allocate and initialize the grid: all cells walkable, zero congestion, design-rule
    /// set and subset zero, no cost multipliers, no pin-swap zones.
    pub fn new(inputs: &InputConfig) -> Self {
        let num_z = 2 * inputs.num_routing_layers - 1;
        let n = inputs.map_width * inputs.map_height * num_z;
        Self {
            width: inputs.map_width,
            height: inputs.map_height,
            num_z,
            num_routing_layers: inputs.num_routing_layers,
            cells: vec![Cell::default(); n],
            trace_cost_multipliers: inputs.trace_cost_multipliers.clone(),
            via_cost_multipliers: inputs.via_cost_multipliers.clone(),
            cost_multipliers_used: false,
            num_swap_zones: 0,
        }
    }

    /// Map width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Map height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of z-slices (routing and via layers interleaved).
    pub fn num_z(&self) -> usize {
        self.num_z
    }

    /// Number of routing layers (excluding via layers).
    pub fn num_routing_layers(&self) -> usize {
        self.num_routing_layers
    }

    /// Total number of cells, used to size per-thread pathfinding workspaces.
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if any painted cost zone carries a non-unity multiplier. The first
    /// iteration is routed without these multipliers to produce the rat's-nest baseline.
    pub fn cost_multipliers_used(&self) -> bool {
        self.cost_multipliers_used
    }

    /// Number of distinct pin-swap zones painted onto the map.
    pub fn num_swap_zones(&self) -> usize {
        self.num_swap_zones
    }

    fn idx(&self, c: Coord) -> usize {
        (c.z * self.height + c.y) * self.width + c.x
    }

    /// Flat index of a coordinate, for per-thread workspaces sized by [`Self::num_cells`].
    pub fn cell_index(&self, c: Coord) -> usize {
        self.idx(c)
    }

    /// Inverse of [`Self::cell_index`].
    pub fn coord_from_index(&self, i: usize) -> Coord {
        let x = i % self.width;
        let y = (i / self.width) % self.height;
        let z = i / (self.width * self.height);
        Coord::new(x, y, z)
    }

    /// Returns `true` if the coordinate lies within the map.
    pub fn contains(&self, x: isize, y: isize, z: isize) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && (z as usize) < self.num_z
    }

    /// Shared access to a cell.
    pub fn cell(&self, c: Coord) -> &Cell {
        &self.cells[self.idx(c)]
    }

    /// Exclusive access to a cell.
    pub fn cell_mut(&mut self, c: Coord) -> &mut Cell {
        let i = self.idx(c);
        &mut self.cells[i]
    }

    /// Returns `true` if a path may traverse the cell at `c`.
    pub fn is_walkable(&self, c: Coord) -> bool {
        self.cell(c).is_walkable()
    }

    /// Effective trace cost multiplier at `c` (1.0 if the painted index is out of table).
    pub fn trace_cost_multiplier(&self, c: Coord) -> f64 {
        *self
            .trace_cost_multipliers
            .get(self.cell(c).trace_cost_index as usize)
            .unwrap_or(&1.0)
    }

    /// Effective via cost multiplier at `c` (1.0 if the painted index is out of table).
    pub fn via_cost_multiplier(&self, c: Coord) -> f64 {
        *self
            .via_cost_multipliers
            .get(self.cell(c).via_cost_index as usize)
            .unwrap_or(&1.0)
    }

    /// The design rule governing cell `c` on its routing layer. Via layers inherit the
    /// rule of the routing layer directly below.
    pub fn rule_at<'a>(
        &self,
        rules: &'a [DesignRuleSet],
        c: Coord,
    ) -> &'a crate::input::LayerRule {
        let cell = self.cell(c);
        let set = &rules[cell.rule_set as usize];
        let subset = &set.subsets[cell.rule_subset as usize];
        &subset.layers[c.z / 2]
    }

    //------------------------------------------------------------------------------------
    // Startup painting. All of these run exactly once, before the routing loop starts.
    //------------------------------------------------------------------------------------

    /// Paint design-rule zones. Later zones overwrite earlier ones.
    pub fn paint_design_rule_zones(&mut self, zones: &[DesignRuleZone]) {
        for zone in zones {
            let (rule_set, rule_subset) = (zone.rule_set as u8, zone.rule_subset as u8);
            self.for_each_zone_cell(&zone.rect, |cell| {
                cell.rule_set = rule_set;
                cell.rule_subset = rule_subset;
            });
        }
        debug!("Painted {} design-rule zones", zones.len());
    }

    /// Paint barrier (block/unblock) zones in declaration order.
    pub fn paint_barriers(&mut self, zones: &[BarrierZone]) {
        for zone in zones {
            let block = !zone.unblock;
            self.for_each_zone_cell(&zone.rect, |cell| cell.barrier = block);
        }
        debug!("Painted {} barrier instructions", zones.len());
    }

    /// Paint trace and via cost zones, and record whether any non-unity multiplier is in
    /// effect anywhere on the map.
    pub fn paint_cost_zones(&mut self, trace_zones: &[CostZone], via_zones: &[CostZone]) {
        for zone in trace_zones {
            let index = zone.multiplier_index as u8;
            self.for_each_zone_cell(&zone.rect, |cell| cell.trace_cost_index = index);
        }
        for zone in via_zones {
            let index = zone.multiplier_index as u8;
            self.for_each_zone_cell(&zone.rect, |cell| cell.via_cost_index = index);
        }
        let trace_mults = self.trace_cost_multipliers.clone();
        let via_mults = self.via_cost_multipliers.clone();
        self.cost_multipliers_used = self.cells.iter().any(|cell| {
            trace_mults
                .get(cell.trace_cost_index as usize)
                .map(|m| (*m - 1.0).abs() > f64::EPSILON)
                .unwrap_or(false)
                || via_mults
                    .get(cell.via_cost_index as usize)
                    .map(|m| (*m - 1.0).abs() > f64::EPSILON)
                    .unwrap_or(false)
        });
        if self.cost_multipliers_used {
            info!("Non-unity cost multipliers are used in the map");
        }
    }

    /// Paint pin-swap zones, assigning each declared zone a distinct non-zero id.
    pub fn paint_pin_swap_zones(&mut self, zones: &[PinSwapZone]) {
        for (i, zone) in zones.iter().enumerate() {
            let id = (i + 1) as u8;
            self.for_each_zone_cell(&zone.rect, |cell| cell.swap_zone = id);
        }
        self.num_swap_zones = zones.len();
    }

    /// Flag the cells at and around a terminal. Flagged cells are exempt from proximity
    /// painting and from terminal-to-terminal DRC flagging.
    pub fn mark_near_terminal(&mut self, c: Coord) {
        for dy in -1isize..=1 {
            for dx in -1isize..=1 {
                let (x, y) = (c.x as isize + dx, c.y as isize + dy);
                if self.contains(x, y, c.z as isize) {
                    self.cell_mut(Coord::new(x as usize, y as usize, c.z))
                        .near_terminal = true;
                }
            }
        }
    }

    /// Mark cells within half a line-width of a barrier or the map edge as unwalkable.
    /// Cells in pin-swap zones and cells adjacent to terminals are never proximity cells.
    pub fn paint_proximity_zones(&mut self, rules: &[DesignRuleSet]) {
        let mut proximity = Vec::new();
        for z in (0..self.num_z).step_by(2) {
            for y in 0..self.height {
                for x in 0..self.width {
                    let c = Coord::new(x, y, z);
                    let cell = self.cell(c);
                    if cell.barrier || cell.swap_zone != 0 || cell.near_terminal {
                        continue;
                    }
                    let radius = (self.rule_at(rules, c).line_width / 2.0).ceil() as isize;
                    if radius == 0 {
                        continue;
                    }
                    if self.near_barrier_or_edge(c, radius) {
                        proximity.push(c);
                    }
                }
            }
        }
        let n = proximity.len();
        for c in proximity {
            self.cell_mut(c).proximity = true;
        }
        debug!("Painted {} proximity cells", n);
    }

    fn near_barrier_or_edge(&self, c: Coord, radius: isize) -> bool {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let (x, y) = (c.x as isize + dx, c.y as isize + dy);
                if !self.contains(x, y, c.z as isize) {
                    return true;
                }
                if self.cell(Coord::new(x as usize, y as usize, c.z)).barrier {
                    return true;
                }
            }
        }
        false
    }

    /// Scan for via-diameter conflicts between adjacent routing layers. A conflict exists
    /// wherever the upward via diameter declared at a cell of layer `l` differs from the
    /// downward via diameter declared at the same (x, y) on layer `l + 1`.
    pub fn detect_design_rule_conflicts(
        &self,
        rules: &[DesignRuleSet],
    ) -> Vec<DesignRuleConflict> {
        let mut conflicts = Vec::new();
        for lower in 0..self.num_routing_layers.saturating_sub(1) {
            for y in 0..self.height {
                for x in 0..self.width {
                    let below = self.rule_at(rules, Coord::on_routing_layer(x, y, lower));
                    let above = self.rule_at(rules, Coord::on_routing_layer(x, y, lower + 1));
                    let up = below.via_up_diameter;
                    let down = above.via_down_diameter;
                    if up > 0.0 && down > 0.0 && (up - down).abs() > 1e-9 {
                        conflicts.push(DesignRuleConflict {
                            x,
                            y,
                            lower_layer: lower,
                            via_up_diameter: up,
                            via_down_diameter: down,
                        });
                    }
                }
            }
        }
        if !conflicts.is_empty() {
            error!(
                "Detected {} cells with conflicting via diameters between adjacent layers",
                conflicts.len()
            );
        }
        conflicts
    }

    fn for_each_zone_cell<F: FnMut(&mut Cell)>(&mut self, rect: &crate::input::ZoneRect, mut f: F) {
        let z_range: Vec<usize> = match rect.layer {
            Some(layer) => vec![2 * layer],
            None => (0..self.num_z).collect(),
        };
        let x2 = rect.x2.min(self.width - 1);
        let y2 = rect.y2.min(self.height - 1);
        for z in z_range {
            if z >= self.num_z {
                continue;
            }
            for y in rect.y1..=y2 {
                for x in rect.x1..=x2 {
                    let i = self.idx(Coord::new(x, y, z));
                    f(&mut self.cells[i]);
                }
            }
        }
    }

    //------------------------------------------------------------------------------------
    // Per-iteration congestion operations. These run in the controller's single-threaded
    // phase; the parallel pathfinding phase only ever reads the grid.
    //------------------------------------------------------------------------------------

    /// Multiply every congestion counter by `(100 - rate) / 100`.
    pub fn evaporate(&mut self, rate_percent: f64) {
        let keep = ((100.0 - rate_percent) / 100.0) as f32;
        for cell in &mut self.cells {
            cell.trace_congestion *= keep;
            cell.via_congestion *= keep;
        }
    }

    /// Add trace congestion at `c`, scaled by the cell's effective trace cost multiplier.
    pub fn deposit_trace(&mut self, c: Coord, amount: f64) {
        let scaled = amount * self.trace_cost_multiplier(c);
        self.cell_mut(c).trace_congestion += scaled as f32;
    }

    /// Add via congestion at `c`, scaled by the cell's effective via cost multiplier.
    pub fn deposit_via(&mut self, c: Coord, amount: f64) {
        let scaled = amount * self.via_cost_multiplier(c);
        self.cell_mut(c).via_congestion += scaled as f32;
    }

    /// Clear the per-iteration occupancy scratch of every cell.
    pub fn clear_occupancy(&mut self) {
        for cell in &mut self.cells {
            cell.occupants.clear();
        }
    }

    /// Record that `net` traverses the cell at `c` in the current iteration.
    pub fn add_occupant(&mut self, c: Coord, net: u32) {
        let cell = self.cell_mut(c);
        if !cell.occupants.contains(&net) {
            cell.occupants.push(net);
        }
    }

    /// The largest trace-congestion value anywhere on the map (report diagnostics).
    pub fn max_trace_congestion(&self) -> f32 {
        self.cells.iter().map(|c| c.trace_congestion).fold(0.0, f32::max)
    }

    /// Sum of all congestion counters, used by tests and reports.
    pub fn total_congestion(&self) -> f64 {
        self.cells
            .iter()
            .map(|c| c.trace_congestion as f64 + c.via_congestion as f64)
            .sum()
    }
}
