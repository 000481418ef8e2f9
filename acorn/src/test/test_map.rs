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

#![cfg(test)]
use crate::input::{
    BarrierZone, CostZone, DesignRuleSet, DesignRuleZone, InputConfig, ZoneRect,
};
use crate::map::{Coord, RoutingGrid};

use assert_approx_eq::assert_approx_eq;

fn grid_8x8_2l() -> (InputConfig, RoutingGrid) {
    let inputs = InputConfig::new(8, 8, 2);
    let grid = RoutingGrid::new(&inputs);
    (inputs, grid)
}

#[test]
fn initialization() {
    let (_, grid) = grid_8x8_2l();
    assert_eq!(grid.num_z(), 3);
    assert_eq!(grid.num_routing_layers(), 2);
    assert_eq!(grid.num_cells(), 8 * 8 * 3);
    assert!(!grid.cost_multipliers_used());
    for z in 0..3 {
        for y in 0..8 {
            for x in 0..8 {
                let cell = grid.cell(Coord::new(x, y, z));
                assert!(cell.is_walkable());
                assert_eq!(cell.rule_set, 0);
                assert_eq!(cell.trace_congestion, 0.0);
                assert_eq!(cell.via_congestion, 0.0);
            }
        }
    }
}

#[test]
fn barrier_painting_with_unblock() {
    let (_, mut grid) = grid_8x8_2l();
    grid.paint_barriers(&[
        BarrierZone { unblock: false, rect: ZoneRect::on_layer(0, 2, 2, 5, 5) },
        BarrierZone { unblock: true, rect: ZoneRect::on_layer(0, 3, 3, 4, 4) },
    ]);
    assert!(grid.cell(Coord::new(2, 2, 0)).barrier);
    assert!(grid.cell(Coord::new(5, 5, 0)).barrier);
    // the inner window was re-opened
    assert!(!grid.cell(Coord::new(3, 3, 0)).barrier);
    // other layers are untouched
    assert!(!grid.cell(Coord::new(2, 2, 2)).barrier);
}

#[test]
fn proximity_hugs_barriers_and_edges() {
    let (inputs, mut grid) = grid_8x8_2l();
    grid.paint_barriers(&[BarrierZone {
        unblock: false,
        rect: ZoneRect::on_layer(0, 4, 4, 4, 4),
    }]);
    grid.paint_proximity_zones(&inputs.design_rules);
    // the map border is kept clear of traces
    assert!(grid.cell(Coord::new(0, 3, 0)).proximity);
    // cells next to the barrier are unwalkable, the barrier cell itself is not re-flagged
    assert!(grid.cell(Coord::new(3, 4, 0)).proximity);
    assert!(!grid.cell(Coord::new(4, 4, 0)).proximity);
    assert!(grid.cell(Coord::new(4, 4, 0)).barrier);
    // two cells away is free again
    assert!(!grid.cell(Coord::new(2, 4, 0)).proximity);
    // the barrier only exists on layer 0, so layer 1 only carries the border ring
    assert!(!grid.cell(Coord::new(3, 4, 2)).proximity);
}

#[test]
fn near_terminal_cells_are_never_proximity() {
    let (inputs, mut grid) = grid_8x8_2l();
    grid.mark_near_terminal(Coord::new(0, 0, 0));
    grid.paint_proximity_zones(&inputs.design_rules);
    assert!(!grid.cell(Coord::new(0, 0, 0)).proximity);
    assert!(!grid.cell(Coord::new(1, 1, 0)).proximity);
    assert!(grid.cell(Coord::new(3, 0, 0)).proximity);
}

#[test]
fn evaporation_scales_all_congestion() {
    let (_, mut grid) = grid_8x8_2l();
    let trace_cell = Coord::new(3, 3, 0);
    let via_cell = Coord::new(3, 3, 1);
    grid.deposit_trace(trace_cell, 100.0);
    grid.deposit_via(via_cell, 100.0);
    grid.evaporate(40.0);
    assert_approx_eq!(grid.cell(trace_cell).trace_congestion, 60.0_f32, 1e-3_f32);
    assert_approx_eq!(grid.cell(via_cell).via_congestion, 60.0_f32, 1e-3_f32);
    grid.evaporate(40.0);
    assert_approx_eq!(grid.cell(trace_cell).trace_congestion, 36.0_f32, 1e-3_f32);
}

#[test]
fn deposition_scales_with_cost_multiplier() {
    let mut inputs = InputConfig::new(8, 8, 1);
    inputs.trace_cost_multipliers = vec![1.0, 3.0];
    inputs.trace_cost_zones.push(CostZone {
        multiplier_index: 1,
        rect: ZoneRect::on_layer(0, 0, 0, 3, 3),
    });
    let mut grid = RoutingGrid::new(&inputs);
    grid.paint_cost_zones(&inputs.trace_cost_zones, &inputs.via_cost_zones);
    assert!(grid.cost_multipliers_used());

    grid.deposit_trace(Coord::new(1, 1, 0), 100.0);
    grid.deposit_trace(Coord::new(6, 6, 0), 100.0);
    assert_approx_eq!(grid.cell(Coord::new(1, 1, 0)).trace_congestion, 300.0_f32, 1e-3_f32);
    assert_approx_eq!(grid.cell(Coord::new(6, 6, 0)).trace_congestion, 100.0_f32, 1e-3_f32);
}

#[test]
fn occupancy_is_per_iteration_scratch() {
    let (_, mut grid) = grid_8x8_2l();
    let c = Coord::new(2, 2, 0);
    grid.add_occupant(c, 0);
    grid.add_occupant(c, 1);
    grid.add_occupant(c, 1);
    assert_eq!(grid.cell(c).occupants, vec![0, 1]);
    grid.clear_occupancy();
    assert!(grid.cell(c).occupants.is_empty());
}

#[test]
fn design_rule_conflicts_between_adjacent_layers() {
    let mut inputs = InputConfig::new(8, 8, 2);
    let mut fat_vias = DesignRuleSet::uniform("fat_vias", 2);
    for rule in &mut fat_vias.subsets[0].layers {
        rule.via_up_diameter = 3.0;
        rule.via_down_diameter = 3.0;
    }
    inputs.design_rules.push(fat_vias);
    inputs.design_rule_zones.push(DesignRuleZone {
        rule_set: 1,
        rule_subset: 0,
        rect: ZoneRect::on_layer(1, 2, 2, 4, 4),
    });

    let mut grid = RoutingGrid::new(&inputs);
    grid.paint_design_rule_zones(&inputs.design_rule_zones);
    let conflicts = grid.detect_design_rule_conflicts(&inputs.design_rules);
    // the painted 3x3 region of layer 1 now disagrees with layer 0 below it
    assert_eq!(conflicts.len(), 9);
    assert_eq!(conflicts[0].lower_layer, 0);
    assert_approx_eq!(conflicts[0].via_up_diameter, 1.0);
    assert_approx_eq!(conflicts[0].via_down_diameter, 3.0);
}

#[test]
fn conflict_free_when_rules_agree() {
    let (inputs, grid) = grid_8x8_2l();
    assert!(grid.detect_design_rule_conflicts(&inputs.design_rules).is_empty());
}
