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
    CostZone, DesignRuleSet, DesignRuleZone, InputConfig, NetDef, PinSwapZone, Terminal,
    ZoneRect,
};
use crate::map::Coord;
use crate::report::NullReport;
use crate::Engine;

fn terminal(x: usize, y: usize, layer: usize) -> Terminal {
    Terminal { x, y, layer }
}

#[test]
fn single_short_net_solves_in_one_iteration() {
    let mut inputs = InputConfig::new(10, 5, 1);
    inputs.nets.push(NetDef::new("only", terminal(0, 0, 0), terminal(3, 0, 0)));
    inputs.user_drc_free_threshold = 1;
    inputs.max_iterations = 50;

    let mut engine = Engine::new(inputs, Some(2)).expect("valid configuration");
    let outcome = engine.route(&mut NullReport).expect("routing succeeds");

    assert!(outcome.solved);
    assert_eq!(outcome.iterations_run, 1);
    assert_eq!(outcome.best_iteration, Some(1));
    assert_eq!(engine.metrics().paths[0].length, 3.0);
    assert!(engine.metrics().record(1).drc_free);
}

#[test]
fn crossing_nets_conflict_then_separate() {
    let mut inputs = InputConfig::new(10, 10, 1);
    inputs.nets.push(NetDef::new("a", terminal(1, 4, 0), terminal(8, 4, 0)));
    inputs.nets.push(NetDef::new("b", terminal(1, 6, 0), terminal(8, 6, 0)));
    inputs.user_drc_free_threshold = 1;
    inputs.max_iterations = 150;

    let mut engine = Engine::new(inputs, Some(2)).expect("valid configuration");
    let outcome = engine.route(&mut NullReport).expect("routing succeeds");

    let metrics = engine.metrics();
    // the rat's-nest pass routes both nets straight through the contested corridor
    assert!(metrics.record(1).drc_cells > 0, "first iteration should conflict");
    // which leaves congestion behind
    assert!(engine.grid().total_congestion() > 0.0);
    // and a later iteration resolves the conflict
    assert!(metrics.iterations.iter().any(|r| r.drc_free));
    assert!(outcome.solved);

    // every non-child net occupies exactly its own result slot
    assert_eq!(metrics.paths.len(), engine.nets().len());
    for net in engine.nets() {
        assert!(!metrics.paths[net.id].cells.is_empty());
    }
    // no iteration ever triggered more than one intervention
    for record in &metrics.iterations {
        assert!(record.interventions.count() <= 1);
    }
    // the best iteration is never displaced by one with more DRC cells
    let best = metrics.best_iteration.expect("a best iteration exists");
    let best_cells = metrics.record(best).non_pseudo_drc_cells;
    let min_cells =
        metrics.iterations.iter().map(|r| r.non_pseudo_drc_cells).min().expect("records");
    assert_eq!(best_cells, min_cells);
}

#[test]
fn crossing_nets_on_two_layers_use_vias() {
    let mut inputs = InputConfig::new(12, 12, 2);
    inputs.nets.push(NetDef::new("h", terminal(1, 5, 0), terminal(10, 5, 0)));
    inputs.nets.push(NetDef::new("v", terminal(5, 1, 0), terminal(5, 10, 0)));
    inputs.user_drc_free_threshold = 1;
    inputs.max_iterations = 150;
    // via cost equal to trace cost makes a layer change the cheapest way across
    inputs.vert_cost = inputs.cell_cost;
    // the vertical net cannot pass this blockage on the bottom layer
    inputs.barrier_zones.push(crate::input::BarrierZone {
        unblock: false,
        rect: ZoneRect::on_layer(0, 4, 2, 6, 3),
    });

    let mut engine = Engine::new(inputs, Some(2)).expect("valid configuration");
    let outcome = engine.route(&mut NullReport).expect("routing succeeds");

    assert!(outcome.solved);
    let metrics = engine.metrics();
    let with_vias = engine
        .nets()
        .iter()
        .filter(|n| metrics.paths[n.id].via_count >= 2)
        .count();
    assert_eq!(with_vias, 1, "exactly one net should change layers");
    // and the layer-changer is the blocked vertical net
    assert!(metrics.paths[1].via_count >= 2);
}

#[test]
fn diff_pair_routes_children_through_the_pseudo_net() {
    let mut inputs = InputConfig::new(20, 20, 1);
    let mut p = NetDef::new("clk_p", terminal(2, 8, 0), terminal(16, 8, 0));
    p.diff_pair_partner = Some("clk_n".to_string());
    p.pitch = 4.0;
    let mut n = NetDef::new("clk_n", terminal(2, 12, 0), terminal(16, 12, 0));
    n.diff_pair_partner = Some("clk_p".to_string());
    n.pitch = 4.0;
    inputs.nets.push(p);
    inputs.nets.push(n);
    inputs.user_drc_free_threshold = 1;
    inputs.max_iterations = 1;

    let mut engine = Engine::new(inputs, Some(2)).expect("valid configuration");
    let outcome = engine.route(&mut NullReport).expect("routing succeeds");
    assert_eq!(outcome.iterations_run, 1);

    let nets = engine.nets();
    let metrics = engine.metrics();
    assert_eq!(nets.len(), 3);
    let pseudo = nets.iter().find(|n| n.is_pseudo).expect("pseudo net exists");
    let (a, b) = pseudo.children.expect("pseudo has children");
    // the pseudo net was routed directly, the children only through expansion
    assert!(!metrics.paths[pseudo.id].cells.is_empty());
    assert!(!metrics.paths[a].contiguous.is_empty());
    assert!(!metrics.paths[b].contiguous.is_empty());
    // the children run on opposite sides of the centerline at the declared pitch
    assert!(metrics.paths[a].contiguous.contains(&Coord::new(9, 8, 0)));
    assert!(metrics.paths[b].contiguous.contains(&Coord::new(9, 12, 0)));
    assert!(metrics.record(1).drc_free);
}

#[test]
fn zero_iterations_is_preroute_only() {
    let mut inputs = InputConfig::new(10, 10, 1);
    inputs.nets.push(NetDef::new("a", terminal(1, 4, 0), terminal(8, 4, 0)));
    inputs.max_iterations = 0;

    let mut engine = Engine::new(inputs, Some(1)).expect("valid configuration");
    let outcome = engine.route(&mut NullReport).expect("pre-routing succeeds");

    assert!(!outcome.solved);
    assert_eq!(outcome.iterations_run, 0);
    // congestion is untouched in pre-routing mode
    assert_eq!(engine.grid().total_congestion(), 0.0);
}

#[test]
fn rats_nest_iteration_skips_deposition_with_cost_multipliers() {
    let mut inputs = InputConfig::new(10, 5, 1);
    inputs.nets.push(NetDef::new("only", terminal(0, 0, 0), terminal(3, 0, 0)));
    inputs.user_drc_free_threshold = 1;
    inputs.max_iterations = 1;
    inputs.trace_cost_multipliers = vec![1.0, 2.0];
    inputs.trace_cost_zones.push(CostZone {
        multiplier_index: 1,
        rect: ZoneRect::on_layer(0, 6, 0, 9, 4),
    });

    let mut engine = Engine::new(inputs, Some(1)).expect("valid configuration");
    engine.route(&mut NullReport).expect("routing succeeds");

    // with cost multipliers present, iteration 1 neither deposits congestion nor
    // qualifies as the best iteration
    assert_eq!(engine.grid().total_congestion(), 0.0);
    assert_eq!(engine.metrics().best_iteration, None);
}

#[test]
fn second_iteration_deposits_with_cost_multipliers() {
    let mut inputs = InputConfig::new(10, 5, 1);
    inputs.nets.push(NetDef::new("only", terminal(0, 0, 0), terminal(3, 0, 0)));
    inputs.user_drc_free_threshold = 10;
    inputs.max_iterations = 2;
    inputs.trace_cost_multipliers = vec![1.0, 2.0];
    inputs.trace_cost_zones.push(CostZone {
        multiplier_index: 1,
        rect: ZoneRect::on_layer(0, 6, 0, 9, 4),
    });

    let mut engine = Engine::new(inputs, Some(1)).expect("valid configuration");
    engine.route(&mut NullReport).expect("routing succeeds");

    assert!(engine.grid().total_congestion() > 0.0);
    assert_eq!(engine.metrics().best_iteration, Some(2));
}

#[test]
fn first_iteration_deposits_without_cost_multipliers() {
    let mut inputs = InputConfig::new(10, 5, 1);
    inputs.nets.push(NetDef::new("only", terminal(0, 0, 0), terminal(3, 0, 0)));
    inputs.user_drc_free_threshold = 10;
    inputs.max_iterations = 1;

    let mut engine = Engine::new(inputs, Some(1)).expect("valid configuration");
    engine.route(&mut NullReport).expect("routing succeeds");

    assert!(engine.grid().total_congestion() > 0.0);
    assert_eq!(engine.metrics().best_iteration, Some(1));
}

#[test]
fn design_rule_conflict_forces_a_single_diagnostic_iteration() {
    let mut inputs = InputConfig::new(10, 10, 2);
    inputs.nets.push(NetDef::new("a", terminal(1, 4, 0), terminal(8, 4, 0)));
    inputs.nets.push(NetDef::new("b", terminal(1, 7, 0), terminal(8, 7, 0)));
    inputs.user_drc_free_threshold = 5;
    inputs.max_iterations = 50;

    let mut fat_vias = DesignRuleSet::uniform("fat_vias", 2);
    for rule in &mut fat_vias.subsets[0].layers {
        rule.via_up_diameter = 3.0;
        rule.via_down_diameter = 3.0;
    }
    inputs.design_rules.push(fat_vias);
    inputs.design_rule_zones.push(DesignRuleZone {
        rule_set: 1,
        rule_subset: 0,
        rect: ZoneRect::on_layer(1, 3, 3, 6, 6),
    });

    let mut engine = Engine::new(inputs, Some(1)).expect("valid configuration");
    assert!(!engine.design_rule_conflicts().is_empty());
    // user threshold 5 plus 35 * log10(2) ~ 10
    assert_eq!(engine.drc_free_threshold(), 15);
    let outcome = engine.route(&mut NullReport).expect("diagnostic iteration runs");

    assert!(outcome.design_rule_conflicts > 0);
    assert_eq!(outcome.iterations_run, 1);
    assert!(!outcome.solved);
}

#[test]
fn pin_swap_start_moves_to_the_zone_exit() {
    let mut inputs = InputConfig::new(12, 12, 1);
    inputs.pin_swap_zones.push(PinSwapZone { rect: ZoneRect::on_layer(0, 0, 0, 3, 3) });
    inputs.nets.push(NetDef::new("swp", terminal(1, 1, 0), terminal(10, 10, 0)));
    inputs.user_drc_free_threshold = 1;
    inputs.max_iterations = 1;

    let mut engine = Engine::new(inputs, Some(1)).expect("valid configuration");
    engine.route(&mut NullReport).expect("routing succeeds");

    let (start, _) = engine.terminal_of(0);
    assert_ne!(start, Coord::new(1, 1, 0), "start should move toward the zone exit");
    assert_ne!(engine.grid().cell(start).swap_zone, 0, "start stays inside the zone");
    assert!(!engine.nets()[0].swappable);
}
