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
use crate::algorithm::{
    determine_algorithm_change, pseudo_congestion_targets, AlgorithmChange,
};
use crate::map::Coord;
use crate::netlist::Net;
use crate::routability::{
    Direction, IterationRecord, RoutingMetrics, DRC_WINDOW_MASK,
};

fn plain_net(id: usize, swappable: bool) -> Net {
    Net {
        id,
        name: format!("net{}", id),
        start: Coord::new(1, 1 + id, 0),
        end: Coord::new(8, 1 + id, 0),
        rule_set: 0,
        rule_subset: 0,
        is_diff_pair_child: false,
        is_pseudo: false,
        pseudo_parent: None,
        children: None,
        pitch: 0.0,
        swappable,
        start_swap_zone: if swappable { 0 } else { 1 },
    }
}

fn pseudo_family(first_id: usize) -> Vec<Net> {
    let mut a = plain_net(first_id, true);
    a.is_diff_pair_child = true;
    a.pseudo_parent = Some(first_id + 2);
    let mut b = plain_net(first_id + 1, true);
    b.is_diff_pair_child = true;
    b.pseudo_parent = Some(first_id + 2);
    let mut pseudo = plain_net(first_id + 2, true);
    pseudo.is_pseudo = true;
    pseudo.children = Some((first_id, first_id + 1));
    pseudo.pitch = 4.0;
    vec![a, b, pseudo]
}

/// A metrics state deep in a stagnant run: `iterations` records, none of them DRC-free,
/// every net holding DRCs, currently in a plateau.
fn stagnant_metrics(nets: &[Net], num_layers: usize, iterations: usize) -> RoutingMetrics {
    let mut metrics = RoutingMetrics::new(nets.len(), num_layers);
    for _ in 0..iterations {
        metrics.iterations.push(IterationRecord {
            non_pseudo_drc_cells: 8,
            non_pseudo_drc_nets: nets.len(),
            non_pseudo_cost: 1000.0,
            ..Default::default()
        });
    }
    for net in nets {
        metrics.paths[net.id].drc_cells = 2;
    }
    metrics.in_metrics_plateau = true;
    metrics
}

fn no_flags(nets: &[Net], layers: usize) -> Vec<Vec<bool>> {
    vec![vec![false; layers]; nets.len()]
}

#[test]
fn no_intervention_outside_a_plateau() {
    let nets: Vec<Net> = (0..4).map(|i| plain_net(i, true)).collect();
    let mut metrics = stagnant_metrics(&nets, 1, 80);
    metrics.in_metrics_plateau = false;
    let change = determine_algorithm_change(&metrics, &nets, 1, 80, 20, &no_flags(&nets, 1));
    assert_eq!(change, AlgorithmChange::None);
}

#[test]
fn no_intervention_before_sixty_quiet_iterations() {
    let nets: Vec<Net> = (0..4).map(|i| plain_net(i, true)).collect();
    let mut metrics = stagnant_metrics(&nets, 1, 80);
    metrics.last_algorithm_change = 30;
    let change = determine_algorithm_change(&metrics, &nets, 1, 80, 20, &no_flags(&nets, 1));
    assert_eq!(change, AlgorithmChange::None);

    // sixty iterations after the last change, interventions are allowed again
    let change = determine_algorithm_change(&metrics, &nets, 1, 90, 20, &no_flags(&nets, 1));
    assert_ne!(change, AlgorithmChange::None);
}

#[test]
fn no_intervention_once_threshold_is_met() {
    let nets: Vec<Net> = (0..4).map(|i| plain_net(i, true)).collect();
    let mut metrics = stagnant_metrics(&nets, 1, 80);
    metrics.cumulative_drc_free = 20;
    let change = determine_algorithm_change(&metrics, &nets, 1, 80, 20, &no_flags(&nets, 1));
    assert_eq!(change, AlgorithmChange::None);
}

#[test]
fn swap_is_selected_for_stagnant_swappable_nets() {
    // three swappable nets plus one with terminals in a pin-swap zone
    let mut nets: Vec<Net> = (0..3).map(|i| plain_net(i, true)).collect();
    nets.push(plain_net(3, false));
    let metrics = stagnant_metrics(&nets, 1, 80);

    assert_eq!(metrics.swap_eligible_drc_nets(&nets), 3);
    let change = determine_algorithm_change(&metrics, &nets, 1, 80, 20, &no_flags(&nets, 1));
    assert_eq!(change, AlgorithmChange::SwapTerminals);
}

#[test]
fn sensitivity_change_waits_for_swapping_to_be_exhausted() {
    let nets: Vec<Net> = (0..4).map(|i| plain_net(i, true)).collect();
    let mut metrics = stagnant_metrics(&nets, 1, 80);

    // swap-eligible nets exist and fewer than three swap rounds happened: swap wins
    metrics.num_terminal_swaps = 2;
    let change = determine_algorithm_change(&metrics, &nets, 1, 80, 20, &no_flags(&nets, 1));
    assert_eq!(change, AlgorithmChange::SwapTerminals);

    // after the third swap round, the via band is climbed first
    metrics.num_terminal_swaps = 3;
    let change = determine_algorithm_change(&metrics, &nets, 1, 80, 20, &no_flags(&nets, 1));
    assert_eq!(change, AlgorithmChange::ChangeViaSensitivity(Direction::Increase));
}

#[test]
fn hill_climb_steps_back_down_when_the_upper_level_measured_worse() {
    let nets: Vec<Net> = (0..4).map(|i| plain_net(i, true)).collect();
    let mut metrics = stagnant_metrics(&nets, 1, 80);
    metrics.num_terminal_swaps = 3;

    // the via band already measured the level above as worse, and it cannot go lower,
    // so the trace band is climbed instead
    metrics.via_band.levels[0].iteration_measured = 60;
    metrics.via_band.levels[0].avg_drc_nets = 2.0;
    metrics.via_band.levels[1].iteration_measured = 40;
    metrics.via_band.levels[1].avg_drc_nets = 10.0;
    let change = determine_algorithm_change(&metrics, &nets, 1, 80, 20, &no_flags(&nets, 1));
    assert_eq!(change, AlgorithmChange::ChangeTraceSensitivity(Direction::Increase));

    // from a higher rung, the same memory sends the via band back down
    metrics.via_band.current = 1;
    metrics.via_band.levels[2].iteration_measured = 40;
    metrics.via_band.levels[2].avg_drc_nets = 30.0;
    metrics.via_band.levels[1].avg_drc_nets = 10.0;
    let change = determine_algorithm_change(&metrics, &nets, 1, 80, 20, &no_flags(&nets, 1));
    assert_eq!(change, AlgorithmChange::ChangeViaSensitivity(Direction::Decrease));

    // at the top of the ladder the only way is down
    metrics.via_band.current = metrics.via_band.levels.len() - 1;
    let change = determine_algorithm_change(&metrics, &nets, 1, 80, 20, &no_flags(&nets, 1));
    assert_eq!(change, AlgorithmChange::ChangeViaSensitivity(Direction::Decrease));
}

#[test]
fn pseudo_congestion_fires_only_with_all_gates_open() {
    let mut nets: Vec<Net> = vec![plain_net(0, true)];
    nets.extend(pseudo_family(1));
    let layers = 3;
    let mut metrics = stagnant_metrics(&nets, layers, 80);
    let flags = no_flags(&nets, layers);

    // the pair has had DRCs on the middle layer for 20 straight iterations
    metrics.recent_drc_by_layer[3][1] = DRC_WINDOW_MASK;

    // without a prior sensitivity reduction, the highest-priority intervention is barred
    let change = determine_algorithm_change(&metrics, &nets, layers, 80, 20, &flags);
    assert_ne!(change, AlgorithmChange::EnablePseudoTraceCongestion);

    metrics.trace_band.num_reductions = 1;
    let change = determine_algorithm_change(&metrics, &nets, layers, 80, 20, &flags);
    assert_eq!(change, AlgorithmChange::EnablePseudoTraceCongestion);

    // a single DRC-free iteration in the window closes the 0% gate again
    metrics.iterations.last_mut().expect("history exists").drc_free = true;
    let change = determine_algorithm_change(&metrics, &nets, layers, 80, 20, &flags);
    assert_ne!(change, AlgorithmChange::EnablePseudoTraceCongestion);
}

#[test]
fn pseudo_congestion_targets_include_adjacent_outer_layers_only_when_already_on() {
    let mut nets: Vec<Net> = vec![plain_net(0, true)];
    nets.extend(pseudo_family(1));
    let layers = 3;
    let mut metrics = RoutingMetrics::new(nets.len(), layers);
    let mut flags = no_flags(&nets, layers);

    // a full window on the bottom layer alone selects nothing
    metrics.recent_drc_by_layer[3][0] = DRC_WINDOW_MASK;
    assert!(pseudo_congestion_targets(&metrics, &nets, layers, &flags).is_empty());

    // once the middle layer is already on, the adjacent bottom-layer DRCs keep it on
    flags[3][1] = true;
    assert_eq!(pseudo_congestion_targets(&metrics, &nets, layers, &flags), vec![(3, 1)]);

    // a full window on the middle layer itself always qualifies
    flags[3][1] = false;
    metrics.recent_drc_by_layer[3][0] = 0;
    metrics.recent_drc_by_layer[3][1] = DRC_WINDOW_MASK;
    assert_eq!(pseudo_congestion_targets(&metrics, &nets, layers, &flags), vec![(3, 1)]);
}

#[test]
fn terminal_swap_is_an_involution() {
    let mut net = plain_net(0, true);
    let (start, end) = (net.start, net.end);
    net.swap_terminals();
    assert_eq!(net.start, end);
    assert_eq!(net.end, start);
    net.swap_terminals();
    assert_eq!(net.start, start);
    assert_eq!(net.end, end);
}
