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

//! # Algorithm Changes
//!
//! When the routing metrics reach a plateau without meeting the DRC-free threshold, the
//! loop escapes by applying exactly one *intervention* per iteration, chosen from four
//! candidates in strict priority order (most specific first):
//!
//! 1. enable pseudo-trace congestion near crowded pseudo-vias,
//! 2. change the via congestion sensitivity,
//! 3. change the trace congestion sensitivity,
//! 4. swap the start/end terminals of DRC nets.
//!
//! The selection is a pure function of the routing metrics, the netlist and the current
//! pseudo-congestion mode flags; applying the chosen change is the iteration
//! controller's job. A higher-priority intervention being ineligible never prevents a
//! lower-priority one from being chosen in the same or a later iteration.

use crate::netlist::Net;
use crate::routability::{
    Direction, RoutingMetrics, SensitivityBand, MIN_ITERATIONS_BETWEEN_CHANGES,
};

/// The intervention chosen for the next iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmChange {
    /// Keep routing unchanged
    None,
    /// Exchange start and end terminals of all swap-eligible DRC nets
    SwapTerminals,
    /// Step the via congestion sensitivity up or down
    ChangeViaSensitivity(Direction),
    /// Step the trace congestion sensitivity up or down
    ChangeTraceSensitivity(Direction),
    /// Start depositing trace congestion around crowded pseudo-vias
    EnablePseudoTraceCongestion,
}

/// Decide which intervention (if any) to apply after the given iteration.
pub fn determine_algorithm_change(
    metrics: &RoutingMetrics,
    nets: &[Net],
    num_routing_layers: usize,
    iteration: usize,
    drc_free_threshold: usize,
    pseudo_trace_congestion: &[Vec<bool>],
) -> AlgorithmChange {
    let plateau = metrics.in_metrics_plateau;
    let threshold_met = metrics.cumulative_drc_free >= drc_free_threshold;
    let free_fraction = metrics.drc_free_window_fraction();
    let spaced =
        iteration >= metrics.last_algorithm_change + MIN_ITERATIONS_BETWEEN_CHANGES;
    let swap_eligible = metrics.swap_eligible_drc_nets(nets);

    if !plateau || threshold_met || !spaced {
        return AlgorithmChange::None;
    }

    // (1) pseudo-trace congestion near pseudo-vias
    let reductions = metrics.trace_band.num_reductions + metrics.via_band.num_reductions;
    if num_routing_layers > 1
        && free_fraction == 0.0
        && reductions >= 1
        && !pseudo_congestion_targets(metrics, nets, num_routing_layers, pseudo_trace_congestion)
            .is_empty()
    {
        return AlgorithmChange::EnablePseudoTraceCongestion;
    }

    // (2) and (3): congestion sensitivity, gated on swapping being exhausted
    let swapping_exhausted = metrics.num_terminal_swaps >= 3 || swap_eligible == 0;
    if free_fraction <= 0.20 && swapping_exhausted {
        if let Some(direction) = hill_climb_direction(&metrics.via_band) {
            return AlgorithmChange::ChangeViaSensitivity(direction);
        }
        if let Some(direction) = hill_climb_direction(&metrics.trace_band) {
            return AlgorithmChange::ChangeTraceSensitivity(direction);
        }
    }

    // (4) terminal swapping
    if swap_eligible >= 1 && free_fraction <= 0.60 {
        return AlgorithmChange::SwapTerminals;
    }

    AlgorithmChange::None
}

/// Hill-climb with memory: climb while the next level up is unmeasured or measured no
/// worse than the current one, otherwise step back down. Returns `None` when the band is
/// stuck at the bottom below a level that measured worse.
fn hill_climb_direction(band: &SensitivityBand) -> Option<Direction> {
    let current = band.active();
    if band.current + 1 < band.levels.len() {
        let upper = &band.levels[band.current + 1];
        if upper.iteration_measured == 0 || upper.avg_drc_nets <= current.avg_drc_nets {
            return Some(Direction::Increase);
        }
    }
    if band.current > 0 {
        return Some(Direction::Decrease);
    }
    None
}

/// The (pseudo net, routing layer) pairs qualifying for pseudo-trace congestion: the
/// pair's rolling DRC window is all-ones on that inner layer, or on the adjacent top or
/// bottom layer while the mode is already on for the inner layer. Congestion is never
/// deposited on the top and bottom layers themselves.
pub fn pseudo_congestion_targets(
    metrics: &RoutingMetrics,
    nets: &[Net],
    num_routing_layers: usize,
    pseudo_trace_congestion: &[Vec<bool>],
) -> Vec<(usize, usize)> {
    let mut targets = Vec::new();
    for net in nets.iter().filter(|n| n.is_pseudo) {
        for layer in 1..num_routing_layers.saturating_sub(1) {
            let full_here = metrics.full_drc_window(net.id, layer);
            let full_below = layer == 1 && metrics.full_drc_window(net.id, 0);
            let full_above = layer == num_routing_layers - 2
                && metrics.full_drc_window(net.id, num_routing_layers - 1);
            let already_on = pseudo_trace_congestion[net.id][layer];
            if full_here || ((full_below || full_above) && already_on) {
                targets.push((net.id, layer));
            }
        }
    }
    targets
}
