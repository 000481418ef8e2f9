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

//! # Routability Metrics
//!
//! Everything the iteration controller knows about the *goodness* of the routing lives
//! here: per-net path results, per-iteration totals, the rolling per-layer DRC history of
//! every net, the congestion-sensitivity bands with their rolling statistics, the plateau
//! detector, and the best-iteration pointer.
//!
//! The rolling DRC history is a fixed-width 20-bit mask per net and routing layer: bit
//! `i` records whether the net had a DRC on that layer `i` iterations ago. All plateau
//! predicates and intervention gates look at this 20-iteration window, so the width is a
//! load-bearing constant, not a tunable.
//!
//! Metric computation runs in the controller's single-threaded phase, after the
//! pathfinding join barrier: it rebuilds the per-cell occupancy scratch, scans for
//! design-rule violations, shifts the DRC history, aggregates totals, deposits congestion
//! along the freshly routed paths, and refreshes the statistics of the currently active
//! sensitivity levels.

use crate::input::{InputConfig, ONE_TRAVERSAL};
use crate::map::{Coord, RoutingGrid};
use crate::netlist::Net;

use log::*;
use std::time::Duration;

/// Width of the rolling DRC window, in iterations.
pub const DRC_WINDOW: usize = 20;

/// Bit mask selecting the rolling DRC window.
pub const DRC_WINDOW_MASK: u32 = 0x000F_FFFF;

/// The discrete congestion-sensitivity ladder, in percent of the nominal sensitivity.
pub const SENSITIVITY_LEVELS: [u32; 5] = [100, 140, 200, 280, 400];

/// A sensitivity band is stationary when the standard error of its tracked statistics
/// falls below this fraction of their mean.
pub const PLATEAU_STD_ERR_FRACTION: f64 = 0.03;

/// Minimum number of iterations between two algorithm changes of any kind.
pub const MIN_ITERATIONS_BETWEEN_CHANGES: usize = 60;

/// Upper bound on retained DRC details per iteration. The full violation list can run to
/// hundreds of thousands of entries; everything beyond this cap is counted but discarded.
pub const MAX_RECORDED_DRCS: usize = 1000;

/// The routed geometry and statistics of one net in the current iteration.
#[derive(Debug, Clone, Default)]
pub struct PathResult {
    /// Path as returned by the pathfinder (may contain knight-move gaps)
    pub cells: Vec<Coord>,
    /// Cell-adjacent expansion of `cells`
    pub contiguous: Vec<Coord>,
    /// Total path cost
    pub cost: f64,
    /// Cells explored while finding the path
    pub explored: u64,
    /// Wall-clock time spent finding the path
    pub elapsed: Duration,
    /// Number of this net's cells involved in a DRC this iteration
    pub drc_cells: usize,
    /// Lateral path length in cell units
    pub length: f64,
    /// Number of via-layer cells traversed
    pub via_count: usize,
}

/// A recorded design-rule violation: a cell of `net` conflicting with `other`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrcDetail {
    /// The violating cell
    pub coord: Coord,
    /// Net owning the violating cell
    pub net: u32,
    /// The conflicting net
    pub other: u32,
}

/// Which intervention (if any) was triggered for an iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InterventionFlags {
    /// Start/end terminals of DRC nets were swapped
    pub swapped_terminals: bool,
    /// The via congestion sensitivity was changed
    pub changed_via_sensitivity: bool,
    /// The trace congestion sensitivity was changed
    pub changed_trace_sensitivity: bool,
    /// Pseudo-trace congestion deposition near pseudo-vias was enabled
    pub enabled_pseudo_trace_congestion: bool,
}

impl InterventionFlags {
    /// Number of flags set. The invariant is that at most one is set per iteration.
    pub fn count(&self) -> usize {
        self.swapped_terminals as usize
            + self.changed_via_sensitivity as usize
            + self.changed_trace_sensitivity as usize
            + self.enabled_pseudo_trace_congestion as usize
    }
}

/// Aggregated metrics of one iteration.
#[derive(Debug, Clone, Default)]
pub struct IterationRecord {
    /// Total DRC cells over all nets, including pseudo nets
    pub drc_cells: usize,
    /// DRC cells over non-pseudo nets (diff-pair children counted, pseudo excluded)
    pub non_pseudo_drc_cells: usize,
    /// Number of non-pseudo nets with at least one DRC
    pub non_pseudo_drc_nets: usize,
    /// Total routing cost over all nets
    pub cost: f64,
    /// Routing cost over non-pseudo nets
    pub non_pseudo_cost: f64,
    /// Lateral path length over non-pseudo nets
    pub non_pseudo_length: f64,
    /// Wall-clock time of the iteration
    pub elapsed: Duration,
    /// The iteration had zero non-pseudo DRC cells
    pub drc_free: bool,
    /// Which intervention was triggered for this iteration
    pub interventions: InterventionFlags,
}

/// Rolling statistics of one congestion-sensitivity level.
#[derive(Debug, Clone, Default)]
pub struct SensitivityLevel {
    /// Sensitivity value in percent, used as a multiplier scalar
    pub percent: u32,
    /// Iteration at which these statistics were last refreshed (0 = never)
    pub iteration_measured: usize,
    /// Fraction of the recent window that was DRC-free at this level
    pub fraction_drc_free: f64,
    /// Mean number of non-pseudo nets with DRCs
    pub avg_drc_nets: f64,
    /// Standard error of the non-pseudo DRC-net count
    pub std_err_drc_nets: f64,
    /// Mean non-pseudo routing cost
    pub avg_routing_cost: f64,
    /// Standard error of the non-pseudo routing cost
    pub std_err_routing_cost: f64,
    /// Number of plateau events observed at this level
    pub plateau_events: usize,
}

/// One congestion-sensitivity band (trace or via): the ladder of discrete levels, the
/// currently active level and its bookkeeping.
#[derive(Debug, Clone)]
pub struct SensitivityBand {
    /// The ladder of levels, lowest sensitivity first
    pub levels: Vec<SensitivityLevel>,
    /// Index of the active level
    pub current: usize,
    /// Iteration at which the active level was entered
    pub entered_iteration: usize,
    /// Whether the band is currently in a metrics plateau
    pub in_plateau: bool,
    /// Total number of sensitivity changes on this band
    pub num_changes: usize,
    /// Number of sensitivity *reductions* on this band
    pub num_reductions: usize,
}

/// Step direction on a sensitivity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Move one level up the ladder
    Increase,
    /// Move one level down the ladder
    Decrease,
}

impl SensitivityBand {
    /// A band over [`SENSITIVITY_LEVELS`], starting at the lowest level.
    pub fn new() -> Self {
        Self {
            levels: SENSITIVITY_LEVELS
                .iter()
                .map(|&percent| SensitivityLevel { percent, ..Default::default() })
                .collect(),
            current: 0,
            entered_iteration: 1,
            in_plateau: false,
            num_changes: 0,
            num_reductions: 0,
        }
    }

    /// Sensitivity of the active level, in percent.
    pub fn percent(&self) -> u32 {
        self.levels[self.current].percent
    }

    /// The active level.
    pub fn active(&self) -> &SensitivityLevel {
        &self.levels[self.current]
    }

    /// Move the active level by one step. The new level takes effect with the next
    /// iteration, which also restarts its statistics window.
    pub fn step(&mut self, direction: Direction, iteration: usize) {
        match direction {
            Direction::Increase => self.current += 1,
            Direction::Decrease => {
                self.current -= 1;
                self.num_reductions += 1;
            }
        }
        self.num_changes += 1;
        self.entered_iteration = iteration + 1;
        self.in_plateau = false;
    }

    /// Erase the statistics of every level. Used when a new routing mode makes all
    /// previously measured metrics stale.
    pub fn reset_statistics(&mut self) {
        for level in &mut self.levels {
            level.iteration_measured = 0;
            level.fraction_drc_free = 0.0;
            level.avg_drc_nets = 0.0;
            level.std_err_drc_nets = 0.0;
            level.avg_routing_cost = 0.0;
            level.std_err_routing_cost = 0.0;
        }
    }
}

impl Default for SensitivityBand {
    fn default() -> Self {
        Self::new()
    }
}

/// All routing metrics accumulated over the run.
#[derive(Debug, Clone)]
pub struct RoutingMetrics {
    num_routing_layers: usize,
    /// One result slot per net, overwritten every iteration
    pub paths: Vec<PathResult>,
    /// Rolling 20-bit DRC history per net and routing layer
    pub recent_drc_by_layer: Vec<Vec<u32>>,
    /// One record per completed iteration (index = iteration - 1)
    pub iterations: Vec<IterationRecord>,
    /// The trace congestion-sensitivity band
    pub trace_band: SensitivityBand,
    /// The via congestion-sensitivity band
    pub via_band: SensitivityBand,
    /// Iteration with the best routing metrics so far
    pub best_iteration: Option<usize>,
    best_drc_cells: usize,
    best_cost: f64,
    /// Number of DRC-free iterations accumulated so far
    pub cumulative_drc_free: usize,
    /// Iteration at which the DRC-free threshold was first met
    pub threshold_met_iteration: Option<usize>,
    /// Whether the current iteration is in a metrics plateau (either band)
    pub in_metrics_plateau: bool,
    /// Iteration of the last algorithm change of any kind (0 = never)
    pub last_algorithm_change: usize,
    /// Number of terminal-swap rounds performed
    pub num_terminal_swaps: usize,
    /// Retained DRC details of the current iteration (capped at [`MAX_RECORDED_DRCS`])
    pub drc_details: Vec<DrcDetail>,
    /// Total cells explored over the whole run
    pub total_explored: u64,
}

impl RoutingMetrics {
    /// Allocate metrics for `num_nets` nets on `num_routing_layers` routing layers.
    pub fn new(num_nets: usize, num_routing_layers: usize) -> Self {
        Self {
            num_routing_layers,
            paths: vec![PathResult::default(); num_nets],
            recent_drc_by_layer: vec![vec![0; num_routing_layers]; num_nets],
            iterations: Vec::new(),
            trace_band: SensitivityBand::new(),
            via_band: SensitivityBand::new(),
            best_iteration: None,
            best_drc_cells: usize::MAX,
            best_cost: f64::INFINITY,
            cumulative_drc_free: 0,
            threshold_met_iteration: None,
            in_metrics_plateau: false,
            last_algorithm_change: 0,
            num_terminal_swaps: 0,
            drc_details: Vec::new(),
            total_explored: 0,
        }
    }

    /// The record of a given 1-based iteration.
    pub fn record(&self, iteration: usize) -> &IterationRecord {
        &self.iterations[iteration - 1]
    }

    /// Returns `true` if the given net has had a DRC on `layer` in each of the last 20
    /// iterations.
    pub fn full_drc_window(&self, net: usize, layer: usize) -> bool {
        self.recent_drc_by_layer[net][layer] & DRC_WINDOW_MASK == DRC_WINDOW_MASK
    }

    /// Fraction of the last 20 iterations that were DRC-free.
    pub fn drc_free_window_fraction(&self) -> f64 {
        let window = self.iterations.len().min(DRC_WINDOW);
        if window == 0 {
            return 0.0;
        }
        let free =
            self.iterations.iter().rev().take(window).filter(|r| r.drc_free).count();
        free as f64 / window as f64
    }

    /// Returns `true` if `net` (a non-child net) or any of its diff-pair children holds a
    /// DRC in the current iteration.
    pub fn net_has_drc(&self, nets: &[Net], net: usize) -> bool {
        if self.paths[net].drc_cells > 0 {
            return true;
        }
        if let Some((a, b)) = nets[net].children {
            return self.paths[a].drc_cells > 0 || self.paths[b].drc_cells > 0;
        }
        false
    }

    /// Count the DRC-holding nets currently eligible for the terminal-swap intervention.
    pub fn swap_eligible_drc_nets(&self, nets: &[Net]) -> usize {
        nets.iter()
            .filter(|n| n.is_routed_directly() && n.swappable && self.net_has_drc(nets, n.id))
            .count()
    }

    /// Record the intervention flags chosen for an iteration.
    pub fn set_intervention_flags(&mut self, iteration: usize, flags: InterventionFlags) {
        debug_assert!(flags.count() <= 1, "at most one intervention per iteration");
        self.iterations[iteration - 1].interventions = flags;
    }

    /// Compute all metrics for the just-routed iteration: occupancy, DRC scan, rolling
    /// DRC history, aggregates, congestion deposition (when `deposit` is set), and the
    /// statistics refresh of the active sensitivity levels.
    #[allow(clippy::too_many_arguments)]
    pub fn analyze_iteration(
        &mut self,
        iteration: usize,
        nets: &[Net],
        grid: &mut RoutingGrid,
        inputs: &InputConfig,
        drc_free_threshold: usize,
        deposit: bool,
        pseudo_trace_congestion: &[Vec<bool>],
    ) {
        // rebuild the per-cell occupancy scratch from this iteration's contiguous paths
        grid.clear_occupancy();
        for net in nets {
            for &c in &self.paths[net.id].contiguous {
                grid.add_occupant(c, net.id as u32);
            }
        }

        // DRC scan and geometric statistics per net
        self.drc_details.clear();
        let mut layer_flags: Vec<Vec<bool>> =
            vec![vec![false; self.num_routing_layers]; nets.len()];
        for net in nets {
            let (drc_cells, length, via_count) =
                self.scan_net(net, nets, grid, inputs, &mut layer_flags);
            let path = &mut self.paths[net.id];
            path.drc_cells = drc_cells;
            path.length = length;
            path.via_count = via_count;
        }

        // children contribute their DRC layers to their pseudo parent
        for net in nets.iter().filter(|n| n.is_diff_pair_child) {
            if let Some(parent) = net.pseudo_parent {
                for layer in 0..self.num_routing_layers {
                    if layer_flags[net.id][layer] {
                        layer_flags[parent][layer] = true;
                    }
                }
            }
        }

        // shift the rolling DRC window
        for net in 0..nets.len() {
            for layer in 0..self.num_routing_layers {
                let history = &mut self.recent_drc_by_layer[net][layer];
                *history = ((*history << 1) | layer_flags[net][layer] as u32) & DRC_WINDOW_MASK;
            }
        }

        // aggregate
        let mut record = IterationRecord::default();
        for net in nets {
            let path = &self.paths[net.id];
            record.drc_cells += path.drc_cells;
            record.cost += path.cost;
            if !net.is_pseudo {
                record.non_pseudo_drc_cells += path.drc_cells;
                record.non_pseudo_cost += path.cost;
                record.non_pseudo_length += path.length;
                if path.drc_cells > 0 {
                    record.non_pseudo_drc_nets += 1;
                }
            }
            self.total_explored += path.explored;
        }
        record.drc_free = record.non_pseudo_drc_cells == 0;
        if record.drc_free {
            self.cumulative_drc_free += 1;
            if self.threshold_met_iteration.is_none()
                && self.cumulative_drc_free >= drc_free_threshold
            {
                self.threshold_met_iteration = Some(iteration);
                info!(
                    "Reached {} DRC-free iterations at iteration {}",
                    drc_free_threshold, iteration
                );
            }
        }
        debug_assert_eq!(self.iterations.len(), iteration - 1);
        self.iterations.push(record);

        // feed the routing back into the map as congestion
        if deposit {
            for net in nets {
                let cells = std::mem::take(&mut self.paths[net.id].contiguous);
                deposit_path_congestion(grid, inputs, &cells);
                self.paths[net.id].contiguous = cells;
            }
            deposit_pseudo_via_trace_congestion(
                grid,
                inputs,
                nets,
                &self.paths,
                pseudo_trace_congestion,
            );
        }

        self.update_band_statistics(iteration);
        self.in_metrics_plateau = self.detect_plateau(iteration);
    }

    /// Scan one net's contiguous path for spacing violations against other nets'
    /// occupancy, and compute its lateral length and via count.
    fn scan_net(
        &mut self,
        net: &Net,
        nets: &[Net],
        grid: &RoutingGrid,
        inputs: &InputConfig,
        layer_flags: &mut [Vec<bool>],
    ) -> (usize, f64, usize) {
        let mut drc_cells = 0;
        let mut length = 0.0;
        let mut via_count = 0;
        let path = &self.paths[net.id];
        let mut prev: Option<Coord> = None;
        let mut details: Vec<DrcDetail> = Vec::new();

        for &c in &path.contiguous {
            if let Some(p) = prev {
                if p.z == c.z {
                    length += p.lateral_distance(&c);
                }
            }
            prev = Some(c);
            if !c.is_routing_layer() {
                via_count += 1;
            }

            let rule = grid.rule_at(&inputs.design_rules, c);
            let radius = if c.is_routing_layer() {
                rule.trace_interaction_radius()
            } else {
                rule.via_interaction_radius()
            };
            let r = radius.ceil() as isize;

            let mut violated = false;
            for dy in -r..=r {
                for dx in -r..=r {
                    if ((dx * dx + dy * dy) as f64) > radius * radius {
                        continue;
                    }
                    let (x, y) = (c.x as isize + dx, c.y as isize + dy);
                    if !grid.contains(x, y, c.z as isize) {
                        continue;
                    }
                    let other = Coord::new(x as usize, y as usize, c.z);
                    for &occupant in &grid.cell(other).occupants {
                        let o = occupant as usize;
                        if o == net.id || net.same_family(&nets[o]) {
                            continue;
                        }
                        // conflicts between two terminal neighborhoods are validated at
                        // startup, not flagged as routing DRCs
                        if net.near_own_terminal(&c) && nets[o].near_own_terminal(&other) {
                            continue;
                        }
                        violated = true;
                        details.push(DrcDetail { coord: c, net: net.id as u32, other: occupant });
                    }
                }
            }
            if violated {
                drc_cells += 1;
                layer_flags[net.id][c.z / 2] = true;
            }
        }

        // bounded DRC-detail buffer: keep the first entries, drop the rest
        let room = MAX_RECORDED_DRCS.saturating_sub(self.drc_details.len());
        self.drc_details.extend(details.into_iter().take(room));

        (drc_cells, length, via_count)
    }

    /// Refresh the rolling statistics of the currently active trace and via sensitivity
    /// levels, over the iterations since each level was last entered (at most 20).
    fn update_band_statistics(&mut self, iteration: usize) {
        let records = &self.iterations;
        for band in &mut [&mut self.trace_band, &mut self.via_band] {
            let first = band.entered_iteration.max(1);
            if iteration < first {
                continue;
            }
            let samples: Vec<&IterationRecord> = (first..=iteration)
                .rev()
                .take(DRC_WINDOW)
                .map(|i| &records[i - 1])
                .collect();
            let drc_nets: Vec<f64> =
                samples.iter().map(|r| r.non_pseudo_drc_nets as f64).collect();
            let costs: Vec<f64> = samples.iter().map(|r| r.non_pseudo_cost).collect();
            let free = samples.iter().filter(|r| r.drc_free).count();

            let level = &mut band.levels[band.current];
            level.iteration_measured = iteration;
            level.fraction_drc_free = free as f64 / samples.len() as f64;
            let (avg, err) = mean_std_err(&drc_nets);
            level.avg_drc_nets = avg;
            level.std_err_drc_nets = err;
            let (avg, err) = mean_std_err(&costs);
            level.avg_routing_cost = avg;
            level.std_err_routing_cost = err;
        }
    }

    /// Evaluate the plateau predicate for both bands and record plateau events.
    fn detect_plateau(&mut self, iteration: usize) -> bool {
        let mut any = false;
        for band in &mut [&mut self.trace_band, &mut self.via_band] {
            let settled = iteration + 1 > band.entered_iteration
                && iteration + 1 - band.entered_iteration >= DRC_WINDOW;
            let level = &band.levels[band.current];
            let stationary = settled
                && level.std_err_drc_nets <= PLATEAU_STD_ERR_FRACTION * level.avg_drc_nets
                && level.std_err_routing_cost
                    <= PLATEAU_STD_ERR_FRACTION * level.avg_routing_cost;
            if stationary && !band.in_plateau {
                band.levels[band.current].plateau_events += 1;
            }
            band.in_plateau = stationary;
            any |= stationary;
        }
        any
    }

    /// Update the best-iteration pointer: fewest non-pseudo DRC cells, ties broken on
    /// lowest non-pseudo cost. Iteration 1 is excluded whenever user cost multipliers
    /// exist, because that iteration deliberately ignores them.
    pub fn update_best_iteration(&mut self, iteration: usize, cost_multipliers_used: bool) {
        if iteration == 1 && cost_multipliers_used {
            return;
        }
        let record = &self.iterations[iteration - 1];
        let better = record.non_pseudo_drc_cells < self.best_drc_cells
            || (record.non_pseudo_drc_cells == self.best_drc_cells
                && record.non_pseudo_cost < self.best_cost);
        if better {
            self.best_iteration = Some(iteration);
            self.best_drc_cells = record.non_pseudo_drc_cells;
            self.best_cost = record.non_pseudo_cost;
        }
    }
}

/// Mean and standard error of a sample.
pub fn mean_std_err(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return (mean, 0.0);
    }
    let var =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n as f64 - 1.0);
    (mean, (var / n as f64).sqrt())
}

/// Deposit congestion along a routed path: the full traversal quantum on every path cell,
/// and half a quantum on the surrounding cells within the governing design rule's
/// interaction radius. The halo is what repels *nearby* competing traces, so spacing
/// violations (not just cell sharing) feed back into the next iteration's costs.
pub fn deposit_path_congestion(grid: &mut RoutingGrid, inputs: &InputConfig, cells: &[Coord]) {
    for &c in cells {
        let rule = grid.rule_at(&inputs.design_rules, c);
        let (radius, is_trace) = if c.is_routing_layer() {
            (rule.trace_interaction_radius(), true)
        } else {
            (rule.via_interaction_radius(), false)
        };
        let r = radius.ceil() as isize;
        for dy in -r..=r {
            for dx in -r..=r {
                if ((dx * dx + dy * dy) as f64) > radius * radius {
                    continue;
                }
                let (x, y) = (c.x as isize + dx, c.y as isize + dy);
                if !grid.contains(x, y, c.z as isize) {
                    continue;
                }
                let target = Coord::new(x as usize, y as usize, c.z);
                let amount =
                    if dx == 0 && dy == 0 { ONE_TRAVERSAL } else { ONE_TRAVERSAL / 2.0 };
                if is_trace {
                    grid.deposit_trace(target, amount);
                } else {
                    grid.deposit_via(target, amount);
                }
            }
        }
    }
}

/// Deposit extra trace congestion around the start- and end-terminals of every non-pseudo
/// net. Terminals are immovable, so keeping competing traces away from them measurably
/// improves routing with closely spaced terminals.
pub fn add_congestion_around_terminals(
    grid: &mut RoutingGrid,
    nets: &[Net],
) {
    for net in nets.iter().filter(|n| !n.is_pseudo) {
        for &terminal in &[net.start, net.end] {
            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    let (x, y) = (terminal.x as isize + dx, terminal.y as isize + dy);
                    if grid.contains(x, y, terminal.z as isize) {
                        grid.deposit_trace(
                            Coord::new(x as usize, y as usize, terminal.z),
                            ONE_TRAVERSAL,
                        );
                    }
                }
            }
        }
    }
}

/// Deposit trace congestion around the pseudo-vias of every (pseudo net, layer) pair for
/// which the pseudo-trace-congestion mode is enabled. The deposited disc has a radius of
/// half a line-width and repels other traces from the crowded via neighborhood.
pub fn deposit_pseudo_via_trace_congestion(
    grid: &mut RoutingGrid,
    inputs: &InputConfig,
    nets: &[Net],
    paths: &[PathResult],
    pseudo_trace_congestion: &[Vec<bool>],
) {
    for net in nets.iter().filter(|n| n.is_pseudo) {
        let flags = &pseudo_trace_congestion[net.id];
        if !flags.iter().any(|&f| f) {
            continue;
        }
        let vias: Vec<Coord> = paths[net.id]
            .contiguous
            .iter()
            .copied()
            .filter(|c| !c.is_routing_layer())
            .collect();
        for (layer, _) in flags.iter().enumerate().filter(|(_, &f)| f) {
            let z = 2 * layer;
            for &via in &vias {
                let rule = grid.rule_at(&inputs.design_rules, Coord::new(via.x, via.y, z));
                let radius = (rule.line_width / 2.0).max(1.0);
                let amount =
                    ONE_TRAVERSAL * (inputs.vert_cost / inputs.cell_cost) / radius;
                let r = radius.ceil() as isize;
                for dy in -r..=r {
                    for dx in -r..=r {
                        if ((dx * dx + dy * dy) as f64).sqrt() > radius {
                            continue;
                        }
                        let (x, y) = (via.x as isize + dx, via.y as isize + dy);
                        if grid.contains(x, y, z as isize) {
                            grid.deposit_trace(Coord::new(x as usize, y as usize, z), amount);
                        }
                    }
                }
            }
        }
    }
}
