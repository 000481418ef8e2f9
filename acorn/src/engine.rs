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

//! # Iteration Controller
//!
//! The outer rip-up-and-reroute loop. Every iteration proceeds through a fixed sequence
//! of phases:
//!
//! 1. advance the iteration counter and recompute the iteration-dependent congestion
//!    multipliers,
//! 2. evaporate congestion (once past the pre-evaporation window),
//! 3. route every non-child net across the worker pool, longest-first,
//! 4. expand pseudo nets into diff-pair children,
//! 5. rebuild contiguous geometry, compute routability metrics and deposit congestion,
//! 6. update the best-iteration pointer, evaluate termination, and apply at most one
//!    algorithm change.
//!
//! The grid is owned by the controller and loaned read-only to the worker pool during
//! pathfinding; workers write only into their own scratch workspaces and their own
//! result slots. Every grid mutation (evaporation, deposition, occupancy, zone state)
//! happens between the join barrier and the next parallel region, in this
//! single-threaded phase.

use crate::algorithm::{
    determine_algorithm_change, pseudo_congestion_targets, AlgorithmChange,
};
use crate::contiguity::make_contiguous;
use crate::diff_pairs::{DiffPairExpander, ParallelShiftExpander};
use crate::error::Error;
use crate::input::InputConfig;
use crate::map::{Coord, DesignRuleConflict, RoutingGrid};
use crate::netlist::{build_netlist, Net};
use crate::pathfinder::{GridRouter, PathWorkspace, Pathfinder, RouterParams, SparsePath};
use crate::report::{IterationSnapshot, PrerouteSnapshot, ReportSink, RunSummary};
use crate::routability::{
    add_congestion_around_terminals, deposit_pseudo_via_trace_congestion, Direction,
    InterventionFlags, PathResult, RoutingMetrics, DRC_WINDOW,
};

use itertools::Itertools;
use log::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// The result of a routing run.
#[derive(Debug, Clone)]
pub struct RoutingOutcome {
    /// The DRC-free threshold was met
    pub solved: bool,
    /// Iteration with the best routing metrics
    pub best_iteration: Option<usize>,
    /// Number of iterations run
    pub iterations_run: usize,
    /// DRC-free iterations accumulated
    pub cumulative_drc_free: usize,
    /// Number of cells with design-rule conflicts between adjacent layers
    pub design_rule_conflicts: usize,
}

/// The iteration controller: owns the grid, the netlist and all routing metrics, and
/// drives the iterative rip-up-and-reroute loop.
pub struct Engine {
    inputs: InputConfig,
    nets: Vec<Net>,
    grid: RoutingGrid,
    metrics: RoutingMetrics,
    pathfinder: Box<dyn Pathfinder>,
    expander: Box<dyn DiffPairExpander>,
    num_threads: usize,
    max_iterations: usize,
    drc_free_threshold: usize,
    trace_congestion_multiplier: f64,
    via_congestion_multiplier: f64,
    /// per-(net, routing layer) pseudo-trace congestion mode flags
    pseudo_trace_congestion: Vec<Vec<bool>>,
    /// pathfinding order for the next iteration (net ids, longest-first)
    sequence: Vec<usize>,
    conflicts: Vec<DesignRuleConflict>,
}

/// `0.20 * level * baseCost * evapRate / (100 - evapRate) / 100`, the startup value of
/// both congestion multipliers.
fn congestion_multiplier_base(inputs: &InputConfig, percent: u32) -> f64 {
    (percent as f64 / 100.0) * inputs.cell_cost * inputs.evaporation_rate
        / (100.0 - inputs.evaporation_rate)
        / 100.0
}

impl Engine {
    /// Build the engine: paint the grid from the declared zones, build and validate the
    /// netlist, detect design-rule conflicts, and initialize the loop state.
    ///
    /// `num_threads` defaults to the number of logical CPUs.
    pub fn new(inputs: InputConfig, num_threads: Option<usize>) -> Result<Self, Error> {
        let mut grid = RoutingGrid::new(&inputs);
        grid.paint_design_rule_zones(&inputs.design_rule_zones);
        grid.paint_barriers(&inputs.barrier_zones);
        grid.paint_cost_zones(&inputs.trace_cost_zones, &inputs.via_cost_zones);
        grid.paint_pin_swap_zones(&inputs.pin_swap_zones);
        let nets = build_netlist(&inputs, &mut grid)?;
        grid.paint_proximity_zones(&inputs.design_rules);

        let conflicts = grid.detect_design_rule_conflicts(&inputs.design_rules);
        let max_iterations = if conflicts.is_empty() {
            inputs.max_iterations
        } else {
            // halt after a single diagnostic iteration
            warn!("Design-rule conflicts detected; limiting the run to one iteration");
            inputs.max_iterations.min(1)
        };

        let drc_free_threshold = inputs.drc_free_threshold();
        info!(
            "Program requires at least {} DRC-free iterations before it terminates",
            drc_free_threshold
        );

        let metrics = RoutingMetrics::new(nets.len(), inputs.num_routing_layers);
        let trace_congestion_multiplier =
            0.20 * congestion_multiplier_base(&inputs, metrics.trace_band.percent());
        let via_congestion_multiplier =
            0.20 * congestion_multiplier_base(&inputs, metrics.via_band.percent());

        let sequence = (0..nets.len()).collect();
        let pseudo_trace_congestion =
            vec![vec![false; inputs.num_routing_layers]; nets.len()];

        Ok(Self {
            inputs,
            nets,
            grid,
            metrics,
            pathfinder: Box::new(GridRouter::new()),
            expander: Box::new(ParallelShiftExpander::new()),
            num_threads: num_threads.unwrap_or_else(num_cpus::get).max(1),
            max_iterations,
            drc_free_threshold,
            trace_congestion_multiplier,
            via_congestion_multiplier,
            pseudo_trace_congestion,
            sequence,
            conflicts,
        })
    }

    /// The routed netlist.
    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    /// The routing metrics accumulated so far.
    pub fn metrics(&self) -> &RoutingMetrics {
        &self.metrics
    }

    /// The routing grid.
    pub fn grid(&self) -> &RoutingGrid {
        &self.grid
    }

    /// Design-rule conflicts detected at startup.
    pub fn design_rule_conflicts(&self) -> &[DesignRuleConflict] {
        &self.conflicts
    }

    /// The derived DRC-free threshold of this run.
    pub fn drc_free_threshold(&self) -> usize {
        self.drc_free_threshold
    }

    /// Run the routing loop to completion.
    pub fn route(&mut self, report: &mut dyn ReportSink) -> Result<RoutingOutcome, Error> {
        let run_start = Instant::now();
        report.preroute(&PrerouteSnapshot {
            grid: &self.grid,
            inputs: &self.inputs,
            conflicts: &self.conflicts,
            drc_free_threshold: self.drc_free_threshold,
        });

        let cost_multipliers_used = self.grid.cost_multipliers_used();
        let mut solved = false;
        let mut iteration = 0;

        while iteration < self.max_iterations && !solved {
            iteration += 1;
            let iteration_start = Instant::now();
            info!("Starting iteration {}...", iteration);

            self.update_iteration_dependent_parameters(iteration);

            if iteration > self.inputs.pre_evaporation_iterations {
                debug!(
                    "Evaporating {} percent of congestion from previous iterations",
                    self.inputs.evaporation_rate
                );
                self.grid.evaporate(self.inputs.evaporation_rate);
            }

            // With user cost multipliers in the map, the first iteration is routed
            // without them and without congestion deposition, so the user gets an
            // unbiased rat's-nest baseline.
            let rats_nest = iteration == 1 && cost_multipliers_used;
            if rats_nest {
                info!("Cost multipliers exist: iteration 1 is routed as a rat's nest");
            }

            let params = RouterParams {
                trace_congestion_multiplier: self.trace_congestion_multiplier,
                via_congestion_multiplier: self.via_congestion_multiplier,
                use_cost_multipliers: !rats_nest,
            };
            self.run_pathfinding(params)?;
            self.update_swap_zone_starts();
            self.expand_diff_pairs();
            self.rebuild_contiguity();

            self.metrics.analyze_iteration(
                iteration,
                &self.nets,
                &mut self.grid,
                &self.inputs,
                self.drc_free_threshold,
                !rats_nest,
                &self.pseudo_trace_congestion,
            );
            if !rats_nest {
                add_congestion_around_terminals(&mut self.grid, &self.nets);
            }

            self.metrics.update_best_iteration(iteration, cost_multipliers_used);
            self.resort_sequence();
            self.metrics.iterations[iteration - 1].elapsed = iteration_start.elapsed();

            solved = self.determine_if_solved(iteration);

            let change = determine_algorithm_change(
                &self.metrics,
                &self.nets,
                self.inputs.num_routing_layers,
                iteration,
                self.drc_free_threshold,
                &self.pseudo_trace_congestion,
            );
            let flags = self.apply_algorithm_change(iteration, change);
            self.metrics.set_intervention_flags(iteration, flags);

            report.iteration(&IterationSnapshot {
                iteration,
                record: self.metrics.record(iteration),
                nets: &self.nets,
                paths: &self.metrics.paths,
                drc_details: &self.metrics.drc_details,
                grid: &self.grid,
                best_iteration: self.metrics.best_iteration,
                cumulative_drc_free: self.metrics.cumulative_drc_free,
            });
        }

        let outcome = RoutingOutcome {
            solved,
            best_iteration: self.metrics.best_iteration,
            iterations_run: iteration,
            cumulative_drc_free: self.metrics.cumulative_drc_free,
            design_rule_conflicts: self.conflicts.len(),
        };
        report.finished(&RunSummary {
            solved,
            best_iteration: outcome.best_iteration,
            iterations_run: iteration,
            cumulative_drc_free: outcome.cumulative_drc_free,
            drc_free_threshold: self.drc_free_threshold,
            design_rule_conflicts: self.conflicts.len(),
            total_explored: self.metrics.total_explored,
            total_elapsed: run_start.elapsed(),
        });
        Ok(outcome)
    }

    /// Update both congestion multipliers from the iteration number. With
    /// `L = 20 * log10(num_nets)`, the prefactor is 0.20 up to iteration `L`, then grows
    /// linearly to 1.0 at iteration `5L`, after which the multipliers are only changed by
    /// sensitivity interventions.
    fn update_iteration_dependent_parameters(&mut self, iteration: usize) {
        let num_nets = self.nets.iter().filter(|n| !n.is_pseudo).count().max(1);
        let l = 20.0 * (num_nets as f64).log10();
        if l < 1.0 {
            return;
        }
        let prefactor = if (iteration as f64) <= l {
            0.20
        } else if (iteration as f64) <= 5.0 * l {
            iteration as f64 / (5.0 * l)
        } else {
            return;
        };
        self.trace_congestion_multiplier = prefactor
            * congestion_multiplier_base(&self.inputs, self.metrics.trace_band.percent());
        self.via_congestion_multiplier = prefactor
            * congestion_multiplier_base(&self.inputs, self.metrics.via_band.percent());
    }

    /// Route every non-child net across the worker pool. Tasks are claimed in sequence
    /// order (longest-first from the previous iteration) through an atomic cursor; each
    /// worker owns its scratch workspace and collects its own results, which are merged
    /// into the per-net result slots after the join barrier.
    fn run_pathfinding(&mut self, params: RouterParams) -> Result<(), Error> {
        let grid = &self.grid;
        let inputs = &self.inputs;
        let nets = &self.nets;
        let sequence: &[usize] = &self.sequence;
        let pathfinder = &*self.pathfinder;
        let cursor = AtomicUsize::new(0);
        let num_threads = self.num_threads;

        let results: Vec<Vec<(usize, SparsePath, Duration)>> = thread::scope(|scope| {
            let cursor = &cursor;
            let handles: Vec<_> = (0..num_threads)
                .map(|_| {
                    scope.spawn(move || {
                        let mut workspace = PathWorkspace::new(grid.num_cells());
                        let mut found = Vec::new();
                        loop {
                            let slot = cursor.fetch_add(1, Ordering::SeqCst);
                            if slot >= sequence.len() {
                                break;
                            }
                            let net = &nets[sequence[slot]];
                            if !net.is_routed_directly() {
                                continue;
                            }
                            let task_start = Instant::now();
                            let path =
                                pathfinder.find_path(grid, inputs, net, &params, &mut workspace);
                            trace!(
                                "Routed net {} exploring {} cells",
                                net.name,
                                path.explored
                            );
                            found.push((net.id, path, task_start.elapsed()));
                        }
                        found
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for (id, path, elapsed) in results.into_iter().flatten() {
            if path.cost <= 0.0 {
                return Err(Error::NoPathFound(self.nets[id].name.clone()));
            }
            let slot = &mut self.metrics.paths[id];
            slot.cells = path.cells;
            slot.cost = path.cost;
            slot.explored = path.explored;
            slot.elapsed = elapsed;
        }
        Ok(())
    }

    /// For nets starting inside a pin-swap zone, relocate the start terminal to the last
    /// path cell before the path leaves the zone, so subsequent iterations start at the
    /// zone exit.
    fn update_swap_zone_starts(&mut self) {
        for i in 0..self.nets.len() {
            let zone = self.nets[i].start_swap_zone;
            if zone == 0 || self.nets[i].is_diff_pair_child {
                continue;
            }
            let cells = &self.metrics.paths[i].cells;
            let mut last_inside = 0;
            for (j, &c) in cells.iter().enumerate() {
                if self.grid.cell(c).swap_zone == zone {
                    last_inside = j;
                } else {
                    break;
                }
            }
            if last_inside > 0 {
                let trimmed = self.metrics.paths[i].cells[last_inside..].to_vec();
                self.metrics.paths[i].cells = trimmed;
                self.nets[i].start = self.metrics.paths[i].cells[0];
            }
        }
    }

    /// Expand every routed pseudo net into its two diff-pair child paths.
    fn expand_diff_pairs(&mut self) {
        let families: Vec<(usize, usize, usize)> = self
            .nets
            .iter()
            .filter_map(|n| n.children.map(|(a, b)| (n.id, a, b)))
            .collect();
        for (pseudo, a, b) in families {
            let centerline = std::mem::take(&mut self.metrics.paths[pseudo].cells);
            let (path_a, path_b) = self.expander.expand(
                &self.grid,
                &self.nets[pseudo],
                &self.nets[a],
                &self.nets[b],
                &centerline,
            );
            let half_cost = self.metrics.paths[pseudo].cost / 2.0;
            self.metrics.paths[pseudo].cells = centerline;
            self.metrics.paths[a] =
                PathResult { cells: path_a, cost: half_cost, ..Default::default() };
            self.metrics.paths[b] =
                PathResult { cells: path_b, cost: half_cost, ..Default::default() };
        }
    }

    /// Rebuild the contiguous geometry of every routed net.
    fn rebuild_contiguity(&mut self) {
        for i in 0..self.nets.len() {
            if self.metrics.paths[i].cells.is_empty() {
                continue;
            }
            let contiguous = make_contiguous(&self.grid, &self.metrics.paths[i].cells);
            self.metrics.paths[i].contiguous = contiguous;
        }
    }

    /// Stable re-sort of the next pathfinding sequence by descending elapsed time, so the
    /// slowest nets are dispatched first and the pool drains evenly.
    fn resort_sequence(&mut self) {
        let paths = &self.metrics.paths;
        self.sequence.sort_by(|&a, &b| paths[b].elapsed.cmp(&paths[a].elapsed));
        debug!(
            "Sequence of the next path-finding iteration: {}",
            self.sequence
                .iter()
                .filter(|&&id| self.nets[id].is_routed_directly())
                .map(|&id| format!("{} ({:?})", self.nets[id].name, paths[id].elapsed))
                .join(", ")
        );
    }

    /// The termination predicate: the DRC-free threshold has been met, and either the
    /// netlist holds a single routed path, or the metrics are in a plateau, or the
    /// threshold was first met at least 20 iterations ago, or the iteration cap is
    /// reached.
    fn determine_if_solved(&self, iteration: usize) -> bool {
        if self.metrics.cumulative_drc_free < self.drc_free_threshold {
            return false;
        }
        let routed_paths = self.nets.iter().filter(|n| n.is_routed_directly()).count();
        routed_paths == 1
            || self.metrics.in_metrics_plateau
            || self
                .metrics
                .threshold_met_iteration
                .map(|met| iteration >= met + DRC_WINDOW)
                .unwrap_or(false)
            || iteration == self.max_iterations
    }

    /// Apply the chosen algorithm change and return the intervention flags to record for
    /// this iteration. At most one flag is ever set.
    fn apply_algorithm_change(
        &mut self,
        iteration: usize,
        change: AlgorithmChange,
    ) -> InterventionFlags {
        let mut flags = InterventionFlags::default();
        match change {
            AlgorithmChange::None => {}
            AlgorithmChange::SwapTerminals => {
                let eligible: Vec<usize> = self
                    .nets
                    .iter()
                    .filter(|n| {
                        n.is_routed_directly()
                            && n.swappable
                            && self.metrics.net_has_drc(&self.nets, n.id)
                    })
                    .map(|n| n.id)
                    .collect();
                let mut swapped = 0;
                for id in eligible {
                    self.nets[id].swap_terminals();
                    if !self.nets[id].is_pseudo {
                        swapped += 1;
                    }
                    if let Some((a, b)) = self.nets[id].children {
                        self.nets[a].swap_terminals();
                        self.nets[b].swap_terminals();
                        swapped += 2;
                    }
                }
                self.metrics.num_terminal_swaps += 1;
                self.metrics.last_algorithm_change = iteration;
                flags.swapped_terminals = true;
                info!(
                    "Stagnant routing metrics: swapped start/end terminals of {} nets \
                     (swap #{})",
                    swapped, self.metrics.num_terminal_swaps
                );
            }
            AlgorithmChange::ChangeViaSensitivity(direction) => {
                let old = self.metrics.via_band.percent();
                self.metrics.via_band.step(direction, iteration);
                self.via_congestion_multiplier =
                    congestion_multiplier_base(&self.inputs, self.metrics.via_band.percent());
                self.metrics.last_algorithm_change = iteration;
                flags.changed_via_sensitivity = true;
                info!(
                    "Stagnant routing metrics: via congestion sensitivity {} from {}% to {}% \
                     (change #{})",
                    if direction == Direction::Increase { "increased" } else { "reduced" },
                    old,
                    self.metrics.via_band.percent(),
                    self.metrics.via_band.num_changes
                );
            }
            AlgorithmChange::ChangeTraceSensitivity(direction) => {
                let old = self.metrics.trace_band.percent();
                self.metrics.trace_band.step(direction, iteration);
                self.trace_congestion_multiplier = congestion_multiplier_base(
                    &self.inputs,
                    self.metrics.trace_band.percent(),
                );
                self.metrics.last_algorithm_change = iteration;
                flags.changed_trace_sensitivity = true;
                info!(
                    "Stagnant routing metrics: trace congestion sensitivity {} from {}% to {}% \
                     (change #{})",
                    if direction == Direction::Increase { "increased" } else { "reduced" },
                    old,
                    self.metrics.trace_band.percent(),
                    self.metrics.trace_band.num_changes
                );
            }
            AlgorithmChange::EnablePseudoTraceCongestion => {
                let targets = pseudo_congestion_targets(
                    &self.metrics,
                    &self.nets,
                    self.inputs.num_routing_layers,
                    &self.pseudo_trace_congestion,
                );
                let mut toggled_on = 0;
                for &(net, layer) in &targets {
                    if !self.pseudo_trace_congestion[net][layer] {
                        self.pseudo_trace_congestion[net][layer] = true;
                        toggled_on += 1;
                    }
                }
                if toggled_on > 0 {
                    // freshly enabled deposition makes all measured via metrics stale
                    self.metrics.via_band.reset_statistics();
                    info!(
                        "Via sensitivity statistics reset: pseudo-trace congestion newly \
                         enabled for {} (net, layer) pairs",
                        toggled_on
                    );
                }
                deposit_pseudo_via_trace_congestion(
                    &mut self.grid,
                    &self.inputs,
                    &self.nets,
                    &self.metrics.paths,
                    &self.pseudo_trace_congestion,
                );
                self.metrics.last_algorithm_change = iteration;
                flags.enabled_pseudo_trace_congestion = true;
                info!(
                    "Stagnant routing metrics: pseudo-trace congestion deposited for {} \
                     (pseudo net, layer) pairs",
                    targets.len()
                );
            }
        }
        flags
    }

    /// Expose a terminal coordinate for inspection, mainly for tests and reports.
    pub fn terminal_of(&self, net: usize) -> (Coord, Coord) {
        (self.nets[net].start, self.nets[net].end)
    }
}
