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

//! # Report Sinks
//!
//! Report rendering (HTML tables of contents, PNG maps) is a collaborator outside the
//! core. The iteration controller only depends on the [`ReportSink`] trait, to which it
//! pushes a pre-routing snapshot at startup, one snapshot per iteration, and a final run
//! summary. All snapshot types expose typed accessors over borrowed engine state; the
//! sink decides what (if anything) to render from them.

use crate::input::InputConfig;
use crate::map::{DesignRuleConflict, RoutingGrid};
use crate::netlist::Net;
use crate::routability::{DrcDetail, IterationRecord, PathResult};

use log::*;
use std::time::Duration;

/// The static map as painted at startup, before any routing.
#[derive(Debug)]
pub struct PrerouteSnapshot<'a> {
    /// The painted grid (design-rule zones, barriers, cost zones, pin-swap zones)
    pub grid: &'a RoutingGrid,
    /// The user inputs
    pub inputs: &'a InputConfig,
    /// Via-diameter conflicts detected between adjacent layers
    pub conflicts: &'a [DesignRuleConflict],
    /// The derived DRC-free threshold of this run
    pub drc_free_threshold: usize,
}

/// The state of one completed iteration.
#[derive(Debug)]
pub struct IterationSnapshot<'a> {
    /// 1-based iteration number
    pub iteration: usize,
    /// Aggregated metrics of this iteration
    pub record: &'a IterationRecord,
    /// The netlist
    pub nets: &'a [Net],
    /// Per-net routed geometry and statistics
    pub paths: &'a [PathResult],
    /// Retained DRC details (bounded buffer)
    pub drc_details: &'a [DrcDetail],
    /// The grid, including the congestion state after deposition
    pub grid: &'a RoutingGrid,
    /// Best iteration so far
    pub best_iteration: Option<usize>,
    /// DRC-free iterations accumulated so far
    pub cumulative_drc_free: usize,
}

/// The final summary of a routing run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Whether the DRC-free threshold was met
    pub solved: bool,
    /// Iteration with the best routing metrics
    pub best_iteration: Option<usize>,
    /// Number of iterations actually run
    pub iterations_run: usize,
    /// DRC-free iterations accumulated
    pub cumulative_drc_free: usize,
    /// The threshold that had to be reached
    pub drc_free_threshold: usize,
    /// Number of cells with design-rule conflicts between adjacent layers
    pub design_rule_conflicts: usize,
    /// Total cells explored by the pathfinder
    pub total_explored: u64,
    /// Total wall-clock time
    pub total_elapsed: Duration,
}

/// Consumer of per-iteration routing snapshots.
pub trait ReportSink {
    /// Called once before the routing loop, with the painted static map.
    fn preroute(&mut self, snapshot: &PrerouteSnapshot);

    /// Called after every completed iteration.
    fn iteration(&mut self, snapshot: &IterationSnapshot);

    /// Called once after the loop terminates.
    fn finished(&mut self, summary: &RunSummary);
}

/// A sink that discards every snapshot. Used by tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReport;

impl ReportSink for NullReport {
    fn preroute(&mut self, _snapshot: &PrerouteSnapshot) {}
    fn iteration(&mut self, _snapshot: &IterationSnapshot) {}
    fn finished(&mut self, _summary: &RunSummary) {}
}

/// A sink that renders every snapshot through the `log` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReport;

impl ReportSink for LogReport {
    fn preroute(&mut self, snapshot: &PrerouteSnapshot) {
        info!(
            "Map is {}x{} cells on routing layers [{}]; {} nets; {} pin-swap zones; \
             requires {} DRC-free iterations",
            snapshot.grid.width(),
            snapshot.grid.height(),
            snapshot.inputs.layer_names.join(", "),
            snapshot.inputs.nets.len(),
            snapshot.grid.num_swap_zones(),
            snapshot.drc_free_threshold,
        );
        if !snapshot.conflicts.is_empty() {
            error!(
                "{} cells carry conflicting via diameters between adjacent layers",
                snapshot.conflicts.len()
            );
        }
    }

    fn iteration(&mut self, snapshot: &IterationSnapshot) {
        info!(
            "Iteration {}: {} DRC cells ({} non-pseudo), cost {:.0}, length {:.1}, \
             peak congestion {:.0}, {} DRC-free so far, best iteration {:?}",
            snapshot.iteration,
            snapshot.record.drc_cells,
            snapshot.record.non_pseudo_drc_cells,
            snapshot.record.non_pseudo_cost,
            snapshot.record.non_pseudo_length,
            snapshot.grid.max_trace_congestion(),
            snapshot.cumulative_drc_free,
            snapshot.best_iteration,
        );
        for detail in snapshot.drc_details.iter().take(5) {
            debug!(
                "  DRC at ({}, {}, {}): net {} vs net {}",
                detail.coord.x, detail.coord.y, detail.coord.z, detail.net, detail.other
            );
        }
    }

    fn finished(&mut self, summary: &RunSummary) {
        if summary.solved {
            info!(
                "Solution found in {:?} with {} cells explored. Best iteration is {:?}.",
                summary.total_elapsed, summary.total_explored, summary.best_iteration
            );
        } else {
            error!(
                "No solution after {} iterations ({} of {} DRC-free). Best iteration is {:?}.",
                summary.iterations_run,
                summary.cumulative_drc_free,
                summary.drc_free_threshold,
                summary.best_iteration
            );
        }
    }
}
