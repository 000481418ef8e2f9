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

#![deny(missing_docs)]

//! # Acorn: Iterative Multi-Layer PCB Autorouting
//!
//! This is a library for routing a netlist of source/sink terminal pairs on a 3D cell
//! grid representing a multi-layer printed circuit board. Routed paths must connect all
//! terminals, obey per-layer and per-net design rules (trace width, via diameter, and
//! spacings), and minimize routing cost while accumulating a configurable number of
//! design-rule-clean iterations.
//!
//! The heart of the library is the iterative *rip-up-and-reroute* loop: every iteration
//! re-routes all nets from scratch against the congestion that previous iterations left
//! behind on the map. Congestion partially evaporates before each pass and is
//! re-deposited along the freshly routed paths, so contested cells become gradually more
//! expensive until the competing nets spread out. When the routing metrics stop
//! improving, the loop escapes the plateau with one of four algorithmic interventions.
//!
//! ## Structure
//!
//! This library is structured in the following way:
//!
//! - **[`Map`](map)**: The 3D routing grid. Even z-slices are routing layers, odd
//!   z-slices are the via layers between them. Cells carry the painted design-rule,
//!   barrier, cost and pin-swap state, plus the trace and via congestion accumulators.
//!
//! - **[`Netlist`](netlist)**: User-declared nets plus one synthesized *pseudo net* per
//!   differential pair. Pseudo nets are routed like normal nets along the pair's
//!   centerline; their two *child* nets are never routed directly.
//!
//! - **[`Pathfinder`](pathfinder)**: The single-net pathfinding collaborator, called in
//!   parallel for every non-child net. It reads the shared grid and writes only into its
//!   per-thread workspace. [`GridRouter`](pathfinder::GridRouter) is the provided
//!   congestion-aware A* implementation.
//!
//! - **[`Contiguity`](contiguity)**: Deterministic expansion of pathfinder output (which
//!   may contain knight-move gaps) into dense cell-adjacent sequences.
//!
//! - **[`DiffPairs`](diff_pairs)**: The post-processor expanding each routed pseudo net
//!   into two parallel child paths at the pair's pitch.
//!
//! - **[`Routability`](routability)**: Per-iteration metrics (DRC cells, cost, length),
//!   the rolling 20-bit per-layer DRC history of every net, the congestion-sensitivity
//!   bands with their rolling statistics, the plateau detector, and the best-iteration
//!   pointer.
//!
//! - **[`Algorithm`](algorithm)**: The intervention selector, a pure function choosing at
//!   most one of: terminal swapping, via-sensitivity change, trace-sensitivity change, or
//!   pseudo-trace congestion deposition near crowded pseudo-vias.
//!
//! - **[`Engine`](engine)**: The iteration controller orchestrating all of the above and
//!   deciding termination.
//!
//! - **[`Report`](report)**: The sink trait consuming pre-routing, per-iteration and
//!   final snapshots; rendering is a collaborator outside the core.
//!
//! ## Usage
//!
//! ```
//! use acorn::input::{InputConfig, NetDef, Terminal};
//! use acorn::report::NullReport;
//! use acorn::Error;
//!
//! fn main() -> Result<(), Error> {
//!     let mut inputs = InputConfig::new(16, 16, 1);
//!     inputs.nets.push(NetDef::new(
//!         "data0",
//!         Terminal { x: 1, y: 8, layer: 0 },
//!         Terminal { x: 14, y: 8, layer: 0 },
//!     ));
//!     inputs.user_drc_free_threshold = 1;
//!
//!     let outcome = acorn::route(inputs, None, &mut NullReport)?;
//!     assert!(outcome.solved);
//!     Ok(())
//! }
//! ```

pub mod algorithm;
pub mod contiguity;
pub mod diff_pairs;
mod engine;
mod error;
pub mod input;
pub mod map;
pub mod netlist;
pub mod pathfinder;
pub mod report;
pub mod routability;

// test modules
mod test;

pub use engine::{Engine, RoutingOutcome};
pub use error::{ConfigError, Error};

use report::ReportSink;

/// # Route a netlist
///
/// This is the main function to interact with the system: build the routing engine from
/// the user inputs and run the rip-up-and-reroute loop to completion. `num_threads`
/// defaults to the number of logical CPUs.
pub fn route(
    inputs: input::InputConfig,
    num_threads: Option<usize>,
    report: &mut dyn ReportSink,
) -> Result<RoutingOutcome, Error> {
    let mut engine = Engine::new(inputs, num_threads)?;
    engine.route(report)
}
