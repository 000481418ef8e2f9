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

//! Module containing all error types

use crate::map::Coord;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Error in the user-provided configuration, detected before or at the start of the
    /// routing loop.
    #[error("Configuration Error: {0}")]
    ConfigError(#[from] ConfigError),
    /// The pathfinder returned a path with zero cost for a net. This means no route exists
    /// between the terminals, and the routing loop aborts immediately.
    #[error("No path could be found for net {0}!")]
    NoPathFound(String),
}

/// Errors in the user-provided configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The input filename exceeds the maximum supported length.
    #[error("The input filename is too long ({0} bytes, maximum is 300)")]
    FilenameTooLong(usize),
    /// The netlist contains no nets.
    #[error("The netlist contains no nets")]
    EmptyNetlist,
    /// A net references a design-rule set or subset which does not exist.
    #[error("Net {net} references unknown design-rule subset {set}.{subset}")]
    UnknownDesignRule {
        /// Name of the offending net
        net: String,
        /// Referenced design-rule set
        set: usize,
        /// Referenced design-rule subset
        subset: usize,
    },
    /// A terminal lies outside the map or on an unwalkable cell.
    #[error("Terminal {coord:?} of net {net} is not routable")]
    TerminalUnroutable {
        /// Name of the offending net
        net: String,
        /// The unroutable terminal
        coord: Coord,
    },
    /// A diff-pair references a partner net which does not exist.
    #[error("Diff-pair partner {partner} of net {net} does not exist")]
    UnknownDiffPairPartner {
        /// Name of the net declaring the pair
        net: String,
        /// Name of the missing partner
        partner: String,
    },
    /// The terminals of a diff-pair are misaligned (different layers, or too far apart).
    #[error("Diff-pair terminals of nets {net_a} and {net_b} are misaligned: {reason}")]
    DiffPairTerminalMismatch {
        /// First net of the pair
        net_a: String,
        /// Second net of the pair
        net_b: String,
        /// Human-readable reason
        reason: String,
    },
    /// The terminals of two unrelated nets are closer than one trace pitch.
    #[error("Terminals of nets {net_a} and {net_b} are closer than one trace pitch")]
    TerminalsTooClose {
        /// First net
        net_a: String,
        /// Second net
        net_b: String,
    },
}
