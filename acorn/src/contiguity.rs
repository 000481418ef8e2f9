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

//! # Contiguity Reconstruction
//!
//! The pathfinder may emit knight moves, whose endpoints are not cell-adjacent. Before
//! congestion deposition and DRC analysis, every path is expanded into a dense,
//! cell-adjacent sequence on the same layers with the same endpoints. The expansion is
//! purely geometric and deterministic: gaps are filled by stepping diagonally toward the
//! target first, falling back to the x and then the y direction whenever the preferred
//! step would enter a barrier.

use crate::map::{Coord, RoutingGrid};

/// Expand a sparse path (which may contain knight-move gaps) into a cell-adjacent
/// sequence. The input must start at the path's start terminal; the output contains every
/// cell from start to end inclusive and never enters an unwalkable cell beyond those
/// already present in the input.
pub fn make_contiguous(grid: &RoutingGrid, sparse: &[Coord]) -> Vec<Coord> {
    let mut out: Vec<Coord> = Vec::with_capacity(sparse.len() * 2);
    let mut iter = sparse.iter();
    let first = match iter.next() {
        Some(c) => *c,
        None => return out,
    };
    out.push(first);

    for &target in iter {
        let mut cur = *out.last().expect("output starts non-empty");
        while cur != target {
            cur = if cur.z != target.z {
                // vertical gap: step one z-slice at a time
                let dz = if target.z > cur.z { 1 } else { -1 };
                Coord::new(cur.x, cur.y, (cur.z as isize + dz) as usize)
            } else {
                step_toward(grid, cur, target)
            };
            out.push(cur);
        }
    }
    out
}

/// One lateral step from `cur` toward `target`: diagonal when possible, otherwise x
/// before y, preferring walkable cells.
fn step_toward(grid: &RoutingGrid, cur: Coord, target: Coord) -> Coord {
    let sx = (target.x as isize - cur.x as isize).signum();
    let sy = (target.y as isize - cur.y as isize).signum();
    let candidates = [
        (sx, sy), // diagonal
        (sx, 0),
        (0, sy),
    ];
    let mut first_valid = None;
    for &(dx, dy) in candidates.iter() {
        if dx == 0 && dy == 0 {
            continue;
        }
        let c = Coord::new(
            (cur.x as isize + dx) as usize,
            (cur.y as isize + dy) as usize,
            cur.z,
        );
        if first_valid.is_none() {
            first_valid = Some(c);
        }
        if grid.is_walkable(c) {
            return c;
        }
    }
    // all candidates blocked: take the geometric step anyway so the path stays connected
    first_valid.expect("cur != target implies at least one candidate")
}
