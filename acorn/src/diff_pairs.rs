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

//! # Diff-Pair Post-Processing
//!
//! A differential pair is routed as a single *pseudo net* along its centerline. After all
//! pseudo nets of an iteration are routed, the post-processor expands each pseudo path
//! into two parallel child paths at the pair's pitch. The expansion runs after the
//! pathfinding join barrier and before routability metrics, and writes into the children's
//! path-result slots exactly as the direct pathfinder would.
//!
//! The expander is a collaborator: the iteration controller only depends on the
//! [`DiffPairExpander`] trait. [`ParallelShiftExpander`] is the provided implementation,
//! which offsets every centerline cell perpendicular to the local path direction by half
//! the pitch and snaps the child endpoints onto the true child terminals.

use crate::map::{Coord, RoutingGrid};
use crate::netlist::Net;

/// The diff-pair expansion contract. Given a routed pseudo net and its centerline path
/// (as returned by the pathfinder), produce the geometries of the two child nets.
pub trait DiffPairExpander: Send + Sync {
    /// Expand `pseudo`'s centerline into the paths of its two children, in child order
    /// `(first, second)` as recorded in [`Net::children`].
    fn expand(
        &self,
        grid: &RoutingGrid,
        pseudo: &Net,
        child_a: &Net,
        child_b: &Net,
        centerline: &[Coord],
    ) -> (Vec<Coord>, Vec<Coord>);
}

/// Expands a pseudo path by shifting it perpendicular to its local direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelShiftExpander;

impl ParallelShiftExpander {
    /// Create a new expander.
    pub fn new() -> Self {
        Self
    }

    /// Shift one centerline cell sideways by `offset` cells, clamped to the map.
    fn shift(grid: &RoutingGrid, c: Coord, normal: (isize, isize), offset: isize) -> Coord {
        let x = (c.x as isize + normal.0 * offset)
            .max(0)
            .min(grid.width() as isize - 1);
        let y = (c.y as isize + normal.1 * offset)
            .max(0)
            .min(grid.height() as isize - 1);
        Coord::new(x as usize, y as usize, c.z)
    }

    /// Unit normal of the centerline at position `i`, derived from the neighboring cells.
    fn normal_at(centerline: &[Coord], i: usize) -> (isize, isize) {
        let prev = if i == 0 { centerline[0] } else { centerline[i - 1] };
        let next = if i + 1 >= centerline.len() { centerline[i] } else { centerline[i + 1] };
        let dx = (next.x as isize - prev.x as isize).signum();
        let dy = (next.y as isize - prev.y as isize).signum();
        if dx == 0 && dy == 0 {
            // vertical (via) segment: keep the previous lateral orientation
            (0, 1)
        } else {
            (-dy, dx)
        }
    }

    fn one_side(
        grid: &RoutingGrid,
        child: &Net,
        centerline: &[Coord],
        offset: isize,
    ) -> Vec<Coord> {
        let mut path: Vec<Coord> = Vec::with_capacity(centerline.len() + 4);
        path.push(child.start);
        let mut last_normal = (0isize, 1isize);
        for (i, &c) in centerline.iter().enumerate() {
            // via cells keep the orientation of the preceding lateral segment
            if c.is_routing_layer() {
                last_normal = Self::normal_at(centerline, i);
            }
            let shifted = Self::shift(grid, c, last_normal, offset);
            if path.last() != Some(&shifted) {
                path.push(shifted);
            }
        }
        if path.last() != Some(&child.end) {
            path.push(child.end);
        }
        path
    }
}

impl DiffPairExpander for ParallelShiftExpander {
    fn expand(
        &self,
        grid: &RoutingGrid,
        pseudo: &Net,
        child_a: &Net,
        child_b: &Net,
        centerline: &[Coord],
    ) -> (Vec<Coord>, Vec<Coord>) {
        let half_pitch = (pseudo.pitch / 2.0).round().max(1.0) as isize;
        if centerline.is_empty() {
            return (vec![child_a.start, child_a.end], vec![child_b.start, child_b.end]);
        }
        // assign each child the side of the centerline its start terminal lies on
        let normal = Self::normal_at(centerline, 0);
        let plus = Self::shift(grid, centerline[0], normal, half_pitch);
        let minus = Self::shift(grid, centerline[0], normal, -half_pitch);
        let a_on_plus_side =
            plus.lateral_distance(&child_a.start) <= minus.lateral_distance(&child_a.start);
        let sign_a = if a_on_plus_side { half_pitch } else { -half_pitch };
        let a = Self::one_side(grid, child_a, centerline, sign_a);
        let b = Self::one_side(grid, child_b, centerline, -sign_a);
        (a, b)
    }
}
