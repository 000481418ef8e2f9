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

//! # Netlist
//!
//! The routed netlist: user-declared nets plus one synthesized *pseudo net* per
//! differential pair. A pseudo net represents the pair's centerline; it is routed like a
//! normal net and then expanded into the two *child* nets by the diff-pair post-processor.
//! Child nets are never fed to the pathfinder directly.
//!
//! Pseudo nets and their children form a strict tree (pseudo → child A, child B), stored
//! by index into the netlist rather than by ownership pointers.

use crate::error::ConfigError;
use crate::input::{InputConfig, Terminal};
use crate::map::{Coord, RoutingGrid};

use log::*;

/// A net of the routed netlist.
#[derive(Debug, Clone, PartialEq)]
pub struct Net {
    /// Index of this net in the netlist
    pub id: usize,
    /// Display name
    pub name: String,
    /// Start terminal
    pub start: Coord,
    /// End terminal
    pub end: Coord,
    /// Design-rule set index
    pub rule_set: usize,
    /// Design-rule subset index
    pub rule_subset: usize,
    /// This net is half of a differential pair; its geometry comes from its pseudo parent
    pub is_diff_pair_child: bool,
    /// This net is a synthesized diff-pair centerline
    pub is_pseudo: bool,
    /// Index of the pseudo parent (child nets only)
    pub pseudo_parent: Option<usize>,
    /// Indices of the two children (pseudo nets only)
    pub children: Option<(usize, usize)>,
    /// Diff-pair pitch in cells (pseudo nets and children)
    pub pitch: f64,
    /// Net is eligible for the terminal-swap intervention
    pub swappable: bool,
    /// Pin-swap-zone id of the start terminal (0 = none)
    pub start_swap_zone: u8,
}

impl Net {
    /// Exchange start and end terminals. Applying this twice restores the original net.
    pub fn swap_terminals(&mut self) {
        std::mem::swap(&mut self.start, &mut self.end);
    }

    /// Returns `true` if `c` lies in the immediate neighborhood of one of this net's own
    /// terminals. Conflicts between two such neighborhoods are not counted as routing
    /// DRCs; terminal placement is validated separately at startup.
    pub fn near_own_terminal(&self, c: &Coord) -> bool {
        [self.start, self.end].iter().any(|t| {
            (c.z as isize - t.z as isize).abs() <= 1 && c.lateral_distance(t) <= 1.5
        })
    }

    /// Returns `true` if the pathfinder routes this net directly.
    pub fn is_routed_directly(&self) -> bool {
        !self.is_diff_pair_child
    }

    /// Returns `true` if `other` belongs to the same diff-pair family (same pseudo parent,
    /// the parent itself, or a child of this pseudo net).
    pub fn same_family(&self, other: &Net) -> bool {
        if self.id == other.id {
            return true;
        }
        let family_of = |net: &Net| -> Option<usize> {
            if net.is_pseudo {
                Some(net.id)
            } else {
                net.pseudo_parent
            }
        };
        match (family_of(self), family_of(other)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

fn terminal_coord(t: &Terminal) -> Coord {
    Coord::on_routing_layer(t.x, t.y, t.layer)
}

/// Build the routed netlist from the user inputs.
///
/// This validates every terminal, synthesizes one pseudo net per diff-pair, relocates
/// start terminals into pin-swap zones where applicable, flags swap-eligibility, and
/// marks the near-terminal cells on the grid. The grid must already have its barriers
/// and pin-swap zones painted.
pub fn build_netlist(
    inputs: &InputConfig,
    grid: &mut RoutingGrid,
) -> Result<Vec<Net>, ConfigError> {
    if inputs.nets.is_empty() {
        return Err(ConfigError::EmptyNetlist);
    }

    let mut nets: Vec<Net> = Vec::with_capacity(inputs.nets.len() + inputs.nets.len() / 2);
    for (id, def) in inputs.nets.iter().enumerate() {
        let set = inputs
            .design_rules
            .get(def.rule_set)
            .ok_or_else(|| ConfigError::UnknownDesignRule {
                net: def.name.clone(),
                set: def.rule_set,
                subset: def.rule_subset,
            })?;
        if set.subsets.get(def.rule_subset).is_none() {
            return Err(ConfigError::UnknownDesignRule {
                net: def.name.clone(),
                set: def.rule_set,
                subset: def.rule_subset,
            });
        }
        let start = terminal_coord(&def.start);
        let end = terminal_coord(&def.end);
        for &coord in &[start, end] {
            if !grid.contains(coord.x as isize, coord.y as isize, coord.z as isize)
                || grid.cell(coord).barrier
            {
                return Err(ConfigError::TerminalUnroutable { net: def.name.clone(), coord });
            }
        }
        nets.push(Net {
            id,
            name: def.name.clone(),
            start,
            end,
            rule_set: def.rule_set,
            rule_subset: def.rule_subset,
            is_diff_pair_child: false,
            is_pseudo: false,
            pseudo_parent: None,
            children: None,
            pitch: def.pitch,
            swappable: true,
            start_swap_zone: 0,
        });
    }

    synthesize_pseudo_nets(inputs, &mut nets)?;
    assign_pin_swap_state(grid, &mut nets);
    verify_all_terminals(inputs, &nets)?;

    for net in &nets {
        grid.mark_near_terminal(net.start);
        grid.mark_near_terminal(net.end);
    }

    info!(
        "Netlist holds {} nets, of which {} are pseudo nets for differential pairs",
        nets.len(),
        nets.iter().filter(|n| n.is_pseudo).count()
    );

    Ok(nets)
}

/// Synthesize one pseudo net per declared diff-pair and link the family by index.
fn synthesize_pseudo_nets(inputs: &InputConfig, nets: &mut Vec<Net>) -> Result<(), ConfigError> {
    let name_index: std::collections::HashMap<String, usize> =
        inputs.nets.iter().enumerate().map(|(i, d)| (d.name.clone(), i)).collect();

    for a in 0..inputs.nets.len() {
        let partner_name = match &inputs.nets[a].diff_pair_partner {
            Some(p) => p.clone(),
            None => continue,
        };
        let b = *name_index.get(&partner_name).ok_or_else(|| {
            ConfigError::UnknownDiffPairPartner {
                net: inputs.nets[a].name.clone(),
                partner: partner_name.clone(),
            }
        })?;
        // process each pair only once, from its lower-indexed member
        if b <= a {
            continue;
        }

        verify_diff_pair_terminals(&nets[a], &nets[b])?;

        let pseudo_id = nets.len();
        let pitch = nets[a].pitch.max(nets[b].pitch);
        let start = midpoint(nets[a].start, nets[b].start);
        let end = midpoint(nets[a].end, nets[b].end);
        let pseudo = Net {
            id: pseudo_id,
            name: format!("pseudo({},{})", nets[a].name, nets[b].name),
            start,
            end,
            rule_set: nets[a].rule_set,
            rule_subset: nets[a].rule_subset,
            is_diff_pair_child: false,
            is_pseudo: true,
            pseudo_parent: None,
            children: Some((a, b)),
            pitch,
            swappable: true,
            start_swap_zone: 0,
        };
        nets[a].is_diff_pair_child = true;
        nets[a].pseudo_parent = Some(pseudo_id);
        nets[b].is_diff_pair_child = true;
        nets[b].pseudo_parent = Some(pseudo_id);
        nets.push(pseudo);
    }
    Ok(())
}

/// Verify that the two members of a diff-pair have aligned terminals: same layer at both
/// ends, a positive pitch, and terminals no further apart than five pitches.
fn verify_diff_pair_terminals(a: &Net, b: &Net) -> Result<(), ConfigError> {
    let mismatch = |reason: &str| ConfigError::DiffPairTerminalMismatch {
        net_a: a.name.clone(),
        net_b: b.name.clone(),
        reason: reason.to_string(),
    };
    if a.start.z != b.start.z || a.end.z != b.end.z {
        return Err(mismatch("terminals are on different layers"));
    }
    let pitch = a.pitch.max(b.pitch);
    if pitch <= 0.0 {
        return Err(mismatch("diff-pair pitch must be positive"));
    }
    if a.start.lateral_distance(&b.start) > 5.0 * pitch
        || a.end.lateral_distance(&b.end) > 5.0 * pitch
    {
        return Err(mismatch("terminals are too far apart for the declared pitch"));
    }
    Ok(())
}

/// Record pin-swap-zone membership: a net whose end terminal lies in a swap zone has its
/// terminals exchanged so routing always starts inside the zone, and any net touching a
/// swap zone is ineligible for the terminal-swap intervention.
fn assign_pin_swap_state(grid: &RoutingGrid, nets: &mut [Net]) {
    for net in nets.iter_mut() {
        let start_zone = grid.cell(net.start).swap_zone;
        let end_zone = grid.cell(net.end).swap_zone;
        if end_zone != 0 && start_zone == 0 {
            net.swap_terminals();
        }
        let start_zone = grid.cell(net.start).swap_zone;
        let end_zone = grid.cell(net.end).swap_zone;
        net.start_swap_zone = start_zone;
        net.swappable = start_zone == 0 && end_zone == 0;
        if !net.swappable {
            debug!("Net {} touches pin-swap zone {}; terminal swapping disabled", net.name,
                   start_zone.max(end_zone));
        }
    }
}

/// Verify that no two unrelated nets have terminals closer than one trace pitch.
fn verify_all_terminals(inputs: &InputConfig, nets: &[Net]) -> Result<(), ConfigError> {
    for a in nets.iter().filter(|n| !n.is_pseudo) {
        let rule =
            &inputs.design_rules[a.rule_set].subsets[a.rule_subset].layers[a.start.routing_layer()];
        let pitch = rule.line_width + rule.trace_spacing;
        for b in nets.iter().filter(|n| !n.is_pseudo) {
            if b.id <= a.id || a.same_family(b) {
                continue;
            }
            if a.start_swap_zone != 0 || b.start_swap_zone != 0 {
                continue;
            }
            for &ta in &[a.start, a.end] {
                for &tb in &[b.start, b.end] {
                    if ta.z == tb.z && ta.lateral_distance(&tb) < pitch {
                        return Err(ConfigError::TerminalsTooClose {
                            net_a: a.name.clone(),
                            net_b: b.name.clone(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

fn midpoint(a: Coord, b: Coord) -> Coord {
    Coord::new((a.x + b.x) / 2, (a.y + b.y) / 2, a.z)
}
