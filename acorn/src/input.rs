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

//! # User Inputs
//!
//! This module holds the flat configuration value produced by the external input-file
//! parser: the netlist, the design-rule sets, the various zones to paint onto the map, and
//! the scalar routing parameters. The core never parses files itself; it only consumes an
//! [`InputConfig`].
//!
//! All geometric quantities are expressed in *cell units* of the routing grid.

/// Cost deposited on a cell for one path traversal, before multiplier scaling.
pub const ONE_TRAVERSAL: f64 = 100.0;

/// Maximum accepted length (in bytes) of the input filename.
pub const MAX_FILENAME_LEN: usize = 300;

/// Per-layer design rule of one design-rule subset.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRule {
    /// Trace width on this layer
    pub line_width: f64,
    /// Diameter of a via going up from this layer (0 = vias not allowed)
    pub via_up_diameter: f64,
    /// Diameter of a via coming down into this layer (0 = vias not allowed)
    pub via_down_diameter: f64,
    /// Minimum trace-to-trace spacing
    pub trace_spacing: f64,
    /// Minimum via-to-via spacing
    pub via_spacing: f64,
    /// Minimum trace-to-via spacing
    pub trace_via_spacing: f64,
}

impl Default for LayerRule {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            via_up_diameter: 1.0,
            via_down_diameter: 1.0,
            trace_spacing: 1.0,
            via_spacing: 1.0,
            trace_via_spacing: 1.0,
        }
    }
}

impl LayerRule {
    /// Interaction radius for trace-to-trace DRC checks on this layer.
    pub fn trace_interaction_radius(&self) -> f64 {
        self.line_width + self.trace_spacing
    }

    /// Interaction radius for via-to-via DRC checks through this layer.
    pub fn via_interaction_radius(&self) -> f64 {
        self.via_up_diameter.max(self.via_down_diameter) + self.via_spacing
    }
}

/// A named design-rule subset: one [`LayerRule`] per routing layer.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignRuleSubset {
    /// Subset name (e.g. an impedance class)
    pub name: String,
    /// One rule per routing layer
    pub layers: Vec<LayerRule>,
}

impl DesignRuleSubset {
    /// A subset with default rules on every layer.
    pub fn uniform(name: &str, num_layers: usize) -> Self {
        Self { name: name.to_string(), layers: vec![LayerRule::default(); num_layers] }
    }
}

/// A named design-rule set containing one or more subsets.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignRuleSet {
    /// Set name
    pub name: String,
    /// Subsets (index 0 is the default subset)
    pub subsets: Vec<DesignRuleSubset>,
}

impl DesignRuleSet {
    /// A set with a single default subset.
    pub fn uniform(name: &str, num_layers: usize) -> Self {
        Self {
            name: name.to_string(),
            subsets: vec![DesignRuleSubset::uniform("default", num_layers)],
        }
    }
}

/// An axis-aligned rectangle of cells, inclusive on both corners.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRect {
    /// Routing-layer index the zone applies to, or `None` for all layers
    pub layer: Option<usize>,
    /// Left edge
    pub x1: usize,
    /// Top edge
    pub y1: usize,
    /// Right edge (inclusive)
    pub x2: usize,
    /// Bottom edge (inclusive)
    pub y2: usize,
}

impl ZoneRect {
    /// A rectangle on a single routing layer.
    pub fn on_layer(layer: usize, x1: usize, y1: usize, x2: usize, y2: usize) -> Self {
        Self { layer: Some(layer), x1, y1, x2, y2 }
    }

    /// A rectangle spanning all layers.
    pub fn all_layers(x1: usize, y1: usize, x2: usize, y2: usize) -> Self {
        Self { layer: None, x1, y1, x2, y2 }
    }
}

/// A design-rule zone assigning a rule set and subset to a region.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignRuleZone {
    /// Index of the design-rule set to paint
    pub rule_set: usize,
    /// Index of the subset within the set
    pub rule_subset: usize,
    /// Affected region
    pub rect: ZoneRect,
}

/// A block or unblock instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct BarrierZone {
    /// `true` re-opens a previously blocked region
    pub unblock: bool,
    /// Affected region
    pub rect: ZoneRect,
}

/// A cost zone assigning a cost-multiplier index to a region.
#[derive(Debug, Clone, PartialEq)]
pub struct CostZone {
    /// Index into the trace or via multiplier table
    pub multiplier_index: usize,
    /// Affected region
    pub rect: ZoneRect,
}

/// A pin-swap zone: terminals inside it may be relocated, and nets with a terminal inside
/// it are ineligible for the terminal-swap intervention.
#[derive(Debug, Clone, PartialEq)]
pub struct PinSwapZone {
    /// Affected region
    pub rect: ZoneRect,
}

/// A terminal position as written in the input file: (x, y, routing layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminal {
    /// Horizontal position in cells
    pub x: usize,
    /// Vertical position in cells
    pub y: usize,
    /// Routing-layer index (not a z index)
    pub layer: usize,
}

/// A user-declared net.
#[derive(Debug, Clone, PartialEq)]
pub struct NetDef {
    /// Display name
    pub name: String,
    /// Start terminal
    pub start: Terminal,
    /// End terminal
    pub end: Terminal,
    /// Design-rule set index
    pub rule_set: usize,
    /// Design-rule subset index
    pub rule_subset: usize,
    /// Name of the diff-pair partner net, if this net is half of a differential pair
    pub diff_pair_partner: Option<String>,
    /// Diff-pair pitch (center-to-center distance of the two traces), in cells
    pub pitch: f64,
}

impl NetDef {
    /// A plain net with default design rules.
    pub fn new(name: &str, start: Terminal, end: Terminal) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
            rule_set: 0,
            rule_subset: 0,
            diff_pair_partner: None,
            pitch: 0.0,
        }
    }
}

/// The flat configuration value consumed by the core: everything the external parser
/// extracts from the input file.
#[derive(Debug, Clone)]
pub struct InputConfig {
    /// Map width in cells
    pub map_width: usize,
    /// Map height in cells
    pub map_height: usize,
    /// Number of routing layers (via layers are implied between them)
    pub num_routing_layers: usize,
    /// Display names of the routing layers
    pub layer_names: Vec<String>,
    /// User-declared nets
    pub nets: Vec<NetDef>,
    /// Design-rule sets
    pub design_rules: Vec<DesignRuleSet>,
    /// Design-rule zones
    pub design_rule_zones: Vec<DesignRuleZone>,
    /// Block/unblock instructions, applied in order
    pub barrier_zones: Vec<BarrierZone>,
    /// Trace cost zones
    pub trace_cost_zones: Vec<CostZone>,
    /// Via cost zones
    pub via_cost_zones: Vec<CostZone>,
    /// Trace cost-multiplier table (index 0 must be 1.0)
    pub trace_cost_multipliers: Vec<f64>,
    /// Via cost-multiplier table (index 0 must be 1.0)
    pub via_cost_multipliers: Vec<f64>,
    /// Pin-swap zones
    pub pin_swap_zones: Vec<PinSwapZone>,
    /// User-requested number of DRC-free iterations before termination
    pub user_drc_free_threshold: usize,
    /// Hard cap on the number of routing iterations (0 = pre-routing only)
    pub max_iterations: usize,
    /// Number of initial iterations routed without evaporation
    pub pre_evaporation_iterations: usize,
    /// Percentage of congestion evaporated before each iteration
    pub evaporation_rate: f64,
    /// Base cost of traversing one cell laterally
    pub cell_cost: f64,
    /// Base cost of one layer transition
    pub vert_cost: f64,
}

impl InputConfig {
    /// A minimal configuration for the given map dimensions, with a single default
    /// design-rule set and no zones. Used by tests and as the parser's starting point.
    pub fn new(map_width: usize, map_height: usize, num_routing_layers: usize) -> Self {
        Self {
            map_width,
            map_height,
            num_routing_layers,
            layer_names: (0..num_routing_layers).map(|i| format!("L{}", i)).collect(),
            nets: Vec::new(),
            design_rules: vec![DesignRuleSet::uniform("default", num_routing_layers)],
            design_rule_zones: Vec::new(),
            barrier_zones: Vec::new(),
            trace_cost_zones: Vec::new(),
            via_cost_zones: Vec::new(),
            trace_cost_multipliers: vec![1.0],
            via_cost_multipliers: vec![1.0],
            pin_swap_zones: Vec::new(),
            user_drc_free_threshold: 5,
            max_iterations: 200,
            pre_evaporation_iterations: 1,
            evaporation_rate: 40.0,
            cell_cost: 100.0,
            vert_cost: 400.0,
        }
    }

    /// Base cost of a diagonal step.
    pub fn diag_cost(&self) -> f64 {
        self.cell_cost * std::f64::consts::SQRT_2
    }

    /// Base cost of a knight step.
    pub fn knight_cost(&self) -> f64 {
        self.cell_cost * 5.0_f64.sqrt()
    }

    /// The derived DRC-free threshold: the user value plus `35 * log10(num_nets)`.
    pub fn drc_free_threshold(&self) -> usize {
        let nets = self.nets.len().max(1) as f64;
        self.user_drc_free_threshold + (35.0 * nets.log10()) as usize
    }
}
