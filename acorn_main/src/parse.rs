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

//! Parser for the line-oriented routing problem description.
//!
//! The file format is keyword-per-line; `#` starts a comment. The `map` statement must
//! appear before any statement that references layers:
//!
//! ```text
//! map 100 60 4
//! max_iterations 400
//! drc_free_threshold 20
//! evaporation_rate 40
//! net CLK_P 2 10 0 90 48 0
//! net CLK_N 2 14 0 90 52 0
//! diff_pair CLK_P CLK_N 4
//! block 1 30 0 34 59
//! pin_swap 0 0 0 4 10
//! trace_cost_multiplier 1 2.5
//! trace_cost_zone 1 2 40 0 60 59
//! ```

use acorn::input::{
    BarrierZone, CostZone, InputConfig, NetDef, PinSwapZone, Terminal, ZoneRect,
};

use std::fs;
use std::str::FromStr;

/// Parse errors of the input file.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The file could not be read.
    #[error("cannot read the input file: {0}")]
    Io(#[from] std::io::Error),
    /// A statement appeared before the `map` statement.
    #[error("line {0}: statement before the map statement")]
    MapNotFirst(usize),
    /// A statement had the wrong number of fields.
    #[error("line {0}: malformed {1} statement")]
    Malformed(usize, &'static str),
    /// An unknown keyword.
    #[error("line {0}: unknown statement '{1}'")]
    UnknownStatement(usize, String),
    /// A numeric field failed to parse.
    #[error("line {0}: invalid number: {1}")]
    InvalidNumber(usize, String),
    /// A diff-pair statement referenced an undeclared net.
    #[error("line {0}: diff_pair references unknown net '{1}'")]
    UnknownNet(usize, String),
}

fn number<T>(line: usize, field: &str) -> Result<T, ParseError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    field.parse().map_err(|e: T::Err| ParseError::InvalidNumber(line, format!("{}: {}", field, e)))
}

fn zone_rect(line: usize, fields: &[&str]) -> Result<ZoneRect, ParseError> {
    let layer = if fields[0] == "all" { None } else { Some(number::<usize>(line, fields[0])?) };
    Ok(ZoneRect {
        layer,
        x1: number(line, fields[1])?,
        y1: number(line, fields[2])?,
        x2: number(line, fields[3])?,
        y2: number(line, fields[4])?,
    })
}

/// Read and parse an input file into the flat configuration consumed by the core.
pub fn parse_input_file(filename: &str) -> Result<InputConfig, ParseError> {
    parse_input(&fs::read_to_string(filename)?)
}

fn parse_input(text: &str) -> Result<InputConfig, ParseError> {
    let mut inputs: Option<InputConfig> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let statement = raw.split('#').next().unwrap_or("").trim();
        if statement.is_empty() {
            continue;
        }
        let fields: Vec<&str> = statement.split_whitespace().collect();
        let keyword = fields[0];
        let args = &fields[1..];

        if keyword == "map" {
            if args.len() != 3 {
                return Err(ParseError::Malformed(line, "map"));
            }
            inputs = Some(InputConfig::new(
                number(line, args[0])?,
                number(line, args[1])?,
                number(line, args[2])?,
            ));
            continue;
        }
        let config = inputs.as_mut().ok_or(ParseError::MapNotFirst(line))?;

        match keyword {
            "max_iterations" if args.len() == 1 => {
                config.max_iterations = number(line, args[0])?;
            }
            "drc_free_threshold" if args.len() == 1 => {
                config.user_drc_free_threshold = number(line, args[0])?;
            }
            "pre_evaporation_iterations" if args.len() == 1 => {
                config.pre_evaporation_iterations = number(line, args[0])?;
            }
            "evaporation_rate" if args.len() == 1 => {
                config.evaporation_rate = number(line, args[0])?;
            }
            "cell_cost" if args.len() == 1 => {
                config.cell_cost = number(line, args[0])?;
            }
            "vert_cost" if args.len() == 1 => {
                config.vert_cost = number(line, args[0])?;
            }
            "net" if args.len() == 7 || args.len() == 9 => {
                let mut net = NetDef::new(
                    args[0],
                    Terminal {
                        x: number(line, args[1])?,
                        y: number(line, args[2])?,
                        layer: number(line, args[3])?,
                    },
                    Terminal {
                        x: number(line, args[4])?,
                        y: number(line, args[5])?,
                        layer: number(line, args[6])?,
                    },
                );
                if args.len() == 9 {
                    net.rule_set = number(line, args[7])?;
                    net.rule_subset = number(line, args[8])?;
                }
                config.nets.push(net);
            }
            "diff_pair" if args.len() == 3 => {
                let pitch: f64 = number(line, args[2])?;
                for (name, partner) in &[(args[0], args[1]), (args[1], args[0])] {
                    let net = config
                        .nets
                        .iter_mut()
                        .find(|n| n.name == *name)
                        .ok_or_else(|| ParseError::UnknownNet(line, name.to_string()))?;
                    net.diff_pair_partner = Some(partner.to_string());
                    net.pitch = pitch;
                }
            }
            "block" | "unblock" if args.len() == 5 => {
                config.barrier_zones.push(BarrierZone {
                    unblock: keyword == "unblock",
                    rect: zone_rect(line, args)?,
                });
            }
            "trace_cost_zone" | "via_cost_zone" if args.len() == 6 => {
                let zone = CostZone {
                    multiplier_index: number(line, args[0])?,
                    rect: zone_rect(line, &args[1..])?,
                };
                if keyword == "trace_cost_zone" {
                    config.trace_cost_zones.push(zone);
                } else {
                    config.via_cost_zones.push(zone);
                }
            }
            "trace_cost_multiplier" | "via_cost_multiplier" if args.len() == 2 => {
                let index: usize = number(line, args[0])?;
                let value: f64 = number(line, args[1])?;
                let table = if keyword == "trace_cost_multiplier" {
                    &mut config.trace_cost_multipliers
                } else {
                    &mut config.via_cost_multipliers
                };
                if table.len() <= index {
                    table.resize(index + 1, 1.0);
                }
                table[index] = value;
            }
            "pin_swap" if args.len() == 5 => {
                config.pin_swap_zones.push(PinSwapZone { rect: zone_rect(line, args)? });
            }
            _ => return Err(ParseError::UnknownStatement(line, keyword.to_string())),
        }
    }

    inputs.ok_or(ParseError::MapNotFirst(text.lines().count().max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_file() {
        let text = "
            # a small two-layer board
            map 40 30 2
            max_iterations 300
            drc_free_threshold 12
            evaporation_rate 35
            net CLK_P 2 10 0 36 22 0
            net CLK_N 2 14 0 36 26 0
            diff_pair CLK_P CLK_N 4
            net DATA 4 4 1 30 6 1
            block 1 18 0 20 29
            unblock 1 18 12 20 16
            trace_cost_multiplier 1 2.5
            trace_cost_zone 1 0 30 0 39 29
            pin_swap 0 0 0 3 6
        ";
        let inputs = parse_input(text).expect("example parses");
        assert_eq!(inputs.map_width, 40);
        assert_eq!(inputs.num_routing_layers, 2);
        assert_eq!(inputs.max_iterations, 300);
        assert_eq!(inputs.user_drc_free_threshold, 12);
        assert_eq!(inputs.evaporation_rate, 35.0);
        assert_eq!(inputs.nets.len(), 3);
        assert_eq!(inputs.nets[0].diff_pair_partner.as_deref(), Some("CLK_N"));
        assert_eq!(inputs.nets[1].pitch, 4.0);
        assert_eq!(inputs.barrier_zones.len(), 2);
        assert!(inputs.barrier_zones[1].unblock);
        assert_eq!(inputs.trace_cost_multipliers, vec![1.0, 2.5]);
        assert_eq!(inputs.trace_cost_zones.len(), 1);
        assert_eq!(inputs.pin_swap_zones.len(), 1);
    }

    #[test]
    fn map_must_come_first() {
        assert!(matches!(
            parse_input("max_iterations 10"),
            Err(ParseError::MapNotFirst(1))
        ));
    }

    #[test]
    fn unknown_statements_are_rejected() {
        assert!(matches!(
            parse_input("map 10 10 1\nfrobnicate 1 2 3"),
            Err(ParseError::UnknownStatement(2, _))
        ));
    }

    #[test]
    fn diff_pair_requires_declared_nets() {
        let text = "map 10 10 1\nnet A 1 1 0 8 8 0\ndiff_pair A B 4";
        assert!(matches!(parse_input(text), Err(ParseError::UnknownNet(3, _))));
    }
}
