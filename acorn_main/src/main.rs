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

use acorn::input::MAX_FILENAME_LEN;
use acorn::report::LogReport;

use clap::Parser;
use log::*;

mod parse;

#[derive(Parser, Debug)]
#[clap(name = "acorn", author = "Tibor Schneider", version)]
struct CommandLineArguments {
    /// Number of worker threads (defaults to the number of logical CPUs)
    #[clap(short = 't', long)]
    num_threads: Option<usize>,
    /// The routing problem description file
    input_filename: String,
}

fn main() {
    // initialize the env logger
    pretty_env_logger::init();
    let args = match CommandLineArguments::try_parse() {
        Ok(args) => args,
        Err(e)
            if e.kind() == clap::ErrorKind::DisplayHelp
                || e.kind() == clap::ErrorKind::DisplayVersion =>
        {
            let _ = e.print();
            std::process::exit(0);
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };
    std::process::exit(run(args));
}

fn run(args: CommandLineArguments) -> i32 {
    if args.input_filename.len() > MAX_FILENAME_LEN {
        error!("{}", acorn::ConfigError::FilenameTooLong(args.input_filename.len()));
        return 1;
    }

    let inputs = match parse::parse_input_file(&args.input_filename) {
        Ok(inputs) => inputs,
        Err(e) => {
            error!("Could not parse {}: {}", args.input_filename, e);
            return 1;
        }
    };

    let num_threads = args.num_threads.unwrap_or_else(num_cpus::get);
    info!("Number of threads is {}", num_threads);

    match acorn::route(inputs, Some(num_threads), &mut LogReport) {
        Ok(outcome) => {
            if outcome.design_rule_conflicts > 0 {
                error!(
                    "Conflicts were detected between design-rule zones on adjacent layers. \
                     Correct these and re-start the program."
                );
                return 1;
            }
            if !outcome.solved {
                // the iteration cap was reached: a soft failure, the best iteration still
                // holds the preferred result
                warn!(
                    "No complete solution; the best routing is in iteration {:?}",
                    outcome.best_iteration
                );
            }
            0
        }
        Err(e) => {
            error!("Routing failed: {}", e);
            1
        }
    }
}
