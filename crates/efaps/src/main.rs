// efaps: The install-set packaging toolchain for eFaps applications.
// Copyright (C) 2024 The eFaps Team
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use clap::Parser;
use colored::Colorize;

mod cli;

use cli::EfapsSubcommands;

/// Log filtering follows `RUST_LOG` when set; `--verbose` lifts the default
/// level to info, recoverable per-file problems stay visible at warn.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default_level);
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .init();
}

pub fn main() {
    let cli = cli::EfapsCli::parse();
    let flags = cli.flags;

    init_logging(flags.verbose);

    use EfapsSubcommands::*;
    let res = match cli.subcommand {
        Package(p) => cli::run_package(&flags, p),
        Plan(p) => cli::run_plan(&flags, p),
        Deps(d) => cli::run_deps(&flags, d),
        Version(v) => cli::run_version(&flags, v),
    };

    match res {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:?}", "error".red().bold(), e);
            std::process::exit(-1);
        }
    }
}
