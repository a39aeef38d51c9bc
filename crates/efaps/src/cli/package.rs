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

use std::path::PathBuf;

use efapsbuild::PackageOpt;
use efapsdeps::LocalStore;
use efapsutil::cli::UniversalFlags;
use efapsutil::dirs::PackageDirs;
use efapsutil::kind::TypeGroup;

/// Package the application's install set into a manifest and archive
#[derive(Debug, clap::Parser)]
pub struct PackageSubcommand {
    /// Directory holding generated install files, scanned in addition to
    /// the source tree
    #[clap(long)]
    pub output_dir: Option<PathBuf>,

    /// Include glob (repeatable); replaces the default extension globs
    #[clap(long = "include")]
    pub includes: Vec<String>,

    /// Exclude glob (repeatable); extends the default excludes
    #[clap(long = "exclude")]
    pub excludes: Vec<String>,

    /// Which item kinds to package
    #[clap(long, value_enum, default_value = "all")]
    pub group: TypeGroup,

    /// Emit a plain tar instead of a gzip-compressed one
    #[clap(long)]
    pub no_compress: bool,

    /// Artifact store root. Defaults to `$EFAPS_HOME/store` or
    /// `~/.efaps/store`
    #[clap(long)]
    pub store: Option<PathBuf>,
}

pub fn run_package(cli: &UniversalFlags, cmd: PackageSubcommand) -> anyhow::Result<i32> {
    let PackageDirs {
        source_dir,
        target_dir,
    } = cli.source_tgt_dir.try_into_package_dirs()?;

    let store = LocalStore::new(cmd.store.unwrap_or_else(LocalStore::default_location));
    let opt = PackageOpt {
        source_dir,
        output_dir: cmd.output_dir,
        target_dir,
        includes: cmd.includes,
        excludes: cmd.excludes,
        group: cmd.group,
        compress: !cmd.no_compress,
    };

    let result = efapsbuild::run_package(&opt, &store)?;
    if !cli.quiet {
        println!(
            "packaged {} ({} entries) into {}",
            result.application,
            result.entry_count,
            result.archive_path.display()
        );
        for shadowed in &result.overrides {
            println!(
                "  overridden: {} ({} -> {})",
                shadowed.identifier, shadowed.previous, shadowed.replacement
            );
        }
    }
    Ok(0)
}
