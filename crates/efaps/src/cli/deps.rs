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

use std::collections::HashSet;
use std::path::PathBuf;

use colored::{ColoredString, Colorize};
use efapsdeps::LocalStore;
use efapsutil::cli::UniversalFlags;
use efapsutil::dirs::PackageDirs;
use efapsutil::manifest::read_app_manifest_in_dir;

/// Display the resolved dependency applications in precedence order
#[derive(Debug, clap::Parser)]
pub struct DepsSubcommand {
    /// Artifact store root. Defaults to `$EFAPS_HOME/store` or
    /// `~/.efaps/store`
    #[clap(long)]
    pub store: Option<PathBuf>,
}

fn bold(top: &HashSet<String>, item: &str) -> ColoredString {
    if top.contains(item) {
        item.bold()
    } else {
        item.into()
    }
}

pub fn run_deps(cli: &UniversalFlags, cmd: DepsSubcommand) -> anyhow::Result<i32> {
    let PackageDirs { source_dir, .. } = cli.source_tgt_dir.try_into_package_dirs()?;

    let manifest = read_app_manifest_in_dir(&source_dir)?;
    let mut top = HashSet::new();
    for dep in &manifest.dependencies {
        top.insert(dep.artifact_id.clone());
    }

    let store = LocalStore::new(cmd.store.unwrap_or_else(LocalStore::default_location));
    let resolved = efapsdeps::resolve_all(&manifest.dependencies, &store)?;

    println!("{}:", manifest.application.bold());
    for app in &resolved {
        println!(
            "  {} ({} files)",
            bold(&top, &app.name),
            app.records.len()
        );
    }
    Ok(0)
}
