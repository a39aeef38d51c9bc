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

use anyhow::Context;
use efapsbuild::synthesis::NameRules;
use efapsbuild::PackageOpt;
use efapsdeps::LocalStore;
use efapsutil::cli::UniversalFlags;
use efapsutil::dirs::PackageDirs;
use efapsutil::kind::TypeGroup;

/// Build the CI-class synthesis model and write it as JSON
#[derive(Debug, clap::Parser)]
pub struct PlanSubcommand {
    /// Directory holding generated install files
    #[clap(long)]
    pub output_dir: Option<PathBuf>,

    /// Regex prefix stripped from item names when deriving class names
    #[clap(long)]
    pub strip_prefix: Option<String>,

    /// Artifact store root. Defaults to `$EFAPS_HOME/store` or
    /// `~/.efaps/store`
    #[clap(long)]
    pub store: Option<PathBuf>,

    /// Write the model here instead of `<target>/synthesis.json`
    #[clap(long)]
    pub out: Option<PathBuf>,
}

pub fn run_plan(cli: &UniversalFlags, cmd: PlanSubcommand) -> anyhow::Result<i32> {
    let PackageDirs {
        source_dir,
        target_dir,
    } = cli.source_tgt_dir.try_into_package_dirs()?;

    let store = LocalStore::new(cmd.store.unwrap_or_else(LocalStore::default_location));
    let opt = PackageOpt {
        source_dir,
        output_dir: cmd.output_dir,
        target_dir: target_dir.clone(),
        includes: Vec::new(),
        excludes: Vec::new(),
        group: TypeGroup::All,
        compress: false,
    };
    let rules = NameRules::new(cmd.strip_prefix.as_deref())?;

    let model = efapsbuild::run_plan(&opt, &store, &rules)?;

    let out = cmd.out.unwrap_or_else(|| target_dir.join("synthesis.json"));
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(&model)?;
    std::fs::write(&out, json)
        .with_context(|| format!("could not write `{}`", out.display()))?;

    if !cli.quiet {
        println!(
            "planned {} types, {} status groups, {} forms, {} tables into {}",
            model.types.len(),
            model.status_groups.len(),
            model.forms.len(),
            model.tables.len(),
            out.display()
        );
    }
    Ok(0)
}
