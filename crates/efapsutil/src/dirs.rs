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
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, clap::Parser, Serialize, Deserialize)]
pub struct SourceTargetDirs {
    /// The application source directory. Defaults to the current directory.
    #[clap(long, global = true)]
    pub source_dir: Option<PathBuf>,

    /// The target directory. Defaults to `<source_dir>/target`.
    #[clap(long, global = true)]
    pub target_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PackageDirs {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
}

impl SourceTargetDirs {
    pub fn try_into_package_dirs(&self) -> anyhow::Result<PackageDirs> {
        let source_dir = match &self.source_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("failed to get current directory")?,
        };
        let target_dir = match &self.target_dir {
            Some(dir) => dir.clone(),
            None => source_dir.join("target"),
        };
        Ok(PackageDirs {
            source_dir,
            target_dir,
        })
    }
}
