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

pub mod deps;
pub mod package;
pub mod plan;
pub mod version;

pub use deps::*;
pub use package::*;
pub use plan::*;
pub use version::*;

use efapsutil::cli::UniversalFlags;

#[derive(Debug, clap::Parser)]
#[clap(
    name = "efaps",
    about = "The install-set packaging toolchain for eFaps applications."
)]
pub struct EfapsCli {
    #[clap(subcommand)]
    pub subcommand: EfapsSubcommands,

    #[clap(flatten)]
    pub flags: UniversalFlags,
}

#[derive(Debug, clap::Parser)]
pub enum EfapsSubcommands {
    Package(PackageSubcommand),
    Plan(PlanSubcommand),
    Deps(DepsSubcommand),
    Version(VersionSubcommand),
}
