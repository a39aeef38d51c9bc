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

//! The install-set resolution and packaging engine: definition parsing,
//! precedence-ordered merging, manifest/archive emission and the CI-class
//! synthesis planner.

pub mod emit;
pub mod merge;
pub mod package;
pub mod parse;
pub mod synthesis;

pub use package::{run_package, run_plan, InstallError, PackageOpt, PackageResult};
