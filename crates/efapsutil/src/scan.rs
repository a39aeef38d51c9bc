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

use std::path::Path;

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::common::{DEFAULT_EXCLUDES, DEFAULT_INCLUDES};

/// Compiled include/exclude globs for an install-file scan.
///
/// An empty include list falls back to the default extension globs; the
/// default excludes (`**/versions.xml`, generated package-info files) always
/// apply in addition to caller-supplied ones.
#[derive(Debug)]
pub struct ScanPatterns {
    includes: GlobSet,
    excludes: GlobSet,
}

impl ScanPatterns {
    pub fn new(includes: &[String], excludes: &[String]) -> anyhow::Result<Self> {
        let mut include_builder = GlobSetBuilder::new();
        if includes.is_empty() {
            for pattern in DEFAULT_INCLUDES {
                include_builder.add(Glob::new(pattern)?);
            }
        } else {
            for pattern in includes {
                include_builder
                    .add(Glob::new(pattern).with_context(|| format!("bad include `{pattern}`"))?);
            }
        }

        let mut exclude_builder = GlobSetBuilder::new();
        for pattern in DEFAULT_EXCLUDES {
            exclude_builder.add(Glob::new(pattern)?);
        }
        for pattern in excludes {
            exclude_builder
                .add(Glob::new(pattern).with_context(|| format!("bad exclude `{pattern}`"))?);
        }

        Ok(ScanPatterns {
            includes: include_builder.build()?,
            excludes: exclude_builder.build()?,
        })
    }

    pub fn defaults() -> Self {
        // the built-in patterns are known to compile
        Self::new(&[], &[]).unwrap()
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.includes.is_match(rel_path) && !self.excludes.is_match(rel_path)
    }
}

/// Walk `root` and collect the `/`-separated relative paths of all regular
/// files matching the patterns. A missing root yields an empty set.
///
/// Entries come back in walk order; the merger imposes the deterministic
/// final ordering before anything is emitted.
pub fn scan(root: &Path, patterns: &ScanPatterns) -> anyhow::Result<Vec<String>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut result = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .expect("walkdir entries live below the root");
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if patterns.matches(&rel) {
            result.push(rel);
        }
    }
    Ok(result)
}
