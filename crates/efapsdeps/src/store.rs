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

use std::path::{Path, PathBuf};

use anyhow::bail;
use efapsutil::manifest::Dependency;

/// Source of packaged application bundles. A failed resolution is fatal to
/// the packaging operation; there is no partial-dependency mode.
pub trait ArtifactStore {
    /// Locate the bundle archive for the given dependency.
    fn resolve(&self, dep: &Dependency) -> anyhow::Result<PathBuf>;
}

impl<S> ArtifactStore for &S
where
    S: ArtifactStore + ?Sized,
{
    fn resolve(&self, dep: &Dependency) -> anyhow::Result<PathBuf> {
        (**self).resolve(dep)
    }
}

/// Directory-backed store laid out
/// `<root>/<groupId>/<artifactId>/<version>/<artifactId>-<version>.tar[.gz]`.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStore { root: root.into() }
    }

    /// `$EFAPS_HOME/store` when set, `~/.efaps/store` otherwise.
    pub fn default_location() -> PathBuf {
        if let Ok(dir) = std::env::var("EFAPS_HOME") {
            return PathBuf::from(dir).join("store");
        }
        match home::home_dir() {
            Some(dir) => dir.join(".efaps").join("store"),
            None => PathBuf::from(".efaps").join("store"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bundle_dir(&self, dep: &Dependency) -> PathBuf {
        self.root
            .join(&dep.group_id)
            .join(&dep.artifact_id)
            .join(dep.version.to_string())
    }
}

impl ArtifactStore for LocalStore {
    fn resolve(&self, dep: &Dependency) -> anyhow::Result<PathBuf> {
        let dir = self.bundle_dir(dep);
        for ext in ["tar.gz", "tar"] {
            let candidate = dir.join(format!("{}-{}.{}", dep.artifact_id, dep.version, ext));
            if candidate.exists() {
                log::debug!("resolved {} to {}", dep, candidate.display());
                return Ok(candidate);
            }
        }
        bail!(
            "dependency {} not found in store `{}`",
            dep,
            self.root.display()
        )
    }
}
