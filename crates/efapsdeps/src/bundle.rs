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

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use efapsutil::common::{RevisionRecord, REVISIONS_JSON};
use efapsutil::manifest::{read_install_manifest_in_dir, InstallManifest};
use flate2::read::GzDecoder;
use tempfile::TempDir;

/// A dependency bundle opened for merging: the extracted entry directory,
/// its package manifest and its revision records (in merge order).
#[derive(Debug)]
pub struct ResolvedApplication {
    pub name: String,
    pub manifest: InstallManifest,
    pub records: Vec<RevisionRecord>,
    dir: PathBuf,
    // extraction directory, removed when the resolved application is dropped
    _extracted: Option<TempDir>,
}

impl ResolvedApplication {
    /// Extract a bundle archive into a scratch directory and load its
    /// manifest and revision sidecar.
    pub fn open(archive: &Path) -> anyhow::Result<Self> {
        let extracted = TempDir::new().context("failed to create extraction directory")?;
        unpack(archive, extracted.path())
            .with_context(|| format!("could not open bundle `{}`", archive.display()))?;
        let mut app = Self::from_dir(extracted.path())?;
        app._extracted = Some(extracted);
        Ok(app)
    }

    /// Load an already extracted bundle directory.
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let manifest = read_install_manifest_in_dir(dir)?;
        let records = read_revision_records(&dir.join(REVISIONS_JSON))?;
        Ok(ResolvedApplication {
            name: manifest.application.clone(),
            manifest,
            records,
            dir: dir.to_path_buf(),
            _extracted: None,
        })
    }

    pub fn entry_dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the archive entry holding the given record's content.
    pub fn entry_path(&self, record: &RevisionRecord) -> PathBuf {
        self.dir.join(record.entry_name())
    }
}

fn unpack(archive: &Path, into: &Path) -> anyhow::Result<()> {
    let file = File::open(archive)?;
    if archive.extension().is_some_and(|ext| ext == "gz") {
        tar::Archive::new(GzDecoder::new(BufReader::new(file))).unpack(into)?;
    } else {
        tar::Archive::new(BufReader::new(file)).unpack(into)?;
    }
    Ok(())
}

fn read_revision_records(path: &Path) -> anyhow::Result<Vec<RevisionRecord>> {
    let file =
        File::open(path).with_context(|| format!("could not read `{}`", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("could not parse `{}`", path.display()))
}
