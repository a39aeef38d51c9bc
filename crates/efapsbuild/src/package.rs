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

//! The packaging pipeline: read the application manifest, resolve declared
//! dependencies, scan the source and generated-output trees, merge (lowest
//! precedence first, own files last) and emit or plan.
//!
//! Per-file problems are handled inside the stages and logged; everything
//! surfacing from here is fatal and means no output was produced.

use std::path::{Path, PathBuf};

use efapsdeps::ArtifactStore;
use efapsutil::git;
use efapsutil::kind::{FileClassifier, TypeGroup};
use efapsutil::manifest::{read_app_manifest_in_dir, AppManifest};
use efapsutil::scan::{scan, ScanPatterns};

use crate::emit;
use crate::merge::{InstallSet, Merger, Shadowed};
use crate::synthesis::{self, NameRules, SynthesisModel};

/// Operation-level failure of a packaging run.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("could not read application manifest")]
    Manifest(#[source] anyhow::Error),
    #[error("could not resolve dependencies")]
    Dependency(#[source] anyhow::Error),
    #[error("could not scan install files")]
    Scan(#[source] anyhow::Error),
    #[error("could not execute package script")]
    Package(#[source] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct PackageOpt {
    pub source_dir: PathBuf,
    /// Directory holding generated install files, scanned in addition to the
    /// source tree when it exists.
    pub output_dir: Option<PathBuf>,
    pub target_dir: PathBuf,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub group: TypeGroup,
    pub compress: bool,
}

#[derive(Debug)]
pub struct PackageResult {
    pub application: String,
    pub manifest_path: PathBuf,
    pub archive_path: PathBuf,
    pub entry_count: usize,
    pub overrides: Vec<Shadowed>,
}

/// Run the full scan, resolve, merge stage and hand back the application
/// manifest together with the merged install set.
pub fn build_install_set(
    opt: &PackageOpt,
    store: &dyn ArtifactStore,
) -> Result<(AppManifest, InstallSet), InstallError> {
    let manifest =
        read_app_manifest_in_dir(&opt.source_dir).map_err(InstallError::Manifest)?;
    log::info!(
        "packaging application `{}` with {} declared dependencies",
        manifest.application,
        manifest.dependencies.len()
    );

    let resolved = efapsdeps::resolve_all(&manifest.dependencies, store)
        .map_err(InstallError::Dependency)?;

    if !git::is_in_git_repo(&opt.source_dir) {
        log::warn!(
            "`{}` is not inside a git repository, all revisions will be degraded",
            opt.source_dir.display()
        );
    }

    let patterns =
        ScanPatterns::new(&opt.includes, &opt.excludes).map_err(InstallError::Scan)?;
    let own_files = scan(&opt.source_dir, &patterns).map_err(InstallError::Scan)?;

    let mut merger = Merger::new(FileClassifier::new(), opt.group);
    for app in &resolved {
        merger.add_bundle(app);
    }
    merger.add_source_tree(&manifest, &opt.source_dir, &own_files);
    if let Some(output_dir) = &opt.output_dir {
        let generated = scan(output_dir, &patterns).map_err(InstallError::Scan)?;
        merger.add_source_tree(&manifest, output_dir, &generated);
    }

    let set = merger.finish();
    for shadowed in &set.overrides {
        log::info!(
            "identifier `{}` of {} overridden by {}",
            shadowed.identifier,
            shadowed.previous,
            shadowed.replacement
        );
    }
    Ok((manifest, set))
}

/// Package the application: produce `install.xml` and the content archive
/// below the target directory.
pub fn run_package(
    opt: &PackageOpt,
    store: &dyn ArtifactStore,
) -> Result<PackageResult, InstallError> {
    let (manifest, set) = build_install_set(opt, store)?;
    let emitted = emit::emit(&manifest, &set, &opt.target_dir, opt.compress)
        .map_err(InstallError::Package)?;
    Ok(PackageResult {
        application: manifest.application,
        manifest_path: emitted.manifest_path,
        archive_path: emitted.archive_path,
        entry_count: set.entries.len(),
        overrides: set.overrides,
    })
}

/// Build the CI-class synthesis model for the merged set.
pub fn run_plan(
    opt: &PackageOpt,
    store: &dyn ArtifactStore,
    rules: &NameRules,
) -> Result<SynthesisModel, InstallError> {
    let (_, set) = build_install_set(opt, store)?;
    Ok(synthesis::plan(&set, rules))
}

impl PackageOpt {
    pub fn new(source_dir: &Path, target_dir: &Path) -> Self {
        PackageOpt {
            source_dir: source_dir.to_path_buf(),
            output_dir: None,
            target_dir: target_dir.to_path_buf(),
            includes: Vec::new(),
            excludes: Vec::new(),
            group: TypeGroup::All,
            compress: true,
        }
    }
}
