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

//! Emission of the package manifest and the content archive.
//!
//! Both artifacts are written to a temporary file in the target directory
//! and renamed into place on success, so a failed emission never leaves a
//! partial file at the final path. Entry modification times come from the
//! resolved provenance, which makes the archive byte-identical across runs
//! over unchanged inputs.

use std::collections::HashSet;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

use efapsutil::common::{INSTALL_XML, REVISIONS_JSON};
use efapsutil::manifest::{write_install_manifest, AppManifest, InstallManifest, ManifestFile};

use crate::merge::InstallSet;

#[derive(Debug)]
pub struct EmitResult {
    pub manifest_path: PathBuf,
    pub archive_path: PathBuf,
}

/// Serialize the merged set into `install.xml` and `<application>.tar[.gz]`
/// below `target_dir`.
pub fn emit(
    manifest: &AppManifest,
    set: &InstallSet,
    target_dir: &Path,
    compress: bool,
) -> anyhow::Result<EmitResult> {
    std::fs::create_dir_all(target_dir).with_context(|| {
        format!("could not create target directory `{}`", target_dir.display())
    })?;

    let records = set.records();
    let install = InstallManifest {
        application: manifest.application.clone(),
        root_package: manifest.root_package.clone(),
        dependencies: manifest.dependencies.clone(),
        files: records
            .iter()
            .map(|r| ManifestFile {
                kind: r.kind,
                name: r.name.clone(),
                revision: r.revision.clone(),
                date: r.date,
            })
            .collect(),
    };

    let mut manifest_xml = Vec::new();
    write_install_manifest(&install, &mut manifest_xml)?;
    let records_json =
        serde_json::to_vec_pretty(&records).context("could not serialize revision records")?;

    let manifest_path = target_dir.join(INSTALL_XML);
    let mut tmp = NamedTempFile::new_in(target_dir)?;
    tmp.as_file_mut()
        .write_all(&manifest_xml)
        .context("could not write install.xml")?;
    tmp.persist(&manifest_path)
        .with_context(|| format!("could not persist `{}`", manifest_path.display()))?;

    let archive_name = format!(
        "{}.tar{}",
        manifest.application,
        if compress { ".gz" } else { "" }
    );
    let archive_path = target_dir.join(&archive_name);
    let tmp = NamedTempFile::new_in(target_dir)?;
    if compress {
        let encoder = GzEncoder::new(
            BufWriter::new(tmp.as_file().try_clone()?),
            Compression::default(),
        );
        let encoder = append_entries(encoder, &manifest_xml, set, &records_json)?;
        encoder
            .finish()
            .context("could not finish archive compression")?
            .flush()?;
    } else {
        let mut out = append_entries(
            BufWriter::new(tmp.as_file().try_clone()?),
            &manifest_xml,
            set,
            &records_json,
        )?;
        out.flush()?;
    }
    tmp.persist(&archive_path)
        .with_context(|| format!("could not persist `{}`", archive_path.display()))?;

    log::info!(
        "packaged {} entries into `{}`",
        set.entries.len(),
        archive_path.display()
    );
    Ok(EmitResult {
        manifest_path,
        archive_path,
    })
}

fn append_entries<W: Write>(
    out: W,
    manifest_xml: &[u8],
    set: &InstallSet,
    records_json: &[u8],
) -> anyhow::Result<W> {
    let mut builder = tar::Builder::new(out);

    append_bytes(&mut builder, INSTALL_XML, manifest_xml, 0)?;

    let mut seen_related: HashSet<String> = HashSet::new();
    for entry in set.entries.values() {
        let data = std::fs::read(&entry.path)
            .with_context(|| format!("could not read `{}`", entry.path.display()))?;
        let mtime = entry.provenance.date.timestamp().max(0) as u64;
        append_bytes(&mut builder, &entry.entry_name(), &data, mtime)?;

        for related in &entry.related {
            if !seen_related.insert(related.name.clone()) {
                continue;
            }
            let data = std::fs::read(&related.path).with_context(|| {
                format!("could not read related file `{}`", related.path.display())
            })?;
            append_bytes(&mut builder, &related.name, &data, mtime)?;
        }
    }

    let mut extras: Vec<_> = set.extras.iter().collect();
    extras.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    extras.dedup_by(|a, b| a.rel_path == b.rel_path);
    for extra in extras {
        let data = std::fs::read(&extra.path)
            .with_context(|| format!("could not read `{}`", extra.path.display()))?;
        append_bytes(&mut builder, &extra.rel_path, &data, 0)?;
    }

    append_bytes(&mut builder, REVISIONS_JSON, records_json, 0)?;

    Ok(builder.into_inner()?)
}

fn append_bytes<W: Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    data: &[u8],
    mtime: u64,
) -> anyhow::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(mtime);
    header.set_cksum();
    builder
        .append_data(&mut header, name, data)
        .with_context(|| format!("could not write archive entry `{name}`"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use efapsutil::common::Provenance;
    use efapsutil::kind::ItemKind;
    use indexmap::IndexMap;

    use super::*;
    use crate::merge::{Extra, MergedEntry, RelatedFile};

    fn fixture(dir: &Path) -> (AppManifest, InstallSet) {
        let date = DateTime::parse_from_rfc3339("2024-03-01T12:00:00+01:00").unwrap();
        fs::write(dir.join("Product.xml"), "<datamodel-type/>").unwrap();
        fs::write(dir.join("logo.png"), "png bytes").unwrap();
        fs::write(dir.join("notes.csv"), "a,b\n").unwrap();

        let mut entries = IndexMap::new();
        entries.insert(
            "87f5e4f0-b55f-49f4-b61a-e402d0545f09".to_owned(),
            MergedEntry {
                identifier: "87f5e4f0-b55f-49f4-b61a-e402d0545f09".to_owned(),
                kind: ItemKind::DatamodelType,
                name: "org/acme/Product.xml".to_owned(),
                application: "acme".to_owned(),
                path: dir.join("Product.xml"),
                provenance: Provenance::new("a0f3", date),
                item: None,
                related: vec![RelatedFile {
                    name: "logo.png".to_owned(),
                    path: dir.join("logo.png"),
                }],
            },
        );
        let set = InstallSet {
            entries,
            overrides: vec![],
            extras: vec![Extra {
                rel_path: "notes.csv".to_owned(),
                path: dir.join("notes.csv"),
            }],
        };
        let manifest = AppManifest {
            application: "acme".to_owned(),
            root_package: Some("org/acme".to_owned()),
            dependencies: vec![],
        };
        (manifest, set)
    }

    fn entry_names(archive: &Path) -> Vec<String> {
        let file = fs::File::open(archive).unwrap();
        let mut archive = tar::Archive::new(file);
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn archive_layout() {
        let dir = tempfile::tempdir().unwrap();
        let (manifest, set) = fixture(dir.path());
        let target = dir.path().join("target");
        let result = emit(&manifest, &set, &target, false).unwrap();

        assert_eq!(
            entry_names(&result.archive_path),
            vec![
                "install.xml",
                "87f5e4f0-b55f-49f4-b61a-e402d0545f09.xml",
                "logo.png",
                "notes.csv",
                "revisions.json",
            ]
        );
        assert!(result.manifest_path.exists());
        let manifest_xml = fs::read_to_string(&result.manifest_path).unwrap();
        expect_test::expect![[r#"
            <?xml version="1.0" encoding="UTF-8"?>
            <install>
              <application>acme</application>
              <rootPackage>org/acme</rootPackage>
              <dependencies>
              </dependencies>
              <files>
                <file type="datamodel-type" name="org/acme/Product.xml" revision="a0f3" date="2024-03-01T12:00:00+01:00"/>
              </files>
            </install>"#]]
        .assert_eq(&manifest_xml);
    }

    #[test]
    fn emission_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let (manifest, set) = fixture(dir.path());
        let first = emit(&manifest, &set, &dir.path().join("t1"), false).unwrap();
        let second = emit(&manifest, &set, &dir.path().join("t2"), false).unwrap();

        assert_eq!(
            fs::read(&first.manifest_path).unwrap(),
            fs::read(&second.manifest_path).unwrap()
        );
        assert_eq!(
            fs::read(&first.archive_path).unwrap(),
            fs::read(&second.archive_path).unwrap()
        );
    }

    #[test]
    fn compressed_archive_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let (manifest, set) = fixture(dir.path());
        let result = emit(&manifest, &set, &dir.path().join("target"), true).unwrap();
        assert!(result.archive_path.to_string_lossy().ends_with(".tar.gz"));

        let file = fs::File::open(&result.archive_path).unwrap();
        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.first().map(String::as_str), Some("install.xml"));
        assert_eq!(names.last().map(String::as_str), Some("revisions.json"));
    }

    #[test]
    fn unreadable_entry_aborts_without_partial_archive() {
        let dir = tempfile::tempdir().unwrap();
        let (manifest, mut set) = fixture(dir.path());
        set.entries.get_index_mut(0).unwrap().1.path = dir.path().join("gone.xml");
        let target = dir.path().join("target");
        let err = emit(&manifest, &set, &target, false).unwrap_err();
        assert!(format!("{err:#}").contains("could not read"));
        assert!(!target.join("acme.tar").exists());
    }
}
