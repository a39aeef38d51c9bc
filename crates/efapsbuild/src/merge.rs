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

//! Precedence-ordered merging of install-file sets into one identity-keyed
//! map. File sets are added in ascending precedence (dependencies in
//! resolution order first, the application's own files last); a later entry
//! under the same identifier unconditionally replaces the earlier one. The
//! overwrite order is the sole mechanism implementing override semantics and
//! must not be reordered.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use efapsdeps::ResolvedApplication;
use efapsutil::common::{InstallFile, Provenance, RevisionRecord};
use efapsutil::git;
use efapsutil::kind::{FileClassifier, FileKind, ItemKind, TypeGroup};
use efapsutil::manifest::AppManifest;

use crate::parse::{self, ParsedItem};

/// An auxiliary file referenced by a merged entry, archived under its own
/// literal name next to the entry.
#[derive(Debug, Clone)]
pub struct RelatedFile {
    pub name: String,
    pub path: PathBuf,
}

/// One identity in the merged install set.
#[derive(Debug, Clone)]
pub struct MergedEntry {
    pub identifier: String,
    pub kind: ItemKind,
    /// Display path, prefixed with the owning application's root package.
    pub name: String,
    pub application: String,
    /// Content location on disk.
    pub path: PathBuf,
    pub provenance: Provenance,
    pub item: Option<ParsedItem>,
    pub related: Vec<RelatedFile>,
}

impl MergedEntry {
    pub fn to_record(&self) -> RevisionRecord {
        RevisionRecord {
            kind: self.kind,
            identifier: self.identifier.clone(),
            name: self.name.clone(),
            application: self.application.clone(),
            revision: self.provenance.revision.clone(),
            date: self.provenance.date,
        }
    }

    /// Archive entry name: identifier plus the kind extension.
    pub fn entry_name(&self) -> String {
        format!("{}{}", self.identifier, self.kind.archive_extension())
    }
}

/// Audit row for an identifier that was shadowed during the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shadowed {
    pub identifier: String,
    pub previous: String,
    pub replacement: String,
}

/// A scanned file without an identity, carried along for raw-copy archival.
#[derive(Debug, Clone)]
pub struct Extra {
    pub rel_path: String,
    pub path: PathBuf,
}

/// Result of a merge: identity-keyed entries in record order, the override
/// audit trail, and the raw-copy extras.
#[derive(Debug, Default)]
pub struct InstallSet {
    pub entries: IndexMap<String, MergedEntry>,
    pub overrides: Vec<Shadowed>,
    pub extras: Vec<Extra>,
}

impl InstallSet {
    pub fn records(&self) -> Vec<RevisionRecord> {
        self.entries.values().map(MergedEntry::to_record).collect()
    }
}

pub struct Merger {
    classifier: FileClassifier,
    group: TypeGroup,
    set: InstallSet,
}

impl Merger {
    pub fn new(classifier: FileClassifier, group: TypeGroup) -> Self {
        Merger {
            classifier,
            group,
            set: InstallSet::default(),
        }
    }

    pub fn finish(self) -> InstallSet {
        self.set
    }

    /// Fold a resolved dependency bundle into the set. Identity, kind and
    /// provenance come from the bundle's revision records; XML entries are
    /// re-parsed only to feed synthesis and related-file lookup.
    pub fn add_bundle(&mut self, app: &ResolvedApplication) {
        for record in &app.records {
            if !self.group.includes(record.kind) {
                continue;
            }
            let path = app.entry_path(record);
            let mut item = None;
            let mut related = Vec::new();
            if !record.kind.is_program() && self.group.parses_xml() {
                match std::fs::read_to_string(&path) {
                    Ok(content) => match parse::parse_item(&content) {
                        Ok(Some(parsed)) => {
                            related =
                                find_related(app.entry_dir(), parsed.related_files());
                            item = Some(parsed);
                        }
                        Ok(None) => {
                            log::debug!(
                                "bundle entry `{}` of {} yields no definition",
                                record.identifier,
                                app.name
                            );
                        }
                        Err(e) => {
                            log::warn!(
                                "unparseable bundle entry `{}` of {}: {e}",
                                record.identifier,
                                app.name
                            );
                        }
                    },
                    Err(e) => {
                        log::warn!(
                            "unreadable bundle entry `{}` of {}: {e}",
                            record.identifier,
                            app.name
                        );
                    }
                }
            }
            self.insert(MergedEntry {
                identifier: record.identifier.clone(),
                kind: record.kind,
                name: record.name.clone(),
                application: record.application.clone(),
                path,
                provenance: Provenance::new(record.revision.clone(), record.date),
                item,
                related,
            });
        }
    }

    /// Fold scanned files of the application's own tree into the set. This
    /// is the highest-precedence layer and must be added last.
    pub fn add_source_tree(&mut self, manifest: &AppManifest, base: &Path, rel_paths: &[String]) {
        let provenances = git::latest_changes(base, rel_paths);
        for rel_path in rel_paths {
            let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
            let Some(kind) = self.classifier.classify(file_name) else {
                self.push_extra(rel_path, base);
                continue;
            };
            let file = InstallFile {
                base: base.to_path_buf(),
                rel_path: rel_path.clone(),
                kind,
                provenance: provenances
                    .get(rel_path)
                    .cloned()
                    .unwrap_or_else(Provenance::unknown),
            };

            match file.kind {
                FileKind::Xml => {
                    if self.group.parses_xml() {
                        self.add_definition_file(manifest, file);
                    }
                }
                kind if kind.is_source() => {
                    self.add_source_file(manifest, file);
                }
                _ => self.push_extra(rel_path, base),
            }
        }
    }

    fn add_definition_file(&mut self, manifest: &AppManifest, file: InstallFile) {
        let path = file.abs_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("unreadable definition file `{}`: {e}", file.rel_path);
                self.push_extra(&file.rel_path, &file.base);
                return;
            }
        };
        let item = match parse::parse_item(&content) {
            Ok(Some(item)) => item,
            Ok(None) => {
                log::debug!(
                    "`{}` carries no identity, keeping as raw copy only",
                    file.rel_path
                );
                self.push_extra(&file.rel_path, &file.base);
                return;
            }
            Err(e) => {
                log::warn!("malformed definition file `{}`: {e}", file.rel_path);
                self.push_extra(&file.rel_path, &file.base);
                return;
            }
        };
        let kind = item.kind();
        if !self.group.includes(kind) {
            return;
        }

        let mut provenance = file.provenance.clone();
        let rel_dir = file.rel_dir();
        let mut related = Vec::new();
        for name in item.related_files() {
            let related_rel = if rel_dir.is_empty() {
                name.clone()
            } else {
                format!("{rel_dir}/{name}")
            };
            let related_path = file.base.join(&related_rel);
            if !related_path.exists() {
                log::warn!(
                    "related file `{related_rel}` of `{}` not found",
                    file.rel_path
                );
                continue;
            }
            // A newer related file bumps the primary's provenance wholesale,
            // revision included.
            let related_provenance = git::latest_change(&file.base, &related_rel);
            if related_provenance.date > provenance.date {
                log::debug!(
                    "provenance of `{}` replaced by newer related file `{related_rel}`",
                    file.rel_path
                );
                provenance = related_provenance;
            }
            related.push(RelatedFile {
                name: name.clone(),
                path: related_path,
            });
        }

        self.insert(MergedEntry {
            identifier: item.uuid().to_string(),
            kind,
            name: manifest.display_name(&file.rel_path),
            application: manifest.application.clone(),
            path,
            provenance,
            item: Some(item),
            related,
        });
    }

    fn add_source_file(&mut self, manifest: &AppManifest, file: InstallFile) {
        let kind = match file.kind {
            FileKind::Java => ItemKind::JavaProgram,
            FileKind::Css => ItemKind::CssProgram,
            FileKind::Js => ItemKind::JsProgram,
            FileKind::Jrxml => ItemKind::JasperReport,
            FileKind::Wiki => ItemKind::WikiProgram,
            _ => unreachable!("only source kinds reach here"),
        };
        if !self.group.includes(kind) {
            return;
        }
        let path = file.abs_path();
        let stem = file
            .file_name()
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or_else(|| file.file_name());

        let identifier = match kind {
            ItemKind::JavaProgram => {
                let content = match std::fs::read_to_string(&path) {
                    Ok(content) => content,
                    Err(e) => {
                        log::warn!("unreadable source file `{}`: {e}", file.rel_path);
                        self.push_extra(&file.rel_path, &file.base);
                        return;
                    }
                };
                parse::java_program_name(&content, stem)
            }
            ItemKind::JasperReport => {
                let content = match std::fs::read_to_string(&path) {
                    Ok(content) => content,
                    Err(e) => {
                        log::warn!("unreadable report file `{}`: {e}", file.rel_path);
                        self.push_extra(&file.rel_path, &file.base);
                        return;
                    }
                };
                match parse::jasper_report_uuid(&content) {
                    Some(uuid) => uuid.to_string(),
                    None => {
                        log::debug!(
                            "`{}` has no report uuid, keeping as raw copy only",
                            file.rel_path
                        );
                        self.push_extra(&file.rel_path, &file.base);
                        return;
                    }
                }
            }
            // program name is the relative path minus the extension
            _ => file
                .rel_path
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_owned())
                .unwrap_or_else(|| file.rel_path.clone()),
        };

        self.insert(MergedEntry {
            identifier,
            kind,
            name: manifest.display_name(&file.rel_path),
            application: manifest.application.clone(),
            path,
            provenance: file.provenance,
            item: None,
            related: Vec::new(),
        });
    }

    fn insert(&mut self, entry: MergedEntry) {
        let identifier = entry.identifier.clone();
        if let Some(previous) = self.set.entries.insert(identifier.clone(), entry) {
            let replacement = self.set.entries[&identifier].application.clone();
            log::debug!(
                "identifier `{identifier}` of {} overridden by {replacement}",
                previous.application,
            );
            self.set.overrides.push(Shadowed {
                identifier,
                previous: previous.application,
                replacement,
            });
        }
    }

    fn push_extra(&mut self, rel_path: &str, base: &Path) {
        if self.group.copies_unmatched() {
            self.set.extras.push(Extra {
                rel_path: rel_path.to_owned(),
                path: base.join(rel_path),
            });
        }
    }
}

fn find_related(dir: &Path, names: &[String]) -> Vec<RelatedFile> {
    let mut related = Vec::new();
    for name in names {
        let path = dir.join(name);
        if path.exists() {
            related.push(RelatedFile {
                name: name.clone(),
                path,
            });
        } else {
            log::warn!("related file `{name}` missing from bundle");
        }
    }
    related
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn manifest(app: &str) -> AppManifest {
        AppManifest {
            application: app.to_owned(),
            root_package: Some(format!("org/acme/{app}")),
            dependencies: vec![],
        }
    }

    fn write(base: &Path, rel: &str, content: &str) {
        let path = base.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const U1: &str = "87f5e4f0-b55f-49f4-b61a-e402d0545f09";

    fn type_xml(uuid: &str, name: &str) -> String {
        format!(
            "<datamodel-type><uuid>{uuid}</uuid>\
             <definition><version-expression>(version==latest)</version-expression>\
             <name>{name}</name></definition></datamodel-type>"
        )
    }

    #[test]
    fn later_file_set_wins() {
        let dir = tempfile::tempdir().unwrap();
        let low = dir.path().join("low");
        let high = dir.path().join("high");
        write(&low, "TypeA.xml", &type_xml(U1, "Low_Type"));
        write(&high, "TypeA.xml", &type_xml(U1, "High_Type"));

        let mut merger = Merger::new(FileClassifier::new(), TypeGroup::All);
        merger.add_source_tree(&manifest("low-app"), &low, &["TypeA.xml".to_owned()]);
        merger.add_source_tree(&manifest("high-app"), &high, &["TypeA.xml".to_owned()]);
        let set = merger.finish();

        assert_eq!(set.entries.len(), 1);
        let entry = &set.entries[U1];
        assert_eq!(entry.application, "high-app");
        assert_eq!(entry.item.as_ref().unwrap().name(), Some("High_Type"));
        // the shadowed identity is discarded entirely, only the audit row remains
        assert_eq!(
            set.overrides,
            vec![Shadowed {
                identifier: U1.to_owned(),
                previous: "low-app".to_owned(),
                replacement: "high-app".to_owned(),
            }]
        );
    }

    #[test]
    fn record_order_is_first_insertion() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        write(base, "a/First.xml", &type_xml(U1, "First"));
        write(
            base,
            "b/Second.xml",
            &type_xml("53a04e20-0b33-4063-b08c-4275a64e2b75", "Second"),
        );
        write(base, "c/Override.xml", &type_xml(U1, "Override"));

        let mut merger = Merger::new(FileClassifier::new(), TypeGroup::All);
        merger.add_source_tree(
            &manifest("app"),
            base,
            &[
                "a/First.xml".to_owned(),
                "b/Second.xml".to_owned(),
                "c/Override.xml".to_owned(),
            ],
        );
        let set = merger.finish();

        let ids: Vec<&str> = set.entries.keys().map(String::as_str).collect();
        // the overridden identifier keeps its original position
        assert_eq!(ids, vec![U1, "53a04e20-0b33-4063-b08c-4275a64e2b75"]);
        assert_eq!(
            set.entries[U1].item.as_ref().unwrap().name(),
            Some("Override")
        );
    }

    #[test]
    fn program_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        write(
            base,
            "org/acme/esjp/Listener.java",
            "package org.acme.esjp;\nclass Listener {}\n",
        );
        write(base, "org/acme/ui/style.css", "body {}\n");
        write(
            base,
            "org/acme/reports/Sales.jrxml",
            r#"<jasperReport uuid="411dcd20-4c20-4fa6-8e3c-f57e3f50fcdb"/>"#,
        );

        let mut merger = Merger::new(FileClassifier::new(), TypeGroup::All);
        merger.add_source_tree(
            &manifest("app"),
            base,
            &[
                "org/acme/esjp/Listener.java".to_owned(),
                "org/acme/ui/style.css".to_owned(),
                "org/acme/reports/Sales.jrxml".to_owned(),
            ],
        );
        let set = merger.finish();

        let ids: Vec<&str> = set.entries.keys().map(String::as_str).collect();
        assert_eq!(
            ids,
            vec![
                "org.acme.esjp.Listener",
                "org/acme/ui/style",
                "411dcd20-4c20-4fa6-8e3c-f57e3f50fcdb",
            ]
        );
        assert_eq!(set.entries["org/acme/ui/style"].kind, ItemKind::CssProgram);
        assert_eq!(
            set.entries["org.acme.esjp.Listener"].entry_name(),
            "org.acme.esjp.Listener.java"
        );
    }

    #[test]
    fn group_filters_skip_parsing_and_items() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        write(base, "Type.xml", &type_xml(U1, "A_Type"));
        write(base, "style.css", "body {}\n");

        let mut merger = Merger::new(FileClassifier::new(), TypeGroup::Program);
        merger.add_source_tree(
            &manifest("app"),
            base,
            &["Type.xml".to_owned(), "style.css".to_owned()],
        );
        let set = merger.finish();
        assert_eq!(set.entries.len(), 1);
        assert_eq!(set.entries.values().next().unwrap().kind, ItemKind::CssProgram);

        let mut merger = Merger::new(FileClassifier::new(), TypeGroup::Datamodel);
        merger.add_source_tree(
            &manifest("app"),
            base,
            &["Type.xml".to_owned(), "style.css".to_owned()],
        );
        let set = merger.finish();
        assert_eq!(set.entries.len(), 1);
        assert_eq!(
            set.entries.values().next().unwrap().kind,
            ItemKind::DatamodelType
        );
    }

    #[test]
    fn uuidless_xml_becomes_extra_for_group_all() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        write(base, "broken.xml", "<datamodel-type><definition/></datamodel-type>");
        write(base, "logo.png", "not really a png");

        let mut merger = Merger::new(FileClassifier::new(), TypeGroup::All);
        merger.add_source_tree(
            &manifest("app"),
            base,
            &["broken.xml".to_owned(), "logo.png".to_owned()],
        );
        let set = merger.finish();
        assert!(set.entries.is_empty());
        let extras: Vec<&str> = set.extras.iter().map(|e| e.rel_path.as_str()).collect();
        assert_eq!(extras, vec!["broken.xml", "logo.png"]);

        // for a narrower group the same files are dropped entirely
        let mut merger = Merger::new(FileClassifier::new(), TypeGroup::Ui);
        merger.add_source_tree(
            &manifest("app"),
            base,
            &["broken.xml".to_owned(), "logo.png".to_owned()],
        );
        let set = merger.finish();
        assert!(set.entries.is_empty());
        assert!(set.extras.is_empty());
    }

    #[test]
    fn newer_related_file_replaces_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        write(
            base,
            "Acme.xml",
            "<dbproperties><uuid>23c4ca41-3bea-4c17-8b74-3d54f9c0e527</uuid>\
             <definition><name>Acme_Props</name></definition>\
             <file>logo.png</file></dbproperties>",
        );
        write(base, "logo.png", "png bytes");

        let run_git = |args: &[&str], date: &str| {
            std::process::Command::new("git")
                .current_dir(base)
                .args(args)
                .env("GIT_AUTHOR_DATE", date)
                .env("GIT_COMMITTER_DATE", date)
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        };
        if !run_git(&["init", "-q"], "2024-01-01T10:00:00+00:00") {
            // no usable git in this environment, nothing to assert here
            return;
        }
        assert!(run_git(&["add", "Acme.xml"], "2024-01-01T10:00:00+00:00"));
        assert!(run_git(
            &["-c", "user.name=t", "-c", "user.email=t@t", "commit", "-q", "-m", "one"],
            "2024-01-01T10:00:00+00:00"
        ));
        assert!(run_git(&["add", "logo.png"], "2024-06-01T10:00:00+00:00"));
        assert!(run_git(
            &["-c", "user.name=t", "-c", "user.email=t@t", "commit", "-q", "-m", "two"],
            "2024-06-01T10:00:00+00:00"
        ));

        let mut merger = Merger::new(FileClassifier::new(), TypeGroup::All);
        merger.add_source_tree(&manifest("app"), base, &["Acme.xml".to_owned()]);
        let set = merger.finish();

        let entry = &set.entries["23c4ca41-3bea-4c17-8b74-3d54f9c0e527"];
        // revision and date both come from the newer related file
        let expected = git::latest_change(base, "logo.png");
        assert!(!expected.is_unknown());
        assert_eq!(entry.provenance, expected);
    }

    #[test]
    fn related_files_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        write(
            base,
            "props/Acme.xml",
            "<dbproperties><uuid>23c4ca41-3bea-4c17-8b74-3d54f9c0e527</uuid>\
             <definition><name>Acme_Props</name></definition>\
             <file>Acme.properties</file><file>missing.properties</file></dbproperties>",
        );
        write(base, "props/Acme.properties", "key=value\n");

        let mut merger = Merger::new(FileClassifier::new(), TypeGroup::All);
        merger.add_source_tree(&manifest("app"), base, &["props/Acme.xml".to_owned()]);
        let set = merger.finish();

        let entry = &set.entries["23c4ca41-3bea-4c17-8b74-3d54f9c0e527"];
        // the missing sibling is skipped, not fatal
        assert_eq!(entry.related.len(), 1);
        assert_eq!(entry.related[0].name, "Acme.properties");
    }
}
