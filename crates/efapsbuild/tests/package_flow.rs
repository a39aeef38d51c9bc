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

//! End-to-end packaging flows: dependency inheritance, override precedence,
//! group filtering and the fatal error surface.

use std::fs;
use std::path::Path;

use efapsbuild::package::{build_install_set, run_package, InstallError, PackageOpt};
use efapsdeps::LocalStore;
use efapsutil::common::{RevisionRecord, REVISIONS_JSON};
use efapsutil::kind::TypeGroup;

const U1: &str = "87f5e4f0-b55f-49f4-b61a-e402d0545f09";

fn write(base: &Path, rel: &str, content: &str) {
    let path = base.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn versions_xml(app: &str, deps: &[(&str, &str, &str)]) -> String {
    let deps: String = deps
        .iter()
        .map(|(g, a, v)| {
            format!(
                "<dependency><groupId>{g}</groupId>\
                 <artifactId>{a}</artifactId><version>{v}</version></dependency>"
            )
        })
        .collect();
    format!(
        "<versions><application>{app}</application>\
         <root-package>org/acme/{app}</root-package>\
         <dependencies>{deps}</dependencies></versions>"
    )
}

fn type_xml(uuid: &str, name: &str) -> String {
    format!(
        "<datamodel-type><uuid>{uuid}</uuid>\
         <definition><version-expression>(version==latest)</version-expression>\
         <name>{name}</name></definition></datamodel-type>"
    )
}

/// Package the application at `src` and place its bundle into the store
/// under the given coordinates.
fn package_into_store(src: &Path, store_root: &Path, group: &str, artifact: &str, version: &str) {
    let target = src.join("target");
    let opt = PackageOpt::new(src, &target);
    let result = run_package(&opt, &LocalStore::new(store_root)).unwrap();
    let dest = store_root.join(group).join(artifact).join(version);
    fs::create_dir_all(&dest).unwrap();
    fs::copy(
        result.archive_path,
        dest.join(format!("{artifact}-{version}.tar.gz")),
    )
    .unwrap();
}

fn archive_entries(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).unwrap();
    let read: Box<dyn std::io::Read> = if path.extension().is_some_and(|e| e == "gz") {
        Box::new(flate2::read::GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut archive = tar::Archive::new(read);
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn archive_records(path: &Path) -> Vec<RevisionRecord> {
    let file = fs::File::open(path).unwrap();
    let read: Box<dyn std::io::Read> = if path.extension().is_some_and(|e| e == "gz") {
        Box::new(flate2::read::GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut archive = tar::Archive::new(read);
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        if entry.path().unwrap().to_string_lossy() == REVISIONS_JSON {
            return serde_json::from_reader(&mut entry).unwrap();
        }
    }
    panic!("no revisions.json in `{}`", path.display());
}

#[test]
fn inherited_entry_keeps_owning_application() {
    let root = tempfile::tempdir().unwrap();
    let store_root = root.path().join("store");

    let b_src = root.path().join("app-b");
    write(&b_src, "versions.xml", &versions_xml("app-b", &[]));
    write(&b_src, "TypeB.xml", &type_xml(U1, "B_Type"));
    package_into_store(&b_src, &store_root, "org.acme", "app-b", "1.0.0");

    let a_src = root.path().join("app-a");
    write(
        &a_src,
        "versions.xml",
        &versions_xml("app-a", &[("org.acme", "app-b", "1.0.0")]),
    );

    let opt = PackageOpt::new(&a_src, &a_src.join("target"));
    let store = LocalStore::new(&store_root);
    let (_, set) = build_install_set(&opt, &store).unwrap();

    assert_eq!(set.entries.len(), 1);
    let entry = &set.entries[U1];
    assert_eq!(entry.application, "app-b");
    assert_eq!(entry.name, "org/acme/app-b/TypeB.xml");
    assert!(set.overrides.is_empty());
}

#[test_log::test]
fn own_file_overrides_dependency() {
    let root = tempfile::tempdir().unwrap();
    let store_root = root.path().join("store");

    let b_src = root.path().join("app-b");
    write(&b_src, "versions.xml", &versions_xml("app-b", &[]));
    write(&b_src, "TypeB.xml", &type_xml(U1, "B_Type"));
    package_into_store(&b_src, &store_root, "org.acme", "app-b", "1.0.0");

    let a_src = root.path().join("app-a");
    write(
        &a_src,
        "versions.xml",
        &versions_xml("app-a", &[("org.acme", "app-b", "1.0.0")]),
    );
    write(&a_src, "TypeA.xml", &type_xml(U1, "A_Type"));

    let opt = PackageOpt::new(&a_src, &a_src.join("target"));
    let store = LocalStore::new(&store_root);
    let result = run_package(&opt, &store).unwrap();

    let records = archive_records(&result.archive_path);
    // identity uniqueness: exactly one record for the shared uuid
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identifier, U1);
    assert_eq!(records[0].application, "app-a");
    assert_eq!(records[0].name, "org/acme/app-a/TypeA.xml");
    // the old name is discarded entirely
    assert!(!records[0].name.contains("TypeB"));
    assert_eq!(
        result.overrides.iter().map(|s| s.previous.as_str()).collect::<Vec<_>>(),
        vec!["app-b"]
    );

    // the archived bytes are the overriding application's
    let target2 = root.path().join("unpack");
    fs::create_dir_all(&target2).unwrap();
    let file = fs::File::open(&result.archive_path).unwrap();
    tar::Archive::new(flate2::read::GzDecoder::new(file))
        .unpack(&target2)
        .unwrap();
    let content = fs::read_to_string(target2.join(format!("{U1}.xml"))).unwrap();
    assert!(content.contains("A_Type"));
}

#[test]
fn group_filtering_excludes_program_kinds() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("app");
    write(&src, "versions.xml", &versions_xml("app", &[]));
    write(&src, "Type.xml", &type_xml(U1, "A_Type"));
    write(&src, "esjp/Listener.java", "package org.acme.esjp;\nclass Listener {}\n");
    write(&src, "ui/style.css", "body {}\n");

    let mut opt = PackageOpt::new(&src, &src.join("target"));
    opt.group = TypeGroup::Datamodel;
    opt.compress = false;
    let store = LocalStore::new(root.path().join("store"));
    let result = run_package(&opt, &store).unwrap();

    let entries = archive_entries(&result.archive_path);
    assert!(entries.iter().all(|e| !e.ends_with(".java")));
    assert!(entries.iter().all(|e| !e.ends_with(".css")));
    assert!(entries.contains(&format!("{U1}.xml")));
}

#[test]
fn degraded_provenance_still_packages() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("app");
    write(&src, "versions.xml", &versions_xml("app", &[]));
    write(&src, "Type.xml", &type_xml(U1, "A_Type"));

    let opt = PackageOpt::new(&src, &src.join("target"));
    let store = LocalStore::new(root.path().join("store"));
    let result = run_package(&opt, &store).unwrap();

    let records = archive_records(&result.archive_path);
    assert_eq!(records[0].revision, "-");
}

#[test]
fn missing_application_name_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("app");
    write(&src, "versions.xml", "<versions><root-package>x</root-package></versions>");

    let opt = PackageOpt::new(&src, &src.join("target"));
    let store = LocalStore::new(root.path().join("store"));
    let err = run_package(&opt, &store).unwrap_err();
    assert!(matches!(err, InstallError::Manifest(_)));
}

#[test]
fn unresolvable_dependency_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("app");
    write(
        &src,
        "versions.xml",
        &versions_xml("app", &[("org.acme", "nowhere", "1.0.0")]),
    );

    let opt = PackageOpt::new(&src, &src.join("target"));
    let store = LocalStore::new(root.path().join("store"));
    let err = run_package(&opt, &store).unwrap_err();
    assert!(matches!(err, InstallError::Dependency(_)));
    // no archive was produced
    assert!(!src.join("target").join("app.tar.gz").exists());
}

#[test]
fn transitive_dependencies_merge_in_declared_order() {
    let root = tempfile::tempdir().unwrap();
    let store_root = root.path().join("store");

    let kernel = root.path().join("kernel");
    write(&kernel, "versions.xml", &versions_xml("kernel", &[]));
    write(&kernel, "Base.xml", &type_xml(U1, "Kernel_Type"));
    package_into_store(&kernel, &store_root, "org.acme", "kernel", "1.0.0");

    let ui = root.path().join("ui");
    write(
        &ui,
        "versions.xml",
        &versions_xml("ui", &[("org.acme", "kernel", "1.0.0")]),
    );
    write(&ui, "Base.xml", &type_xml(U1, "Ui_Type"));
    package_into_store(&ui, &store_root, "org.acme", "ui", "1.0.0");

    let app = root.path().join("app");
    write(
        &app,
        "versions.xml",
        &versions_xml("app", &[("org.acme", "ui", "1.0.0")]),
    );

    let opt = PackageOpt::new(&app, &app.join("target"));
    let store = LocalStore::new(&store_root);
    let (_, set) = build_install_set(&opt, &store).unwrap();

    // kernel was merged before ui, so ui's definition of the shared uuid wins
    assert_eq!(set.entries[U1].application, "ui");
    assert_eq!(
        set.overrides
            .iter()
            .map(|s| (s.previous.as_str(), s.replacement.as_str()))
            .collect::<Vec<_>>(),
        vec![("kernel", "ui")]
    );
}
