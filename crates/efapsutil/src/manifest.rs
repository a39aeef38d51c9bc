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

//! Reading and writing of the two manifest documents: the application
//! manifest `versions.xml` (hand written, declares name/root package and the
//! ordered dependency list) and the emitted package manifest `install.xml`.

use std::io::Write;
use std::path::Path;

use anyhow::bail;
use chrono::{DateTime, FixedOffset};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::common::{INSTALL_XML, VERSIONS_XML};
use crate::kind::ItemKind;

/// Declared reference to another application's packaged bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Version,
}

impl Dependency {
    /// Identity key ignoring the version, used to break resolution cycles.
    pub fn key(&self) -> (String, String) {
        (self.group_id.clone(), self.artifact_id.clone())
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}@{}",
            self.group_id, self.artifact_id, self.version
        )
    }
}

/// The application manifest read from `versions.xml`.
#[derive(Debug, Clone, Default)]
pub struct AppManifest {
    pub application: String,
    pub root_package: Option<String>,
    pub dependencies: Vec<Dependency>,
}

impl AppManifest {
    /// Prefix a scanned relative path with the root package.
    pub fn display_name(&self, rel_path: &str) -> String {
        match &self.root_package {
            Some(root) if !root.is_empty() => {
                format!("{}/{}", root.trim_end_matches('/'), rel_path)
            }
            _ => rel_path.to_owned(),
        }
    }
}

/// The package manifest of an emitted bundle, `install.xml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallManifest {
    pub application: String,
    pub root_package: Option<String>,
    pub dependencies: Vec<Dependency>,
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestFile {
    pub kind: ItemKind,
    pub name: String,
    pub revision: String,
    pub date: DateTime<FixedOffset>,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to load `{}`", path.display())]
pub struct ManifestError {
    path: Box<Path>,
    #[source]
    kind: ManifestErrorKind,
}

impl ManifestError {
    fn new(path: &Path, kind: ManifestErrorKind) -> Self {
        ManifestError {
            path: path.into(),
            kind,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestErrorKind {
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("XML error")]
    Xml(#[from] quick_xml::Error),
    #[error("missing `application` name")]
    MissingApplication,
    #[error("`version` bad format")]
    Version(#[from] semver::Error),
    #[error("bad `file` element: {0}")]
    BadFile(String),
}

/// Read the application manifest from `<dir>/versions.xml`.
pub fn read_app_manifest_in_dir(dir: &Path) -> anyhow::Result<AppManifest> {
    let path = dir.join(VERSIONS_XML);
    if !path.exists() {
        bail!("`{}` does not exist", path.display());
    }
    Ok(read_app_manifest(&path)?)
}

pub fn read_app_manifest(path: &Path) -> Result<AppManifest, ManifestError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ManifestError::new(path, ManifestErrorKind::Io(e)))?;
    parse_app_manifest(&content).map_err(|kind| ManifestError::new(path, kind))
}

pub fn parse_app_manifest(content: &str) -> Result<AppManifest, ManifestErrorKind> {
    let mut reader = Reader::from_str(content);

    let mut application = None;
    let mut root_package = None;
    let mut dependencies = Vec::new();

    let mut in_dependency = false;
    let mut current_tag: Option<String> = None;
    let mut group_id: Option<String> = None;
    let mut artifact_id: Option<String> = None;
    let mut version: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "dependency" {
                    in_dependency = true;
                    group_id = None;
                    artifact_id = None;
                    version = None;
                    current_tag = None;
                } else {
                    current_tag = Some(name);
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "dependency" && in_dependency {
                    if let (Some(g), Some(a), Some(v)) =
                        (group_id.take(), artifact_id.take(), version.take())
                    {
                        dependencies.push(Dependency {
                            group_id: g,
                            artifact_id: a,
                            version: Version::parse(&v)?,
                        });
                    }
                    in_dependency = false;
                }
                current_tag = None;
            }
            Event::Text(t) => {
                let txt = t.unescape()?.trim().to_string();
                if txt.is_empty() {
                    continue;
                }
                match current_tag.as_deref() {
                    Some("groupId") if in_dependency => group_id = Some(txt),
                    Some("artifactId") if in_dependency => artifact_id = Some(txt),
                    Some("version") if in_dependency => version = Some(txt),
                    Some("application") if !in_dependency => application = Some(txt),
                    Some("root-package") | Some("rootPackage") if !in_dependency => {
                        root_package = Some(txt)
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let application = application.ok_or(ManifestErrorKind::MissingApplication)?;
    Ok(AppManifest {
        application,
        root_package,
        dependencies,
    })
}

/// Read the package manifest from `<dir>/install.xml`.
pub fn read_install_manifest_in_dir(dir: &Path) -> anyhow::Result<InstallManifest> {
    let path = dir.join(INSTALL_XML);
    if !path.exists() {
        bail!("`{}` does not exist", path.display());
    }
    Ok(read_install_manifest(&path)?)
}

pub fn read_install_manifest(path: &Path) -> Result<InstallManifest, ManifestError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ManifestError::new(path, ManifestErrorKind::Io(e)))?;
    parse_install_manifest(&content).map_err(|kind| ManifestError::new(path, kind))
}

pub fn parse_install_manifest(content: &str) -> Result<InstallManifest, ManifestErrorKind> {
    // The header part (application, root package, dependencies) shares its
    // layout with versions.xml.
    let app = parse_app_manifest(content)?;

    let mut reader = Reader::from_str(content);
    let mut files = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Empty(e) if e.name().as_ref() == b"file" => {
                let mut kind = None;
                let mut name = None;
                let mut revision = None;
                let mut date = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    let value = attr.unescape_value()?.to_string();
                    match attr.key.as_ref() {
                        b"type" => {
                            kind = Some(value.parse::<ItemKind>().map_err(|e| {
                                ManifestErrorKind::BadFile(e.to_string())
                            })?)
                        }
                        b"name" => name = Some(value),
                        b"revision" => revision = Some(value),
                        b"date" => {
                            date = Some(DateTime::parse_from_rfc3339(&value).map_err(|e| {
                                ManifestErrorKind::BadFile(format!("bad date: {e}"))
                            })?)
                        }
                        _ => {}
                    }
                }
                match (kind, name, revision, date) {
                    (Some(kind), Some(name), Some(revision), Some(date)) => {
                        files.push(ManifestFile {
                            kind,
                            name,
                            revision,
                            date,
                        });
                    }
                    _ => {
                        return Err(ManifestErrorKind::BadFile(
                            "missing one of type/name/revision/date".to_owned(),
                        ))
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(InstallManifest {
        application: app.application,
        root_package: app.root_package,
        dependencies: app.dependencies,
        files,
    })
}

/// Serialize an `install.xml` document. Files are emitted sorted by name so
/// identical inputs produce byte-identical manifests.
pub fn write_install_manifest(m: &InstallManifest, out: impl Write) -> anyhow::Result<()> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer.write_event(Event::Start(BytesStart::new("install")))?;

    write_text_element(&mut writer, "application", &m.application)?;
    if let Some(root) = &m.root_package {
        write_text_element(&mut writer, "rootPackage", root)?;
    }

    writer.write_event(Event::Start(BytesStart::new("dependencies")))?;
    for dep in &m.dependencies {
        writer.write_event(Event::Start(BytesStart::new("dependency")))?;
        write_text_element(&mut writer, "groupId", &dep.group_id)?;
        write_text_element(&mut writer, "artifactId", &dep.artifact_id)?;
        write_text_element(&mut writer, "version", &dep.version.to_string())?;
        writer.write_event(Event::End(BytesEnd::new("dependency")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("dependencies")))?;

    let mut sorted: Vec<&ManifestFile> = m.files.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    writer.write_event(Event::Start(BytesStart::new("files")))?;
    for file in sorted {
        let mut el = BytesStart::new("file");
        el.push_attribute(("type", file.kind.to_str()));
        el.push_attribute(("name", file.name.as_str()));
        el.push_attribute(("revision", file.revision.as_str()));
        el.push_attribute(("date", file.date.to_rfc3339().as_str()));
        writer.write_event(Event::Empty(el))?;
    }
    writer.write_event(Event::End(BytesEnd::new("files")))?;

    writer.write_event(Event::End(BytesEnd::new("install")))?;
    Ok(())
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> anyhow::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    #[test]
    fn parse_versions() {
        let m = parse_app_manifest(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<versions>
  <application>acme-products</application>
  <root-package>org/acme/products</root-package>
  <dependencies>
    <dependency>
      <groupId>org.acme</groupId>
      <artifactId>acme-kernel</artifactId>
      <version>2.1.0</version>
    </dependency>
    <dependency>
      <groupId>org.acme</groupId>
      <artifactId>acme-ui</artifactId>
      <version>1.4.2</version>
    </dependency>
  </dependencies>
</versions>"#,
        )
        .unwrap();
        assert_eq!(m.application, "acme-products");
        assert_eq!(m.root_package.as_deref(), Some("org/acme/products"));
        assert_eq!(m.dependencies.len(), 2);
        assert_eq!(m.dependencies[0].artifact_id, "acme-kernel");
        assert_eq!(m.dependencies[1].version, Version::new(1, 4, 2));
        assert_eq!(
            m.display_name("Admin_Type.xml"),
            "org/acme/products/Admin_Type.xml"
        );
    }

    #[test]
    fn missing_application_is_an_error() {
        let err = parse_app_manifest("<versions><root-package>x</root-package></versions>")
            .unwrap_err();
        assert!(matches!(err, ManifestErrorKind::MissingApplication));
    }

    #[test]
    fn install_manifest_round_trip() {
        let date = DateTime::parse_from_rfc3339("2024-03-01T12:00:00+01:00").unwrap();
        let m = InstallManifest {
            application: "acme-products".to_owned(),
            root_package: Some("org/acme/products".to_owned()),
            dependencies: vec![Dependency {
                group_id: "org.acme".to_owned(),
                artifact_id: "acme-kernel".to_owned(),
                version: Version::new(2, 1, 0),
            }],
            files: vec![
                ManifestFile {
                    kind: ItemKind::Form,
                    name: "org/acme/products/ui/Product_Form.xml".to_owned(),
                    revision: "bd1c".to_owned(),
                    date,
                },
                ManifestFile {
                    kind: ItemKind::DatamodelType,
                    name: "org/acme/products/Product.xml".to_owned(),
                    revision: "a0f3".to_owned(),
                    date,
                },
            ],
        };
        let mut buf = Vec::new();
        write_install_manifest(&m, &mut buf).unwrap();
        let xml = String::from_utf8(buf).unwrap();
        expect![[r#"
            <?xml version="1.0" encoding="UTF-8"?>
            <install>
              <application>acme-products</application>
              <rootPackage>org/acme/products</rootPackage>
              <dependencies>
                <dependency>
                  <groupId>org.acme</groupId>
                  <artifactId>acme-kernel</artifactId>
                  <version>2.1.0</version>
                </dependency>
              </dependencies>
              <files>
                <file type="datamodel-type" name="org/acme/products/Product.xml" revision="a0f3" date="2024-03-01T12:00:00+01:00"/>
                <file type="ui-form" name="org/acme/products/ui/Product_Form.xml" revision="bd1c" date="2024-03-01T12:00:00+01:00"/>
              </files>
            </install>"#]]
        .assert_eq(&xml);

        let parsed = parse_install_manifest(&xml).unwrap();
        assert_eq!(parsed.application, m.application);
        assert_eq!(parsed.dependencies, m.dependencies);
        // reading yields the sorted order
        assert_eq!(parsed.files[0].kind, ItemKind::DatamodelType);
        assert_eq!(parsed.files[1].kind, ItemKind::Form);
    }
}
