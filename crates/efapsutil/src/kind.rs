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

use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Physical kind of an install file, derived from its file name extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileKind {
    Xml,
    Java,
    Css,
    Js,
    Jrxml,
    Wiki,
    Xsl,
    Bpmn,
    Csv,
    /// Opaque but copyable content (images and similar). Never parsed.
    Media,
}

impl FileKind {
    pub fn to_str(&self) -> &'static str {
        match self {
            FileKind::Xml => "xml",
            FileKind::Java => "java",
            FileKind::Css => "css",
            FileKind::Js => "js",
            FileKind::Jrxml => "jrxml",
            FileKind::Wiki => "wiki",
            FileKind::Xsl => "xsl",
            FileKind::Bpmn => "bpmn2",
            FileKind::Csv => "csv",
            FileKind::Media => "media",
        }
    }

    /// Kinds that carry a derivable program identity instead of a uuid.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            FileKind::Java | FileKind::Css | FileKind::Js | FileKind::Jrxml | FileKind::Wiki
        )
    }
}

/// Maps file names to [`FileKind`]s through an immutable extension table.
///
/// The table is fixed at construction; callers either take the default table
/// or inject their own, there is no shared mutable default.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    table: IndexMap<String, FileKind>,
}

impl FileClassifier {
    pub fn new() -> Self {
        let mut table = IndexMap::new();
        for (ext, kind) in [
            ("xml", FileKind::Xml),
            ("java", FileKind::Java),
            ("css", FileKind::Css),
            ("js", FileKind::Js),
            ("jrxml", FileKind::Jrxml),
            ("wiki", FileKind::Wiki),
            ("xsl", FileKind::Xsl),
            ("bpmn2", FileKind::Bpmn),
            ("csv", FileKind::Csv),
            ("gif", FileKind::Media),
            ("png", FileKind::Media),
            ("jpg", FileKind::Media),
            ("jpeg", FileKind::Media),
            ("svg", FileKind::Media),
        ] {
            table.insert(ext.to_owned(), kind);
        }
        FileClassifier { table }
    }

    /// Default table with individual entries replaced or added.
    pub fn with_overrides(overrides: IndexMap<String, FileKind>) -> Self {
        let mut classifier = Self::new();
        for (ext, kind) in overrides {
            classifier.table.insert(ext.to_ascii_lowercase(), kind);
        }
        classifier
    }

    /// Classify by extension. `None` means the file is unknown; it stays
    /// eligible for raw-copy archival but is never parsed.
    pub fn classify(&self, file_name: &str) -> Option<FileKind> {
        let (_, ext) = file_name.rsplit_once('.')?;
        self.table.get(&ext.to_ascii_lowercase()).copied()
    }
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Semantic kind of a merged install item. XML kinds correspond to the root
/// element of the definition file, program kinds to compiled-source files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    DatamodelType,
    StatusGroup,
    SqlTable,
    Form,
    Table,
    Command,
    Menu,
    Module,
    Search,
    MsgPhrase,
    NumberGenerator,
    Role,
    AccessSet,
    DbProperties,
    Image,
    JasperImage,
    JavaProgram,
    CssProgram,
    JsProgram,
    JasperReport,
    WikiProgram,
}

impl ItemKind {
    pub fn to_str(&self) -> &'static str {
        match self {
            ItemKind::DatamodelType => "datamodel-type",
            ItemKind::StatusGroup => "datamodel-statusgroup",
            ItemKind::SqlTable => "datamodel-sqltable",
            ItemKind::Form => "ui-form",
            ItemKind::Table => "ui-table",
            ItemKind::Command => "ui-command",
            ItemKind::Menu => "ui-menu",
            ItemKind::Module => "module",
            ItemKind::Search => "search",
            ItemKind::MsgPhrase => "datamodel-msgphrase",
            ItemKind::NumberGenerator => "numbergenerator",
            ItemKind::Role => "datamodel-role",
            ItemKind::AccessSet => "datamodel-accessset",
            ItemKind::DbProperties => "dbproperties",
            ItemKind::Image => "image",
            ItemKind::JasperImage => "jasper-image",
            ItemKind::JavaProgram => "program-java",
            ItemKind::CssProgram => "program-css",
            ItemKind::JsProgram => "program-js",
            ItemKind::JasperReport => "program-jasper",
            ItemKind::WikiProgram => "program-wiki",
        }
    }

    /// Extension used for the archive entry of an item of this kind.
    pub fn archive_extension(&self) -> &'static str {
        match self {
            ItemKind::JavaProgram => ".java",
            ItemKind::CssProgram => ".css",
            ItemKind::JsProgram => ".js",
            ItemKind::JasperReport => ".jrxml",
            ItemKind::WikiProgram => ".wiki",
            _ => ".xml",
        }
    }

    pub fn is_program(&self) -> bool {
        matches!(
            self,
            ItemKind::JavaProgram
                | ItemKind::CssProgram
                | ItemKind::JsProgram
                | ItemKind::JasperReport
                | ItemKind::WikiProgram
        )
    }

    pub const ALL: &'static [ItemKind] = &[
        ItemKind::DatamodelType,
        ItemKind::StatusGroup,
        ItemKind::SqlTable,
        ItemKind::Form,
        ItemKind::Table,
        ItemKind::Command,
        ItemKind::Menu,
        ItemKind::Module,
        ItemKind::Search,
        ItemKind::MsgPhrase,
        ItemKind::NumberGenerator,
        ItemKind::Role,
        ItemKind::AccessSet,
        ItemKind::DbProperties,
        ItemKind::Image,
        ItemKind::JasperImage,
        ItemKind::JavaProgram,
        ItemKind::CssProgram,
        ItemKind::JsProgram,
        ItemKind::JasperReport,
        ItemKind::WikiProgram,
    ];
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown item kind `{0}`")]
pub struct UnknownItemKind(String);

impl std::str::FromStr for ItemKind {
    type Err = UnknownItemKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemKind::ALL
            .iter()
            .find(|k| k.to_str() == s)
            .copied()
            .ok_or_else(|| UnknownItemKind(s.to_owned()))
    }
}

impl Serialize for ItemKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.to_str())
    }
}

impl<'de> Deserialize<'de> for ItemKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Emission group controlling which item kinds end up in a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum TypeGroup {
    #[default]
    All,
    Datamodel,
    Ui,
    Program,
}

impl TypeGroup {
    pub fn includes(&self, kind: ItemKind) -> bool {
        match self {
            TypeGroup::All => true,
            TypeGroup::Datamodel => matches!(
                kind,
                ItemKind::DatamodelType | ItemKind::StatusGroup | ItemKind::SqlTable
            ),
            TypeGroup::Ui => matches!(
                kind,
                ItemKind::Form
                    | ItemKind::Table
                    | ItemKind::Command
                    | ItemKind::Menu
                    | ItemKind::Module
                    | ItemKind::Search
                    | ItemKind::DbProperties
                    | ItemKind::Image
                    | ItemKind::JasperImage
            ),
            TypeGroup::Program => matches!(
                kind,
                ItemKind::JavaProgram
                    | ItemKind::CssProgram
                    | ItemKind::JsProgram
                    | ItemKind::JasperReport
            ),
        }
    }

    /// Whether XML definition files need to be parsed at all for this group.
    pub fn parses_xml(&self) -> bool {
        !matches!(self, TypeGroup::Program)
    }

    /// Whether files without an identity are copied into the archive as-is.
    pub fn copies_unmatched(&self) -> bool {
        matches!(self, TypeGroup::All)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_defaults() {
        let c = FileClassifier::new();
        assert_eq!(c.classify("Type.xml"), Some(FileKind::Xml));
        assert_eq!(c.classify("Report.JRXML"), Some(FileKind::Jrxml));
        assert_eq!(c.classify("logo.png"), Some(FileKind::Media));
        assert_eq!(c.classify("noextension"), None);
        assert_eq!(c.classify("archive.tar.gz"), None);
    }

    #[test]
    fn classify_overrides() {
        let mut overrides = IndexMap::new();
        overrides.insert("tpl".to_owned(), FileKind::Wiki);
        overrides.insert("XML".to_owned(), FileKind::Media);
        let c = FileClassifier::with_overrides(overrides);
        assert_eq!(c.classify("page.tpl"), Some(FileKind::Wiki));
        // overridden away from the default
        assert_eq!(c.classify("Type.xml"), Some(FileKind::Media));
        // untouched default survives
        assert_eq!(c.classify("style.css"), Some(FileKind::Css));
    }

    #[test]
    fn item_kind_round_trip() {
        for kind in ItemKind::ALL {
            assert_eq!(kind.to_str().parse::<ItemKind>().unwrap(), *kind);
        }
        assert!("no-such-kind".parse::<ItemKind>().is_err());
    }

    #[test]
    fn group_membership() {
        assert!(TypeGroup::Datamodel.includes(ItemKind::DatamodelType));
        assert!(!TypeGroup::Datamodel.includes(ItemKind::Form));
        assert!(TypeGroup::Ui.includes(ItemKind::DbProperties));
        assert!(!TypeGroup::Ui.includes(ItemKind::JavaProgram));
        assert!(TypeGroup::Program.includes(ItemKind::CssProgram));
        assert!(!TypeGroup::Program.includes(ItemKind::WikiProgram));
        assert!(TypeGroup::All.includes(ItemKind::WikiProgram));
        assert!(!TypeGroup::Program.parses_xml());
        assert!(TypeGroup::Ui.parses_xml());
    }
}
