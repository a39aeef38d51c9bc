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

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};

use crate::kind::{FileKind, ItemKind};

pub const VERSIONS_XML: &str = "versions.xml";
pub const INSTALL_XML: &str = "install.xml";
pub const REVISIONS_JSON: &str = "revisions.json";

/// Revision sentinel for files without version-control history.
pub const UNKNOWN_REVISION: &str = "-";

pub const DEFAULT_INCLUDES: &[&str] = &[
    "**/*.xml",
    "**/*.java",
    "**/*.css",
    "**/*.js",
    "**/*.jrxml",
    "**/*.wiki",
    "**/*.xsl",
    "**/*.bpmn2",
    "**/*.csv",
    "**/*.gif",
    "**/*.png",
    "**/*.jpg",
    "**/*.jpeg",
    "**/*.svg",
];

pub const DEFAULT_EXCLUDES: &[&str] = &["**/versions.xml", "**/package-info.java"];

/// Best-known revision and timestamp of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub revision: String,
    pub date: DateTime<FixedOffset>,
}

impl Provenance {
    pub fn new(revision: impl Into<String>, date: DateTime<FixedOffset>) -> Self {
        Provenance {
            revision: revision.into(),
            date,
        }
    }

    /// Degraded sentinel: no history known, stamped with the current time.
    pub fn unknown() -> Self {
        Provenance {
            revision: UNKNOWN_REVISION.to_owned(),
            date: Local::now().fixed_offset(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.revision == UNKNOWN_REVISION
    }
}

/// One physical artifact under consideration for packaging. Created by the
/// scanner and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct InstallFile {
    /// Directory the relative path is anchored in.
    pub base: PathBuf,
    /// `/`-separated path below `base`.
    pub rel_path: String,
    pub kind: FileKind,
    pub provenance: Provenance,
}

impl InstallFile {
    pub fn abs_path(&self) -> PathBuf {
        self.base.join(&self.rel_path)
    }

    pub fn file_name(&self) -> &str {
        self.rel_path
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.rel_path)
    }

    /// Directory part of the relative path, without trailing slash.
    pub fn rel_dir(&self) -> &str {
        self.rel_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }
}

/// Identity and provenance of one merged item, as emitted into the
/// `revisions.json` sidecar. Exactly one record exists per identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub identifier: String,
    /// Display path of the file, prefixed with the owning root package.
    pub name: String,
    pub application: String,
    pub revision: String,
    pub date: DateTime<FixedOffset>,
}

impl RevisionRecord {
    /// Name of the archive entry holding this record's content.
    pub fn entry_name(&self) -> String {
        format!("{}{}", self.identifier, self.kind.archive_extension())
    }
}
