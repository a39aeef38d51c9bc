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

//! Parsing of XML definition files into the closed [`ParsedItem`] set, and
//! derivation of program identifiers for source-kind files.
//!
//! The parse is an explicit event loop dispatching on the root element tag;
//! there is no reflective binding. A file without a `<uuid>` yields
//! `Ok(None)` so callers can log and skip it; only malformed XML surfaces an
//! error, which is equally recoverable for the caller.

use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use uuid::Uuid;

use efapsutil::kind::ItemKind;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("XML error")]
    Xml(#[from] quick_xml::Error),
}

/// One version-scoped revision of a named item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Definition {
    pub version_expr: String,
    pub name: String,
    pub parent: Option<String>,
    pub profiles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub attr_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub core: Definition,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDefinition {
    pub core: Definition,
    pub statuses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiDefinition {
    pub core: Definition,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeItem {
    pub uuid: Uuid,
    pub definitions: Vec<TypeDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusGroupItem {
    pub uuid: Uuid,
    pub definitions: Vec<StatusDefinition>,
}

/// `ui-form` or `ui-table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiItem {
    pub kind: ItemKind,
    pub uuid: Uuid,
    pub definitions: Vec<UiDefinition>,
}

/// Items without kind-specific children: commands, menus, roles and the
/// other plainly named definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainItem {
    pub kind: ItemKind,
    pub uuid: Uuid,
    pub definitions: Vec<Definition>,
}

/// Items referencing sibling files on disk (dbproperties, images).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceItem {
    pub kind: ItemKind,
    pub uuid: Uuid,
    pub definitions: Vec<Definition>,
    pub files: Vec<String>,
}

/// Closed set of parsed definition items. Structurally identical root tags
/// share a variant; the concrete tag survives in the carried [`ItemKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedItem {
    Type(TypeItem),
    StatusGroup(StatusGroupItem),
    Ui(UiItem),
    Plain(PlainItem),
    Resource(ResourceItem),
}

impl ParsedItem {
    pub fn uuid(&self) -> Uuid {
        match self {
            ParsedItem::Type(i) => i.uuid,
            ParsedItem::StatusGroup(i) => i.uuid,
            ParsedItem::Ui(i) => i.uuid,
            ParsedItem::Plain(i) => i.uuid,
            ParsedItem::Resource(i) => i.uuid,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            ParsedItem::Type(_) => ItemKind::DatamodelType,
            ParsedItem::StatusGroup(_) => ItemKind::StatusGroup,
            ParsedItem::Ui(i) => i.kind,
            ParsedItem::Plain(i) => i.kind,
            ParsedItem::Resource(i) => i.kind,
        }
    }

    /// Sibling files this item references; empty for items without the
    /// related-files capability.
    pub fn related_files(&self) -> &[String] {
        match self {
            ParsedItem::Resource(i) => &i.files,
            _ => &[],
        }
    }

    /// Name of the first (canonical) definition.
    pub fn name(&self) -> Option<&str> {
        let name = match self {
            ParsedItem::Type(i) => i.definitions.first().map(|d| d.core.name.as_str()),
            ParsedItem::StatusGroup(i) => i.definitions.first().map(|d| d.core.name.as_str()),
            ParsedItem::Ui(i) => i.definitions.first().map(|d| d.core.name.as_str()),
            ParsedItem::Plain(i) => i.definitions.first().map(|d| d.name.as_str()),
            ParsedItem::Resource(i) => i.definitions.first().map(|d| d.name.as_str()),
        };
        name.filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Default)]
struct RawDefinition {
    version_expr: String,
    name: String,
    parent: Option<String>,
    profiles: Vec<String>,
    attributes: Vec<Attribute>,
    statuses: Vec<String>,
    fields: Vec<String>,
}

impl RawDefinition {
    fn core(&self) -> Definition {
        Definition {
            version_expr: self.version_expr.clone(),
            name: self.name.clone(),
            parent: self.parent.clone(),
            profiles: self.profiles.clone(),
        }
    }
}

/// Parse one XML definition file. `Ok(None)` means the file carries no
/// usable identity (unknown root element, missing or invalid uuid) and is to
/// be skipped by the caller.
pub fn parse_item(content: &str) -> Result<Option<ParsedItem>, ParseError> {
    let mut reader = Reader::from_str(content);

    let mut stack: Vec<String> = Vec::new();
    let mut uuid_text: Option<String> = None;
    let mut files: Vec<String> = Vec::new();
    let mut defs: Vec<RawDefinition> = Vec::new();
    let mut current_def: Option<RawDefinition> = None;
    let mut current_attr: Option<(Option<String>, Option<String>)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                stack.push(name);
                let path: Vec<&str> = stack.iter().map(String::as_str).collect();
                match path.as_slice() {
                    [_, "definition"] => current_def = Some(RawDefinition::default()),
                    [_, "definition", "attribute"] => current_attr = Some((None, None)),
                    _ => {}
                }
            }
            Event::End(_) => {
                let popped = stack.pop();
                match popped.as_deref() {
                    Some("attribute") if stack.len() == 2 => {
                        if let (Some(def), Some((Some(name), Some(attr_type)))) =
                            (current_def.as_mut(), current_attr.take())
                        {
                            def.attributes.push(Attribute { name, attr_type });
                        }
                    }
                    Some("definition") if stack.len() == 1 => {
                        if let Some(def) = current_def.take() {
                            defs.push(def);
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                let parent: Vec<&str> = stack.iter().map(String::as_str).collect();
                match (parent.as_slice(), name.as_str()) {
                    ([_, "definition", "profiles"], "profile") => {
                        if let (Some(def), Some(value)) =
                            (current_def.as_mut(), attr_value(&e, b"name")?)
                        {
                            def.profiles.push(value);
                        }
                    }
                    ([_, "definition"], "status") => {
                        if let (Some(def), Some(value)) =
                            (current_def.as_mut(), attr_value(&e, b"key")?)
                        {
                            def.statuses.push(value);
                        }
                    }
                    ([_, "definition"], "field") => {
                        if let (Some(def), Some(value)) =
                            (current_def.as_mut(), attr_value(&e, b"name")?)
                        {
                            def.fields.push(value);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                let txt = t.unescape()?.trim().to_string();
                if txt.is_empty() {
                    continue;
                }
                let path: Vec<&str> = stack.iter().map(String::as_str).collect();
                match path.as_slice() {
                    [_, "uuid"] => uuid_text = Some(txt),
                    [_, "file"] => files.push(txt),
                    [_, "definition", tag] => {
                        if let Some(def) = current_def.as_mut() {
                            match *tag {
                                "version-expression" | "version" => def.version_expr = txt,
                                "name" => def.name = txt,
                                "parent" => def.parent = Some(txt),
                                _ => {}
                            }
                        }
                    }
                    [_, "definition", "attribute", tag] => {
                        if let Some(attr) = current_attr.as_mut() {
                            match *tag {
                                "name" => attr.0 = Some(txt),
                                "type" => attr.1 = Some(txt),
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // The first element seen is the root; an empty stack at EOF is the
    // normal case, the root name was recorded on the way in.
    let root = match first_element_name(content) {
        Some(root) => root,
        None => return Ok(None),
    };

    let uuid = match uuid_text.as_deref().map(Uuid::parse_str) {
        Some(Ok(uuid)) => uuid,
        Some(Err(_)) | None => {
            log::debug!("definition with root `{root}` has no usable uuid, skipping");
            return Ok(None);
        }
    };

    let item = match root.as_str() {
        "datamodel-type" => ParsedItem::Type(TypeItem {
            uuid,
            definitions: defs
                .iter()
                .map(|d| TypeDefinition {
                    core: d.core(),
                    attributes: d.attributes.clone(),
                })
                .collect(),
        }),
        "datamodel-statusgroup" => ParsedItem::StatusGroup(StatusGroupItem {
            uuid,
            definitions: defs
                .iter()
                .map(|d| StatusDefinition {
                    core: d.core(),
                    statuses: d.statuses.clone(),
                })
                .collect(),
        }),
        "ui-form" | "ui-table" => ParsedItem::Ui(UiItem {
            kind: if root == "ui-form" {
                ItemKind::Form
            } else {
                ItemKind::Table
            },
            uuid,
            definitions: defs
                .iter()
                .map(|d| UiDefinition {
                    core: d.core(),
                    fields: d.fields.clone(),
                })
                .collect(),
        }),
        "dbproperties" | "image" | "jasper-image" => ParsedItem::Resource(ResourceItem {
            kind: match root.as_str() {
                "dbproperties" => ItemKind::DbProperties,
                "image" => ItemKind::Image,
                _ => ItemKind::JasperImage,
            },
            uuid,
            definitions: defs.iter().map(RawDefinition::core).collect(),
            files,
        }),
        other => {
            let kind = match other {
                "datamodel-sqltable" => ItemKind::SqlTable,
                "ui-command" => ItemKind::Command,
                "ui-menu" => ItemKind::Menu,
                "module" => ItemKind::Module,
                "search" => ItemKind::Search,
                "datamodel-msgphrase" => ItemKind::MsgPhrase,
                "numbergenerator" => ItemKind::NumberGenerator,
                "datamodel-role" => ItemKind::Role,
                "datamodel-accessset" => ItemKind::AccessSet,
                _ => {
                    log::debug!("unknown definition root element `{other}`, skipping");
                    return Ok(None);
                }
            };
            ParsedItem::Plain(PlainItem {
                kind,
                uuid,
                definitions: defs.iter().map(RawDefinition::core).collect(),
            })
        }
    };

    Ok(Some(item))
}

fn first_element_name(content: &str) -> Option<String> {
    let mut reader = Reader::from_str(content);
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) | Event::Empty(e) => return Some(local_name(&e)),
            Event::Eof => return None,
            _ => {}
        }
    }
}

fn local_name(e: &BytesStart) -> String {
    let name = e.name();
    let local = name.as_ref();
    // strip a namespace prefix if present
    let local = match local.iter().position(|b| *b == b':') {
        Some(idx) => &local[idx + 1..],
        None => local,
    };
    String::from_utf8_lossy(local).to_string()
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Result<Option<String>, quick_xml::Error> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

static JAVA_PACKAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*package\s+([A-Za-z_][A-Za-z0-9_.]*)\s*;").unwrap());

/// Fully qualified program name of a Java source: declared package plus the
/// file stem, or the bare stem for sources in the default package.
pub fn java_program_name(content: &str, file_stem: &str) -> String {
    match JAVA_PACKAGE.captures(content) {
        Some(caps) => format!("{}.{}", &caps[1], file_stem),
        None => file_stem.to_owned(),
    }
}

/// The report uuid embedded in the root `jasperReport` element, if any.
pub fn jasper_report_uuid(content: &str) -> Option<Uuid> {
    let mut reader = Reader::from_str(content);
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) | Event::Empty(e) => {
                if local_name(&e) != "jasperReport" {
                    return None;
                }
                let value = attr_value(&e, b"uuid").ok()??;
                return Uuid::parse_str(&value).ok();
            }
            Event::Eof => return None,
            _ => {}
        }
    }
}
