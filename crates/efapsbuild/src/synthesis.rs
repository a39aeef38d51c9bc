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

//! Planning of the CI accessor-class model from the merged definitions.
//!
//! The output is pure data; rendering it into source text is a separate,
//! swappable step. Name-collision handling therefore works on the model
//! instead of comparing generated text.

use anyhow::Context;
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use efapsutil::kind::ItemKind;

use crate::merge::InstallSet;
use crate::parse::ParsedItem;

/// Rules for deriving simple class names from item names.
#[derive(Debug, Default)]
pub struct NameRules {
    strip_prefix: Option<Regex>,
}

impl NameRules {
    pub fn new(strip_prefix: Option<&str>) -> anyhow::Result<Self> {
        let strip_prefix = match strip_prefix {
            Some(pattern) => Some(
                Regex::new(pattern)
                    .with_context(|| format!("bad name prefix pattern `{pattern}`"))?,
            ),
            None => None,
        };
        Ok(NameRules { strip_prefix })
    }

    pub fn none() -> Self {
        NameRules::default()
    }

    /// Sanitized simple name. Prefix stripping only applies while the name
    /// is not flagged as duplicated.
    fn simple_name(&self, name: &str, allow_strip: bool) -> String {
        let stripped = match (&self.strip_prefix, allow_strip) {
            (Some(re), true) => re.replace(name, "").into_owned(),
            _ => name.to_owned(),
        };
        let mut out = String::with_capacity(stripped.len());
        for c in stripped.chars() {
            if c.is_ascii_alphanumeric() || c == '_' {
                out.push(c);
            } else {
                out.push('_');
            }
        }
        if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            out.insert(0, '_');
        }
        if out.is_empty() {
            out.push('_');
        }
        out
    }
}

/// A unique-constraint child of a type or status group: an attribute (with
/// its type) or a status key, with the union of profiles it appears under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildPlan {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_type: Option<String>,
    pub profiles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypePlan {
    pub uuid: Uuid,
    pub name: String,
    pub simple_name: String,
    pub duplicated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub children: Vec<ChildPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldPlan {
    pub name: String,
    pub profiles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiPlan {
    pub uuid: Uuid,
    pub kind: ItemKind,
    pub name: String,
    pub simple_name: String,
    pub duplicated: bool,
    pub fields: Vec<FieldPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamePlan {
    pub uuid: Uuid,
    pub name: String,
    pub simple_name: String,
    pub duplicated: bool,
}

/// The complete, render-independent synthesis model.
#[derive(Debug, Default, Serialize)]
pub struct SynthesisModel {
    pub types: Vec<TypePlan>,
    pub status_groups: Vec<TypePlan>,
    pub forms: Vec<UiPlan>,
    pub tables: Vec<UiPlan>,
    pub msg_phrases: Vec<NamePlan>,
    pub number_generators: Vec<NamePlan>,
}

pub fn plan(set: &InstallSet, rules: &NameRules) -> SynthesisModel {
    let mut model = SynthesisModel::default();

    for entry in set.entries.values() {
        let Some(item) = &entry.item else { continue };
        let name = item.name().unwrap_or_default().to_owned();
        match item {
            ParsedItem::Type(t) => {
                let mut children: IndexMap<String, ChildPlan> = IndexMap::new();
                for def in &t.definitions {
                    for attr in &def.attributes {
                        merge_child(
                            &mut children,
                            &attr.name,
                            Some(&attr.attr_type),
                            &def.core.profiles,
                        );
                    }
                }
                model.types.push(TypePlan {
                    uuid: t.uuid,
                    name,
                    simple_name: String::new(),
                    duplicated: false,
                    parent: t
                        .definitions
                        .first()
                        .and_then(|d| d.core.parent.clone()),
                    children: children.into_values().collect(),
                });
            }
            ParsedItem::StatusGroup(g) => {
                let mut children: IndexMap<String, ChildPlan> = IndexMap::new();
                for def in &g.definitions {
                    for key in &def.statuses {
                        merge_child(&mut children, key, None, &def.core.profiles);
                    }
                }
                model.status_groups.push(TypePlan {
                    uuid: g.uuid,
                    name,
                    simple_name: String::new(),
                    duplicated: false,
                    parent: g
                        .definitions
                        .first()
                        .and_then(|d| d.core.parent.clone()),
                    children: children.into_values().collect(),
                });
            }
            ParsedItem::Ui(ui) => {
                let mut fields: IndexMap<String, FieldPlan> = IndexMap::new();
                for def in &ui.definitions {
                    for field in &def.fields {
                        let plan = fields.entry(field.clone()).or_insert_with(|| FieldPlan {
                            name: field.clone(),
                            profiles: Vec::new(),
                        });
                        for profile in &def.core.profiles {
                            if !plan.profiles.contains(profile) {
                                plan.profiles.push(profile.clone());
                            }
                        }
                    }
                }
                let mut fields: Vec<FieldPlan> = fields.into_values().collect();
                for field in &mut fields {
                    field.profiles.sort();
                }
                let plan = UiPlan {
                    uuid: ui.uuid,
                    kind: ui.kind,
                    name,
                    simple_name: String::new(),
                    duplicated: false,
                    fields,
                };
                match ui.kind {
                    ItemKind::Form => model.forms.push(plan),
                    _ => model.tables.push(plan),
                }
            }
            ParsedItem::Plain(p) => {
                let plan = NamePlan {
                    uuid: p.uuid,
                    name,
                    simple_name: String::new(),
                    duplicated: false,
                };
                match p.kind {
                    ItemKind::MsgPhrase => model.msg_phrases.push(plan),
                    ItemKind::NumberGenerator => model.number_generators.push(plan),
                    _ => {}
                }
            }
            ParsedItem::Resource(_) => {}
        }
    }

    assign_simple_names(&mut model.types, rules);
    assign_simple_names(&mut model.status_groups, rules);
    assign_simple_names(&mut model.forms, rules);
    assign_simple_names(&mut model.tables, rules);
    assign_simple_names(&mut model.msg_phrases, rules);
    assign_simple_names(&mut model.number_generators, rules);

    model
}

trait NamedPlan {
    fn item_name(&self) -> &str;
    fn set_simple(&mut self, simple: String, duplicated: bool);
}

macro_rules! impl_named_plan {
    ($($ty:ty),*) => {$(
        impl NamedPlan for $ty {
            fn item_name(&self) -> &str {
                &self.name
            }
            fn set_simple(&mut self, simple: String, duplicated: bool) {
                self.simple_name = simple;
                self.duplicated = duplicated;
            }
        }
    )*};
}

impl_named_plan!(TypePlan, UiPlan, NamePlan);

fn merge_child(
    children: &mut IndexMap<String, ChildPlan>,
    name: &str,
    child_type: Option<&str>,
    profiles: &[String],
) {
    let plan = children
        .entry(name.to_owned())
        .or_insert_with(|| ChildPlan {
            name: name.to_owned(),
            child_type: child_type.map(str::to_owned),
            profiles: Vec::new(),
        });
    for profile in profiles {
        if !plan.profiles.contains(profile) {
            plan.profiles.push(profile.clone());
        }
    }
    plan.profiles.sort();
}

/// Compute sanitized simple names per category; two distinct items mapping
/// to the same simple name are both flagged duplicated, which suppresses
/// prefix stripping for exactly those items.
fn assign_simple_names<T: NamedPlan>(plans: &mut [T], rules: &NameRules) {
    let stripped: Vec<String> = plans
        .iter()
        .map(|p| rules.simple_name(p.item_name(), true))
        .collect();

    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for simple in &stripped {
        *counts.entry(simple.as_str()).or_default() += 1;
    }

    for (idx, simple) in stripped.iter().enumerate() {
        let duplicated = counts[simple.as_str()] > 1;
        let final_name = if duplicated {
            rules.simple_name(plans[idx].item_name(), false)
        } else {
            simple.clone()
        };
        plans[idx].set_simple(final_name, duplicated);
    }
}
