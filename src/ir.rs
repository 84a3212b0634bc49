use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types;

/// Entities of one bundle, in declaration order.
pub type Bundle = IndexMap<String, EntitySpec>;

/// Every bundle schema of the application, keyed by bundle name.
#[derive(Debug, Clone, Default)]
pub struct SchemaDocument {
    pub bundles: IndexMap<String, Bundle>,
    /// Set when references were allocated or removed and the documents need
    /// to be written back.
    pub dirty: bool,
}

impl SchemaDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_bundle(&mut self, name: impl Into<String>, bundle: Bundle) {
        self.bundles.insert(name.into(), bundle);
    }

    /// Iterate `(bundle, entity name, entity)` in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = (&str, &str, &EntitySpec)> {
        self.bundles.iter().flat_map(|(bundle, entities)| {
            entities
                .iter()
                .map(move |(name, entity)| (bundle.as_str(), name.as_str(), entity))
        })
    }

    pub fn entity(&self, bundle: &str, name: &str) -> Option<&EntitySpec> {
        self.bundles.get(bundle).and_then(|b| b.get(name))
    }

    /// Locate the entity a foreign key points at. When the descriptor names
    /// no bundle the owning bundle is searched first, then every other one.
    pub fn find_entity<'a>(
        &'a self,
        owner_bundle: &str,
        fk: &ForeignKeySpec,
    ) -> Option<(&'a str, &'a str, &'a EntitySpec)> {
        if let Some(bundle) = &fk.bundle {
            let (bundle_name, entities) = self.bundles.get_key_value(bundle)?;
            let (name, entity) = entities.get_key_value(&fk.model)?;
            return Some((bundle_name.as_str(), name.as_str(), entity));
        }
        if let Some((bundle_name, entities)) = self.bundles.get_key_value(owner_bundle) {
            if let Some((name, entity)) = entities.get_key_value(&fk.model) {
                return Some((bundle_name.as_str(), name.as_str(), entity));
            }
        }
        self.entities().find(|(_, name, _)| *name == fk.model)
    }
}

/// Entity-level metadata stored under the reserved `_params` key.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct EntityParams {
    /// Physical table name when it differs from the entity name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "_ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl EntityParams {
    pub fn is_empty(&self) -> bool {
        self.alias.is_none() && self.reference.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct EntitySpec {
    #[serde(rename = "_params", default, skip_serializing_if = "Option::is_none")]
    pub params: Option<EntityParams>,
    #[serde(flatten)]
    pub columns: IndexMap<String, ColumnSpec>,
}

impl EntitySpec {
    /// Physical table name: the alias if one is declared, else the entity name.
    pub fn table_name<'a>(&'a self, entity_name: &'a str) -> &'a str {
        self.params
            .as_ref()
            .and_then(|p| p.alias.as_deref())
            .filter(|alias| !alias.is_empty())
            .unwrap_or(entity_name)
    }

    pub fn reference(&self) -> Option<&str> {
        self.params
            .as_ref()
            .and_then(|p| p.reference.as_deref())
            .filter(|r| !r.is_empty())
    }

    pub fn set_reference(&mut self, reference: String) {
        self.params.get_or_insert_with(EntityParams::default).reference = Some(reference);
    }

    /// Columns flagged `identifier`, in declaration order.
    pub fn identifier_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, c)| c.identifier)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Name of the column declared immediately before `column`.
    pub fn previous_column(&self, column: &str) -> Option<&str> {
        let index = self.columns.get_index_of(column)?;
        if index == 0 {
            return None;
        }
        self.columns.get_index(index - 1).map(|(name, _)| name.as_str())
    }
}

/// Column default as written in the schema document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl DefaultValue {
    /// SQL literal; the string `null` stands for `NULL`.
    pub fn sql_literal(&self) -> String {
        match self {
            DefaultValue::Bool(b) => format!("'{}'", if *b { 1 } else { 0 }),
            DefaultValue::Integer(i) => format!("'{}'", i),
            DefaultValue::Float(f) => format!("'{}'", f),
            DefaultValue::Text(s) if s.eq_ignore_ascii_case("null") => "NULL".to_string(),
            DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ColumnSpec {
    #[serde(rename = "_ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Abstract type (`integer`, `float`, `string`, ...) or a raw MySQL type
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub identifier: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub zerofill: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub index: bool,
    #[serde(rename = "indexOf", default, skip_serializing_if = "Option::is_none")]
    pub index_of: Option<ForeignKeySpec>,
}

impl ColumnSpec {
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref().filter(|r| !r.is_empty())
    }

    /// Concrete MySQL type of the column itself, ignoring any `indexOf`.
    pub fn concrete_type(&self) -> String {
        types::convert_type(self.kind.as_deref(), self.length, self.decimal)
    }
}

/// Foreign-key descriptor of a column (`indexOf`).
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ForeignKeySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    pub model: String,
    /// Referenced column; the target's first identifier column when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<ReferentialAction>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    #[default]
    Restrict,
    Cascade,
    Null,
    NoAction,
}

impl ReferentialAction {
    pub fn sql(self) -> &'static str {
        match self {
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::Null => "SET NULL",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }

    /// Parse an `information_schema` rule such as `SET NULL`.
    pub fn from_rule(rule: &str) -> Self {
        match rule.to_ascii_uppercase().as_str() {
            "CASCADE" => ReferentialAction::Cascade,
            "SET NULL" => ReferentialAction::Null,
            "NO ACTION" => ReferentialAction::NoAction,
            _ => ReferentialAction::Restrict,
        }
    }
}
