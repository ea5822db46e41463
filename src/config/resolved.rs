//! Resolved model: config validated, merged, and flattened for runtime use.
//! Built once at registration; read-only and shared across requests after that.

use crate::config::ValidationRule;
use crate::pipeline::Pipeline;
use std::collections::{HashMap, HashSet};

/// Hard bound on populate-tree depth. The relation graph is acyclic by
/// convention only, so deeper nodes are cut at resolution time.
pub const MAX_POPULATE_DEPTH: usize = 5;

/// Store-side column kind, inferred from the field type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
    Json,
    Uuid,
    Timestamp,
}

#[derive(Clone, Debug)]
pub struct ReferenceInfo {
    pub model: String,
    pub table: String,
    pub many: bool,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    /// snake_case store name; API names are camelCase and converted at the boundary.
    pub name: String,
    pub kind: ColumnKind,
    pub required: bool,
    pub reference: Option<ReferenceInfo>,
}

/// Resolved relation-expansion node. Self-contained: carries the target table
/// and column list so query building needs no model lookups.
#[derive(Clone, Debug)]
pub struct PopulateSpec {
    /// snake_case column on the parent holding the referenced id(s).
    pub field: String,
    pub many: bool,
    pub target_table: String,
    /// Full snake_case column list of the target model.
    pub target_columns: Vec<String>,
    /// Projection inside the expansion; empty = all target columns.
    pub select: Vec<String>,
    pub nested: Vec<PopulateSpec>,
}

#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    pub disabled: bool,
    /// snake_case allow-list, in configured order.
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    pub populate: Vec<PopulateSpec>,
    pub filter_fields: HashSet<String>,
    pub search: SearchOptions,
}

#[derive(Clone, Debug, Default)]
pub struct GetByIdOptions {
    pub populate: Vec<PopulateSpec>,
}

/// Canonical per-resource settings (deprecated flat keys already merged).
#[derive(Clone, Debug, Default)]
pub struct ResolvedSettings {
    /// Projection for list; empty = full document.
    pub list_fields: Vec<String>,
    /// Projection for get-by-id; empty = full document.
    pub get_by_id_fields: Vec<String>,
    /// snake_case primary-key column, if the resource enforces one.
    pub primary_key: Option<String>,
    pub list: ListOptions,
    pub get_by_id: GetByIdOptions,
}

#[derive(Clone, Debug)]
pub struct ResolvedResource {
    pub model_name: String,
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    pub columns: Vec<ColumnInfo>,
    pub settings: ResolvedSettings,
    /// Rules keyed by snake_case column name.
    pub validation: HashMap<String, ValidationRule>,
    pub pipeline: Pipeline,
}

impl ColumnInfo {
    /// PostgreSQL type name, used for DDL and for placeholder casts.
    pub fn pg_type(&self) -> &'static str {
        match (self.kind, &self.reference) {
            (ColumnKind::Uuid, Some(r)) if r.many => "uuid[]",
            (ColumnKind::Uuid, _) => "uuid",
            (ColumnKind::Text, _) => "text",
            (ColumnKind::Integer, _) => "bigint",
            (ColumnKind::Float, _) => "double precision",
            (ColumnKind::Boolean, _) => "boolean",
            (ColumnKind::Json, _) => "jsonb",
            (ColumnKind::Timestamp, _) => "timestamptz",
        }
    }
}

impl ResolvedResource {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> HashSet<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub prefix: String,
    pub resources: Vec<ResolvedResource>,
    pub resource_by_path: HashMap<String, ResolvedResource>,
}

impl ResolvedModel {
    pub fn resource_by_path(&self, path: &str) -> Option<&ResolvedResource> {
        self.resource_by_path.get(path)
    }
}
