//! Raw config types matching the JSON catalog shape (models + resource descriptors).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Json,
    Reference,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    /// Target model name; required when `type` is `reference`.
    #[serde(default)]
    pub reference: Option<String>,
    /// Multi-valued reference: the field holds an array of ids.
    #[serde(default)]
    pub many: bool,
    #[serde(default)]
    pub required: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub name: String,
    pub fields: Vec<FieldConfig>,
}

/// Relation-expansion spec: a tree over reference fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulateConfig {
    pub path: String,
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default)]
    pub populate: Vec<PopulateConfig>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSettings {
    #[serde(default)]
    pub allowed_fields: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSettings {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub allowed_fields: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSettings {
    /// Takes precedence over the deprecated flat `listFields` when present.
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    #[serde(default)]
    pub populate: Vec<PopulateConfig>,
    #[serde(default)]
    pub filter: Option<FilterSettings>,
    #[serde(default)]
    pub search: Option<SearchSettings>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetByIdSettings {
    /// Takes precedence over the deprecated flat `getByIdFields` when present.
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    #[serde(default)]
    pub populate: Vec<PopulateConfig>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    #[serde(default)]
    pub list: Option<ListSettings>,
    #[serde(default)]
    pub get_by_id: Option<GetByIdSettings>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    /// Applied to the body when the field is absent and the body is accepted.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// One resource descriptor: binds a model to a path with validation, a
/// primary-key field, middleware names, and per-operation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    pub model: String,
    pub path: String,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub middlewares: Vec<String>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    #[serde(default)]
    pub settings: Option<ApiSettings>,
    /// Deprecated: use settings.list.keys instead.
    #[serde(default)]
    pub list_fields: Vec<String>,
    /// Deprecated: use settings.getById.keys instead.
    #[serde(default)]
    pub get_by_id_fields: Vec<String>,
}

/// Registration input: shared path prefix plus all models and resources.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// PostgreSQL schema for resource tables; default from `RESTMINT_SCHEMA` env.
    #[serde(default)]
    pub schema: Option<String>,
    pub models: Vec<ModelConfig>,
    pub resources: Vec<ResourceConfig>,
}

fn default_prefix() -> String {
    "/api/v1".into()
}
