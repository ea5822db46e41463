//! Build the resolved model from a catalog: merge layered/deprecated settings
//! into one canonical value per resource, flatten populate trees, and compile
//! middleware pipelines. Runs once at registration.

use crate::case::{pluralize, to_snake_case};
use crate::config::resolved::{
    ColumnInfo, ColumnKind, GetByIdOptions, ListOptions, PopulateSpec, ReferenceInfo,
    ResolvedModel, ResolvedResource, ResolvedSettings, SearchOptions, MAX_POPULATE_DEPTH,
};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use crate::pipeline::MiddlewareRegistry;
use crate::store::default_schema;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Resolve with the built-in middleware registry.
pub fn resolve(config: &CatalogConfig) -> Result<ResolvedModel, ConfigError> {
    resolve_with(config, &MiddlewareRegistry::default())
}

/// Resolve with a caller-supplied middleware registry (call after registering
/// custom interceptors).
pub fn resolve_with(
    config: &CatalogConfig,
    registry: &MiddlewareRegistry,
) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let schema_name = config.schema.clone().unwrap_or_else(default_schema);
    let models_by_name: HashMap<&str, &ModelConfig> =
        config.models.iter().map(|m| (m.name.as_str(), m)).collect();

    let mut resources = Vec::new();
    let mut resource_by_path = HashMap::new();

    for descriptor in &config.resources {
        let model = models_by_name
            .get(descriptor.model.as_str())
            .copied()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "model",
                id: descriptor.model.clone(),
            })?;
        let settings = resolve_settings(descriptor, model, &models_by_name)?;
        let validation: HashMap<String, ValidationRule> = descriptor
            .validation
            .iter()
            .map(|(field, rule)| (to_snake_case(field), rule.clone()))
            .collect();
        let pipeline =
            registry.build_pipeline(&descriptor.middlewares, !validation.is_empty())?;

        let resource = ResolvedResource {
            model_name: model.name.clone(),
            schema_name: schema_name.clone(),
            table_name: table_name(&model.name),
            path_segment: descriptor.path.clone(),
            columns: model_columns(model),
            settings,
            validation,
            pipeline,
        };
        tracing::info!(
            resource = %resource.path_segment,
            model = %resource.model_name,
            "registered resource"
        );
        resource_by_path.insert(descriptor.path.clone(), resource.clone());
        resources.push(resource);
    }

    Ok(ResolvedModel {
        prefix: config.prefix.clone(),
        resources,
        resource_by_path,
    })
}

/// Store table for a model: plural snake_case of its name.
pub fn table_name(model_name: &str) -> String {
    pluralize(&to_snake_case(model_name))
}

fn column_kind(field: &FieldConfig) -> ColumnKind {
    match field.type_ {
        FieldType::String => ColumnKind::Text,
        FieldType::Integer => ColumnKind::Integer,
        FieldType::Number => ColumnKind::Float,
        FieldType::Boolean => ColumnKind::Boolean,
        FieldType::Json => ColumnKind::Json,
        FieldType::Reference => ColumnKind::Uuid,
    }
}

fn model_columns(model: &ModelConfig) -> Vec<ColumnInfo> {
    let mut columns = vec![ColumnInfo {
        name: "id".into(),
        kind: ColumnKind::Uuid,
        required: false,
        reference: None,
    }];
    for field in &model.fields {
        let reference = field.reference.as_ref().map(|target| ReferenceInfo {
            model: target.clone(),
            table: table_name(target),
            many: field.many,
        });
        columns.push(ColumnInfo {
            name: to_snake_case(&field.name),
            kind: column_kind(field),
            required: field.required,
            reference,
        });
    }
    for name in ["created_at", "updated_at"] {
        columns.push(ColumnInfo {
            name: name.into(),
            kind: ColumnKind::Timestamp,
            required: false,
            reference: None,
        });
    }
    columns
}

/// Merge nested settings and deprecated flat keys into the canonical value.
/// Nested keys win when both are present; absent means "no restriction".
fn resolve_settings(
    descriptor: &ResourceConfig,
    model: &ModelConfig,
    models_by_name: &HashMap<&str, &ModelConfig>,
) -> Result<ResolvedSettings, ConfigError> {
    let api = descriptor.settings.clone().unwrap_or_default();
    let list = api.list.unwrap_or_default();
    let get_by_id = api.get_by_id.unwrap_or_default();

    let list_fields = list
        .keys
        .unwrap_or_else(|| descriptor.list_fields.clone())
        .iter()
        .map(|f| to_snake_case(f))
        .collect();
    let get_by_id_fields = get_by_id
        .keys
        .unwrap_or_else(|| descriptor.get_by_id_fields.clone())
        .iter()
        .map(|f| to_snake_case(f))
        .collect();

    let filter_fields: HashSet<String> = list
        .filter
        .unwrap_or_default()
        .allowed_fields
        .iter()
        .map(|f| to_snake_case(f))
        .collect();
    let search_settings = list.search.unwrap_or_default();
    let search = SearchOptions {
        disabled: search_settings.disabled,
        fields: search_settings
            .allowed_fields
            .iter()
            .map(|f| to_snake_case(f))
            .collect(),
    };

    Ok(ResolvedSettings {
        list_fields,
        get_by_id_fields,
        primary_key: descriptor.primary_key.as_deref().map(to_snake_case),
        list: ListOptions {
            populate: resolve_populate_list(&list.populate, model, models_by_name, 0),
            filter_fields,
            search,
        },
        get_by_id: GetByIdOptions {
            populate: resolve_populate_list(&get_by_id.populate, model, models_by_name, 0),
        },
    })
}

fn resolve_populate_list(
    configs: &[PopulateConfig],
    model: &ModelConfig,
    models_by_name: &HashMap<&str, &ModelConfig>,
    depth: usize,
) -> Vec<PopulateSpec> {
    if depth >= MAX_POPULATE_DEPTH {
        if !configs.is_empty() {
            tracing::warn!(
                model = %model.name,
                depth,
                "populate tree exceeds depth bound; deeper nodes dropped"
            );
        }
        return Vec::new();
    }
    let mut specs = Vec::new();
    for config in configs {
        // Paths were checked by the validator; a miss here is unreachable.
        let Some(field) = model.fields.iter().find(|f| f.name == config.path) else {
            continue;
        };
        let Some(target) = field.reference.as_deref().and_then(|t| models_by_name.get(t)) else {
            continue;
        };
        let target_columns: Vec<String> =
            model_columns(target).into_iter().map(|c| c.name).collect();
        specs.push(PopulateSpec {
            field: to_snake_case(&field.name),
            many: field.many,
            target_table: table_name(&target.name),
            target_columns,
            select: config.select.iter().map(|f| to_snake_case(f)).collect(),
            nested: resolve_populate_list(&config.populate, target, models_by_name, depth + 1),
        });
    }
    specs
}

/// Load a catalog from a JSON file (demo/server entry point).
pub async fn load_catalog(path: impl AsRef<Path>) -> Result<CatalogConfig, ConfigError> {
    let raw = tokio::fs::read_to_string(path.as_ref())
        .await
        .map_err(|e| ConfigError::Load(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::catalog;

    #[test]
    fn nested_keys_take_precedence_over_deprecated_flat_keys() {
        let mut config = catalog();
        config.resources[0].list_fields = vec!["email".into()];
        let settings = config.resources[0].settings.as_mut().unwrap();
        settings.list.as_mut().unwrap().keys = Some(vec!["firstName".into()]);

        let model = resolve(&config).unwrap();
        let user = model.resource_by_path("user").unwrap();
        assert_eq!(user.settings.list_fields, vec!["first_name".to_string()]);
    }

    #[test]
    fn deprecated_flat_keys_apply_when_nested_absent() {
        let mut config = catalog();
        config.resources[0].settings.as_mut().unwrap().list.as_mut().unwrap().keys = None;
        config.resources[0].list_fields = vec!["email".into()];

        let model = resolve(&config).unwrap();
        let user = model.resource_by_path("user").unwrap();
        assert_eq!(user.settings.list_fields, vec!["email".to_string()]);
    }

    #[test]
    fn absent_keys_mean_no_restriction() {
        let config = catalog();
        let model = resolve(&config).unwrap();
        let department = model.resource_by_path("department").unwrap();
        assert!(department.settings.get_by_id_fields.is_empty());
    }

    #[test]
    fn settings_are_converted_to_store_names() {
        let model = resolve(&catalog()).unwrap();
        let user = model.resource_by_path("user").unwrap();
        assert!(user.settings.list.filter_fields.contains("age"));
        assert_eq!(
            user.settings.list.search.fields,
            vec!["first_name".to_string(), "last_name".to_string()]
        );
        assert_eq!(user.settings.primary_key.as_deref(), Some("email"));
    }

    #[test]
    fn populate_tree_is_resolved_with_targets() {
        let model = resolve(&catalog()).unwrap();
        let user = model.resource_by_path("user").unwrap();
        let specs = &user.settings.list.populate;
        let department = specs.iter().find(|s| s.field == "department").unwrap();
        assert_eq!(department.target_table, "departments");
        assert!(!department.many);
        assert_eq!(department.select, vec!["name".to_string()]);
        let teams = specs.iter().find(|s| s.field == "teams").unwrap();
        assert!(teams.many);
        assert_eq!(teams.nested.len(), 1);
        assert_eq!(teams.nested[0].field, "department");
    }

    #[test]
    fn populate_depth_is_clamped_on_cyclic_relations() {
        let mut config = catalog();
        // Category -> parent is a self-reference; chain it far past the bound.
        let mut node = PopulateConfig {
            path: "parent".into(),
            select: vec![],
            populate: vec![],
        };
        for _ in 0..(MAX_POPULATE_DEPTH + 3) {
            node = PopulateConfig {
                path: "parent".into(),
                select: vec![],
                populate: vec![node],
            };
        }
        let category = config.resources.iter_mut().find(|r| r.path == "category").unwrap();
        category.settings = Some(ApiSettings {
            list: Some(ListSettings {
                keys: None,
                populate: vec![node],
                filter: None,
                search: None,
            }),
            get_by_id: None,
        });
        let model = resolve(&config).unwrap();
        let resource = model.resource_by_path("category").unwrap();
        fn depth(specs: &[PopulateSpec]) -> usize {
            specs.iter().map(|s| 1 + depth(&s.nested)).max().unwrap_or(0)
        }
        assert!(depth(&resource.settings.list.populate) <= MAX_POPULATE_DEPTH);
        assert!(depth(&resource.settings.list.populate) > 0);
    }

    #[test]
    fn table_names_are_plural_snake_case() {
        assert_eq!(table_name("User"), "users");
        assert_eq!(table_name("SubCategory"), "sub_categories");
    }
}
