//! Catalog validation: referential integrity and descriptor consistency.
//! Runs at registration; any failure here aborts startup rather than
//! surfacing per request.

use crate::config::{
    CatalogConfig, FieldConfig, FieldType, ModelConfig, PopulateConfig, ResourceConfig,
};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

/// Column names the resolver injects on every model.
pub const RESERVED_FIELDS: &[&str] = &["id", "createdAt", "updatedAt"];

pub fn validate(config: &CatalogConfig) -> Result<(), ConfigError> {
    let models_by_name: HashMap<&str, &ModelConfig> =
        config.models.iter().map(|m| (m.name.as_str(), m)).collect();
    if models_by_name.len() != config.models.len() {
        return Err(ConfigError::Validation("duplicate model name".into()));
    }

    for model in &config.models {
        let mut seen = HashSet::new();
        for field in &model.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "model {}: duplicate field {}",
                    model.name, field.name
                )));
            }
            if RESERVED_FIELDS.contains(&field.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "model {}: field {} is reserved",
                    model.name, field.name
                )));
            }
            validate_field(model, field, &models_by_name)?;
        }
    }

    let mut path_segments = HashSet::new();
    for resource in &config.resources {
        let model = models_by_name
            .get(resource.model.as_str())
            .copied()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "model",
                id: resource.model.clone(),
            })?;
        if !path_segments.insert(resource.path.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(resource.path.clone()));
        }
        validate_resource(resource, model, &models_by_name)?;
    }

    Ok(())
}

fn validate_field(
    model: &ModelConfig,
    field: &FieldConfig,
    models_by_name: &HashMap<&str, &ModelConfig>,
) -> Result<(), ConfigError> {
    match field.type_ {
        FieldType::Reference => {
            let target = field.reference.as_deref().ok_or_else(|| {
                ConfigError::Validation(format!(
                    "model {}: reference field {} needs a target model",
                    model.name, field.name
                ))
            })?;
            if !models_by_name.contains_key(target) {
                return Err(ConfigError::MissingReference {
                    kind: "model",
                    id: target.to_string(),
                });
            }
        }
        _ => {
            if field.reference.is_some() || field.many {
                return Err(ConfigError::Validation(format!(
                    "model {}: field {} is not a reference",
                    model.name, field.name
                )));
            }
        }
    }
    Ok(())
}

fn validate_resource(
    resource: &ResourceConfig,
    model: &ModelConfig,
    models_by_name: &HashMap<&str, &ModelConfig>,
) -> Result<(), ConfigError> {
    let field_names: HashSet<&str> = model.fields.iter().map(|f| f.name.as_str()).collect();
    let known = |name: &str| field_names.contains(name) || RESERVED_FIELDS.contains(&name);

    if let Some(pk) = resource.primary_key.as_deref() {
        if !field_names.contains(pk) {
            return Err(ConfigError::InvalidPrimaryKey {
                model: model.name.clone(),
                field: pk.to_string(),
            });
        }
    }

    for field in resource.validation.keys() {
        if !field_names.contains(field.as_str()) {
            return Err(ConfigError::UnknownField {
                model: model.name.clone(),
                field: field.clone(),
            });
        }
    }

    for field in resource.list_fields.iter().chain(&resource.get_by_id_fields) {
        if !known(field) {
            return Err(ConfigError::UnknownField {
                model: model.name.clone(),
                field: field.clone(),
            });
        }
    }

    if let Some(settings) = &resource.settings {
        let mut projection_fields: Vec<&String> = Vec::new();
        let mut allow_fields: Vec<&String> = Vec::new();
        if let Some(list) = &settings.list {
            if let Some(keys) = &list.keys {
                projection_fields.extend(keys);
            }
            if let Some(filter) = &list.filter {
                allow_fields.extend(&filter.allowed_fields);
            }
            if let Some(search) = &list.search {
                allow_fields.extend(&search.allowed_fields);
            }
            for populate in &list.populate {
                validate_populate(populate, model, models_by_name)?;
            }
        }
        if let Some(get_by_id) = &settings.get_by_id {
            if let Some(keys) = &get_by_id.keys {
                projection_fields.extend(keys);
            }
            for populate in &get_by_id.populate {
                validate_populate(populate, model, models_by_name)?;
            }
        }
        for field in projection_fields.into_iter().chain(allow_fields) {
            if !known(field) {
                return Err(ConfigError::UnknownField {
                    model: model.name.clone(),
                    field: field.clone(),
                });
            }
        }
    }

    Ok(())
}

fn validate_populate(
    populate: &PopulateConfig,
    model: &ModelConfig,
    models_by_name: &HashMap<&str, &ModelConfig>,
) -> Result<(), ConfigError> {
    let field = model
        .fields
        .iter()
        .find(|f| f.name == populate.path)
        .ok_or_else(|| ConfigError::UnknownField {
            model: model.name.clone(),
            field: populate.path.clone(),
        })?;
    if field.type_ != FieldType::Reference {
        return Err(ConfigError::Validation(format!(
            "model {}: populate path {} is not a reference field",
            model.name, populate.path
        )));
    }
    let target_name = field.reference.as_deref().unwrap_or_default();
    let target = models_by_name
        .get(target_name)
        .copied()
        .ok_or_else(|| ConfigError::MissingReference {
            kind: "model",
            id: target_name.to_string(),
        })?;
    let target_fields: HashSet<&str> = target.fields.iter().map(|f| f.name.as_str()).collect();
    for selected in &populate.select {
        if !target_fields.contains(selected.as_str()) && !RESERVED_FIELDS.contains(&selected.as_str()) {
            return Err(ConfigError::UnknownField {
                model: target.name.clone(),
                field: selected.clone(),
            });
        }
    }
    for nested in &populate.populate {
        validate_populate(nested, target, models_by_name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::catalog;

    #[test]
    fn valid_catalog_passes() {
        assert!(validate(&catalog()).is_ok());
    }

    #[test]
    fn unknown_model_reference_fails() {
        let mut config = catalog();
        config.resources[0].model = "Ghost".into();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingReference { kind: "model", .. })
        ));
    }

    #[test]
    fn duplicate_path_segment_fails() {
        let mut config = catalog();
        let dup = config.resources[0].clone();
        config.resources.push(dup);
        assert!(matches!(
            validate(&config),
            Err(ConfigError::DuplicatePathSegment(_))
        ));
    }

    #[test]
    fn primary_key_must_exist_on_model() {
        let mut config = catalog();
        config.resources[0].primary_key = Some("missing".into());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPrimaryKey { .. })
        ));
    }

    #[test]
    fn populate_path_must_be_reference() {
        let mut config = catalog();
        let settings = config.resources[0].settings.as_mut().unwrap();
        settings.list.as_mut().unwrap().populate[0].path = "firstName".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn allow_list_fields_must_exist() {
        let mut config = catalog();
        let settings = config.resources[0].settings.as_mut().unwrap();
        settings.list.as_mut().unwrap().filter.as_mut().unwrap().allowed_fields =
            vec!["notAField".into()];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::UnknownField { .. })
        ));
    }
}
