//! Shared catalog fixture for unit tests.

use crate::config::types::*;
use std::collections::HashMap;

fn field(name: &str, type_: FieldType, required: bool) -> FieldConfig {
    FieldConfig {
        name: name.into(),
        type_,
        reference: None,
        many: false,
        required,
    }
}

fn reference(name: &str, target: &str, many: bool) -> FieldConfig {
    FieldConfig {
        name: name.into(),
        type_: FieldType::Reference,
        reference: Some(target.into()),
        many,
        required: false,
    }
}

pub fn catalog() -> CatalogConfig {
    let user = ModelConfig {
        name: "User".into(),
        fields: vec![
            field("firstName", FieldType::String, true),
            field("lastName", FieldType::String, false),
            field("email", FieldType::String, true),
            field("age", FieldType::Integer, false),
            field("active", FieldType::Boolean, false),
            reference("department", "Department", false),
            reference("teams", "Team", true),
        ],
    };
    let department = ModelConfig {
        name: "Department".into(),
        fields: vec![field("name", FieldType::String, true)],
    };
    let team = ModelConfig {
        name: "Team".into(),
        fields: vec![
            field("name", FieldType::String, false),
            reference("department", "Department", false),
        ],
    };
    let category = ModelConfig {
        name: "Category".into(),
        fields: vec![
            field("name", FieldType::String, false),
            reference("parent", "Category", false),
        ],
    };

    let mut validation = HashMap::new();
    validation.insert(
        "email".to_string(),
        ValidationRule {
            required: Some(true),
            format: Some("email".into()),
            ..Default::default()
        },
    );
    validation.insert(
        "firstName".to_string(),
        ValidationRule {
            required: Some(true),
            min_length: Some(2),
            ..Default::default()
        },
    );
    validation.insert(
        "age".to_string(),
        ValidationRule {
            minimum: Some(0.0),
            ..Default::default()
        },
    );

    let user_resource = ResourceConfig {
        model: "User".into(),
        path: "user".into(),
        primary_key: Some("email".into()),
        middlewares: vec![],
        validation,
        settings: Some(ApiSettings {
            list: Some(ListSettings {
                keys: Some(vec!["firstName".into(), "lastName".into(), "email".into()]),
                populate: vec![
                    PopulateConfig {
                        path: "department".into(),
                        select: vec!["name".into()],
                        populate: vec![],
                    },
                    PopulateConfig {
                        path: "teams".into(),
                        select: vec!["name".into(), "department".into()],
                        populate: vec![PopulateConfig {
                            path: "department".into(),
                            select: vec![],
                            populate: vec![],
                        }],
                    },
                ],
                filter: Some(FilterSettings {
                    allowed_fields: vec!["age".into(), "active".into(), "email".into()],
                }),
                search: Some(SearchSettings {
                    disabled: false,
                    allowed_fields: vec!["firstName".into(), "lastName".into()],
                }),
            }),
            get_by_id: Some(GetByIdSettings {
                keys: None,
                populate: vec![PopulateConfig {
                    path: "department".into(),
                    select: vec![],
                    populate: vec![],
                }],
            }),
        }),
        list_fields: vec![],
        get_by_id_fields: vec![],
    };

    let department_resource = ResourceConfig {
        model: "Department".into(),
        path: "department".into(),
        primary_key: None,
        middlewares: vec![],
        validation: HashMap::new(),
        settings: None,
        list_fields: vec!["name".into()],
        get_by_id_fields: vec![],
    };

    let category_resource = ResourceConfig {
        model: "Category".into(),
        path: "category".into(),
        primary_key: None,
        middlewares: vec![],
        validation: HashMap::new(),
        settings: None,
        list_fields: vec![],
        get_by_id_fields: vec![],
    };

    CatalogConfig {
        prefix: "/api/v1".into(),
        schema: Some("restmint".into()),
        models: vec![user, department, team, category],
        resources: vec![user_resource, department_resource, category_resource],
    }
}
