//! Apply the resolved model to the database: DDL for schemas, tables, the
//! per-resource unique index backing primary-key enforcement, and foreign
//! keys for single-valued references.

use crate::config::{ColumnInfo, ResolvedModel, ResolvedResource};
use crate::error::AppError;
use sqlx::PgPool;
use std::collections::HashSet;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote(schema), quote(table))
}

fn column_ddl(column: &ColumnInfo) -> String {
    match column.name.as_str() {
        "id" => format!("{} UUID PRIMARY KEY DEFAULT gen_random_uuid()", quote("id")),
        "created_at" | "updated_at" => {
            format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", quote(&column.name))
        }
        _ => {
            let mut def = format!("{} {}", quote(&column.name), column.pg_type());
            if column.required {
                def.push_str(" NOT NULL");
            }
            def
        }
    }
}

/// Idempotent: schemas, tables, and indexes use IF NOT EXISTS; foreign keys
/// are tolerated on re-run.
pub async fn apply_migrations(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    let mut schemas: HashSet<&str> = HashSet::new();
    for resource in &model.resources {
        schemas.insert(resource.schema_name.as_str());
    }
    for schema in schemas {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote(schema)))
            .execute(pool)
            .await?;
    }

    let mut created: HashSet<(String, String)> = HashSet::new();
    for resource in &model.resources {
        let key = (resource.schema_name.clone(), resource.table_name.clone());
        if !created.insert(key) {
            continue;
        }
        create_table(pool, resource).await?;
    }

    for resource in &model.resources {
        if let Some(pk) = resource.settings.primary_key.as_deref() {
            let index_name = format!("ux_{}_{}", resource.table_name, pk);
            let sql = format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                quote(&index_name),
                qualified(&resource.schema_name, &resource.table_name),
                quote(pk)
            );
            sqlx::query(&sql).execute(pool).await?;
        }
        add_foreign_keys(pool, resource).await;
    }

    Ok(())
}

async fn create_table(pool: &PgPool, resource: &ResolvedResource) -> Result<(), AppError> {
    let col_defs: Vec<String> = resource.columns.iter().map(column_ddl).collect();
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified(&resource.schema_name, &resource.table_name),
        col_defs.join(",\n  ")
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

async fn add_foreign_keys(pool: &PgPool, resource: &ResolvedResource) {
    for column in &resource.columns {
        let Some(reference) = &column.reference else { continue };
        // Array references have no FK support; the unique index and populate
        // queries still work without one.
        if reference.many {
            continue;
        }
        let constraint = format!("fk_{}_{}", resource.table_name, column.name);
        let sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            qualified(&resource.schema_name, &resource.table_name),
            quote(&constraint),
            quote(&column.name),
            qualified(&resource.schema_name, &reference.table),
            quote("id")
        );
        let _ = sqlx::query(&sql).execute(pool).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolve;
    use crate::config::test_fixtures::catalog;

    #[test]
    fn id_and_timestamps_get_defaults() {
        let model = resolve(&catalog()).unwrap();
        let user = model.resource_by_path("user").unwrap();
        let ddl: Vec<String> = user.columns.iter().map(column_ddl).collect();
        assert!(ddl[0].contains("UUID PRIMARY KEY DEFAULT gen_random_uuid()"));
        assert!(ddl.iter().any(|d| d.contains("\"created_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW()")));
    }

    #[test]
    fn reference_columns_use_uuid_types() {
        let model = resolve(&catalog()).unwrap();
        let user = model.resource_by_path("user").unwrap();
        assert_eq!(user.column("department").unwrap().pg_type(), "uuid");
        assert_eq!(user.column("teams").unwrap().pg_type(), "uuid[]");
        assert!(column_ddl(user.column("teams").unwrap()).contains("uuid[]"));
    }

    #[test]
    fn required_fields_are_not_null() {
        let model = resolve(&catalog()).unwrap();
        let user = model.resource_by_path("user").unwrap();
        assert!(column_ddl(user.column("email").unwrap()).ends_with("NOT NULL"));
        assert!(!column_ddl(user.column("age").unwrap()).contains("NOT NULL"));
    }
}
