//! Generic CRUD execution against PostgreSQL.

use crate::case::to_camel_case;
use crate::config::ResolvedResource;
use crate::error::AppError;
use crate::query::{FilterExpr, SearchExpr};
use crate::sql::{self, PgBindValue, QueryBuf};
use serde_json::{Map, Value};
use sqlx::PgPool;

/// SQLSTATE raised by the per-resource unique index; the store is the
/// authoritative uniqueness signal, the guard's pre-check is the fast path.
const UNIQUE_VIOLATION: &str = "23505";

pub struct CrudService;

impl CrudService {
    /// List documents with compiled filter/search, limit (default 100, max 1000), offset (default 0).
    pub async fn list(
        pool: &PgPool,
        resource: &ResolvedResource,
        filter: &FilterExpr,
        search: Option<&SearchExpr>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Value>, AppError> {
        const DEFAULT_LIMIT: u32 = 100;
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(1000);
        let offset = offset.unwrap_or(0);
        let q = sql::select_list(resource, filter, search, Some(limit), Some(offset));
        Self::query_many(pool, resource, &q).await
    }

    /// Fetch one document by id with the get-by-id projection and populate tree.
    pub async fn get_by_id(
        pool: &PgPool,
        resource: &ResolvedResource,
        id: &Value,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::select_by_id(resource, id);
        Self::query_optional(pool, resource, &q).await
    }

    /// Rows (id + column) where the column equals the value.
    pub async fn find_by_column(
        pool: &PgPool,
        resource: &ResolvedResource,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Value>, AppError> {
        let q = sql::select_by_column_eq(resource, column, value);
        Self::query_many(pool, resource, &q).await
    }

    /// Rows (id + column) where the column is in the value set.
    pub async fn find_by_column_in(
        pool: &PgPool,
        resource: &ResolvedResource,
        column: &str,
        values: &[Value],
    ) -> Result<Vec<Value>, AppError> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let q = sql::select_by_column_in(resource, column, values);
        Self::query_many(pool, resource, &q).await
    }

    /// Insert one document. Returns the created row.
    pub async fn create(
        pool: &PgPool,
        resource: &ResolvedResource,
        body: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        let q = sql::insert(resource, body);
        Self::query_optional(pool, resource, &q)
            .await?
            .ok_or_else(|| AppError::Db(sqlx::Error::RowNotFound))
    }

    /// Update one document by id. Returns the updated row, None when absent.
    pub async fn update(
        pool: &PgPool,
        resource: &ResolvedResource,
        id: &Value,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::update(resource, id, body);
        Self::query_optional(pool, resource, &q).await
    }

    /// Delete one document by id. Returns the deleted row, None when absent.
    pub async fn delete(
        pool: &PgPool,
        resource: &ResolvedResource,
        id: &Value,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::delete(resource, id);
        Self::query_optional(pool, resource, &q).await
    }

    /// Bulk insert in a transaction: either every document is inserted or none.
    pub async fn insert_many(
        pool: &PgPool,
        resource: &ResolvedResource,
        items: &[Map<String, Value>],
    ) -> Result<Vec<Value>, AppError> {
        const BULK_LIMIT: usize = 100;
        if items.len() > BULK_LIMIT {
            return Err(AppError::BadRequest(format!(
                "bulk insert limited to {} items",
                BULK_LIMIT
            )));
        }
        let mut out = Vec::with_capacity(items.len());
        let mut tx = pool.begin().await?;
        for body in items {
            let q = sql::insert(resource, body);
            tracing::debug!(sql = %q.sql, "query (tx)");
            let mut query = sqlx::query(&q.sql);
            for p in &q.params {
                query = query.bind(PgBindValue::from_json(p));
            }
            let row = query
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_store_err(resource, e))?;
            out.push(row.as_ref().map(row_to_json).unwrap_or(Value::Null));
        }
        tx.commit().await?;
        Ok(out)
    }

    async fn query_many(
        pool: &PgPool,
        resource: &ResolvedResource,
        q: &QueryBuf,
    ) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query
            .fetch_all(pool)
            .await
            .map_err(|e| map_store_err(resource, e))?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn query_optional(
        pool: &PgPool,
        resource: &ResolvedResource,
        q: &QueryBuf,
    ) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query
            .fetch_optional(pool)
            .await
            .map_err(|e| map_store_err(resource, e))?;
        Ok(row.as_ref().map(row_to_json))
    }
}

fn map_store_err(resource: &ResolvedResource, e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let key = resource
                .settings
                .primary_key
                .as_deref()
                .map(to_camel_case)
                .unwrap_or_else(|| "key".into());
            return AppError::Conflict(format!(
                "{} with this {} already exists",
                resource.model_name, key
            ));
        }
    }
    AppError::Db(e)
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        let v = cell_to_value(row, name);
        map.insert(name.to_string(), v);
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(ids)) = row.try_get::<Option<Vec<uuid::Uuid>>, _>(name) {
        return Value::Array(ids.into_iter().map(|u| Value::String(u.to_string())).collect());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
