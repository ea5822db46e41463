//! Primary-key uniqueness enforcement. The pre-checks here produce friendly
//! conflict errors before any write; the per-resource unique index remains the
//! authoritative constraint underneath (see `migration`), so a concurrent
//! writer that slips past the check still surfaces as a Conflict.

use crate::case::to_camel_case;
use crate::config::ResolvedResource;
use crate::error::AppError;
use crate::service::CrudService;
use serde_json::{Map, Value};
use sqlx::PgPool;

pub struct PrimaryKeyGuard;

impl PrimaryKeyGuard {
    /// Single create-or-update: the primary-key value must not belong to a
    /// different document. Updating a document to its own current value passes.
    pub async fn check_write(
        pool: &PgPool,
        resource: &ResolvedResource,
        body_id: Option<&str>,
        body: &Map<String, Value>,
    ) -> Result<(), AppError> {
        let Some(pk) = resource.settings.primary_key.as_deref() else {
            return Ok(());
        };
        let Some(value) = body.get(pk).filter(|v| !is_empty_value(v)) else {
            return Ok(());
        };
        let existing = CrudService::find_by_column(pool, resource, pk, value).await?;
        let existing_id = existing
            .first()
            .and_then(|row| row.get("id"))
            .and_then(Value::as_str);
        if write_allowed(existing_id, body_id) {
            Ok(())
        } else {
            Err(AppError::Conflict(format!(
                "{} with this {} already exists",
                resource.model_name,
                to_camel_case(pk)
            )))
        }
    }

    /// Bulk insert: collect non-empty primary-key values across the batch and
    /// fail the whole batch when any duplicates exist — within the batch
    /// itself or against stored documents. Nothing is inserted on failure.
    pub async fn check_batch(
        pool: &PgPool,
        resource: &ResolvedResource,
        items: &[Map<String, Value>],
    ) -> Result<(), AppError> {
        let Some(pk) = resource.settings.primary_key.as_deref() else {
            return Ok(());
        };
        let values: Vec<Value> = items
            .iter()
            .filter_map(|item| item.get(pk))
            .filter(|v| !is_empty_value(v))
            .cloned()
            .collect();
        let mut offending = intra_batch_duplicates(&values);
        let existing = CrudService::find_by_column_in(pool, resource, pk, &values).await?;
        for row in &existing {
            if let Some(v) = row.get(pk) {
                if !offending.contains(v) {
                    offending.push(v.clone());
                }
            }
        }
        if offending.is_empty() {
            Ok(())
        } else {
            Err(AppError::DuplicateKeys {
                field: to_camel_case(pk),
                values: offending,
            })
        }
    }
}

/// A write may proceed when no document holds the value, or when the match is
/// the document being updated.
fn write_allowed(existing_id: Option<&str>, body_id: Option<&str>) -> bool {
    match (existing_id, body_id) {
        (None, _) => true,
        (Some(existing), Some(body)) => existing == body,
        (Some(_), None) => false,
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn intra_batch_duplicates(values: &[Value]) -> Vec<Value> {
    let mut seen: Vec<&Value> = Vec::new();
    let mut dups: Vec<Value> = Vec::new();
    for v in values {
        if seen.contains(&v) {
            if !dups.contains(v) {
                dups.push(v.clone());
            }
        } else {
            seen.push(v);
        }
    }
    dups
}
