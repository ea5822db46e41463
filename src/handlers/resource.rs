//! Resource controller: create-or-update, bulk insert, delete, list, get-by-id.
//! Stateless per request; descriptors and settings were resolved at
//! registration. Every error is converted to the response envelope.

use crate::case::{object_keys_to_snake_case, pluralize, value_keys_to_camel_case_recursive};
use crate::config::ResolvedResource;
use crate::error::AppError;
use crate::query::parse_list_query;
use crate::response::{success_created, success_ok, Envelope};
use crate::service::{CrudService, PrimaryKeyGuard};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};

fn lookup<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a ResolvedResource, AppError> {
    state
        .model
        .resource_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(path_segment.to_string()))
}

fn parse_id(id_str: &str) -> Result<Value, AppError> {
    let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid id".into()))?;
    Ok(Value::String(u.to_string()))
}

fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(mut m) => {
            object_keys_to_snake_case(&mut m);
            Ok(m)
        }
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn to_api(mut v: Value) -> Value {
    value_keys_to_camel_case_recursive(&mut v);
    v
}

/// Identifier from the body, if any. Presence selects update vs create.
fn take_body_id(body: &mut Map<String, Value>) -> Result<Option<String>, AppError> {
    match body.remove("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(AppError::BadRequest("invalid id".into())),
    }
}

pub async fn create_or_update(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Envelope>), AppError> {
    let resource = lookup(&state, &path_segment)?;
    let mut body = body_to_map(body)?;
    let id = take_body_id(&mut body)?;
    resource.pipeline.run(resource, &mut body)?;
    PrimaryKeyGuard::check_write(&state.pool, resource, id.as_deref(), &body).await?;

    match id {
        Some(id_str) => {
            let id = parse_id(&id_str)?;
            let updated = CrudService::update(&state.pool, resource, &id, &body)
                .await?
                .ok_or_else(|| AppError::NotFound(resource.model_name.clone()))?;
            Ok(success_ok(
                format!("{} updated successfully", resource.model_name),
                to_api(updated),
            ))
        }
        None => {
            let created = CrudService::create(&state.pool, resource, &body).await?;
            Ok(success_created(
                format!("{} created successfully", resource.model_name),
                to_api(created),
            ))
        }
    }
}

pub async fn remove(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Envelope>), AppError> {
    let resource = lookup(&state, &path_segment)?;
    let id = parse_id(&id_str)?;
    // Absent target is surfaced as null data, not a synthesized 404.
    let deleted = CrudService::delete(&state.pool, resource, &id).await?;
    Ok(success_ok(
        format!("{} deleted successfully", resource.model_name),
        deleted.map(to_api).unwrap_or(Value::Null),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<(StatusCode, Json<Envelope>), AppError> {
    let resource = lookup(&state, &path_segment)?;
    let query = parse_list_query(resource, &pairs);
    let rows = CrudService::list(
        &state.pool,
        resource,
        &query.filter,
        query.search.as_ref(),
        query.limit,
        query.offset,
    )
    .await?;
    let data: Vec<Value> = rows.into_iter().map(to_api).collect();
    Ok(success_ok(
        format!("{} fetched successfully", pluralize(&resource.model_name)),
        Value::Array(data),
    ))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Envelope>), AppError> {
    let resource = lookup(&state, &path_segment)?;
    let id = parse_id(&id_str)?;
    let row = CrudService::get_by_id(&state.pool, resource, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(resource.model_name.clone()))?;
    Ok(success_ok(
        format!("{} fetched successfully", resource.model_name),
        to_api(row),
    ))
}

pub async fn bulk_insert(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Envelope>), AppError> {
    let resource = lookup(&state, &path_segment)?;
    let docs = match body {
        Value::Array(arr) if !arr.is_empty() => arr,
        _ => {
            return Err(AppError::BadRequest(
                "Request body must be a non-empty array of documents".into(),
            ))
        }
    };
    let mut items = Vec::with_capacity(docs.len());
    for doc in docs {
        let mut item = body_to_map(doc)?;
        resource.pipeline.run(resource, &mut item)?;
        items.push(item);
    }
    PrimaryKeyGuard::check_batch(&state.pool, resource, &items).await?;
    let rows = CrudService::insert_many(&state.pool, resource, &items).await?;
    let count = rows.len();
    let data: Vec<Value> = rows.into_iter().map(to_api).collect();
    Ok(success_created(
        format!("{} {}(s) created successfully", count, resource.model_name),
        Value::Array(data),
    ))
}
