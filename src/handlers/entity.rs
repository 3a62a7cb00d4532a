//! Table CRUD handlers: list, create, read, replace, patch, delete.

use crate::error::AppError;
use crate::extractors::JsonObject;
use crate::response::{success_created, success_many, success_one};
use crate::service::ListQuery;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::Value;

const COLUMNS_PARAM: &str = "columns";
const LIMIT_PARAM: &str = "limit";
const OFFSET_PARAM: &str = "offset";

/// `columns=a,b` to a projection; empty or `*` means every column.
fn parse_columns(raw: &str) -> Option<Vec<String>> {
    let cols: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();
    if cols.is_empty() || cols.iter().any(|c| c == "*") {
        None
    } else {
        Some(cols)
    }
}

fn parse_count(name: &str, raw: &str) -> Result<u64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", name)))
}

/// Reserved parameters configure the listing; every other parameter is an exact-match filter.
fn list_query(params: Vec<(String, String)>) -> Result<ListQuery, AppError> {
    let mut query = ListQuery::default();
    for (k, v) in params {
        match k.as_str() {
            COLUMNS_PARAM => query.columns = parse_columns(&v),
            LIMIT_PARAM => query.limit = Some(parse_count(LIMIT_PARAM, &v)?),
            OFFSET_PARAM => query.offset = Some(parse_count(OFFSET_PARAM, &v)?),
            _ => query.filters.push((k, Value::String(v))),
        }
    }
    Ok(query)
}

pub async fn tables(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let names = state.engine.tables().await?;
    Ok(success_many(names))
}

pub async fn list(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let query = list_query(params)?;
    let rows = state.engine.list(&table, &query).await?;
    Ok(success_many(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Path(table): Path<String>,
    JsonObject(body): JsonObject,
) -> Result<impl IntoResponse, AppError> {
    let row = state.engine.create(&table, body).await?;
    Ok(success_created(row))
}

pub async fn read(
    State(state): State<AppState>,
    Path((table, key)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let columns = params
        .iter()
        .rev()
        .find(|(k, _)| k == COLUMNS_PARAM)
        .and_then(|(_, v)| parse_columns(v));
    let row = state
        .engine
        .get(&table, &Value::String(key), columns.as_deref())
        .await?;
    Ok(success_one(row))
}

pub async fn replace(
    State(state): State<AppState>,
    Path((table, key)): Path<(String, String)>,
    JsonObject(body): JsonObject,
) -> Result<impl IntoResponse, AppError> {
    let row = state
        .engine
        .replace(&table, &Value::String(key), body)
        .await?;
    Ok(success_one(row))
}

pub async fn patch(
    State(state): State<AppState>,
    Path((table, key)): Path<(String, String)>,
    JsonObject(body): JsonObject,
) -> Result<impl IntoResponse, AppError> {
    let row = state
        .engine
        .partial_update(&table, &Value::String(key), body)
        .await?;
    Ok(success_one(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((table, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let pre_image = state.engine.delete(&table, &Value::String(key)).await?;
    Ok(success_one(pre_image))
}
