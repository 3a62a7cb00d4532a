#![allow(dead_code)]

use autorest::driver::sqlite::SqliteDriver;
use autorest::CrudEngine;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::sync::Arc;
use tempfile::TempDir;

pub const USERS: &str = "CREATE TABLE Users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)";
pub const POSTS: &str =
    "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT, body TEXT)";

/// Engine over a fresh SQLite file; keep the `TempDir` alive for the test's duration.
pub async fn sqlite_engine(setup: &[&str]) -> (TempDir, CrudEngine) {
    let dir = tempfile::tempdir().unwrap();
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .unwrap();
    for stmt in setup {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }
    (dir, CrudEngine::new(Arc::new(SqliteDriver::from_pool(pool))))
}

pub fn row(v: serde_json::Value) -> autorest::Row {
    v.as_object().cloned().unwrap()
}

/// Connection for a server backend named by `var`, or `None` (test skipped) when unset.
pub async fn server_driver(var: &str) -> Option<Arc<dyn autorest::BackendDriver>> {
    let url = std::env::var(var).ok().filter(|u| !u.is_empty());
    let Some(url) = url else {
        eprintln!("{} not set, skipping", var);
        return None;
    };
    let config = autorest::parse_dsn(&url).unwrap();
    Some(autorest::connect(&config.descriptor).await.unwrap())
}

/// Fresh table name so concurrent runs never collide.
pub fn scratch_table(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..12])
}

pub async fn run_sql(driver: &dyn autorest::BackendDriver, sql: &str) {
    let q = autorest::sql::QueryBuf {
        sql: sql.to_string(),
        params: Vec::new(),
    };
    driver.execute(&q).await.unwrap();
}

/// The create/list/get/replace/patch/delete walk over a `(id, name)` table.
pub async fn users_scenario(engine: &CrudEngine, table: &str) {
    use autorest::{AppError, ListQuery};
    use serde_json::json;

    let ann = row(json!({"id": 1, "name": "Ann"}));
    assert_eq!(engine.create(table, ann.clone()).await.unwrap(), ann);
    assert_eq!(engine.list(table, &ListQuery::default()).await.unwrap(), vec![ann.clone()]);
    assert_eq!(engine.get(table, &json!("1"), None).await.unwrap(), ann);
    assert!(matches!(engine.get(table, &json!(2), None).await, Err(AppError::RowNotFound(_))));
    assert!(matches!(
        engine.create(table, ann.clone()).await,
        Err(AppError::Conflict(_))
    ));

    let bo = row(json!({"id": 1, "name": "Bo"}));
    assert_eq!(engine.replace(table, &json!("1"), bo.clone()).await.unwrap(), bo);
    assert!(matches!(
        engine.replace(table, &json!(1), row(json!({"id": 1}))).await,
        Err(AppError::InvalidPayload(_))
    ));
    let cy = engine
        .partial_update(table, &json!(1), row(json!({"name": "Cy"})))
        .await
        .unwrap();
    assert_eq!(cy, row(json!({"id": 1, "name": "Cy"})));

    assert_eq!(engine.delete(table, &json!("1")).await.unwrap(), cy);
    assert!(matches!(engine.get(table, &json!(1), None).await, Err(AppError::RowNotFound(_))));
    assert!(matches!(
        engine.list(table, &ListQuery::default()).await,
        Err(AppError::EmptyResult(_))
    ));
}
