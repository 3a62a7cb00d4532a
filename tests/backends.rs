//! Server backends. Each test is skipped unless its connection URL is set, e.g.
//! `AUTOREST_TEST_PG_URL=pg://postgres:secret@localhost:5432/autorest`.

mod common;

use autorest::{AppError, CrudEngine, ListQuery};
use common::{row, run_sql, scratch_table, server_driver, users_scenario};
use serde_json::json;

const PG_URL: &str = "AUTOREST_TEST_PG_URL";
const MYSQL_URL: &str = "AUTOREST_TEST_MYSQL_URL";
#[cfg(feature = "oracle")]
const ORACLE_URL: &str = "AUTOREST_TEST_ORACLE_URL";

#[tokio::test]
async fn postgres_users_scenario() {
    let Some(driver) = server_driver(PG_URL).await else { return };
    let table = scratch_table("users");
    run_sql(driver.as_ref(), &format!("CREATE TABLE {} (id integer PRIMARY KEY, name text NOT NULL)", table)).await;
    let engine = CrudEngine::new(driver.clone());
    users_scenario(&engine, &table).await;
    run_sql(driver.as_ref(), &format!("DROP TABLE {}", table)).await;
}

#[tokio::test]
async fn postgres_same_statement_with_different_json_types() {
    let Some(driver) = server_driver(PG_URL).await else { return };
    let acct = scratch_table("acct");
    let stock = scratch_table("stock");
    run_sql(driver.as_ref(), &format!("CREATE TABLE {} (id integer PRIMARY KEY, n bigint)", acct)).await;
    run_sql(driver.as_ref(), &format!("CREATE TABLE {} (id integer PRIMARY KEY, qty integer)", stock)).await;
    let engine = CrudEngine::new(driver.clone());

    engine.create(&acct, row(json!({"id": 1, "n": 0}))).await.unwrap();
    let got = engine.partial_update(&acct, &json!("1"), row(json!({"n": 5}))).await.unwrap();
    assert_eq!(got, row(json!({"id": 1, "n": 5})));
    let got = engine.partial_update(&acct, &json!("1"), row(json!({"n": "12345678"}))).await.unwrap();
    assert_eq!(got, row(json!({"id": 1, "n": 12345678})));
    let got = engine.partial_update(&acct, &json!(1), row(json!({"n": 7}))).await.unwrap();
    assert_eq!(got, row(json!({"id": 1, "n": 7})));

    engine.create(&stock, row(json!({"id": 1, "qty": "5"}))).await.unwrap();
    let created = engine.create(&stock, row(json!({"id": 3, "qty": 7}))).await.unwrap();
    assert_eq!(created, row(json!({"id": 3, "qty": 7})));
    assert_eq!(engine.get(&stock, &json!("1"), None).await.unwrap()["qty"], json!(5));

    run_sql(driver.as_ref(), &format!("DROP TABLE {}", acct)).await;
    run_sql(driver.as_ref(), &format!("DROP TABLE {}", stock)).await;
}

#[tokio::test]
async fn postgres_keys_outside_the_column_type_are_not_found() {
    let Some(driver) = server_driver(PG_URL).await else { return };
    let table = scratch_table("users");
    run_sql(driver.as_ref(), &format!("CREATE TABLE {} (id integer PRIMARY KEY, name text)", table)).await;
    run_sql(driver.as_ref(), &format!("INSERT INTO {} VALUES (1, 'Ann')", table)).await;
    let engine = CrudEngine::new(driver.clone());

    assert_eq!(engine.get(&table, &json!("1"), None).await.unwrap()["name"], json!("Ann"));
    for key in ["abc", "99999999999"] {
        let err = engine.get(&table, &json!(key), None).await.unwrap_err();
        assert!(matches!(err, AppError::RowNotFound(_)));
        assert_eq!(err.status().as_u16(), 404);
    }
    let q = ListQuery {
        filters: vec![("id".into(), json!("x"))],
        ..Default::default()
    };
    assert!(matches!(engine.list(&table, &q).await, Err(AppError::EmptyResult(_))));

    run_sql(driver.as_ref(), &format!("DROP TABLE {}", table)).await;
}

#[tokio::test]
async fn postgres_decodes_text_cast_columns() {
    let Some(driver) = server_driver(PG_URL).await else { return };
    let table = scratch_table("prices");
    run_sql(
        driver.as_ref(),
        &format!("CREATE TABLE {} (id serial PRIMARY KEY, price numeric(10,2), active boolean)", table),
    )
    .await;
    let engine = CrudEngine::new(driver.clone());

    let created = engine
        .create(&table, row(json!({"price": "9.50", "active": true})))
        .await
        .unwrap();
    assert_eq!(created, row(json!({"id": 1, "price": "9.50", "active": true})));

    run_sql(driver.as_ref(), &format!("DROP TABLE {}", table)).await;
}

#[tokio::test]
async fn mysql_users_scenario() {
    let Some(driver) = server_driver(MYSQL_URL).await else { return };
    let table = scratch_table("users");
    run_sql(driver.as_ref(), &format!("CREATE TABLE {} (id INT PRIMARY KEY, name VARCHAR(40) NOT NULL)", table)).await;
    let engine = CrudEngine::new(driver.clone());
    users_scenario(&engine, &table).await;
    run_sql(driver.as_ref(), &format!("DROP TABLE {}", table)).await;
}

#[tokio::test]
async fn mysql_auto_increment_key_is_returned() {
    let Some(driver) = server_driver(MYSQL_URL).await else { return };
    let table = scratch_table("notes");
    run_sql(
        driver.as_ref(),
        &format!("CREATE TABLE {} (id INT AUTO_INCREMENT PRIMARY KEY, body TEXT)", table),
    )
    .await;
    let engine = CrudEngine::new(driver.clone());

    let created = engine.create(&table, row(json!({"body": "hi"}))).await.unwrap();
    assert_eq!(created, row(json!({"id": 1, "body": "hi"})));

    run_sql(driver.as_ref(), &format!("DROP TABLE {}", table)).await;
}

#[cfg(feature = "oracle")]
#[tokio::test]
async fn oracle_users_scenario() {
    let Some(driver) = server_driver(ORACLE_URL).await else { return };
    let table = scratch_table("users");
    run_sql(
        driver.as_ref(),
        &format!(r#"CREATE TABLE "{}" ("id" NUMBER(10) PRIMARY KEY, "name" VARCHAR2(40) NOT NULL)"#, table),
    )
    .await;
    let engine = CrudEngine::new(driver.clone());
    users_scenario(&engine, &table).await;
    run_sql(driver.as_ref(), &format!(r#"DROP TABLE "{}""#, table)).await;
}
