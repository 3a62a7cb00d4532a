//! Embedded SQLite driver over a sqlx pool.

use super::{float_value, log_statement, BackendDriver, Dialect, Row};
use crate::catalog::{ColumnMeta, TableMeta};
use crate::config::{ConnectionDescriptor, DbKind};
use crate::error::AppError;
use crate::sql::{BindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::str::FromStr;

const MEMORY: &str = ":memory:";

pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn kind(&self) -> DbKind {
        DbKind::Sqlite
    }

    fn placeholder(&self, _n: usize, _declared_type: Option<&str>) -> String {
        "?".into()
    }

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, Some(o)) => format!(" LIMIT -1 OFFSET {}", o),
            (Some(l), Some(o)) => format!(" LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!(" LIMIT {}", l),
            (None, None) => String::new(),
        }
    }
}

pub struct SqliteDriver {
    pool: SqlitePool,
}

impl SqliteDriver {
    /// Open (creating if missing) the database file. `:memory:` gets a single pinned connection,
    /// since every SQLite connection to memory is its own database.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self, AppError> {
        let in_memory = descriptor.database.is_empty() || descriptor.database == MEMORY;
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
                .await?
        } else {
            let options = SqliteConnectOptions::new()
                .filename(&descriptor.database)
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(descriptor.pool_size.max(1))
                .connect_with(options)
                .await?
        };
        Ok(SqliteDriver { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        SqliteDriver { pool }
    }
}

#[async_trait]
impl BackendDriver for SqliteDriver {
    fn dialect(&self) -> &dyn Dialect {
        &SqliteDialect
    }

    async fn introspect(&self) -> Result<Vec<TableMeta>, AppError> {
        let names: Vec<String> = sqlx::query_scalar(
            r"SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let cols: Vec<(String, String, i64)> =
                sqlx::query_as("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")
                    .bind(&name)
                    .fetch_all(&self.pool)
                    .await?;
            let columns = cols
                .into_iter()
                .map(|(cname, ctype, pk)| ColumnMeta::new(cname, ctype, pk > 0))
                .collect();
            tables.push(TableMeta::new(name, columns));
        }
        Ok(tables)
    }

    async fn query(&self, q: &QueryBuf) -> Result<Vec<Row>, AppError> {
        log_statement(q);
        let rows = bind_params(sqlx::query(&q.sql), &q.params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        log_statement(q);
        let result = bind_params(sqlx::query(&q.sql), &q.params)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert(&self, q: &QueryBuf, key_column: Option<&ColumnMeta>) -> Result<Option<Value>, AppError> {
        log_statement(q);
        let result = bind_params(sqlx::query(&q.sql), &q.params)
            .execute(&self.pool)
            .await?;
        // Only an INTEGER PRIMARY KEY aliases the rowid.
        Ok(key_column
            .filter(|c| c.declared_type.eq_ignore_ascii_case("integer"))
            .map(|_| Value::from(result.last_insert_rowid())))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for p in params {
        query = match BindValue::from_json(p) {
            BindValue::Null => query.bind(None::<String>),
            BindValue::Bool(b) => query.bind(b),
            BindValue::I64(n) => query.bind(n),
            BindValue::F64(f) => query.bind(f),
            BindValue::Text(s) => query.bind(s),
        };
    }
    query
}

fn row_to_json(row: &SqliteRow) -> Row {
    use sqlx::{Column, Row as _};
    let mut map = Row::new();
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, i));
    }
    map
}

fn cell_to_value(row: &SqliteRow, i: usize) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(i) {
        return Value::Number(n.into());
    }
    if let Ok(Some(f)) = row.try_get::<Option<f64>, _>(i) {
        return float_value(f);
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(i) {
        return Value::String(s);
    }
    if let Ok(Some(b)) = row.try_get::<Option<Vec<u8>>, _>(i) {
        return Value::String(String::from_utf8_lossy(&b).into_owned());
    }
    Value::Null
}
