//! MySQL driver over a sqlx pool.

use super::{float_value, log_statement, BackendDriver, Dialect, Row};
use crate::catalog::{ColumnMeta, TableMeta};
use crate::config::{ConnectionDescriptor, DbKind};
use crate::error::AppError;
use crate::sql::{BindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;

/// Leading words of column types sqlx decodes natively; everything else is selected as CHAR.
const DECODABLE_PREFIXES: &[&str] = &[
    "tinyint", "smallint", "mediumint", "int", "bigint", "float", "double", "char", "varchar",
    "tinytext", "text", "mediumtext", "longtext", "date", "datetime", "timestamp", "json",
];

const TABLES_SQL: &str = "SELECT CAST(table_name AS CHAR) AS tname \
    FROM information_schema.tables \
    WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
    ORDER BY table_name";

const COLUMNS_SQL: &str = "SELECT CAST(column_name AS CHAR) AS cname, \
    CAST(column_type AS CHAR) AS ctype, \
    CAST(column_key AS CHAR) AS ckey \
    FROM information_schema.columns \
    WHERE table_schema = DATABASE() AND table_name = ? \
    ORDER BY ordinal_position";

/// MySQL's documented "no limit" value, needed when only an offset is given.
const UNBOUNDED_LIMIT: u64 = u64::MAX;

pub struct MySqlDialect;

impl MySqlDialect {
    fn decodable(declared_type: &str) -> bool {
        let lower = declared_type.to_lowercase();
        let word: String = lower.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
        DECODABLE_PREFIXES.contains(&word.as_str())
    }
}

impl Dialect for MySqlDialect {
    fn kind(&self) -> DbKind {
        DbKind::Mysql
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn placeholder(&self, _n: usize, _declared_type: Option<&str>) -> String {
        "?".into()
    }

    fn select_column(&self, ident: &str, declared_type: &str) -> String {
        let q = self.quote_ident(ident);
        if declared_type.is_empty() || Self::decodable(declared_type) {
            q
        } else {
            format!("CAST({} AS CHAR) AS {}", q, q)
        }
    }

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, None) => String::new(),
            (Some(l), None) => format!(" LIMIT {}", l),
            (l, Some(o)) => format!(" LIMIT {} OFFSET {}", l.unwrap_or(UNBOUNDED_LIMIT), o),
        }
    }
}

pub struct MySqlDriver {
    pool: MySqlPool,
}

impl MySqlDriver {
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self, AppError> {
        let options = MySqlConnectOptions::new()
            .host(&descriptor.host)
            .port(descriptor.port)
            .username(&descriptor.user)
            .password(&descriptor.password)
            .database(&descriptor.database);
        let pool = MySqlPoolOptions::new()
            .max_connections(descriptor.pool_size.max(1))
            .connect_with(options)
            .await?;
        Ok(MySqlDriver { pool })
    }
}

#[async_trait]
impl BackendDriver for MySqlDriver {
    fn dialect(&self) -> &dyn Dialect {
        &MySqlDialect
    }

    async fn introspect(&self) -> Result<Vec<TableMeta>, AppError> {
        let names: Vec<String> = sqlx::query(TABLES_SQL)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| text_at(r, 0))
            .collect();
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let rows = sqlx::query(COLUMNS_SQL).bind(&name).fetch_all(&self.pool).await?;
            let columns = rows
                .iter()
                .map(|r| ColumnMeta::new(text_at(r, 0), text_at(r, 1), text_at(r, 2) == "PRI"))
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
        // LAST_INSERT_ID is 0 unless an AUTO_INCREMENT column produced a value.
        let id = result.last_insert_id();
        Ok(key_column.filter(|_| id > 0).map(|_| Value::from(id)))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
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

/// information_schema text comes back as VARBINARY on some servers.
fn text_at(row: &MySqlRow, i: usize) -> String {
    use sqlx::Row as _;
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(i) {
        return s;
    }
    row.try_get::<Option<Vec<u8>>, _>(i)
        .ok()
        .flatten()
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default()
}

fn row_to_json(row: &MySqlRow) -> Row {
    use sqlx::{Column, Row as _};
    let mut map = Row::new();
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, i));
    }
    map
}

fn cell_to_value(row: &MySqlRow, i: usize) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(i) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<u64>, _>(i) {
        return Value::Number(n.into());
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(i) {
        return Value::Bool(b);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(i) {
        return float_value(n as f64);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(i) {
        return float_value(n);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(i) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(i) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(i) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(i) {
        return j;
    }
    if let Ok(Some(b)) = row.try_get::<Option<Vec<u8>>, _>(i) {
        return Value::String(String::from_utf8_lossy(&b).into_owned());
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backticks_are_doubled() {
        assert_eq!(MySqlDialect.quote_ident("order"), "`order`");
        assert_eq!(MySqlDialect.quote_ident("a`b"), "`a``b`");
    }

    #[test]
    fn decimals_and_enums_are_selected_as_char() {
        assert_eq!(MySqlDialect.select_column("id", "int(11) unsigned"), "`id`");
        assert_eq!(MySqlDialect.select_column("name", "varchar(40)"), "`name`");
        assert_eq!(MySqlDialect.select_column("price", "decimal(10,2)"), "CAST(`price` AS CHAR) AS `price`");
        assert_eq!(MySqlDialect.select_column("state", "enum('a','b')"), "CAST(`state` AS CHAR) AS `state`");
    }

    #[test]
    fn offset_alone_still_needs_a_limit() {
        assert_eq!(
            MySqlDialect.limit_clause(None, Some(20)),
            " LIMIT 18446744073709551615 OFFSET 20"
        );
        assert_eq!(MySqlDialect.limit_clause(Some(5), Some(20)), " LIMIT 5 OFFSET 20");
    }
}
