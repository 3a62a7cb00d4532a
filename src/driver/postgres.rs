//! PostgreSQL driver over a sqlx pool.

use super::{float_value, log_statement, BackendDriver, Dialect, Row};
use crate::catalog::{ColumnMeta, TableMeta};
use crate::config::{ConnectionDescriptor, DbKind};
use crate::error::AppError;
use crate::sql::{BindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::query::Query;

/// Types sqlx decodes natively; everything else is selected as text.
const DECODABLE_TYPES: &[&str] = &[
    "smallint",
    "integer",
    "bigint",
    "real",
    "double precision",
    "boolean",
    "text",
    "character varying",
    "character",
    "\"char\"",
    "name",
    "uuid",
    "json",
    "jsonb",
    "date",
    "timestamp without time zone",
    "timestamp with time zone",
];

const TABLES_SQL: &str = r#"
SELECT DISTINCT tablename::text
FROM pg_catalog.pg_tables
WHERE schemaname = ANY(current_schemas(false))
  AND schemaname NOT IN ('pg_catalog', 'information_schema')
ORDER BY 1
"#;

const COLUMNS_SQL: &str = r#"
SELECT
    a.attname::text AS cname,
    pg_catalog.format_type(a.atttypid, a.atttypmod) AS dtype,
    coalesce(i.indisprimary, false) AS pk
FROM pg_catalog.pg_attribute a
LEFT JOIN pg_catalog.pg_index i
    ON i.indrelid = a.attrelid
    AND a.attnum = ANY(i.indkey)
    AND i.indisprimary
WHERE a.attrelid = to_regclass(quote_ident($1))
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum
"#;

pub struct PostgresDialect;

impl PostgresDialect {
    fn decodable(declared_type: &str) -> bool {
        let base = declared_type.split('(').next().unwrap_or("").trim();
        // varchar(40) -> "character varying", timestamp(3) with time zone keeps its suffix
        let base = if declared_type.starts_with("timestamp") {
            declared_type
                .replace(|c: char| c == '(' || c == ')' || c.is_ascii_digit(), "")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            base.to_string()
        };
        DECODABLE_TYPES.contains(&base.as_str())
    }
}

impl PostgresDialect {
    /// Integer range of the declared type, for the integer family.
    fn integer_range(declared_type: &str) -> Option<(i64, i64)> {
        match declared_type {
            "smallint" => Some((i16::MIN.into(), i16::MAX.into())),
            "integer" => Some((i32::MIN.into(), i32::MAX.into())),
            "bigint" => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl Dialect for PostgresDialect {
    fn kind(&self) -> DbKind {
        DbKind::Postgres
    }

    fn placeholder(&self, n: usize, declared_type: Option<&str>) -> String {
        match declared_type.filter(|t| !t.is_empty()) {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }

    fn select_column(&self, ident: &str, declared_type: &str) -> String {
        let q = self.quote_ident(ident);
        if declared_type.is_empty() || Self::decodable(declared_type) {
            q
        } else {
            format!("{}::text AS {}", q, q)
        }
    }

    fn accepts(&self, declared_type: &str, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        let base = declared_type.split('(').next().unwrap_or("").trim();
        if let Some((min, max)) = Self::integer_range(base) {
            return value.as_i64().is_some_and(|n| n >= min && n <= max);
        }
        match base {
            "real" | "double precision" | "numeric" | "decimal" => value.is_number(),
            "boolean" => match value {
                Value::Bool(_) => true,
                Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "false" | "t" | "f"),
                _ => false,
            },
            "uuid" => value.as_str().is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
            _ => true,
        }
    }
}

pub struct PostgresDriver {
    pool: PgPool,
}

impl PostgresDriver {
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self, AppError> {
        let options = PgConnectOptions::new()
            .host(&descriptor.host)
            .port(descriptor.port)
            .username(&descriptor.user)
            .password(&descriptor.password)
            .database(&descriptor.database);
        let pool = PgPoolOptions::new()
            .max_connections(descriptor.pool_size.max(1))
            .connect_with(options)
            .await?;
        Ok(PostgresDriver { pool })
    }
}

#[async_trait]
impl BackendDriver for PostgresDriver {
    fn dialect(&self) -> &dyn Dialect {
        &PostgresDialect
    }

    async fn introspect(&self) -> Result<Vec<TableMeta>, AppError> {
        let names: Vec<String> = sqlx::query_scalar(TABLES_SQL).fetch_all(&self.pool).await?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let cols: Vec<(String, String, bool)> = sqlx::query_as(COLUMNS_SQL)
                .bind(&name)
                .fetch_all(&self.pool)
                .await?;
            let columns = cols
                .into_iter()
                .map(|(cname, dtype, pk)| ColumnMeta::new(cname, dtype, pk))
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
        let Some(key) = key_column else {
            self.execute(q).await?;
            return Ok(None);
        };
        let returning = QueryBuf {
            sql: format!(
                "{} RETURNING {}",
                q.sql,
                PostgresDialect.select_column(&key.name, &key.declared_type)
            ),
            params: q.params.clone(),
        };
        log_statement(&returning);
        let row = bind_params(sqlx::query(&returning.sql), &returning.params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| cell_to_value(&r, 0)).filter(|v| !v.is_null()))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Every parameter travels as text and the placeholder's `::type` cast converts it server-side.
/// Prepared statements are cached by SQL text, so the wire type of a parameter must not depend on the value.
fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[Value],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = query.bind(bind_text(p));
    }
    query
}

fn bind_text(v: &Value) -> Option<String> {
    match BindValue::from_json(v) {
        BindValue::Null => None,
        BindValue::Bool(b) => Some(b.to_string()),
        BindValue::I64(n) => Some(n.to_string()),
        BindValue::F64(f) => Some(f.to_string()),
        BindValue::Text(s) => Some(s),
    }
}

fn row_to_json(row: &PgRow) -> Row {
    use sqlx::{Column, Row as _};
    let mut map = Row::new();
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, i));
    }
    map
}

fn cell_to_value(row: &PgRow, i: usize) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(i) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(i) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(i) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(i) {
        return float_value(n as f64);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(i) {
        return float_value(n);
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(i) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(i) {
        return Value::String(u.to_string());
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
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placeholders_cast_to_declared_type() {
        assert_eq!(PostgresDialect.placeholder(2, Some("integer")), "$2::integer");
        assert_eq!(PostgresDialect.placeholder(1, Some("")), "$1");
        assert_eq!(PostgresDialect.placeholder(3, None), "$3");
    }

    #[test]
    fn parameters_bind_as_text_whatever_the_json_type() {
        assert_eq!(bind_text(&json!(5)), Some("5".to_string()));
        assert_eq!(bind_text(&json!("12345678")), Some("12345678".to_string()));
        assert_eq!(bind_text(&json!(true)), Some("true".to_string()));
        assert_eq!(bind_text(&json!(1.5)), Some("1.5".to_string()));
        assert_eq!(bind_text(&json!({"a": 1})), Some(r#"{"a":1}"#.to_string()));
        assert_eq!(bind_text(&Value::Null), None);
    }

    #[test]
    fn keys_outside_the_column_type_are_refused() {
        let d = PostgresDialect;
        assert!(d.accepts("integer", &json!(7)));
        assert!(!d.accepts("integer", &json!(99999999999i64)));
        assert!(!d.accepts("integer", &json!("abc")));
        assert!(!d.accepts("integer", &json!(1.5)));
        assert!(!d.accepts("smallint", &json!(40000)));
        assert!(d.accepts("bigint", &json!(99999999999i64)));
        assert!(d.accepts("numeric(10,2)", &json!(3.25)));
        assert!(!d.accepts("numeric(10,2)", &json!("x")));
        assert!(d.accepts("uuid", &json!("67e55044-10b1-426f-9247-bb680e5fe0c8")));
        assert!(!d.accepts("uuid", &json!("nope")));
        assert!(d.accepts("text", &json!(12)));
        assert!(d.accepts("integer", &Value::Null));
    }

    #[test]
    fn undecodable_columns_are_selected_as_text() {
        assert_eq!(PostgresDialect.select_column("id", "integer"), r#""id""#);
        assert_eq!(PostgresDialect.select_column("name", "character varying(40)"), r#""name""#);
        assert_eq!(
            PostgresDialect.select_column("at", "timestamp(3) with time zone"),
            r#""at""#
        );
        assert_eq!(PostgresDialect.select_column("price", "numeric(10,2)"), r#""price"::text AS "price""#);
        assert_eq!(PostgresDialect.select_column("mood", "mood"), r#""mood"::text AS "mood""#);
        assert_eq!(PostgresDialect.select_column("tags", "text[]"), r#""tags"::text AS "tags""#);
    }
}
