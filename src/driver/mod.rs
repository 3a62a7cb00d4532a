//! Backend drivers: one per database kind behind a single trait, so the engine never sees a concrete backend.

pub mod mysql;
#[cfg(feature = "oracle")]
pub mod oracle;
pub mod postgres;
pub mod sqlite;

use crate::catalog::{ColumnMeta, TableMeta};
use crate::config::{ConnectionDescriptor, DbKind};
use crate::error::AppError;
use crate::sql::QueryBuf;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// One result row: column name to scalar value, in select-list order.
pub type Row = serde_json::Map<String, Value>;

/// SQL text rules of one backend. Every identifier that reaches SQL text goes through `quote_ident`;
/// every value is a bound parameter written with `placeholder`.
pub trait Dialect: Send + Sync {
    fn kind(&self) -> DbKind;

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Placeholder for the `n`th (1-based) bound parameter, compared against or stored into a column of `declared_type`.
    fn placeholder(&self, n: usize, declared_type: Option<&str>) -> String;

    /// Select-list entry for one column. Backends cast types their client cannot decode.
    fn select_column(&self, ident: &str, _declared_type: &str) -> String {
        self.quote_ident(ident)
    }

    /// Whether `value` can be compared against a column of `declared_type` without the backend
    /// rejecting the conversion. A value that cannot convert can match no row.
    fn accepts(&self, _declared_type: &str, _value: &Value) -> bool {
        true
    }

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, None) => String::new(),
            (Some(l), None) => format!(" LIMIT {}", l),
            (Some(l), Some(o)) => format!(" LIMIT {} OFFSET {}", l, o),
            (None, Some(o)) => format!(" OFFSET {}", o),
        }
    }
}

#[async_trait]
pub trait BackendDriver: Send + Sync {
    fn dialect(&self) -> &dyn Dialect;

    /// Every user table with its columns, declared types and primary-key flags. System tables are excluded.
    async fn introspect(&self) -> Result<Vec<TableMeta>, AppError>;

    /// Run a row-returning statement.
    async fn query(&self, q: &QueryBuf) -> Result<Vec<Row>, AppError>;

    /// Run a statement that returns no rows; yields the affected row count.
    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError>;

    /// Run an INSERT. Returns the generated value of `key_column` when the backend can report it.
    async fn insert(&self, q: &QueryBuf, key_column: Option<&ColumnMeta>) -> Result<Option<Value>, AppError>;

    async fn ping(&self) -> Result<(), AppError>;

    /// Release the connection. Called once at shutdown.
    async fn close(&self);
}

/// Open a connection for the descriptor's kind. Failure here aborts startup.
pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Arc<dyn BackendDriver>, AppError> {
    tracing::info!(backend = %descriptor.kind, host = %descriptor.host, database = %descriptor.database, "connecting");
    let driver: Arc<dyn BackendDriver> = match descriptor.kind {
        DbKind::Sqlite => Arc::new(sqlite::SqliteDriver::connect(descriptor).await?),
        DbKind::Postgres => Arc::new(postgres::PostgresDriver::connect(descriptor).await?),
        DbKind::Mysql => Arc::new(mysql::MySqlDriver::connect(descriptor).await?),
        #[cfg(feature = "oracle")]
        DbKind::Oracle => Arc::new(oracle::OracleDriver::connect(descriptor).await?),
        #[cfg(not(feature = "oracle"))]
        DbKind::Oracle => {
            return Err(crate::error::ConfigError::UnsupportedKind("orcl (built without the oracle feature)".into()).into())
        }
    };
    Ok(driver)
}

fn log_statement(q: &QueryBuf) {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
}

/// `f64` to a JSON number; NaN and infinities become null.
fn float_value(f: f64) -> Value {
    serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    impl Dialect for Plain {
        fn kind(&self) -> DbKind {
            DbKind::Sqlite
        }

        fn placeholder(&self, _n: usize, _declared_type: Option<&str>) -> String {
            "?".into()
        }
    }

    #[test]
    fn default_quoting_doubles_embedded_quotes() {
        assert_eq!(Plain.quote_ident("users"), "\"users\"");
        assert_eq!(Plain.quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Plain.quote_ident("x\"; DROP TABLE t; --"), "\"x\"\"; DROP TABLE t; --\"");
    }

    #[test]
    fn default_limit_clause() {
        assert_eq!(Plain.limit_clause(None, None), "");
        assert_eq!(Plain.limit_clause(Some(10), None), " LIMIT 10");
        assert_eq!(Plain.limit_clause(Some(10), Some(5)), " LIMIT 10 OFFSET 5");
    }

    #[test]
    fn lenient_backends_accept_any_value() {
        assert!(Plain.accepts("INTEGER", &serde_json::json!("abc")));
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(float_value(f64::NAN), Value::Null);
        assert_eq!(float_value(1.5), serde_json::json!(1.5));
    }
}
