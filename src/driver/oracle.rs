//! Oracle driver. The client is blocking, so the single connection sits behind a mutex and every
//! call runs on the blocking pool; statements on that connection never interleave.

use super::{float_value, log_statement, BackendDriver, Dialect, Row};
use crate::catalog::{ColumnMeta, TableMeta};
use crate::config::{ConnectionDescriptor, DbKind};
use crate::error::AppError;
use crate::sql::{BindValue, QueryBuf};
use ::oracle::sql_type::{OracleType, ToSql};
use ::oracle::{Connection, SqlValue};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

const TABLES_SQL: &str = "SELECT table_name FROM user_tables ORDER BY table_name";

const COLUMNS_SQL: &str = "
SELECT c.column_name,
       c.data_type,
       CASE WHEN pk.pk_column IS NOT NULL THEN 1 ELSE 0 END AS is_pk
FROM user_tab_columns c
LEFT JOIN (
    SELECT ucc.column_name AS pk_column
    FROM user_cons_columns ucc
    JOIN user_constraints uc ON ucc.constraint_name = uc.constraint_name
    WHERE uc.constraint_type = 'P'
      AND uc.table_name = :1
) pk ON c.column_name = pk.pk_column
WHERE c.table_name = :2
ORDER BY c.column_id";

pub struct OracleDialect;

impl Dialect for OracleDialect {
    fn kind(&self) -> DbKind {
        DbKind::Oracle
    }

    fn placeholder(&self, n: usize, _declared_type: Option<&str>) -> String {
        format!(":{}", n)
    }

    /// Text compared against a numeric column raises ORA-01722 instead of matching nothing.
    fn accepts(&self, declared_type: &str, value: &Value) -> bool {
        let numeric = matches!(
            declared_type.to_uppercase().as_str(),
            "NUMBER" | "FLOAT" | "INTEGER" | "BINARY_FLOAT" | "BINARY_DOUBLE"
        );
        !numeric || value.is_null() || value.is_number()
    }

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, None) => String::new(),
            (Some(l), None) => format!(" FETCH FIRST {} ROWS ONLY", l),
            (None, Some(o)) => format!(" OFFSET {} ROWS", o),
            (Some(l), Some(o)) => format!(" OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", o, l),
        }
    }
}

pub struct OracleDriver {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl OracleDriver {
    /// Connect to `//host:port/sid` with autocommit on.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self, AppError> {
        let user = descriptor.user.clone();
        let password = descriptor.password.clone();
        let connect_string = format!("//{}:{}/{}", descriptor.host, descriptor.port, descriptor.database);
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, AppError> {
            let mut conn = Connection::connect(&user, &password, &connect_string)?;
            conn.set_autocommit(true);
            Ok(conn)
        })
        .await
        .map_err(|e| AppError::Backend(e.to_string()))??;
        Ok(OracleDriver {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, AppError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| AppError::Backend("oracle connection lock poisoned".into()))?;
            let c = guard
                .as_ref()
                .ok_or_else(|| AppError::Backend("oracle connection closed".into()))?;
            f(c)
        })
        .await
        .map_err(|e| AppError::Backend(e.to_string()))?
    }
}

#[async_trait]
impl BackendDriver for OracleDriver {
    fn dialect(&self) -> &dyn Dialect {
        &OracleDialect
    }

    async fn introspect(&self) -> Result<Vec<TableMeta>, AppError> {
        self.with_conn(|conn| {
            let mut names = Vec::new();
            for name in conn.query_as::<String>(TABLES_SQL, &[])? {
                names.push(name?);
            }
            let mut tables = Vec::with_capacity(names.len());
            for name in names {
                let mut columns = Vec::new();
                for col in conn.query_as::<(String, String, i64)>(COLUMNS_SQL, &[&name, &name])? {
                    let (cname, ctype, pk) = col?;
                    columns.push(ColumnMeta::new(cname, ctype, pk == 1));
                }
                tables.push(TableMeta::new(name, columns));
            }
            Ok(tables)
        })
        .await
    }

    async fn query(&self, q: &QueryBuf) -> Result<Vec<Row>, AppError> {
        log_statement(q);
        let q = q.clone();
        self.with_conn(move |conn| {
            let params = to_sql_params(&q.params);
            let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let rows = conn.query(&q.sql, &refs)?;
            let names: Vec<String> = rows.column_info().iter().map(|c| c.name().to_string()).collect();
            let mut out = Vec::new();
            for row in rows {
                let row = row?;
                let mut map = Row::new();
                for (name, v) in names.iter().zip(row.sql_values()) {
                    map.insert(name.clone(), sql_value_to_json(v)?);
                }
                out.push(map);
            }
            Ok(out)
        })
        .await
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        log_statement(q);
        let q = q.clone();
        self.with_conn(move |conn| {
            let params = to_sql_params(&q.params);
            let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let stmt = conn.execute(&q.sql, &refs)?;
            Ok(stmt.row_count()?)
        })
        .await
    }

    /// Generated keys need OUT binds; the engine falls back to the submitted fields.
    async fn insert(&self, q: &QueryBuf, _key_column: Option<&ColumnMeta>) -> Result<Option<Value>, AppError> {
        self.execute(q).await?;
        Ok(None)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.with_conn(|conn| Ok(conn.ping()?)).await
    }

    async fn close(&self) {
        let conn = Arc::clone(&self.conn);
        let closed = tokio::task::spawn_blocking(move || {
            let taken = conn.lock().ok().and_then(|mut guard| guard.take());
            taken.map(|c| c.close())
        })
        .await;
        if let Ok(Some(Err(e))) = closed {
            tracing::warn!(error = %e, "oracle close failed");
        }
    }
}

fn to_sql_params(params: &[Value]) -> Vec<Box<dyn ToSql>> {
    params
        .iter()
        .map(|p| -> Box<dyn ToSql> {
            match BindValue::from_json(p) {
                BindValue::Null => Box::new(None::<String>),
                BindValue::Bool(b) => Box::new(i64::from(b)),
                BindValue::I64(n) => Box::new(n),
                BindValue::F64(f) => Box::new(f),
                BindValue::Text(s) => Box::new(s),
            }
        })
        .collect()
}

fn sql_value_to_json(v: &SqlValue) -> Result<Value, AppError> {
    if v.is_null()? {
        return Ok(Value::Null);
    }
    let value = match v.oracle_type()? {
        OracleType::Number(_, _)
        | OracleType::Float(_)
        | OracleType::BinaryFloat
        | OracleType::BinaryDouble
        | OracleType::Int64
        | OracleType::UInt64 => match v.get::<i64>() {
            Ok(n) => Value::Number(n.into()),
            Err(_) => float_value(v.get::<f64>()?),
        },
        OracleType::Boolean => Value::Bool(v.get::<bool>()?),
        _ => match v.get::<String>() {
            Ok(s) => Value::String(s),
            Err(e) => {
                tracing::debug!(error = %e, "oracle value not representable as text");
                Value::Null
            }
        },
    };
    Ok(value)
}
