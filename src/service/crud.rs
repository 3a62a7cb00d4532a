//! CrudEngine: schema-driven list/get/create/replace/partial-update/delete over any backend driver.

use crate::catalog::{ColumnMeta, SchemaCatalog, TableMeta};
use crate::driver::{BackendDriver, Row};
use crate::error::AppError;
use crate::policy::AccessPolicy;
use crate::service::RequestValidator;
use crate::sql::{self, coerce_key};
use serde_json::Value;
use std::sync::Arc;

/// Options for `list`. Filter values given as text are coerced like keys.
#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub columns: Option<Vec<String>>,
    pub filters: Vec<(String, Value)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// The catalog and policy are written once during setup and only read afterwards.
pub struct CrudEngine {
    driver: Arc<dyn BackendDriver>,
    catalog: SchemaCatalog,
    policy: AccessPolicy,
}

impl CrudEngine {
    /// Engine over `driver` with an unloaded catalog and no access restriction.
    pub fn new(driver: Arc<dyn BackendDriver>) -> Self {
        CrudEngine {
            driver,
            catalog: SchemaCatalog::new(),
            policy: AccessPolicy::unrestricted(),
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Restrict the engine to `tables`. An empty slice allows every table known right now.
    pub async fn set_access(&mut self, tables: &[String]) -> Result<(), AppError> {
        self.catalog.ensure_loaded(self.driver.as_ref()).await?;
        for name in tables.iter().filter(|t| self.catalog.table(t).is_none()) {
            tracing::warn!(table = %name, "allowed table not present in schema");
        }
        self.policy = AccessPolicy::from_request(tables, self.catalog.tables());
        let allowed = self.policy.tables().map(|s| s.len()).unwrap_or(0);
        tracing::info!(tables = allowed, "access policy set");
        Ok(())
    }

    /// Names of the tables this engine serves, sorted.
    pub async fn tables(&self) -> Result<Vec<String>, AppError> {
        let tables = self.catalog.ensure_loaded(self.driver.as_ref()).await?;
        Ok(tables
            .keys()
            .filter(|t| self.policy.allows(t))
            .cloned()
            .collect())
    }

    /// Rows of `table`, ordered by primary key when there is one. No rows is `EmptyResult`.
    pub async fn list(&self, table: &str, query: &ListQuery) -> Result<Vec<Row>, AppError> {
        let meta = self.resolve(table).await?;
        if let Some(cols) = &query.columns {
            RequestValidator::known_columns(meta, cols.iter().map(String::as_str))?;
        }
        RequestValidator::known_columns(meta, query.filters.iter().map(|(c, _)| c.as_str()))?;
        let filters: Vec<(String, Value)> = query
            .filters
            .iter()
            .map(|(c, v)| (c.clone(), normalize_key(v)))
            .collect();
        let dialect = self.driver.dialect();
        let unmatchable = filters.iter().any(|(c, v)| {
            meta.column(c)
                .is_some_and(|col| !dialect.accepts(&col.declared_type, v))
        });
        if unmatchable {
            return Err(AppError::EmptyResult(table.to_string()));
        }
        let q = sql::select_rows(
            self.driver.dialect(),
            meta,
            query.columns.as_deref(),
            &filters,
            query.limit,
            query.offset,
        );
        let rows = self.driver.query(&q).await?;
        if rows.is_empty() {
            return Err(AppError::EmptyResult(table.to_string()));
        }
        Ok(rows)
    }

    pub async fn get(&self, table: &str, key: &Value, columns: Option<&[String]>) -> Result<Row, AppError> {
        let meta = self.resolve(table).await?;
        let pk = key_column(meta)?;
        if let Some(cols) = columns {
            RequestValidator::known_columns(meta, cols.iter().map(String::as_str))?;
        }
        self.fetch(meta, pk, &normalize_key(key), columns).await
    }

    /// Insert `fields` as given and return the stored row.
    pub async fn create(&self, table: &str, fields: Row) -> Result<Row, AppError> {
        let meta = self.resolve(table).await?;
        let pk = meta.primary_key();
        let supplied = pk
            .and_then(|pk| fields.get(&pk.name))
            .filter(|v| !v.is_null())
            .map(normalize_key);
        if let (Some(pk), Some(key)) = (pk, &supplied) {
            if !self.driver.dialect().accepts(&pk.declared_type, key) {
                return Err(AppError::InvalidPayload(format!(
                    "{} is not a valid {} value",
                    pk.name, pk.declared_type
                )));
            }
            match self.fetch(meta, pk, key, None).await {
                Ok(_) => return Err(AppError::Conflict(table.to_string())),
                Err(AppError::RowNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        let q = sql::insert(self.driver.dialect(), meta, &fields);
        let generated = self
            .driver
            .insert(&q, if supplied.is_none() { pk } else { None })
            .await?;
        match (pk, supplied.or(generated)) {
            (Some(pk), Some(key)) => self.fetch(meta, pk, &key, None).await,
            _ => Ok(fields),
        }
    }

    /// Full replace: `fields` must name every column, and a restated key must match `key`.
    pub async fn replace(&self, table: &str, key: &Value, fields: Row) -> Result<Row, AppError> {
        self.update(table, key, fields, true).await
    }

    /// Update only the named columns.
    pub async fn partial_update(&self, table: &str, key: &Value, fields: Row) -> Result<Row, AppError> {
        self.update(table, key, fields, false).await
    }

    /// Shared by replace (`strict`) and partial-update. The key column itself is never rewritten.
    pub async fn update(&self, table: &str, key: &Value, fields: Row, strict: bool) -> Result<Row, AppError> {
        let meta = self.resolve(table).await?;
        let pk = key_column(meta)?;
        let key = normalize_key(key);
        let current = self.fetch(meta, pk, &key, None).await?;
        if strict {
            RequestValidator::key_matches(pk, &key, &fields)?;
            RequestValidator::full_column_set(meta, &fields)?;
        } else {
            RequestValidator::column_subset(meta, &fields)?;
        }
        match sql::update(self.driver.dialect(), meta, pk, &key, &fields) {
            None => Ok(current),
            Some(q) => {
                self.driver.execute(&q).await?;
                self.fetch(meta, pk, &key, None).await
            }
        }
    }

    /// Delete one row and return it as it was before the delete.
    pub async fn delete(&self, table: &str, key: &Value) -> Result<Row, AppError> {
        let meta = self.resolve(table).await?;
        let pk = key_column(meta)?;
        let key = normalize_key(key);
        let pre_image = self.fetch(meta, pk, &key, None).await?;
        let q = sql::delete(self.driver.dialect(), meta, pk, &key);
        self.driver.execute(&q).await?;
        Ok(pre_image)
    }

    /// Backend round trip for readiness checks.
    pub async fn ping(&self) -> Result<(), AppError> {
        self.driver.ping().await
    }

    /// Release the backend connection. Call once, after the listener has stopped.
    pub async fn close(&self) {
        self.driver.close().await;
        tracing::info!("backend connection closed");
    }

    /// Entry gate for every operation: catalog loaded, table known, table allowed.
    async fn resolve(&self, table: &str) -> Result<&TableMeta, AppError> {
        let tables = self.catalog.ensure_loaded(self.driver.as_ref()).await?;
        let meta = tables
            .get(table)
            .ok_or_else(|| AppError::TableNotFound(table.to_string()))?;
        if !self.policy.allows(table) {
            return Err(AppError::Forbidden(table.to_string()));
        }
        Ok(meta)
    }

    async fn fetch(
        &self,
        meta: &TableMeta,
        pk: &ColumnMeta,
        key: &Value,
        columns: Option<&[String]>,
    ) -> Result<Row, AppError> {
        // A key the column type cannot hold matches no row.
        if !self.driver.dialect().accepts(&pk.declared_type, key) {
            return Err(AppError::RowNotFound(meta.name.clone()));
        }
        let q = sql::select_by_key(self.driver.dialect(), meta, pk, key, columns);
        self.driver
            .query(&q)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::RowNotFound(meta.name.clone()))
    }
}

fn key_column(meta: &TableMeta) -> Result<&ColumnMeta, AppError> {
    meta.primary_key()
        .ok_or_else(|| AppError::KeyMissing(meta.name.clone()))
}

fn normalize_key(v: &Value) -> Value {
    match v {
        Value::String(s) => coerce_key(s),
        other => other.clone(),
    }
}
