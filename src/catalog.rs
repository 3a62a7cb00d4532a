//! Schema catalog: table/column/primary-key metadata discovered from the backend, loaded once.

use crate::driver::BackendDriver;
use crate::error::AppError;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::OnceCell;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnMeta {
    pub name: String,
    /// Type as the backend declares it (e.g. `integer`, `varchar(40)`, `NUMBER`).
    pub declared_type: String,
    pub is_primary_key: bool,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, is_primary_key: bool) -> Self {
        ColumnMeta {
            name: name.into(),
            declared_type: declared_type.into(),
            is_primary_key,
        }
    }
}

/// Columns of one table in the backend's natural order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableMeta {
    pub name: String,
    pub columns: Vec<ColumnMeta>,
}

impl TableMeta {
    /// At most one column keeps the primary-key flag: a composite key makes the table keyless.
    pub fn new(name: impl Into<String>, mut columns: Vec<ColumnMeta>) -> Self {
        let name = name.into();
        let pk_count = columns.iter().filter(|c| c.is_primary_key).count();
        if pk_count > 1 {
            tracing::warn!(table = %name, columns = pk_count, "composite primary key, treating table as keyless");
            for c in &mut columns {
                c.is_primary_key = false;
            }
        }
        TableMeta { name, columns }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn primary_key(&self) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.is_primary_key)
    }
}

/// Loaded lazily on first use; never refreshed for the lifetime of the connection.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    tables: OnceCell<BTreeMap<String, TableMeta>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        SchemaCatalog {
            tables: OnceCell::new(),
        }
    }

    /// Catalog built from already-known metadata (no introspection).
    pub fn from_tables(tables: Vec<TableMeta>) -> Self {
        let map = tables.into_iter().map(|t| (t.name.clone(), t)).collect();
        SchemaCatalog {
            tables: OnceCell::new_with(Some(map)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.tables.initialized()
    }

    /// Introspect on first call; later calls return the memoized result.
    /// Concurrent first callers wait on a single introspection.
    pub async fn ensure_loaded(&self, driver: &dyn BackendDriver) -> Result<&BTreeMap<String, TableMeta>, AppError> {
        self.tables
            .get_or_try_init(|| async {
                let tables = driver.introspect().await?;
                tracing::info!(backend = %driver.dialect().kind(), tables = tables.len(), "schema catalog loaded");
                Ok::<_, AppError>(tables.into_iter().map(|t| (t.name.clone(), t)).collect())
            })
            .await
    }

    fn loaded(&self) -> Option<&BTreeMap<String, TableMeta>> {
        self.tables.get()
    }

    /// Table names, sorted. Empty until loaded.
    pub fn tables(&self) -> Vec<&str> {
        self.loaded()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn table(&self, name: &str) -> Option<&TableMeta> {
        self.loaded().and_then(|m| m.get(name))
    }

    /// Column names of `table` in discovery order.
    pub fn columns(&self, table: &str) -> Option<Vec<&str>> {
        self.table(table).map(TableMeta::column_names)
    }

    pub fn primary_key(&self, table: &str) -> Option<&str> {
        self.table(table)
            .and_then(TableMeta::primary_key)
            .map(|c| c.name.as_str())
    }
}
