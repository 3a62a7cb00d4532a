//! Builds parameterized SELECT, INSERT, UPDATE, DELETE for any dialect from catalog metadata.
//! Identifiers go through `Dialect::quote_ident`; values are always bound parameters.

use crate::catalog::{ColumnMeta, TableMeta};
use crate::config::DbKind;
use crate::driver::{Dialect, Row};
use serde_json::Value;

/// Upper bound applied to any requested page size.
pub const MAX_LIMIT: u64 = 1000;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// `col = <placeholder>` with `v` bound.
    fn eq_param(&mut self, d: &dyn Dialect, col: &str, declared_type: Option<&str>, v: Value) -> String {
        let n = self.push_param(v);
        format!("{} = {}", d.quote_ident(col), d.placeholder(n, declared_type))
    }
}

/// SELECT list: projected columns (or every column) through the dialect's select expression.
fn select_column_list(d: &dyn Dialect, table: &TableMeta, projection: Option<&[String]>) -> String {
    let cols: Vec<String> = match projection {
        Some(names) if !names.is_empty() => names
            .iter()
            .map(|n| {
                let declared = table.column(n).map(|c| c.declared_type.as_str()).unwrap_or("");
                d.select_column(n, declared)
            })
            .collect(),
        _ => table
            .columns
            .iter()
            .map(|c| d.select_column(&c.name, &c.declared_type))
            .collect(),
    };
    if cols.is_empty() {
        "*".into()
    } else {
        cols.join(", ")
    }
}

fn declared_type<'a>(table: &'a TableMeta, col: &str) -> Option<&'a str> {
    table.column(col).map(|c| c.declared_type.as_str())
}

/// SELECT with optional exact-match filters, ordered by primary key when the table has one.
pub fn select_rows(
    d: &dyn Dialect,
    table: &TableMeta,
    projection: Option<&[String]>,
    filters: &[(String, Value)],
    limit: Option<u64>,
    offset: Option<u64>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = select_column_list(d, table, projection);
    let mut where_parts = Vec::new();
    for (col, val) in filters {
        let part = q.eq_param(d, col, declared_type(table, col), val.clone());
        where_parts.push(part);
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let order_clause = table
        .primary_key()
        .map(|pk| format!(" ORDER BY {}", d.quote_ident(&pk.name)))
        .unwrap_or_default();
    let limit_clause = d.limit_clause(limit.map(|n| n.min(MAX_LIMIT)), offset);
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        cols,
        d.quote_ident(&table.name),
        where_clause,
        order_clause,
        limit_clause
    );
    q
}

/// SELECT one row by primary key.
pub fn select_by_key(
    d: &dyn Dialect,
    table: &TableMeta,
    pk: &ColumnMeta,
    key: &Value,
    projection: Option<&[String]>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = select_column_list(d, table, projection);
    let cond = q.eq_param(d, &pk.name, Some(&pk.declared_type), key.clone());
    q.sql = format!("SELECT {} FROM {} WHERE {}", cols, d.quote_ident(&table.name), cond);
    q
}

/// INSERT using the field names exactly as given; unknown columns are left for the backend to reject.
pub fn insert(d: &dyn Dialect, table: &TableMeta, fields: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = d.quote_ident(&table.name);
    if fields.is_empty() {
        q.sql = match d.kind() {
            DbKind::Mysql => format!("INSERT INTO {} () VALUES ()", target),
            _ => format!("INSERT INTO {} DEFAULT VALUES", target),
        };
        return q;
    }
    let mut cols = Vec::with_capacity(fields.len());
    let mut placeholders = Vec::with_capacity(fields.len());
    for (name, val) in fields {
        let n = q.push_param(val.clone());
        cols.push(d.quote_ident(name));
        placeholders.push(d.placeholder(n, declared_type(table, name)));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        target,
        cols.join(", "),
        placeholders.join(", ")
    );
    q
}

/// UPDATE by primary key, setting every given field except the key itself.
/// Returns `None` when nothing is left to set.
pub fn update(d: &dyn Dialect, table: &TableMeta, pk: &ColumnMeta, key: &Value, fields: &Row) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (name, val) in fields {
        if *name == pk.name {
            continue;
        }
        let set = q.eq_param(d, name, declared_type(table, name), val.clone());
        sets.push(set);
    }
    if sets.is_empty() {
        return None;
    }
    let cond = q.eq_param(d, &pk.name, Some(&pk.declared_type), key.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {}",
        d.quote_ident(&table.name),
        sets.join(", "),
        cond
    );
    Some(q)
}

/// DELETE by primary key.
pub fn delete(d: &dyn Dialect, table: &TableMeta, pk: &ColumnMeta, key: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cond = q.eq_param(d, &pk.name, Some(&pk.declared_type), key.clone());
    q.sql = format!("DELETE FROM {} WHERE {}", d.quote_ident(&table.name), cond);
    q
}
