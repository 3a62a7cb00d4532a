//! Request checks against catalog metadata, applied before any statement is built.

use crate::catalog::{ColumnMeta, TableMeta};
use crate::driver::Row;
use crate::error::AppError;
use crate::sql::{key_text, keys_equal};
use serde_json::Value;
use std::collections::BTreeSet;

pub struct RequestValidator;

impl RequestValidator {
    /// Projected or filtered columns must exist; otherwise the request is malformed.
    pub fn known_columns<'a, I>(table: &TableMeta, names: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unknown: Vec<&str> = names.into_iter().filter(|n| !table.has_column(n)).collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "unknown column(s) for table {}: {}",
                table.name,
                unknown.join(", ")
            )))
        }
    }

    /// A full replace must name exactly the table's columns.
    pub fn full_column_set(table: &TableMeta, fields: &Row) -> Result<(), AppError> {
        let expected: BTreeSet<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        let given: BTreeSet<&str> = fields.keys().map(String::as_str).collect();
        if expected == given {
            return Ok(());
        }
        let missing: Vec<&str> = expected.difference(&given).copied().collect();
        let unknown: Vec<&str> = given.difference(&expected).copied().collect();
        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing {}", missing.join(", ")));
        }
        if !unknown.is_empty() {
            parts.push(format!("unknown {}", unknown.join(", ")));
        }
        Err(AppError::InvalidPayload(parts.join("; ")))
    }

    /// A partial update may name any subset of the table's columns, nothing else.
    pub fn column_subset(table: &TableMeta, fields: &Row) -> Result<(), AppError> {
        let unknown: Vec<&str> = fields
            .keys()
            .map(String::as_str)
            .filter(|k| !table.has_column(k))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidPayload(format!("unknown {}", unknown.join(", "))))
        }
    }

    /// A primary-key value restated in the payload must equal the path key.
    pub fn key_matches(pk: &ColumnMeta, key: &Value, fields: &Row) -> Result<(), AppError> {
        match fields.get(&pk.name) {
            Some(given) if !keys_equal(given, key) => Err(AppError::KeyMismatch {
                expected: key_text(key),
                found: key_text(given),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> TableMeta {
        TableMeta::new(
            "users",
            vec![ColumnMeta::new("id", "INTEGER", true), ColumnMeta::new("name", "TEXT", false)],
        )
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn full_set_in_any_order_passes() {
        assert!(RequestValidator::full_column_set(&users(), &row(json!({"name": "Ann", "id": 1}))).is_ok());
    }

    #[test]
    fn missing_or_extra_columns_fail_full_replace() {
        let err = RequestValidator::full_column_set(&users(), &row(json!({"id": 1}))).unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(ref m) if m.contains("missing name")));
        let err = RequestValidator::full_column_set(&users(), &row(json!({"id": 1, "name": "A", "age": 3}))).unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(ref m) if m.contains("unknown age")));
    }

    #[test]
    fn subset_rejects_only_unknown_columns() {
        assert!(RequestValidator::column_subset(&users(), &row(json!({"name": "Bo"}))).is_ok());
        assert!(RequestValidator::column_subset(&users(), &row(json!({}))).is_ok());
        assert!(RequestValidator::column_subset(&users(), &row(json!({"nope": 1}))).is_err());
    }

    #[test]
    fn restated_key_must_match() {
        let t = users();
        let pk = t.primary_key().unwrap();
        assert!(RequestValidator::key_matches(pk, &json!(1), &row(json!({"id": "1"}))).is_ok());
        assert!(RequestValidator::key_matches(pk, &json!(1), &row(json!({"name": "x"}))).is_ok());
        let err = RequestValidator::key_matches(pk, &json!(1), &row(json!({"id": 2}))).unwrap_err();
        assert!(matches!(err, AppError::KeyMismatch { .. }));
    }

    #[test]
    fn unknown_projection_is_a_bad_request() {
        assert!(RequestValidator::known_columns(&users(), ["id", "name"]).is_ok());
        assert!(matches!(
            RequestValidator::known_columns(&users(), ["id", "salary"]),
            Err(AppError::BadRequest(_))
        ));
    }
}
