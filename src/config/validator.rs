//! Config validation: required connection parameters per database kind.

use crate::config::DbConfig;
use crate::error::ConfigError;

pub fn validate(config: &DbConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        let what = if config.kind.is_embedded() {
            "database file path"
        } else {
            "database name"
        };
        return Err(ConfigError::Validation(format!("{} required for {}", what, config.kind)));
    }
    if !config.kind.is_embedded() && config.host.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Err(ConfigError::Validation(format!("host required for {}", config.kind)));
    }
    if config.pool_size == Some(0) {
        return Err(ConfigError::Validation("pool_size must be at least 1".into()));
    }
    for t in &config.tables {
        if t.trim().is_empty() {
            return Err(ConfigError::Validation("table names must not be empty".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbKind;

    fn db(kind: DbKind, host: Option<&str>, name: &str) -> DbConfig {
        DbConfig {
            kind,
            host: host.map(String::from),
            port: None,
            user: None,
            passwd: None,
            name: name.into(),
            tables: Vec::new(),
            pool_size: None,
        }
    }

    #[test]
    fn sqlite_needs_only_a_path() {
        assert!(validate(&db(DbKind::Sqlite, None, "data.db")).is_ok());
        assert!(validate(&db(DbKind::Sqlite, None, "")).is_err());
    }

    #[test]
    fn server_kinds_need_a_host() {
        assert!(validate(&db(DbKind::Postgres, None, "app")).is_err());
        assert!(validate(&db(DbKind::Postgres, Some(" "), "app")).is_err());
        assert!(validate(&db(DbKind::Mysql, Some("localhost"), "app")).is_ok());
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let mut cfg = db(DbKind::Sqlite, None, "data.db");
        cfg.pool_size = Some(0);
        assert!(matches!(validate(&cfg), Err(ConfigError::Validation(_))));
    }
}
