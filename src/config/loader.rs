//! Load startup config from a JSON config file or from a URI-style DSN.

use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use percent_encoding::percent_decode_str;
use std::path::Path;
use url::Url;

/// Read and resolve a JSON config file.
pub async fn load_from_file(path: impl AsRef<Path>) -> Result<StartupConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse_config(&raw)
}

/// Parse config file contents.
pub fn parse_config(raw: &str) -> Result<StartupConfig, ConfigError> {
    let config: AppConfig = serde_json::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))?;
    resolve(config)
}

/// Validate and fill per-kind defaults (port, user, pool size).
pub fn resolve(config: AppConfig) -> Result<StartupConfig, ConfigError> {
    validate(&config.db)?;
    let db = config.db;
    let kind = db.kind;
    let pool_size = db.pool_size.unwrap_or(DEFAULT_POOL_SIZE);
    let descriptor = if kind.is_embedded() {
        ConnectionDescriptor {
            pool_size,
            ..ConnectionDescriptor::sqlite(db.name)
        }
    } else {
        ConnectionDescriptor {
            kind,
            host: db.host.unwrap_or_default(),
            port: db.port.unwrap_or_else(|| kind.default_port()),
            user: db.user.unwrap_or_else(|| kind.default_user().to_string()),
            password: db.passwd.unwrap_or_default(),
            database: db.name,
            pool_size,
        }
    };
    Ok(StartupConfig {
        descriptor,
        tables: db.tables,
        server: config.server,
    })
}

/// Parse a DSN such as `pg://user:secret@localhost:5432/shop/orders` or `sqlite://data.db/users`.
///
/// For server databases the first path segment is the database and the second the table.
/// For SQLite the host is the database file and the first path segment the table; with an
/// empty host (`sqlite:///abs/path.db`) the whole path is the file and no table is seeded.
/// The table, when present, becomes the only entry of the access policy.
pub fn parse_dsn(dsn: &str) -> Result<StartupConfig, ConfigError> {
    let url = Url::parse(dsn).map_err(|e| ConfigError::Dsn(e.to_string()))?;
    let kind: DbKind = url.scheme().parse()?;
    let host = url.host_str().unwrap_or("").to_string();
    let segments: Vec<String> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).map(decode).collect::<Result<_, _>>())
        .transpose()?
        .unwrap_or_default();

    let (descriptor, table) = if kind.is_embedded() {
        if host.is_empty() {
            let path = decode(url.path())?;
            if path.is_empty() {
                return Err(ConfigError::Dsn("sqlite dsn needs a database file".into()));
            }
            (ConnectionDescriptor::sqlite(path), None)
        } else {
            (ConnectionDescriptor::sqlite(host), segments.first().cloned())
        }
    } else {
        if host.is_empty() {
            return Err(ConfigError::Dsn(format!("{} dsn needs a host", kind)));
        }
        let database = segments
            .first()
            .cloned()
            .ok_or_else(|| ConfigError::Dsn(format!("{} dsn needs a database name", kind)))?;
        let user = if url.username().is_empty() {
            kind.default_user().to_string()
        } else {
            decode(url.username())?
        };
        let password = url.password().map(decode).transpose()?.unwrap_or_default();
        let descriptor = ConnectionDescriptor {
            kind,
            host,
            port: url.port().unwrap_or_else(|| kind.default_port()),
            user,
            password,
            database,
            pool_size: DEFAULT_POOL_SIZE,
        };
        (descriptor, segments.get(1).cloned())
    };

    Ok(StartupConfig {
        descriptor,
        tables: table.into_iter().collect(),
        server: ServerConfig::default(),
    })
}

fn decode(s: &str) -> Result<String, ConfigError> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|c| c.into_owned())
        .map_err(|e| ConfigError::Dsn(e.to_string()))
}
