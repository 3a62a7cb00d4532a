//! Raw config types matching the JSON config file, plus the resolved connection descriptor.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SERVER_HOST: &str = "localhost";
pub const DEFAULT_SERVER_PORT: u16 = 7914;
pub const DEFAULT_POOL_SIZE: u32 = 5;

/// Database engine behind a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbKind {
    #[serde(rename = "sqlite")]
    Sqlite,
    #[serde(rename = "mysql")]
    Mysql,
    #[serde(rename = "pg", alias = "postgres", alias = "postgresql")]
    Postgres,
    #[serde(rename = "orcl", alias = "oracle")]
    Oracle,
}

impl DbKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbKind::Sqlite => "sqlite",
            DbKind::Mysql => "mysql",
            DbKind::Postgres => "pg",
            DbKind::Oracle => "orcl",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            DbKind::Sqlite => 0,
            DbKind::Mysql => 3306,
            DbKind::Postgres => 5432,
            DbKind::Oracle => 1521,
        }
    }

    pub fn default_user(&self) -> &'static str {
        match self {
            DbKind::Sqlite => "",
            DbKind::Mysql => "root",
            DbKind::Postgres => "postgres",
            DbKind::Oracle => "SYS",
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, DbKind::Sqlite)
    }
}

impl FromStr for DbKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DbKind::Sqlite),
            "mysql" => Ok(DbKind::Mysql),
            "pg" | "postgres" | "postgresql" => Ok(DbKind::Postgres),
            "orcl" | "oracle" => Ok(DbKind::Oracle),
            other => Err(ConfigError::UnsupportedKind(other.to_string())),
        }
    }
}

impl fmt::Display for DbKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to reach one database. Immutable once built; handed to the driver that owns the connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub kind: DbKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database name (MySQL, PostgreSQL), SID or service (Oracle), or file path (SQLite).
    pub database: String,
    pub pool_size: u32,
}

impl ConnectionDescriptor {
    /// Descriptor for an SQLite database file (or `:memory:`).
    pub fn sqlite(path: impl Into<String>) -> Self {
        ConnectionDescriptor {
            kind: DbKind::Sqlite,
            host: String::new(),
            port: 0,
            user: String::new(),
            password: String::new(),
            database: path.into(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

// Password stays out of logs and error payloads.
impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbConfig {
    pub kind: DbKind,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub passwd: Option<String>,
    /// Database name, Oracle SID, or SQLite file path.
    pub name: String,
    /// Tables to expose; empty means every discovered table.
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub pool_size: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

fn default_server_host() -> String {
    DEFAULT_SERVER_HOST.into()
}

fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}

/// Whole config file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Everything startup needs: where the database is, which tables to serve, where to listen.
#[derive(Clone, Debug)]
pub struct StartupConfig {
    pub descriptor: ConnectionDescriptor,
    pub tables: Vec<String>,
    pub server: ServerConfig,
}
