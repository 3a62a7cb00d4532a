//! autorest: a REST API generated at runtime from the schema of an existing database.

pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod policy;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use catalog::{ColumnMeta, SchemaCatalog, TableMeta};
pub use config::{load_from_file, parse_dsn, ConnectionDescriptor, DbKind, StartupConfig};
pub use driver::{connect, BackendDriver, Row};
pub use error::{AppError, ConfigError};
pub use policy::AccessPolicy;
pub use response::{success_created, success_many, success_one};
pub use routes::{app, common_routes, entity_routes, API_PREFIX};
pub use service::{CrudEngine, ListQuery};
pub use state::AppState;
