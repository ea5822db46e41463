//! Restmint: declarative resource descriptors in, CRUD REST endpoints out.

pub mod case;
pub mod config;
pub mod error;
pub mod migration;
pub mod pipeline;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;
pub mod handlers;

pub use config::{load_catalog, resolve, resolve_with, CatalogConfig, ResolvedModel, ResolvedResource};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use pipeline::{MiddlewareRegistry, Pipeline};
pub use response::{failure, success_created, success_ok, Envelope};
pub use routes::{common_routes, common_routes_with_ready, resource_routes};
pub use service::{CrudService, PrimaryKeyGuard, RequestValidator};
pub use state::AppState;
pub use store::ensure_database_exists;
