//! Shared application state for all routes. The resolved model is built once
//! at registration and read-only afterwards.

use crate::config::ResolvedModel;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub model: Arc<ResolvedModel>,
}
