//! Demo server: loads a catalog from CONFIG_PATH, applies migrations, and
//! mounts common and resource routes under the catalog prefix.

use restmint::{
    apply_migrations, common_routes_with_ready, ensure_database_exists, load_catalog, resolve,
    resource_routes, AppState,
};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("restmint=info")),
        )
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/restmint".into());
    ensure_database_exists(&database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "sample/catalog.json".into());
    let catalog = load_catalog(&config_path).await?;
    let model = resolve(&catalog)?;
    apply_migrations(&pool, &model).await?;

    let prefix = model.prefix.clone();
    let state = AppState {
        pool,
        model: Arc::new(model),
    };

    let app = Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .nest(&prefix, resource_routes(state))
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024));

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
