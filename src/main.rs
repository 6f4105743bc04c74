//! Pipeline Auth server binary
//!
//! Wires configuration, the Postgres-backed credential store, and the
//! auth router, then serves until shutdown.

use pipeline_auth::{create_routes, AuthConfig, AuthService, LogMailer, PgUserStore};

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AuthConfig::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    let store = PgUserStore::new(pool);
    store.migrate().await.expect("Failed to run migrations");

    let service = Arc::new(AuthService::new(
        Arc::new(store),
        Arc::new(LogMailer),
        config,
    ));

    let app = create_routes(service)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!("Listening on {}", bind_addr);
    axum::serve(listener, app).await.expect("Server error");
}
