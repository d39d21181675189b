mod agenda;
mod auth;
mod config;
mod middleware;

mod db;
mod error;
mod models;
mod routes;

#[cfg(test)]
mod testutils;

use crate::{config::Config, models::AppState};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let clinic_offset = cfg.clinic_offset()?;
    let pool = db::connect_pg(&cfg.database_url, cfg.db_max_connections).await?;

    if cfg.run_migrations {
        db::run_migrations(&pool).await?;
    }

    let state = AppState {
        db: pool,
        clinic_offset,
    };

    // Browser front-ends call the API from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!(%clinic_offset, "Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
