use std::net::SocketAddr;
use tracing::info;

use service::config::ServiceConfig;
use service::db;
use service::routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env();
    config.validate()?;

    let pool = db::connect(&config.database_url).await?;
    db::init_schema(&pool).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState { pool, config };
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("bonus program service listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
