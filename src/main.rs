use anyhow::Context;
use axum::Router;
use hearth::mirror::RealtimeMirror;
use hearth::{AppState, rooms, store, users};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt::init();

    let database_url = dotenv::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&database_url)
        .await
        .context("failed to open the database")?;
    store::init_schema(&db_pool)
        .await
        .context("failed to run the schema")?;

    let mirror = RealtimeMirror::new(dotenv::var("MIRROR_BASE_URL").ok());
    if !mirror.is_enabled() {
        warn!("MIRROR_BASE_URL is not set, realtime mirror writes are disabled");
    }

    let app_state = AppState::new(db_pool, mirror);
    let app = Router::new()
        .nest("/chat", rooms::router())
        .nest("/users", users::router())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let bind_addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(%bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
