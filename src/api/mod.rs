//! HTTP surface. Handlers only translate between JSON and the services.

mod artifacts;
mod branches;
mod engine;
mod error;
mod nodes;
mod projects;

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiResult;

use crate::error::{LucidError, Result};
use crate::orchestration::Services;

/// The full route table with shared services attached.
pub fn router(services: Services) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(projects::routes())
        .merge(branches::routes())
        .merge(nodes::routes())
        .merge(artifacts::routes())
        .merge(engine::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(services)
}

/// Binds `addr` and serves until `shutdown` resolves.
///
/// # Errors
/// Returns an I/O error if the listener cannot bind or the server fails.
pub async fn serve<F>(services: Services, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Lucid API listening");
    axum::serve(listener, router(services))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn root() -> Json<Value> {
    Json(json!({ "service": "lucid-core", "status": "ok" }))
}

async fn health(State(services): State<Services>) -> ApiResult<Json<Value>> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(services.db.pool())
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Health check failed: {e}")))?;
    let bucket = services.store.bucket_exists().await?;
    Ok(Json(json!({
        "status": "ok",
        "database": "ok",
        "bucket": services.store.bucket(),
        "bucket_ready": bucket,
    })))
}
