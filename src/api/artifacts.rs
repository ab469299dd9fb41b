use axum::body::Bytes;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::ApiResult;
use crate::error::LucidError;
use crate::orchestration::Services;
use crate::types::{Artifact, ArtifactId, NewArtifact, NodeId};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub(super) fn routes() -> Router<Services> {
    Router::new()
        .route("/artifacts/upload", post(upload_artifact))
        .route("/artifacts/node/{node_id}", get(list_node_artifacts))
        .route("/artifacts/{id}", get(get_artifact))
        .route("/artifacts/{id}/content", get(artifact_content))
}

#[derive(Deserialize)]
struct UploadParams {
    node_id: i64,
    filename: String,
}

/// `artifacts/<uuid>.<ext>`; the extension is kept only when it is plain alphanumerics.
fn artifact_key(filename: &str) -> String {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 16)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase);
    match extension {
        Some(ext) => format!("artifacts/{}.{ext}", Uuid::new_v4()),
        None => format!("artifacts/{}", Uuid::new_v4()),
    }
}

async fn upload_artifact(
    State(services): State<Services>,
    params: Result<Query<UploadParams>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Artifact>)> {
    let Query(params) = params?;
    if params.filename.trim().is_empty() {
        return Err(LucidError::Validation(
            "filename must not be empty".to_string(),
        ));
    }
    let node = services.db.require_node(NodeId::new(params.node_id)).await?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let key = artifact_key(&params.filename);
    let stored = services
        .store
        .put(&key, body.to_vec(), &content_type)
        .await?;
    let artifact = services
        .db
        .insert_artifact(&NewArtifact {
            node_id: node.id,
            file_path: stored.key,
            file_type: content_type,
            content_hash: Some(stored.content_hash),
            byte_length: stored.byte_length,
        })
        .await?;

    info!(
        node_id = node.id.value(),
        artifact_id = artifact.id.value(),
        filename = %params.filename,
        "Artifact uploaded"
    );
    Ok((StatusCode::CREATED, Json(artifact)))
}

async fn list_node_artifacts(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<Artifact>>> {
    let Path(node_id) = path?;
    let node = services.db.require_node(NodeId::new(node_id)).await?;
    Ok(Json(services.db.list_artifacts(node.id).await?))
}

async fn require_artifact(services: &Services, id: i64) -> ApiResult<Artifact> {
    services
        .db
        .get_artifact(ArtifactId::new(id))
        .await?
        .ok_or_else(|| LucidError::NotFound(format!("Artifact {id} not found")))
}

async fn get_artifact(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Artifact>> {
    let Path(id) = path?;
    Ok(Json(require_artifact(&services, id).await?))
}

async fn artifact_content(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Response> {
    let Path(id) = path?;
    let artifact = require_artifact(&services, id).await?;
    let bytes = services.store.get(&artifact.file_path).await?;
    let content_type = HeaderValue::from_str(&artifact.file_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
