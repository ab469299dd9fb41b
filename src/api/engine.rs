use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use super::ApiResult;
use crate::orchestration::{Generation, Services};
use crate::types::{BranchId, NodeId, ProjectId};

pub(super) fn routes() -> Router<Services> {
    Router::new().route("/engine/generate", post(generate))
}

#[derive(Deserialize)]
struct GenerateRequest {
    project_id: ProjectId,
    #[serde(default)]
    branch_id: Option<BranchId>,
    #[serde(default)]
    parent_id: Option<NodeId>,
    prompt: String,
}

async fn generate(
    State(services): State<Services>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Json<Generation>> {
    let Json(request) = payload?;
    let generation = services
        .engine
        .generate(
            request.project_id,
            request.branch_id,
            request.parent_id,
            &request.prompt,
        )
        .await?;
    Ok(Json(generation))
}
