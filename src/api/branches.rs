use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use super::ApiResult;
use crate::orchestration::Services;
use crate::types::{Branch, BranchId, NewBranch, NodeId, ProjectId};

pub(super) fn routes() -> Router<Services> {
    Router::new()
        .route("/branches", post(create_branch))
        .route("/branches/project/{project_id}", get(list_branches))
        .route("/branches/{id}", get(get_branch).delete(delete_branch))
        .route("/branches/{id}/merge", post(merge_branch))
        .route("/branches/{id}/head", put(set_head))
}

async fn create_branch(
    State(services): State<Services>,
    payload: Result<Json<NewBranch>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Branch>)> {
    let Json(input) = payload?;
    let branch = services.db.create_branch(&input).await?;
    Ok((StatusCode::CREATED, Json(branch)))
}

async fn list_branches(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<Branch>>> {
    let Path(project_id) = path?;
    let project = services
        .db
        .require_project(ProjectId::new(project_id))
        .await?;
    Ok(Json(services.db.list_branches(project.id).await?))
}

async fn get_branch(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Branch>> {
    let Path(id) = path?;
    Ok(Json(services.db.require_branch(BranchId::new(id)).await?))
}

async fn merge_branch(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Branch>> {
    let Path(id) = path?;
    Ok(Json(services.db.merge_branch(BranchId::new(id)).await?))
}

#[derive(Deserialize)]
struct HeadRequest {
    node_id: NodeId,
}

async fn set_head(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<HeadRequest>, JsonRejection>,
) -> ApiResult<Json<Branch>> {
    let Path(id) = path?;
    let Json(request) = payload?;
    let branch = services
        .db
        .set_branch_head(BranchId::new(id), request.node_id)
        .await?;
    Ok(Json(branch))
}

async fn delete_branch(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    services.db.delete_branch(BranchId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
