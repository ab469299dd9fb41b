use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::ApiResult;
use crate::orchestration::{PlanFormat, Services};
use crate::types::{BranchId, NewProject, NodeId, NodeStatus, Project, ProjectId};

pub(super) fn routes() -> Router<Services> {
    Router::new()
        .route("/projects", post(create_project).get(list_projects))
        .route("/projects/{id}", get(get_project).delete(delete_project))
        .route("/projects/{id}/plan", post(generate_plan))
}

async fn create_project(
    State(services): State<Services>,
    payload: Result<Json<NewProject>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let Json(input) = payload?;
    let project = services.db.create_project(&input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_projects(State(services): State<Services>) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(services.db.list_projects().await?))
}

async fn get_project(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Project>> {
    let Path(id) = path?;
    Ok(Json(services.db.require_project(ProjectId::new(id)).await?))
}

async fn delete_project(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    services.db.delete_project(ProjectId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct PlanRequest {
    prompt: String,
    #[serde(default)]
    format: Option<PlanFormat>,
}

#[derive(Serialize)]
struct PlannedNode {
    id: NodeId,
    title: Option<String>,
    parent_id: Option<NodeId>,
    status: NodeStatus,
}

#[derive(Serialize)]
struct PlanResponse {
    branch_id: BranchId,
    branch_name: String,
    nodes: Vec<PlannedNode>,
}

async fn generate_plan(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PlanResponse>)> {
    let Path(id) = path?;
    let Json(request) = payload?;
    let outcome = services
        .planner
        .generate_plan(ProjectId::new(id), &request.prompt, request.format)
        .await?;

    let nodes = outcome
        .nodes
        .into_iter()
        .map(|node| PlannedNode {
            id: node.id,
            title: node.title,
            parent_id: node.parent_id,
            status: node.status,
        })
        .collect();
    Ok((
        StatusCode::CREATED,
        Json(PlanResponse {
            branch_id: outcome.branch.id,
            branch_name: outcome.branch.name,
            nodes,
        }),
    ))
}
