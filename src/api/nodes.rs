use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use super::ApiResult;
use crate::orchestration::{read_response, Services};
use crate::types::{
    BranchId, JobId, JobStatus, NewNode, Node, NodeId, NodeStatus, NodeUpdate, ResponseRef,
};

pub(super) fn routes() -> Router<Services> {
    Router::new()
        .route("/nodes", post(create_node))
        .route("/nodes/branch/{branch_id}", get(list_branch_nodes))
        .route(
            "/nodes/{id}",
            get(get_node).put(update_node).delete(delete_node),
        )
        .route("/nodes/{id}/output", get(node_output))
        .route("/nodes/{id}/children", get(list_children))
        .route("/nodes/{id}/run", post(run_node))
}

async fn create_node(
    State(services): State<Services>,
    payload: Result<Json<NewNode>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Node>)> {
    let Json(input) = payload?;
    let node = services.db.create_node(&input).await?;
    Ok((StatusCode::CREATED, Json(node)))
}

async fn get_node(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Node>> {
    let Path(id) = path?;
    Ok(Json(services.db.require_node(NodeId::new(id)).await?))
}

async fn list_branch_nodes(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<Node>>> {
    let Path(branch_id) = path?;
    let branch = services.db.require_branch(BranchId::new(branch_id)).await?;
    Ok(Json(services.db.list_branch_nodes(branch.id).await?))
}

async fn list_children(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<Node>>> {
    let Path(id) = path?;
    let node = services.db.require_node(NodeId::new(id)).await?;
    Ok(Json(services.db.list_children(node.id).await?))
}

async fn update_node(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<NodeUpdate>, JsonRejection>,
) -> ApiResult<Json<Node>> {
    let Path(id) = path?;
    let Json(update) = payload?;
    Ok(Json(services.db.update_node(NodeId::new(id), &update).await?))
}

async fn delete_node(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    services.db.delete_node(NodeId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct NodeOutput {
    node_id: NodeId,
    status: NodeStatus,
    response_ref: Option<ResponseRef>,
    output: Option<String>,
    error_message: Option<String>,
}

async fn node_output(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<NodeOutput>> {
    let Path(id) = path?;
    let node = services.db.require_node(NodeId::new(id)).await?;
    let output = match &node.response {
        Some(response) => Some(read_response(services.store.as_ref(), response).await?),
        None => None,
    };
    Ok(Json(NodeOutput {
        node_id: node.id,
        status: node.status,
        response_ref: node.response,
        output,
        error_message: node.error_message,
    }))
}

#[derive(Serialize)]
struct RunAccepted {
    job_id: JobId,
    node_id: NodeId,
    status: JobStatus,
}

async fn run_node(
    State(services): State<Services>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<(StatusCode, Json<RunAccepted>)> {
    let Path(id) = path?;
    let job = services.dispatcher.enqueue(NodeId::new(id)).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RunAccepted {
            job_id: job.id,
            node_id: job.node_id,
            status: job.status,
        }),
    ))
}
