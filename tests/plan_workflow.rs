// Planner workflows: goal text -> draft branch holding a parent-linked node chain.
#![allow(clippy::expect_used)]

mod support;

use std::sync::Arc;

use lucid::{
    BranchStatus, LlmRouter, LucidError, NodeStatus, PlanFormat, Planner, ProjectId,
};
use support::{Fixture, ScriptedProvider};

#[tokio::test]
async fn given_numbered_goal_when_planning_offline_then_two_chained_pending_nodes() {
    let fx = Fixture::new().await;
    let project = fx.project("P1").await;
    let planner = Planner::new(
        fx.db.clone(),
        Arc::new(LlmRouter::offline()),
        PlanFormat::Numbered,
    );

    let plan = planner
        .generate_plan(project.id, "1. Set up repo\n2. Write tests", None)
        .await
        .expect("plan");

    let titles: Vec<_> = plan.nodes.iter().map(|n| n.title.as_deref()).collect();
    assert_eq!(titles, vec![Some("Set up repo"), Some("Write tests")]);
    assert_eq!(plan.nodes[0].parent_id, None);
    assert_eq!(plan.nodes[1].parent_id, Some(plan.nodes[0].id));
    assert!(plan.nodes.iter().all(|n| n.status == NodeStatus::Pending));
    assert!(plan.branch.name.starts_with("ai-plan-"));
    assert_eq!(plan.branch.status, BranchStatus::Draft);
}

#[tokio::test]
async fn given_k_numbered_steps_when_planning_then_k_nodes_in_step_order_on_one_branch() {
    let fx = Fixture::new().await;
    let project = fx.project("chain").await;
    let llm = ScriptedProvider::replying(
        "Here is the plan:\n1. Gather data\n2) Clean data\n3. Train model\n4. Report results",
    );
    let planner = Planner::new(fx.db.clone(), llm.clone(), PlanFormat::Numbered);

    let plan = planner
        .generate_plan(project.id, "build a model", None)
        .await
        .expect("plan");

    assert_eq!(plan.nodes.len(), 4);
    for pair in plan.nodes.windows(2) {
        assert_eq!(pair[1].parent_id, Some(pair[0].id));
    }
    assert!(plan
        .nodes
        .iter()
        .all(|n| n.branch_id == Some(plan.branch.id)));
    assert_eq!(plan.branch.head_node_id, plan.nodes.last().map(|n| n.id));

    let stored = fx
        .db
        .list_branch_nodes(plan.branch.id)
        .await
        .expect("branch nodes");
    assert_eq!(stored, plan.nodes);
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn given_paragraph_reply_when_planning_then_paragraphs_become_steps() {
    let fx = Fixture::new().await;
    let project = fx.project("prose").await;
    let llm = ScriptedProvider::replying("Research the area.\n\nWrite the first draft.");
    let planner = Planner::new(fx.db.clone(), llm, PlanFormat::Numbered);

    let plan = planner
        .generate_plan(project.id, "write an essay", None)
        .await
        .expect("plan");

    assert_eq!(plan.nodes.len(), 2);
    assert_eq!(plan.nodes[0].prompt.as_deref(), Some("Research the area."));
    assert_eq!(plan.nodes[1].parent_id, Some(plan.nodes[0].id));
}

#[tokio::test]
async fn given_json_format_when_planning_then_titles_and_descriptions_are_used() {
    let fx = Fixture::new().await;
    let project = fx.project("json").await;
    let llm = ScriptedProvider::replying(
        "```json\n{\"steps\": [{\"title\": \"Outline\", \"description\": \"List the sections\"}, {\"title\": \"Draft\", \"description\": \"Write each section\"}]}\n```",
    );
    let planner = Planner::new(fx.db.clone(), llm, PlanFormat::Numbered);

    let plan = planner
        .generate_plan(project.id, "write a report", Some(PlanFormat::Json))
        .await
        .expect("plan");

    assert_eq!(plan.nodes.len(), 2);
    assert_eq!(plan.nodes[0].title.as_deref(), Some("Outline"));
    assert_eq!(plan.nodes[1].prompt.as_deref(), Some("Write each section"));
}

#[tokio::test]
async fn given_unknown_project_when_planning_then_not_found_without_model_call() {
    let fx = Fixture::new().await;
    let llm = ScriptedProvider::replying("1. never used");
    let planner = Planner::new(fx.db.clone(), llm.clone(), PlanFormat::Numbered);

    let result = planner
        .generate_plan(ProjectId::new(9_999), "1. anything", None)
        .await;

    assert!(matches!(result, Err(LucidError::NotFound(_))));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn given_blank_goal_when_planning_then_validation_error() {
    let fx = Fixture::new().await;
    let project = fx.project("blank").await;
    let llm = ScriptedProvider::replying("1. never used");
    let planner = Planner::new(fx.db.clone(), llm.clone(), PlanFormat::Numbered);

    let result = planner.generate_plan(project.id, "   ", None).await;

    assert!(matches!(result, Err(LucidError::Validation(_))));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn given_provider_timeout_when_planning_then_error_and_nothing_written() {
    let fx = Fixture::new().await;
    let project = fx.project("timeout").await;
    let planner = Planner::new(
        fx.db.clone(),
        ScriptedProvider::timing_out(),
        PlanFormat::Numbered,
    );

    let result = planner.generate_plan(project.id, "1. a\n2. b", None).await;

    assert!(matches!(result, Err(LucidError::Provider(_))));
    let branches = fx.db.list_branches(project.id).await.expect("branches");
    assert_eq!(branches.len(), 1, "only the default branch remains");
    let nodes = fx.db.list_project_nodes(project.id).await.expect("nodes");
    assert!(nodes.is_empty());
}

#[tokio::test]
async fn given_insert_failure_mid_chain_when_planning_then_no_branch_or_node_survives() {
    let fx = Fixture::new().await;
    let project = fx.project("atomic").await;
    sqlx::query(
        "CREATE TRIGGER reject_boom BEFORE INSERT ON nodes \
         WHEN NEW.title = 'boom' BEGIN SELECT RAISE(ABORT, 'boom rejected'); END",
    )
    .execute(fx.db.pool())
    .await
    .expect("trigger");

    let llm = ScriptedProvider::replying("1. first\n2. second\n3. boom");
    let planner = Planner::new(fx.db.clone(), llm, PlanFormat::Numbered);

    let result = planner.generate_plan(project.id, "go", None).await;

    assert!(result.is_err());
    let branches = fx.db.list_branches(project.id).await.expect("branches");
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name, "main");
    let nodes = fx.db.list_project_nodes(project.id).await.expect("nodes");
    assert!(nodes.is_empty());
}
