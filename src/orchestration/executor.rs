use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::plan_parsing::truncate_chars;
use crate::db::{redact_sensitive, LucidDb};
use crate::error::{LucidError, Result};
use crate::llm::{CompletionRequest, LlmProvider};
use crate::storage::{ObjectStore, StorageError};
use crate::types::{NewArtifact, Node, NodeId, NodeStatus, ResponseRef};

pub const EXECUTOR_SYSTEM_PROMPT: &str =
    "You are a careful assistant carrying out one step of a larger plan.";

const PREVIEW_CHARS: usize = 500;

/// What one execution attempt ended with. Provider and storage failures land here as
/// `status: failed` with a redacted `error`, not as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub output_preview: Option<String>,
    pub response_ref: Option<ResponseRef>,
    pub error: Option<String>,
}

/// Reads a stored response back as text.
///
/// # Errors
/// Returns the store error when an object-backed response cannot be read.
pub async fn read_response(
    store: &dyn ObjectStore,
    response: &ResponseRef,
) -> std::result::Result<String, StorageError> {
    match response {
        ResponseRef::Inline { text } => Ok(text.clone()),
        ResponseRef::Object { key } => store.get_text(key).await,
    }
}

#[derive(Clone)]
pub struct Executor {
    db: LucidDb,
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn ObjectStore>,
    inline_output_limit: usize,
}

struct PersistedOutput {
    response: ResponseRef,
    artifact: Option<NewArtifact>,
    preview: String,
}

impl Executor {
    #[must_use]
    pub fn new(
        db: LucidDb,
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn ObjectStore>,
        inline_output_limit: usize,
    ) -> Self {
        Self {
            db,
            llm,
            store,
            inline_output_limit,
        }
    }

    /// Runs a pending node through the model and records exactly one terminal status.
    ///
    /// `running` is committed before the model is called.
    ///
    /// # Errors
    /// `NotFound` for unknown nodes, `Validation` for nodes that are not `pending`,
    /// `Conflict` when another executor claimed the node first, and database errors.
    pub async fn execute_node(&self, node_id: NodeId) -> Result<ExecutionReport> {
        let node = self.db.require_node(node_id).await?;
        if node.status != NodeStatus::Pending {
            return Err(LucidError::Validation(format!(
                "Node {} is {}; only pending nodes can be executed",
                node_id.value(),
                node.status
            )));
        }

        let context = self.assemble_context(&node).await?;
        self.db
            .transition_node_status(node_id, NodeStatus::Pending, NodeStatus::Running)
            .await?;

        let persisted = match self.generate_and_store(node_id, &context).await {
            Ok(persisted) => persisted,
            Err(e) => return self.record_failure(node_id, &e.to_string(), None).await,
        };

        match self
            .db
            .complete_node_success(node_id, &persisted.response, persisted.artifact.as_ref())
            .await
        {
            Ok(done) => {
                info!(
                    node_id = node_id.value(),
                    response_kind = persisted.response.kind(),
                    "Node execution succeeded"
                );
                Ok(ExecutionReport {
                    node_id,
                    status: done.status,
                    output_preview: Some(persisted.preview),
                    response_ref: done.response,
                    error: None,
                })
            }
            Err(e) => {
                let orphaned = match &persisted.response {
                    ResponseRef::Object { key } => Some(key.as_str()),
                    ResponseRef::Inline { .. } => None,
                };
                self.record_failure(node_id, &e.to_string(), orphaned).await
            }
        }
    }

    /// Parent prompt, then the parent's output when it succeeded, then this node's prompt.
    async fn assemble_context(&self, node: &Node) -> Result<String> {
        let Some(parent_id) = node.parent_id else {
            return Ok(node.prompt_text().to_string());
        };
        let Some(parent) = self.db.get_node(parent_id).await? else {
            return Ok(node.prompt_text().to_string());
        };

        let mut context = format!("Previous step:\n{}\n\n", parent.prompt_text());
        if parent.status == NodeStatus::Succeeded {
            if let Some(response) = &parent.response {
                match read_response(self.store.as_ref(), response).await {
                    Ok(output) => {
                        context.push_str(&format!("Previous step output:\n{output}\n\n"));
                    }
                    Err(e) => warn!(
                        node_id = node.id.value(),
                        parent_id = parent_id.value(),
                        error = %e,
                        "Parent output unavailable; continuing without it"
                    ),
                }
            }
        }
        context.push_str(&format!("Current step:\n{}", node.prompt_text()));
        Ok(context)
    }

    async fn generate_and_store(&self, node_id: NodeId, context: &str) -> Result<PersistedOutput> {
        let request = CompletionRequest::new(context).with_system(EXECUTOR_SYSTEM_PROMPT);
        let completion = self.llm.complete(&request).await?;
        let preview = truncate_chars(&completion.text, PREVIEW_CHARS);

        if completion.text.len() <= self.inline_output_limit {
            return Ok(PersistedOutput {
                response: ResponseRef::Inline {
                    text: completion.text,
                },
                artifact: None,
                preview,
            });
        }

        let key = format!("nodes/{}/{}.txt", node_id.value(), Uuid::new_v4());
        let stored = self.store.put_text(&key, &completion.text).await?;
        Ok(PersistedOutput {
            response: ResponseRef::Object { key: key.clone() },
            artifact: Some(NewArtifact {
                node_id,
                file_path: key,
                file_type: "text/plain".to_string(),
                content_hash: Some(stored.content_hash),
                byte_length: stored.byte_length,
            }),
            preview,
        })
    }

    /// `orphaned_key` names an object written for this attempt that no node row points at.
    async fn record_failure(
        &self,
        node_id: NodeId,
        message: &str,
        orphaned_key: Option<&str>,
    ) -> Result<ExecutionReport> {
        if let Some(key) = orphaned_key {
            warn!(
                node_id = node_id.value(),
                bucket = self.store.bucket(),
                key,
                "Stored output left without a node reference"
            );
        }
        let failed = self.db.complete_node_failure(node_id, message).await?;
        Ok(ExecutionReport {
            node_id,
            status: failed.status,
            output_preview: None,
            response_ref: None,
            error: Some(
                failed
                    .error_message
                    .unwrap_or_else(|| redact_sensitive(message)),
            ),
        })
    }
}
