//! Shared fixtures for the integration suites.
#![allow(dead_code)]
#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use serde_json::json;
use tempfile::TempDir;

use lucid::llm::ProviderFuture;
use lucid::{
    Completion, CompletionRequest, Executor, FsObjectStore, LlmError, LlmProvider, LucidDb,
    NewNode, NewProject, Node, ObjectStore, Project,
};

type Responder = Box<dyn Fn(&str) -> Result<String, LlmError> + Send + Sync>;

/// In-process provider whose answers are decided by a closure. Records every prompt.
pub struct ScriptedProvider {
    respond: Responder,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn timing_out() -> Arc<Self> {
        Self::new(|_| {
            Err(LlmError::Timeout {
                provider: "scripted",
                after: std::time::Duration::from_secs(30),
            })
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a, Completion> {
        Box::pin(async move {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(request.prompt.clone());
            }
            (self.respond)(&request.prompt).map(|text| Completion {
                text,
                raw: json!({ "provider": "scripted" }),
                provider: "scripted",
            })
        })
    }
}

/// Migrated in-memory database plus a bucket in a temp directory.
pub struct Fixture {
    pub db: LucidDb,
    pub store: Arc<FsObjectStore>,
    dir: TempDir,
}

impl Fixture {
    pub async fn new() -> Self {
        let db = LucidDb::in_memory().await.expect("in-memory db");
        let dir = tempfile::tempdir().expect("temp dir");
        let store = Arc::new(FsObjectStore::new(dir.path(), "lucid-test").expect("store"));
        store.ensure_bucket().await.expect("bucket");
        Self {
            db,
            store,
            dir,
        }
    }

    /// Files written under `nodes/<id>/` in the test bucket.
    pub fn node_objects(&self, node: &Node) -> usize {
        std::fs::read_dir(
            self.dir
                .path()
                .join("lucid-test")
                .join("nodes")
                .join(node.id.value().to_string()),
        )
        .map(|entries| entries.count())
        .unwrap_or_default()
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    pub fn executor(&self, llm: Arc<dyn LlmProvider>, inline_limit: usize) -> Executor {
        Executor::new(self.db.clone(), llm, self.store(), inline_limit)
    }

    pub async fn project(&self, name: &str) -> Project {
        self.db
            .create_project(&NewProject {
                name: name.to_string(),
                description: None,
            })
            .await
            .expect("create project")
    }

    pub async fn node(&self, project: &Project, parent: Option<&Node>, prompt: &str) -> Node {
        self.db
            .create_node(&NewNode {
                project_id: project.id,
                branch_id: None,
                parent_id: parent.map(|p| p.id),
                title: None,
                prompt: Some(prompt.to_string()),
            })
            .await
            .expect("create node")
    }
}
