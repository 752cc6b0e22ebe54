pub mod resolver;
pub mod todoist;
pub mod writer;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_datetime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    /// Set for subtasks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewComment {
    pub task_id: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
}

/// The task service cards are migrated into.
///
/// `create_project` and `create_section` return `None` when the service
/// answered without a usable entity.
#[async_trait]
pub trait DestinationApi: Send + Sync {
    async fn projects(&self) -> Result<Vec<Project>>;
    async fn sections(&self, project_id: &str) -> Result<Vec<Section>>;
    async fn create_project(&self, name: &str) -> Result<Option<Project>>;
    async fn create_section(&self, name: &str, project_id: &str) -> Result<Option<Section>>;
    async fn create_task(&self, task: &NewTask) -> Result<String>;
    async fn close_task(&self, task_id: &str) -> Result<()>;
    async fn create_comment(&self, comment: &NewComment) -> Result<()>;
}
