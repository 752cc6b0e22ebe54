use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{DestinationApi, NewComment, NewTask, Project, Section};

const BASE_URL: &str = "https://api.todoist.com/rest/v2";

pub struct TodoistClient {
    token: String,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Task {
    id: String,
}

#[derive(Serialize)]
struct NewProject<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct NewSection<'a> {
    name: &'a str,
    project_id: &'a str,
}

impl TodoistClient {
    pub fn new(token: String) -> Self {
        Self {
            token,
            client: reqwest::Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        self.client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Todoist GET {path} failed"))?
            .error_for_status()
            .with_context(|| format!("Todoist GET {path} returned an error"))?
            .json()
            .await
            .with_context(|| format!("Failed to parse Todoist response for {path}"))
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<String> {
        self.client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Todoist POST {path} failed"))?
            .error_for_status()
            .with_context(|| format!("Todoist POST {path} returned an error"))?
            .text()
            .await
            .with_context(|| format!("Failed to read Todoist response for {path}"))
    }
}

/// Parses a creation response, mapping an empty or `null` body and an
/// entity without an id to `None`.
fn created<T: DeserializeOwned>(body: &str, id: impl Fn(&T) -> &str) -> Result<Option<T>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let entity: Option<T> =
        serde_json::from_str(body).context("Failed to parse Todoist creation response")?;
    Ok(entity.filter(|e| !id(e).is_empty()))
}

#[async_trait]
impl DestinationApi for TodoistClient {
    async fn projects(&self) -> Result<Vec<Project>> {
        self.get("/projects", &[]).await
    }

    async fn sections(&self, project_id: &str) -> Result<Vec<Section>> {
        self.get("/sections", &[("project_id", project_id)]).await
    }

    async fn create_project(&self, name: &str) -> Result<Option<Project>> {
        let body = self.post("/projects", &NewProject { name }).await?;
        created(&body, |p: &Project| p.id.as_str())
    }

    async fn create_section(&self, name: &str, project_id: &str) -> Result<Option<Section>> {
        let body = self
            .post("/sections", &NewSection { name, project_id })
            .await?;
        created(&body, |s: &Section| s.id.as_str())
    }

    async fn create_task(&self, task: &NewTask) -> Result<String> {
        let body = self.post("/tasks", task).await?;
        let task: Task = serde_json::from_str(&body).context("Failed to parse created task")?;
        Ok(task.id)
    }

    async fn close_task(&self, task_id: &str) -> Result<()> {
        self.post(&format!("/tasks/{task_id}/close"), &serde_json::json!({}))
            .await?;
        Ok(())
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<()> {
        self.post("/comments", comment).await?;
        Ok(())
    }
}
