pub mod confirm;
pub mod extract;
pub mod trello;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,
    pub due: Option<DateTime<Utc>>,
    pub desc: Option<String>,
    /// Always present for cards fetched with `idChecklists` in the field list.
    pub id_checklists: Option<Vec<String>>,
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    pub short_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    #[serde(default)]
    pub is_upload: bool,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub data: ActionData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionData {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    pub name: String,
    #[serde(default)]
    pub check_items: Vec<CheckItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckItem {
    pub name: String,
    pub state: String,
    pub due: Option<DateTime<Utc>>,
}

impl CheckItem {
    pub fn is_complete(&self) -> bool {
        self.state == "complete"
    }
}

/// Read-only view of the board service the cards are migrated from.
#[async_trait]
pub trait SourceApi: Send + Sync {
    async fn open_boards(&self) -> Result<Vec<Board>>;
    async fn lists(&self, board_id: &str) -> Result<Vec<SourceList>>;
    async fn cards(&self, list_id: &str) -> Result<Vec<Card>>;
    async fn actions(&self, card_id: &str) -> Result<Vec<Action>>;
    async fn checklist(&self, checklist_id: &str) -> Result<Checklist>;
}

#[cfg(test)]
pub mod tests;
