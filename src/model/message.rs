use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One migratable card as it travels through the queue.
///
/// Optional fields are always written out, so an absent value is `null` on
/// the wire while an empty description stays `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Source card id
    pub id: String,
    pub name: String,
    pub due: Option<DateTime<Utc>>,
    pub desc: Option<String>,
    /// Markdown backlink to the source card
    pub origin: String,
    pub list_name: String,
    pub list_id: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub content: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub name: String,
    pub is_completed: bool,
    pub due: Option<DateTime<Utc>>,
}

impl Message {
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Task description: the card description followed by the origin
    /// backlink, or the backlink alone when there is no description text.
    pub fn task_description(&self) -> String {
        match self.desc.as_deref() {
            Some(desc) if !desc.is_empty() => format!("{desc}\n\n{}", self.origin),
            _ => self.origin.clone(),
        }
    }
}
