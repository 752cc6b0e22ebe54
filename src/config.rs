use anyhow::{Context, Result};

pub const DEFAULT_AMQP_URL: &str = "amqp://127.0.0.1:5672/%2f";

pub struct TrelloConfig {
    pub api_key: String,
    pub token: String,
}

pub struct TodoistConfig {
    pub api_token: String,
}

impl TrelloConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            api_key: required(&lookup, "TRELLO_API_KEY")?,
            token: required(&lookup, "TRELLO_API_TOKEN")?,
        })
    }
}

impl TodoistConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            api_token: required(&lookup, "TODOIST_API_TOKEN")?,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("{name} is not set"))
}
