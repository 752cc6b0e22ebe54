use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{Action, Board, Card, Checklist, SourceApi, SourceList};

const BASE_URL: &str = "https://api.trello.com/1";

const CARD_FIELDS: &str = "id,name,due,desc,idChecklists,shortUrl";

pub struct TrelloClient {
    api_key: String,
    token: String,
    client: reqwest::Client,
    base_url: String,
}

impl TrelloClient {
    pub fn new(api_key: String, token: String) -> Self {
        Self {
            api_key,
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

    fn auth_params(&self) -> [(&str, &str); 2] {
        [("key", &self.api_key), ("token", &self.token)]
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        self.client
            .get(format!("{}{path}", self.base_url))
            .query(&self.auth_params())
            .query(params)
            .send()
            .await
            .with_context(|| format!("Trello GET {path} failed"))?
            .error_for_status()
            .with_context(|| format!("Trello GET {path} returned an error"))?
            .json()
            .await
            .with_context(|| format!("Failed to parse Trello response for {path}"))
    }
}

#[async_trait]
impl SourceApi for TrelloClient {
    async fn open_boards(&self) -> Result<Vec<Board>> {
        let boards: Vec<Board> = self.get("/members/me/boards", &[]).await?;
        Ok(boards.into_iter().filter(|b| !b.closed).collect())
    }

    async fn lists(&self, board_id: &str) -> Result<Vec<SourceList>> {
        self.get(&format!("/boards/{board_id}/lists"), &[]).await
    }

    async fn cards(&self, list_id: &str) -> Result<Vec<Card>> {
        self.get(
            &format!("/lists/{list_id}/cards"),
            &[
                ("fields", CARD_FIELDS),
                ("attachments", "true"),
                ("attachment_fields", "url,isUpload,date"),
            ],
        )
        .await
    }

    async fn actions(&self, card_id: &str) -> Result<Vec<Action>> {
        self.get(&format!("/cards/{card_id}/actions"), &[]).await
    }

    async fn checklist(&self, checklist_id: &str) -> Result<Checklist> {
        self.get(&format!("/checklists/{checklist_id}"), &[]).await
    }
}
