use anyhow::{Context, Result};
use futures::stream::{self, Stream, TryStreamExt};
use tracing::{debug, info};

use super::confirm::Confirm;
use super::{Card, SourceApi};
use crate::model::message::{Comment, Message, Subtask};
use crate::queue::Publisher;

/// Flattens source boards into queue messages.
pub struct Extractor<'a> {
    api: &'a dyn SourceApi,
}

impl<'a> Extractor<'a> {
    pub fn new(api: &'a dyn SourceApi) -> Self {
        Self { api }
    }

    /// Open lists of one board, or of every open board, that the user agrees
    /// to migrate. Yields `(list_id, list_name)`; calling again starts over.
    pub fn lists_to_migrate(
        &self,
        board: Option<&'a str>,
        confirm: &'a dyn Confirm,
    ) -> impl Stream<Item = Result<(String, String)>> + 'a {
        let api = self.api;
        let board_ids = async move {
            let ids: Vec<String> = match board {
                Some(id) => vec![id.to_string()],
                None => api
                    .open_boards()
                    .await?
                    .into_iter()
                    .map(|b| {
                        debug!(board = %b.name, "Scanning board");
                        b.id
                    })
                    .collect(),
            };
            Ok::<_, anyhow::Error>(ids)
        };

        stream::once(board_ids)
            .map_ok(|ids| stream::iter(ids.into_iter().map(Ok::<_, anyhow::Error>)))
            .try_flatten()
            .and_then(move |board_id: String| async move { api.lists(&board_id).await })
            .map_ok(|lists| {
                stream::iter(
                    lists
                        .into_iter()
                        .filter(|l| !l.closed)
                        .map(Ok::<_, anyhow::Error>),
                )
            })
            .try_flatten()
            .try_filter_map(move |list| {
                let prompt = format!("Do you want to migrate {}? [y]/n ", list.name);
                let keep = confirm.confirm(&prompt);
                async move { keep.map(|keep| keep.then_some((list.id, list.name))) }
            })
    }

    pub async fn cards_of(&self, list_id: &str) -> Result<Vec<Card>> {
        self.api.cards(list_id).await
    }

    /// Link attachments followed by comment actions, in the order the
    /// source returned them.
    pub async fn comments_of(&self, card: &Card) -> Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = card
            .attachments
            .iter()
            .flatten()
            .filter(|a| !a.is_upload)
            .map(|a| Comment {
                content: a.url.clone(),
                posted_at: a.date,
            })
            .collect();

        let actions = self
            .api
            .actions(&card.id)
            .await
            .with_context(|| format!("Failed to fetch actions of card {}", card.id))?;
        comments.extend(
            actions
                .into_iter()
                .filter(|a| a.kind == "commentCard")
                .filter_map(|a| {
                    a.data.text.map(|text| Comment {
                        content: text,
                        posted_at: a.date,
                    })
                }),
        );

        Ok(comments)
    }

    /// One subtask per check item. Items are prefixed with their checklist
    /// name when the card has more than one checklist.
    pub async fn subtasks_of(&self, card: &Card) -> Result<Vec<Subtask>> {
        let checklist_ids = card
            .id_checklists
            .as_ref()
            .with_context(|| format!("Card {} has no checklist field", card.id))?;

        let mut subtasks = Vec::new();
        for checklist_id in checklist_ids {
            let checklist = self
                .api
                .checklist(checklist_id)
                .await
                .with_context(|| format!("Failed to fetch checklist {checklist_id}"))?;
            let prefix = if checklist_ids.len() > 1 {
                format!("{}: ", checklist.name)
            } else {
                String::new()
            };

            subtasks.extend(checklist.check_items.into_iter().map(|item| Subtask {
                name: format!("{prefix}{}", item.name),
                is_completed: item.is_complete(),
                due: item.due,
            }));
        }

        Ok(subtasks)
    }

    pub async fn message_for(
        &self,
        card: &Card,
        list_id: &str,
        list_name: &str,
    ) -> Result<Message> {
        Ok(Message {
            id: card.id.clone(),
            name: card.name.clone(),
            due: card.due,
            desc: card.desc.clone(),
            origin: format!("*From [Trello]({})*", card.short_url),
            list_name: list_name.to_string(),
            list_id: list_id.to_string(),
            comments: self.comments_of(card).await?,
            subtasks: self.subtasks_of(card).await?,
        })
    }
}

pub async fn publish(publisher: &dyn Publisher, message: &Message) -> Result<()> {
    let body = message
        .to_bytes()
        .with_context(|| format!("Failed to encode card {}", message.id))?;
    publisher
        .publish(&body)
        .await
        .with_context(|| format!("Failed to publish card {}", message.id))
}

/// Publishes every card of the confirmed lists. Returns how many were sent.
pub async fn run(
    api: &dyn SourceApi,
    publisher: &dyn Publisher,
    board: Option<&str>,
    confirm: &dyn Confirm,
) -> Result<usize> {
    let extractor = Extractor::new(api);
    let lists: Vec<(String, String)> = extractor
        .lists_to_migrate(board, confirm)
        .try_collect()
        .await?;

    let mut published = 0;
    for (list_id, list_name) in &lists {
        info!(list = %list_name, "Migrating cards");
        for card in extractor.cards_of(list_id).await? {
            debug!(card = %card.id, name = %card.name, "Migrating card");
            let message = extractor.message_for(&card, list_id, list_name).await?;
            publish(publisher, &message).await?;
            published += 1;
        }
    }

    info!(published, lists = lists.len(), "Extraction finished");
    Ok(published)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::tests::MockPublisher;
    use crate::source::confirm::AcceptAll;
    use crate::source::tests::{card, MockSource, Scripted};

    #[tokio::test]
    async fn lists_skip_closed_and_declined() {
        let source = MockSource::sample();
        let confirm = Scripted::new(&[true, false]);
        let lists: Vec<_> = Extractor::new(&source)
            .lists_to_migrate(None, &confirm)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(lists, vec![("l1".to_string(), "Groceries".to_string())]);
        assert_eq!(
            confirm.prompts(),
            [
                "Do you want to migrate Groceries? [y]/n ",
                "Do you want to migrate Chores? [y]/n ",
            ]
        );
    }

    #[tokio::test]
    async fn board_filter_limits_lists() {
        let source = MockSource::sample();
        let lists: Vec<_> = Extractor::new(&source)
            .lists_to_migrate(Some("b2"), &AcceptAll)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(lists, vec![("l9".to_string(), "Someday".to_string())]);
        assert_eq!(source.board_listing_calls(), 0);
    }

    #[tokio::test]
    async fn lists_can_be_listed_again() {
        let source = MockSource::sample();
        let extractor = Extractor::new(&source);
        let first: Vec<_> = extractor
            .lists_to_migrate(None, &AcceptAll)
            .try_collect()
            .await
            .unwrap();
        let second: Vec<_> = extractor
            .lists_to_migrate(None, &AcceptAll)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn comments_keep_source_order_and_skip_uploads() {
        let source = MockSource::sample();
        let comments = Extractor::new(&source)
            .comments_of(&card("c1", &["cl1"]))
            .await
            .unwrap();

        let contents: Vec<_> = comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, ["http://x", "second thought", "first thought"]);
    }

    #[tokio::test]
    async fn single_checklist_has_no_prefix() {
        let source = MockSource::sample();
        let subtasks = Extractor::new(&source)
            .subtasks_of(&card("c1", &["cl1"]))
            .await
            .unwrap();

        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[0].name, "2%");
        assert!(!subtasks[0].is_completed);
        assert_eq!(subtasks[1].name, "Butter");
        assert!(subtasks[1].is_completed);
    }

    #[tokio::test]
    async fn several_checklists_are_prefixed() {
        let source = MockSource::sample();
        let subtasks = Extractor::new(&source)
            .subtasks_of(&card("c1", &["cl1", "cl2"]))
            .await
            .unwrap();

        let names: Vec<_> = subtasks.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Dairy: 2%", "Dairy: Butter", "Bakery: Bread"]);
    }

    #[tokio::test]
    async fn missing_checklist_field_is_an_error() {
        let source = MockSource::sample();
        let mut malformed = card("c1", &[]);
        malformed.id_checklists = None;

        let result = Extractor::new(&source).subtasks_of(&malformed).await;
        assert!(result.unwrap_err().to_string().contains("no checklist field"));
    }

    #[tokio::test]
    async fn empty_checklist_field_yields_no_subtasks() {
        let source = MockSource::sample();
        let subtasks = Extractor::new(&source)
            .subtasks_of(&card("c1", &[]))
            .await
            .unwrap();
        assert!(subtasks.is_empty());
    }

    #[tokio::test]
    async fn run_publishes_one_message_per_card() {
        let source = MockSource::sample();
        let publisher = MockPublisher::default();
        let published = publisher.published.clone();

        let count = run(&source, &publisher, None, &Scripted::new(&[true, false]))
            .await
            .unwrap();

        assert_eq!(count, 1);
        let bodies = published.lock().unwrap();
        let message = Message::from_bytes(&bodies[0]).unwrap();
        assert_eq!(message.id, "c1");
        assert_eq!(message.list_name, "Groceries");
        assert_eq!(message.list_id, "l1");
        assert_eq!(message.desc.as_deref(), Some(""));
        assert_eq!(message.origin, "*From [Trello](https://trello.com/c/c1)*");
        assert_eq!(message.comments.len(), 3);
        assert_eq!(message.subtasks.len(), 2);
    }

    #[tokio::test]
    async fn run_stops_when_publish_fails() {
        let source = MockSource::sample();
        let publisher = MockPublisher::default().with_failure();

        let result = run(&source, &publisher, Some("b1"), &AcceptAll).await;
        let err = format!("{:#}", result.unwrap_err());
        assert!(err.contains("Failed to publish card c1"));
    }
}
