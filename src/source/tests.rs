use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use super::confirm::Confirm;
use super::{
    Action, ActionData, Attachment, Board, Card, CheckItem, Checklist, SourceApi, SourceList,
};

/// In-memory board service with two boards, three lists, and two checklists.
pub struct MockSource {
    boards: Vec<Board>,
    lists: HashMap<String, Vec<SourceList>>,
    cards: HashMap<String, Vec<Card>>,
    actions: HashMap<String, Vec<Action>>,
    checklists: HashMap<String, Checklist>,
    board_listings: AtomicUsize,
}

pub fn card(id: &str, checklists: &[&str]) -> Card {
    Card {
        id: id.to_string(),
        name: format!("Card {id}"),
        due: None,
        desc: Some(String::new()),
        id_checklists: Some(checklists.iter().map(|c| c.to_string()).collect()),
        attachments: Some(vec![
            Attachment {
                url: "http://x".into(),
                is_upload: false,
                date: Utc.with_ymd_and_hms(2023, 4, 1, 9, 0, 0).unwrap(),
            },
            Attachment {
                url: "https://trello.com/uploads/photo.png".into(),
                is_upload: true,
                date: Utc.with_ymd_and_hms(2023, 4, 1, 9, 5, 0).unwrap(),
            },
        ]),
        short_url: format!("https://trello.com/c/{id}"),
    }
}

fn list(id: &str, name: &str, closed: bool) -> SourceList {
    SourceList {
        id: id.to_string(),
        name: name.to_string(),
        closed,
    }
}

fn action(kind: &str, text: Option<&str>, minute: u32) -> Action {
    Action {
        kind: kind.to_string(),
        date: Utc.with_ymd_and_hms(2023, 4, 2, 10, minute, 0).unwrap(),
        data: ActionData {
            text: text.map(String::from),
        },
    }
}

fn item(name: &str, state: &str) -> CheckItem {
    CheckItem {
        name: name.to_string(),
        state: state.to_string(),
        due: None,
    }
}

impl MockSource {
    pub fn sample() -> Self {
        let boards = vec![
            Board {
                id: "b1".into(),
                name: "Home".into(),
                closed: false,
            },
            Board {
                id: "b2".into(),
                name: "Old".into(),
                closed: true,
            },
        ];

        let lists = HashMap::from([
            (
                "b1".to_string(),
                vec![
                    list("l1", "Groceries", false),
                    list("l2", "Chores", false),
                    list("l3", "Archive", true),
                ],
            ),
            ("b2".to_string(), vec![list("l9", "Someday", false)]),
        ]);

        let cards = HashMap::from([
            ("l1".to_string(), vec![card("c1", &["cl1"])]),
            ("l2".to_string(), vec![card("c2", &[])]),
        ]);

        // Newest first, as the activity endpoint returns them.
        let actions = HashMap::from([(
            "c1".to_string(),
            vec![
                action("commentCard", Some("second thought"), 30),
                action("updateCard", None, 20),
                action("commentCard", Some("first thought"), 10),
            ],
        )]);

        let checklists = HashMap::from([
            (
                "cl1".to_string(),
                Checklist {
                    name: "Dairy".into(),
                    check_items: vec![item("2%", "incomplete"), item("Butter", "complete")],
                },
            ),
            (
                "cl2".to_string(),
                Checklist {
                    name: "Bakery".into(),
                    check_items: vec![item("Bread", "incomplete")],
                },
            ),
        ]);

        Self {
            boards,
            lists,
            cards,
            actions,
            checklists,
            board_listings: AtomicUsize::new(0),
        }
    }

    pub fn board_listing_calls(&self) -> usize {
        self.board_listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceApi for MockSource {
    async fn open_boards(&self) -> Result<Vec<Board>> {
        self.board_listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.boards.iter().filter(|b| !b.closed).cloned().collect())
    }

    async fn lists(&self, board_id: &str) -> Result<Vec<SourceList>> {
        Ok(self.lists.get(board_id).cloned().unwrap_or_default())
    }

    async fn cards(&self, list_id: &str) -> Result<Vec<Card>> {
        Ok(self.cards.get(list_id).cloned().unwrap_or_default())
    }

    async fn actions(&self, card_id: &str) -> Result<Vec<Action>> {
        Ok(self.actions.get(card_id).cloned().unwrap_or_default())
    }

    async fn checklist(&self, checklist_id: &str) -> Result<Checklist> {
        self.checklists
            .get(checklist_id)
            .cloned()
            .with_context(|| format!("No checklist {checklist_id}"))
    }
}

/// Answers prompts from a fixed script and remembers what was asked.
pub struct Scripted {
    answers: Mutex<VecDeque<bool>>,
    prompts: Mutex<Vec<String>>,
}

impl Scripted {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Confirm for Scripted {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .context("Ran out of scripted answers")
    }
}

#[tokio::test]
async fn mock_source_hides_closed_boards() {
    let source = MockSource::sample();
    let boards = source.open_boards().await.unwrap();
    assert_eq!(boards.len(), 1);
    assert_eq!(source.board_listing_calls(), 1);
}
