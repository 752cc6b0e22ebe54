use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::destination::resolver::{ListMapping, ResolveError, Resolver};
use crate::destination::writer::Writer;
use crate::destination::{DestinationApi, NewComment, NewTask};
use crate::model::message::Message;
use crate::queue::DeliverySource;

/// What was being written when a message failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    Task,
    Comment(usize),
    Subtask(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("could not resolve destination for list {list:?}: {source}")]
    Resolution {
        list: String,
        #[source]
        source: ResolveError,
    },
    /// `task_id` is set when the parent task was already created.
    #[error("failed to write {step:?} of card {card}: {source:#}")]
    Write {
        card: String,
        step: WriteStep,
        task_id: Option<String>,
        #[source]
        source: anyhow::Error,
    },
}

/// Where a message's task goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub project_id: String,
    pub section_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub task_id: String,
    pub comments: usize,
    pub subtasks: usize,
}

#[derive(Debug)]
pub enum Outcome {
    Written(Written),
    Failed(Failure),
}

/// What to tell the broker about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Leave unacknowledged; the broker redelivers once the channel closes.
    Leave,
    /// Refuse without requeue, so a dead-letter exchange can pick it up.
    Reject,
    /// Leave unacknowledged and end the loop. Closing the channel requeues
    /// the delivery for the next process.
    Stop,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Policy {
    pub dry_run: bool,
    pub reject_malformed: bool,
}

impl Policy {
    /// Unacknowledged deliveries the broker may hand out at once. A dry run
    /// acknowledges nothing, so it must not be limited.
    pub fn prefetch(&self) -> Option<u16> {
        if self.dry_run {
            None
        } else {
            Some(1)
        }
    }
}

pub struct Migrator {
    resolver: Resolver,
    writer: Writer,
    policy: Policy,
}

pub fn parse(body: &[u8]) -> Result<Message, Failure> {
    Ok(Message::from_bytes(body)?)
}

impl Migrator {
    pub fn new(resolver: Resolver, writer: Writer, policy: Policy) -> Self {
        Self {
            resolver,
            writer,
            policy,
        }
    }

    pub async fn connect(
        api: Arc<dyn DestinationApi>,
        mapping: &ListMapping,
        policy: Policy,
    ) -> Result<Self> {
        let resolver = Resolver::bootstrap(api.clone(), mapping, policy.dry_run).await?;
        let writer = Writer::new(api, policy.dry_run);
        Ok(Self::new(resolver, writer, policy))
    }

    pub async fn resolve(&mut self, message: &Message) -> Result<Target, Failure> {
        let list_id = Some(message.list_id.as_str());
        let resolved = match self.resolver.parent_project().map(String::from) {
            Some(project_id) => self
                .resolver
                .resolve_section(&message.list_name, list_id)
                .await
                .map(|section_id| Target {
                    project_id,
                    section_id: Some(section_id),
                }),
            None => self
                .resolver
                .resolve_project(&message.list_name, list_id)
                .await
                .map(|project_id| Target {
                    project_id,
                    section_id: None,
                }),
        };

        resolved.map_err(|source| Failure::Resolution {
            list: message.list_name.clone(),
            source,
        })
    }

    /// Creates the task, then its comments, then its subtasks, in message
    /// order. Stops at the first failure; what was created stays.
    pub async fn write(&self, message: &Message, target: &Target) -> Result<Written, Failure> {
        let task = NewTask {
            content: message.name.clone(),
            description: Some(message.task_description()),
            due_datetime: message.due,
            project_id: Some(target.project_id.clone()),
            section_id: target.section_id.clone(),
            parent_id: None,
        };
        let task_id = self
            .writer
            .create_task(&task)
            .await
            .map_err(|source| Failure::Write {
                card: message.id.clone(),
                step: WriteStep::Task,
                task_id: None,
                source,
            })?;

        let failed = |step: WriteStep, source: anyhow::Error| Failure::Write {
            card: message.id.clone(),
            step,
            task_id: Some(task_id.clone()),
            source,
        };

        for (i, comment) in message.comments.iter().enumerate() {
            let comment = NewComment {
                task_id: task_id.clone(),
                content: comment.content.clone(),
                posted_at: comment.posted_at,
            };
            self.writer
                .create_comment(&comment)
                .await
                .map_err(|e| failed(WriteStep::Comment(i), e))?;
        }

        for (i, subtask) in message.subtasks.iter().enumerate() {
            let new_subtask = NewTask {
                content: subtask.name.clone(),
                due_datetime: subtask.due,
                parent_id: Some(task_id.clone()),
                ..Default::default()
            };
            let subtask_id = self
                .writer
                .create_task(&new_subtask)
                .await
                .map_err(|e| failed(WriteStep::Subtask(i), e))?;
            if subtask.is_completed {
                self.writer
                    .complete_task(&subtask_id)
                    .await
                    .map_err(|e| failed(WriteStep::Subtask(i), e))?;
            }
        }

        Ok(Written {
            task_id,
            comments: message.comments.len(),
            subtasks: message.subtasks.len(),
        })
    }

    pub async fn process(&mut self, body: &[u8]) -> Outcome {
        match self.try_process(body).await {
            Ok(written) => Outcome::Written(written),
            Err(failure) => Outcome::Failed(failure),
        }
    }

    async fn try_process(&mut self, body: &[u8]) -> Result<Written, Failure> {
        let message = parse(body)?;
        info!(card = %message.id, name = %message.name, list = %message.list_name, "Received card");
        let target = self.resolve(&message).await?;
        self.write(&message, &target).await
    }

    pub fn disposition(&self, outcome: &Outcome) -> Disposition {
        match outcome {
            // A dry run leaves the queue intact for the real run.
            Outcome::Written(_) if self.policy.dry_run => Disposition::Leave,
            Outcome::Written(_) => Disposition::Ack,
            Outcome::Failed(_) if self.policy.dry_run => Disposition::Leave,
            Outcome::Failed(Failure::Malformed(_)) if self.policy.reject_malformed => {
                Disposition::Reject
            }
            // With one delivery in flight nothing else would arrive.
            Outcome::Failed(_) => Disposition::Stop,
        }
    }
}

/// Processes deliveries one at a time until the consumer is cancelled.
/// Broker errors end the loop, and so does a message that can neither be
/// acknowledged nor rejected; a supervisor restart picks it up again.
pub async fn run(queue: &mut dyn DeliverySource, migrator: &mut Migrator) -> Result<()> {
    info!("Waiting for messages");
    while let Some(delivery) = queue.next_delivery().await? {
        let outcome = migrator.process(&delivery.body).await;
        match &outcome {
            Outcome::Written(written) => info!(
                tag = delivery.tag,
                task_id = %written.task_id,
                comments = written.comments,
                subtasks = written.subtasks,
                "Card migrated"
            ),
            Outcome::Failed(failure) => error!(
                tag = delivery.tag,
                redelivered = delivery.redelivered,
                "Card not migrated: {failure}"
            ),
        }

        match (migrator.disposition(&outcome), outcome) {
            (Disposition::Ack, _) => queue.ack(delivery.tag).await?,
            (Disposition::Reject, _) => {
                warn!(tag = delivery.tag, "Rejecting malformed message");
                queue.reject(delivery.tag).await?;
            }
            (Disposition::Stop, Outcome::Failed(failure)) => {
                let context = format!("Stopped with delivery {} unacknowledged", delivery.tag);
                return Err(anyhow::Error::new(failure).context(context));
            }
            (Disposition::Stop | Disposition::Leave, _) => {}
        }
    }
    info!("Consumer cancelled");
    Ok(())
}
