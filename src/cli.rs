use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::{TodoistConfig, TrelloConfig, DEFAULT_AMQP_URL};
use crate::consumer::{self, Migrator, Policy};
use crate::destination::resolver::ListMapping;
use crate::destination::todoist::TodoistClient;
use crate::destination::DestinationApi;
use crate::queue::amqp::AmqpQueue;
use crate::queue::QUEUE;
use crate::source::confirm::{AcceptAll, Confirm, StdinConfirm};
use crate::source::extract;
use crate::source::trello::TrelloClient;

#[derive(Debug, Parser)]
#[command(
    name = "cardshift",
    version,
    about = "Move Trello cards into Todoist through a durable queue"
)]
pub struct Cli {
    /// AMQP broker address
    #[arg(
        long,
        env = "AMQP_URL",
        default_value = DEFAULT_AMQP_URL,
        global = true,
        hide_env_values = true
    )]
    pub amqp_url: String,

    /// Queue that carries cards between the two commands
    #[arg(long, default_value = QUEUE, global = true)]
    pub queue: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Publish cards of Trello lists to the queue
    Extract(ExtractArgs),
    /// Create Todoist tasks from queued cards
    Consume(ConsumeArgs),
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Board ID; all open boards when omitted
    #[arg(long)]
    pub board: Option<String>,

    /// Migrate every open list without asking
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct ConsumeArgs {
    /// Log what would be created without calling Todoist
    #[arg(long)]
    pub dry_run: bool,

    /// Map lists to sections instead of projects
    #[arg(long)]
    pub lists_as_sections: bool,

    /// Project name (if mapping lists to sections)
    #[arg(long, default_value = "Inbox")]
    pub project: String,

    /// Leave malformed messages unacknowledged instead of rejecting them
    #[arg(long)]
    pub keep_malformed: bool,
}

impl ConsumeArgs {
    pub fn mapping(&self) -> ListMapping {
        if self.lists_as_sections {
            ListMapping::Sections {
                project: self.project.clone(),
            }
        } else {
            ListMapping::Projects
        }
    }

    pub fn policy(&self) -> Policy {
        Policy {
            dry_run: self.dry_run,
            reject_malformed: !self.keep_malformed,
        }
    }
}

pub async fn handle_extract(cli: &Cli, args: &ExtractArgs) -> Result<()> {
    let config = TrelloConfig::from_env()?;
    let trello = TrelloClient::new(config.api_key, config.token);
    let queue = AmqpQueue::connect(&cli.amqp_url, &cli.queue).await?;

    let confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AcceptAll)
    } else {
        Box::new(StdinConfirm)
    };
    let published = extract::run(
        &trello,
        &queue,
        args.board.as_deref(),
        confirm.as_ref(),
    )
    .await?;
    println!("Published {published} cards to {}", cli.queue);

    queue.close().await
}

pub async fn handle_consume(cli: &Cli, args: &ConsumeArgs) -> Result<()> {
    let config = TodoistConfig::from_env()?;
    let todoist: Arc<dyn DestinationApi> = Arc::new(TodoistClient::new(config.api_token));
    let mut migrator = Migrator::connect(todoist, &args.mapping(), args.policy()).await?;

    let mut deliveries = AmqpQueue::connect(&cli.amqp_url, &cli.queue)
        .await?
        .into_deliveries(args.policy().prefetch())
        .await?;

    println!("[*] Waiting for messages. To exit press CTRL+C");
    tokio::select! {
        result = consumer::run(&mut deliveries, &mut migrator) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted; unacknowledged messages stay queued");
            Ok(())
        }
    }
}
