use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use super::{DestinationApi, NewComment, NewTask};

/// Creates tasks and comments, one destination call each. Nothing is retried.
pub struct Writer {
    api: Arc<dyn DestinationApi>,
    dry_run: bool,
    placeholders: AtomicU64,
}

impl Writer {
    pub fn new(api: Arc<dyn DestinationApi>, dry_run: bool) -> Self {
        Self {
            api,
            dry_run,
            placeholders: AtomicU64::new(0),
        }
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<String> {
        if self.dry_run {
            let n = self.placeholders.fetch_add(1, Ordering::Relaxed) + 1;
            info!(?task, "Dry run: add_task");
            return Ok(format!("T{n}"));
        }
        self.api.create_task(task).await
    }

    pub async fn complete_task(&self, task_id: &str) -> Result<()> {
        if self.dry_run {
            info!(task_id, "Dry run: close_task");
            return Ok(());
        }
        self.api.close_task(task_id).await
    }

    pub async fn create_comment(&self, comment: &NewComment) -> Result<()> {
        if self.dry_run {
            info!(?comment, "Dry run: add_comment");
            return Ok(());
        }
        self.api.create_comment(comment).await
    }
}
