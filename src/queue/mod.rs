pub mod amqp;

use anyhow::Result;
use async_trait::async_trait;

/// The single hand-off queue between extraction and creation.
pub const QUEUE: &str = "trello-cards";

#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: u64,
    pub body: Vec<u8>,
    pub redelivered: bool,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Returns only once the broker has taken the message for durable storage.
    async fn publish(&self, body: &[u8]) -> Result<()>;
}

#[async_trait]
pub trait DeliverySource: Send {
    /// Waits for the next delivery. `None` means the consumer was cancelled.
    async fn next_delivery(&mut self) -> Result<Option<Delivery>>;
    async fn ack(&self, tag: u64) -> Result<()>;
    /// Refuses the delivery without requeueing it.
    async fn reject(&self, tag: u64) -> Result<()>;
}
