use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions, ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tracing::{debug, info};

use super::{Delivery, DeliverySource, Publisher};

const PERSISTENT: u8 = 2;
const CONSUMER_TAG: &str = "cardshift";

/// A channel on a durable queue with publisher confirms enabled.
pub struct AmqpQueue {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl AmqpQueue {
    pub async fn connect(url: &str, queue: &str) -> Result<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .context("Failed to connect to AMQP broker")?;
        let channel = connection
            .create_channel()
            .await
            .context("Failed to open AMQP channel")?;

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("Failed to declare queue {queue}"))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;

        info!(queue, "Connected to broker");
        Ok(Self {
            connection,
            channel,
            queue: queue.to_string(),
        })
    }

    /// Starts consuming. With a prefetch limit the broker holds back further
    /// deliveries while that many are unacknowledged.
    pub async fn into_deliveries(self, prefetch: Option<u16>) -> Result<AmqpDeliveries> {
        if let Some(count) = prefetch {
            self.channel
                .basic_qos(count, BasicQosOptions::default())
                .await
                .context("Failed to set prefetch")?;
        }
        let consumer = self
            .channel
            .basic_consume(
                &self.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("Failed to consume from {}", self.queue))?;

        Ok(AmqpDeliveries {
            _connection: self.connection,
            channel: self.channel,
            consumer,
        })
    }

    pub async fn close(self) -> Result<()> {
        self.connection
            .close(200, "OK")
            .await
            .context("Failed to close AMQP connection")
    }
}

#[async_trait]
impl Publisher for AmqpQueue {
    async fn publish(&self, body: &[u8]) -> Result<()> {
        let confirmation = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                body,
                persistent_properties(),
            )
            .await
            .context("Failed to publish message")?
            .await
            .context("Broker did not confirm message")?;

        check_confirmation(&confirmation, &self.queue)?;
        debug!(bytes = body.len(), "Message confirmed");
        Ok(())
    }
}

/// Properties for a message that survives a broker restart.
pub(crate) fn persistent_properties() -> BasicProperties {
    BasicProperties::default()
        .with_delivery_mode(PERSISTENT)
        .with_content_type(ShortString::from("application/json"))
}

/// Only a positive confirm means the broker took responsibility for the message.
pub(crate) fn check_confirmation(confirmation: &Confirmation, queue: &str) -> Result<()> {
    match confirmation {
        Confirmation::Ack(_) => Ok(()),
        Confirmation::Nack(_) => bail!("Broker refused message for queue {queue}"),
        Confirmation::NotRequested => bail!("Publisher confirms are off for queue {queue}"),
    }
}

pub struct AmqpDeliveries {
    _connection: Connection,
    channel: Channel,
    consumer: Consumer,
}

#[async_trait]
impl DeliverySource for AmqpDeliveries {
    async fn next_delivery(&mut self) -> Result<Option<Delivery>> {
        let Some(delivery) = self.consumer.next().await else {
            return Ok(None);
        };
        let delivery = delivery.context("AMQP consumer failed")?;
        Ok(Some(Delivery {
            tag: delivery.delivery_tag,
            body: delivery.data,
            redelivered: delivery.redelivered,
        }))
    }

    async fn ack(&self, tag: u64) -> Result<()> {
        self.channel
            .basic_ack(tag, BasicAckOptions::default())
            .await
            .with_context(|| format!("Failed to ack delivery {tag}"))
    }

    async fn reject(&self, tag: u64) -> Result<()> {
        self.channel
            .basic_reject(tag, BasicRejectOptions { requeue: false })
            .await
            .with_context(|| format!("Failed to reject delivery {tag}"))
    }
}
