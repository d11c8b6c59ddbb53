use axum::async_trait;
use lapin::{
    options::{BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel,
};
use tracing::debug;

use crate::mailer::dto::MailJob;

/// Publish seam for mail jobs. The AMQP implementation is the only one used
/// at runtime; tests substitute a recording fake.
#[async_trait]
pub trait MailQueue: Send + Sync {
    async fn publish(&self, job: &MailJob) -> anyhow::Result<()>;
}

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

pub struct AmqpMailQueue {
    channel: Channel,
    queue: String,
}

impl AmqpMailQueue {
    pub fn new(channel: Channel, queue: String) -> Self {
        Self { channel, queue }
    }
}

#[async_trait]
impl MailQueue for AmqpMailQueue {
    async fn publish(&self, job: &MailJob) -> anyhow::Result<()> {
        // Idempotent declare so enqueue never races worker startup.
        self.channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let payload = serde_json::to_vec(job)?;
        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(PERSISTENT),
            )
            .await?
            .await?;

        debug!(queue = %self.queue, subject = %job.subject, "mail job published");
        Ok(())
    }
}
