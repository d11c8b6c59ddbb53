use std::sync::Arc;

use futures_util::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel,
};
use tracing::{error, info, warn};

use crate::config::MailConfig;
use crate::mailer::dto::MailJob;
use crate::mailer::render::{compile_mjml, ValidationLevel};
use crate::mailer::resend::{EmailSender, OutgoingEmail};

/// Terminal state for one queued message.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Remove the message from the queue permanently.
    Ack,
    /// Negative-acknowledge without requeue. A malformed or unsendable job
    /// is dropped rather than retried, so it cannot storm the queue.
    Drop,
}

fn resolve_html(job: &MailJob) -> anyhow::Result<String> {
    // Raw markup from the queue is compiled strictly: a malformed message
    // must fail loudly here rather than degrade silently.
    if let Some(mjml) = &job.mjml {
        return compile_mjml(mjml, ValidationLevel::Strict);
    }
    match &job.html {
        Some(html) => Ok(html.clone()),
        None => anyhow::bail!("mail job carries neither mjml nor html"),
    }
}

fn resolve_from(job: &MailJob, config: &MailConfig) -> String {
    job.from
        .clone()
        .unwrap_or_else(|| format!("{} <{}>", config.from_name, config.from_address))
}

/// Processes one delivery payload through the per-message state machine:
/// received -> rendering -> sending -> acked | dropped.
pub async fn handle_delivery(
    payload: &[u8],
    sender: Option<&dyn EmailSender>,
    config: &MailConfig,
) -> Outcome {
    let job: MailJob = match serde_json::from_slice(payload) {
        Ok(job) => job,
        Err(e) => {
            error!(error = %e, "failed to deserialize mail job");
            return Outcome::Drop;
        }
    };

    if job.to.is_empty() {
        error!("mail job has no recipients");
        return Outcome::Drop;
    }

    let html = match resolve_html(&job) {
        Ok(html) => html,
        Err(e) => {
            error!(error = %e, subject = %job.subject, "failed to render mail job");
            return Outcome::Drop;
        }
    };

    let Some(sender) = sender else {
        // Non-configured environments log and acknowledge; redelivering
        // would never succeed either.
        warn!(subject = %job.subject, to = ?job.to.as_vec(), "no send credential configured, logging job instead");
        return Outcome::Ack;
    };

    let email = OutgoingEmail {
        from: resolve_from(&job, config),
        to: job.to.as_vec(),
        subject: job.subject.clone(),
        html,
    };

    match sender.send(&email).await {
        Ok(()) => {
            info!(subject = %email.subject, "email sent successfully");
            Outcome::Ack
        }
        Err(e) => {
            error!(error = %e, subject = %email.subject, "failed to send email, dropping job");
            Outcome::Drop
        }
    }
}

/// Consumes the mail queue one message at a time until the channel closes.
pub async fn run(
    channel: Channel,
    config: MailConfig,
    sender: Option<Arc<dyn EmailSender>>,
) -> anyhow::Result<()> {
    channel
        .queue_declare(
            &config.queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    // One unacknowledged message in flight per worker.
    channel.basic_qos(1, BasicQosOptions::default()).await?;

    let mut consumer = channel
        .basic_consume(
            &config.queue,
            "mailer-worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(queue = %config.queue, "mailer worker listening");

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;
        match handle_delivery(&delivery.data, sender.as_deref(), &config).await {
            Outcome::Ack => delivery.ack(BasicAckOptions::default()).await?,
            Outcome::Drop => {
                delivery
                    .nack(BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    })
                    .await?
            }
        }
    }

    Ok(())
}
