use std::time::Duration;

use anyhow::Context;
use lapin::{Connection, ConnectionProperties};
use tracing::{info, warn};

use crate::config::AmqpConfig;

const MAX_DELAY_MS: u64 = 10_000;

/// Connects to the message broker, retrying with exponential backoff.
/// Exhausting the attempts is a fatal startup error, not a background retry.
pub async fn connect(config: &AmqpConfig) -> anyhow::Result<Connection> {
    let mut last_err = None;

    for attempt in 1..=config.retry_attempts {
        info!(attempt, "connecting to message broker");
        match Connection::connect(&config.url, ConnectionProperties::default()).await {
            Ok(conn) => {
                info!("message broker connected");
                return Ok(conn);
            }
            Err(e) => {
                warn!(attempt, error = %e, "broker connection attempt failed");
                last_err = Some(e);
                if attempt < config.retry_attempts {
                    let delay = config
                        .retry_base_delay_ms
                        .saturating_mul(2u64.saturating_pow(attempt - 1))
                        .min(MAX_DELAY_MS);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    Err(last_err
        .map(anyhow::Error::from)
        .unwrap_or_else(|| anyhow::anyhow!("no connection attempts were made")))
    .context("broker connection failed after retries")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base: u64 = 1000;
        let delays: Vec<u64> = (1u32..=6)
            .map(|attempt| {
                base.saturating_mul(2u64.saturating_pow(attempt - 1))
                    .min(MAX_DELAY_MS)
            })
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10_000, 10_000]);
    }
}
