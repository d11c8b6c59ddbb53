use anyhow::bail;
use axum::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const API_ENDPOINT: &str = "https://api.resend.com/emails";

/// Fully resolved message, ready to hand to the email API.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Transactional email API seam.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()>;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

pub struct ResendClient {
    http: reqwest::Client,
    api_key: String,
}

impl ResendClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl EmailSender for ResendClient {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        let response = self
            .http
            .post(API_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("resend error: HTTP {status}: {body}");
        }

        let parsed = response.json::<SendResponse>().await?;
        if let Some(err) = parsed.error {
            bail!("resend error: {}", err.message);
        }

        debug!(id = ?parsed.id, "email sent");
        Ok(())
    }
}
