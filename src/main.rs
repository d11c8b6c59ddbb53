use std::sync::Arc;

use anyhow::Context;
use redis::aio::ConnectionManager;

mod app;
mod auth;
mod broker;
mod config;
mod error;
mod mailer;
mod response;
mod session;
mod state;

use crate::auth::google::GoogleOAuthClient;
use crate::config::AppConfig;
use crate::mailer::queue::AmqpMailQueue;
use crate::mailer::resend::{EmailSender, ResendClient};
use crate::mailer::MailerService;
use crate::session::RedisSessionStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "luxestay=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    error::set_production(config.production);

    let db = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
        tracing::warn!(error = %e, "migrations folder not found or migration failed; continuing");
    }

    let redis_client =
        redis::Client::open(config.redis_url.as_str()).context("parse redis url")?;
    let redis_conn = ConnectionManager::new(redis_client)
        .await
        .context("connect to redis")?;
    let sessions = Arc::new(RedisSessionStore::new(
        redis_conn,
        config.session.ttl_seconds,
    ));

    // Startup fails if the broker stays unreachable through the retry budget.
    let broker_conn = broker::connect(&config.amqp).await?;
    let publish_channel = broker_conn.create_channel().await?;
    let consume_channel = broker_conn.create_channel().await?;

    let mailer = Arc::new(MailerService::new(
        Arc::new(AmqpMailQueue::new(
            publish_channel,
            config.mail.queue.clone(),
        )),
        config.mail.templates_dir.clone(),
        config.app_name.clone(),
    ));

    let sender: Option<Arc<dyn EmailSender>> = match &config.mail.resend_api_key {
        Some(key) => Some(Arc::new(ResendClient::new(key.clone()))),
        None => {
            tracing::warn!("RESEND_API_KEY not set, mailer worker will log jobs instead of sending");
            None
        }
    };

    let worker_config = config.mail.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer::worker::run(consume_channel, worker_config, sender).await {
            tracing::error!(error = %e, "mailer worker stopped");
        }
    });

    let google = Arc::new(GoogleOAuthClient::new(config.google.clone()));

    let state = AppState::from_parts(db, config, sessions, mailer, google);
    app::serve(app::build_app(state)).await
}
