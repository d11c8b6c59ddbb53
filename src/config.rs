use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AmqpConfig {
    pub url: String,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub queue: String,
    pub resend_api_key: Option<String>,
    pub from_name: String,
    pub from_address: String,
    pub templates_dir: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub amqp: AmqpConfig,
    pub session: SessionConfig,
    pub google: GoogleConfig,
    pub mail: MailConfig,
    pub app_name: String,
    pub production: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());

        let amqp = AmqpConfig {
            url: amqp_url_from_env()?,
            retry_attempts: std::env::var("RABBITMQ_RETRY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            retry_base_delay_ms: std::env::var("RABBITMQ_RETRY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1000),
        };

        let session = SessionConfig {
            cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "luxestay.sid".into()),
            // 1 week, matches the cookie max-age
            ttl_seconds: 60 * 60 * 24 * 7,
        };

        let google = GoogleConfig {
            client_id: std::env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            redirect_uri: std::env::var("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|_| "postmessage".into()),
        };

        let mail = MailConfig {
            queue: std::env::var("MAIL_QUEUE").unwrap_or_else(|_| "mail:send".into()),
            resend_api_key: std::env::var("RESEND_API_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            from_name: std::env::var("FROM_NAME").unwrap_or_else(|_| "Luxestay".into()),
            from_address: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@example.com".into()),
            templates_dir: std::env::var("MAIL_TEMPLATES_DIR")
                .unwrap_or_else(|_| "templates/mail".into()),
        };

        Ok(Self {
            database_url,
            redis_url,
            amqp,
            session,
            google,
            mail,
            app_name: std::env::var("APP_NAME").unwrap_or_else(|_| "Luxestay".into()),
            production: std::env::var("APP_ENV")
                .map(|v| v == "production")
                .unwrap_or(false),
        })
    }
}

/// Resolves the broker URL from RABBITMQ_URL, or builds one from the
/// discrete host/port/user/password variables.
fn amqp_url_from_env() -> anyhow::Result<String> {
    if let Ok(url) = std::env::var("RABBITMQ_URL") {
        return Ok(url);
    }

    let host = std::env::var("RABBITMQ_HOST")
        .context("RABBITMQ_URL or RABBITMQ_HOST and RABBITMQ_PORT must be set")?;
    let port = std::env::var("RABBITMQ_PORT")
        .context("RABBITMQ_URL or RABBITMQ_HOST and RABBITMQ_PORT must be set")?;

    let auth = match std::env::var("RABBITMQ_USER") {
        Ok(user) => match std::env::var("RABBITMQ_PASSWORD") {
            Ok(pass) => format!("{}:{}@", user, pass),
            Err(_) => format!("{}@", user),
        },
        Err(_) => String::new(),
    };

    Ok(format!("amqp://{}{}:{}", auth, host, port))
}
