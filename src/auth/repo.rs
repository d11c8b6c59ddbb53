use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// User record in the database. Either `password` or `google_id` is set;
/// both after account linking.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub phone: Option<String>,
    pub has_verified_email: bool,
    pub created_at: OffsetDateTime,
    pub google_id: Option<String>,
}

/// Insert payload for a new user row.
#[derive(Debug, Default)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub firstname: Option<&'a str>,
    pub lastname: Option<&'a str>,
    pub password: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub google_id: Option<&'a str>,
    pub has_verified_email: bool,
}

const USER_COLUMNS: &str =
    "id, email, firstname, lastname, password, phone, has_verified_email, created_at, google_id";

impl User {
    /// Find a user by (already lowercased) email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Insert a new user row. Returns `None` if the insert produced no row,
    /// which callers treat as an internal failure.
    pub async fn create(db: &PgPool, new: NewUser<'_>) -> sqlx::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, firstname, lastname, password, phone, google_id, has_verified_email)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.email)
        .bind(new.firstname)
        .bind(new.lastname)
        .bind(new.password)
        .bind(new.phone)
        .bind(new.google_id)
        .bind(new.has_verified_email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Attach a Google identity to an existing account and mark the email
    /// verified. Idempotent: repeated calls converge to the same row state.
    pub async fn link_google(db: &PgPool, id: i64, google_id: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET google_id = $2, has_verified_email = TRUE
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(google_id)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}
