use anyhow::anyhow;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::auth::dto::SignupRequest;
use crate::auth::google::{split_name, verify_claims, GoogleVerifier};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::{NewUser, User};
use crate::config::GoogleConfig;
use crate::error::{ApiError, ApiResult};

/// Canonical form for stored and looked-up emails. Signin, signup and the
/// OAuth flow all normalize through here, so an address registered in one
/// casing resolves in any other.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Verifies local credentials and returns the user. The caller is
/// responsible for establishing a session.
pub async fn signin(db: &PgPool, email: &str, password: &str) -> ApiResult<User> {
    let email = normalize_email(email);

    let user = User::find_by_email(db, &email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let hash = match (&user.password, &user.google_id) {
        (Some(hash), _) => hash.clone(),
        (None, Some(_)) => {
            warn!(user_id = user.id, "signin attempt on provider-only account");
            return Err(ApiError::unauthorized("Please sign in with Google"));
        }
        (None, None) => return Err(ApiError::unauthorized("Invalid credentials")),
    };

    if !verify_password(password, &hash)? {
        warn!(user_id = user.id, "signin invalid password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    info!(user_id = user.id, "user signed in");
    Ok(user)
}

/// Creates a local account. The existence check is a fast path only; the
/// unique email constraint catches concurrent signups with the same email.
pub async fn signup(db: &PgPool, req: &SignupRequest) -> ApiResult<User> {
    let email = normalize_email(&req.email);

    if User::find_by_email(db, &email).await?.is_some() {
        return Err(ApiError::bad_request("Email already in use"));
    }

    let hash = hash_password(&req.password)?;
    let user = User::create(
        db,
        NewUser {
            email: &email,
            firstname: Some(req.firstname.trim()),
            lastname: Some(req.lastname.trim()),
            password: Some(&hash),
            phone: Some(req.phone.trim()),
            ..Default::default()
        },
    )
    .await?
    .ok_or_else(|| ApiError::Internal(anyhow!("user insert returned no row")))?;

    info!(user_id = user.id, "user created");
    Ok(user)
}

/// Exchanges a Google authorization code for a verified identity, then
/// links it to an existing account with the same email or creates a new one.
pub async fn google_signin(
    db: &PgPool,
    verifier: &dyn GoogleVerifier,
    google: &GoogleConfig,
    code: &str,
) -> ApiResult<User> {
    let claims = verifier.exchange_code(code).await?;
    verify_claims(&claims, &google.client_id, OffsetDateTime::now_utc())?;

    // verify_claims guarantees the email claim is present
    let email = normalize_email(claims.email.as_deref().unwrap_or_default());

    if let Some(existing) = User::find_by_email(db, &email).await? {
        let user = User::link_google(db, existing.id, &claims.sub).await?;
        info!(user_id = user.id, "google identity linked to existing account");
        return Ok(user);
    }

    let (firstname, lastname) = claims
        .name
        .as_deref()
        .map(split_name)
        .unwrap_or((None, None));

    let user = User::create(
        db,
        NewUser {
            email: &email,
            firstname: firstname.as_deref(),
            lastname: lastname.as_deref(),
            google_id: Some(&claims.sub),
            has_verified_email: true,
            ..Default::default()
        },
    )
    .await?
    .ok_or_else(|| ApiError::Internal(anyhow!("user insert returned no row")))?;

    info!(user_id = user.id, "user created from google identity");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_converge_to_trimmed_lowercase() {
        assert_eq!(normalize_email("A@X.com"), "a@x.com");
        assert_eq!(normalize_email("  a@x.com \n"), "a@x.com");
        assert_eq!(normalize_email(" First.Last@Sub.Domain.ORG"), "first.last@sub.domain.org");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_email("Ada@Example.COM");
        assert_eq!(normalize_email(&once), once);
    }
}
