use axum::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, error, warn};

use crate::config::GoogleConfig;
use crate::error::{ApiError, ApiResult};

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const JWKS_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Issuer strings Google uses interchangeably in identity tokens.
const ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Claims carried by a Google identity token, after signature verification
/// but before claim-level checks.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleClaims {
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Exchanges an authorization code for verified identity-token claims.
/// Signature verification happens behind this seam; claim-level checks
/// (issuer, audience, expiry, email presence) stay in the service so they
/// can be tested without the network.
#[async_trait]
pub trait GoogleVerifier: Send + Sync {
    async fn exchange_code(&self, code: &str) -> ApiResult<GoogleClaims>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

pub struct GoogleOAuthClient {
    http: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn fetch_jwks(&self) -> ApiResult<Jwks> {
        let jwks = self
            .http
            .get(JWKS_ENDPOINT)
            .send()
            .await
            .map_err(|e| ApiError::Internal(e.into()))?
            .json::<Jwks>()
            .await
            .map_err(|e| ApiError::Internal(e.into()))?;
        Ok(jwks)
    }

    /// Decodes the identity token, verifying its RS256 signature against
    /// Google's published keys. Issuer/audience/expiry are checked later by
    /// the caller, so the built-in validation for those is switched off.
    async fn decode_id_token(&self, id_token: &str) -> ApiResult<GoogleClaims> {
        let header = decode_header(id_token)
            .map_err(|_| ApiError::bad_request("Invalid identity token"))?;
        let kid = header
            .kid
            .ok_or_else(|| ApiError::bad_request("Invalid identity token"))?;

        let jwks = self.fetch_jwks().await?;
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| ApiError::bad_request("Invalid identity token"))?;
        let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| ApiError::Internal(e.into()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = decode::<GoogleClaims>(id_token, &key, &validation).map_err(|e| {
            warn!(error = %e, "google id_token signature verification failed");
            ApiError::bad_request("Invalid identity token")
        })?;
        Ok(data.claims)
    }
}

#[async_trait]
impl GoogleVerifier for GoogleOAuthClient {
    async fn exchange_code(&self, code: &str) -> ApiResult<GoogleClaims> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!("exchanging authorization code for tokens");
        let response = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&params)
            .send()
            .await
            .map_err(|e| ApiError::Internal(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, error = %body, "google token exchange failed");
            return Err(ApiError::bad_request("Failed to exchange authorization code"));
        }

        let tokens = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ApiError::Internal(e.into()))?;
        let id_token = tokens
            .id_token
            .ok_or_else(|| ApiError::bad_request("No identity token returned"))?;

        self.decode_id_token(&id_token).await
    }
}

/// Claim-level checks on a signature-verified identity token. Each failure
/// is independently a BadRequest.
pub fn verify_claims(claims: &GoogleClaims, client_id: &str, now: OffsetDateTime) -> ApiResult<()> {
    if !ISSUERS.contains(&claims.iss.as_str()) {
        return Err(ApiError::bad_request("Invalid token issuer"));
    }
    if claims.aud != client_id {
        return Err(ApiError::bad_request("Token audience mismatch"));
    }
    if claims.exp <= now.unix_timestamp() {
        return Err(ApiError::bad_request("Identity token expired"));
    }
    if claims.email.is_none() {
        return Err(ApiError::bad_request("Identity token has no email"));
    }
    Ok(())
}

/// Splits a display name into first name and remainder.
pub fn split_name(name: &str) -> (Option<String>, Option<String>) {
    let mut parts = name.split_whitespace();
    let first = parts.next().map(str::to_string);
    let rest: Vec<&str> = parts.collect();
    let last = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> GoogleClaims {
        GoogleClaims {
            iss: "https://accounts.google.com".into(),
            aud: "client-123".into(),
            exp: OffsetDateTime::now_utc().unix_timestamp() + 3600,
            sub: "sub-1".into(),
            email: Some("a@x.com".into()),
            name: Some("Ada Lovelace".into()),
        }
    }

    #[test]
    fn valid_claims_pass() {
        assert!(verify_claims(&claims(), "client-123", OffsetDateTime::now_utc()).is_ok());
    }

    #[test]
    fn short_issuer_form_is_accepted() {
        let mut c = claims();
        c.iss = "accounts.google.com".into();
        assert!(verify_claims(&c, "client-123", OffsetDateTime::now_utc()).is_ok());
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let mut c = claims();
        c.iss = "https://evil.example.com".into();
        let err = verify_claims(&c, "client-123", OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn audience_mismatch_is_rejected() {
        let err = verify_claims(&claims(), "other-client", OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut c = claims();
        c.exp = OffsetDateTime::now_utc().unix_timestamp() - 1;
        let err = verify_claims(&c, "client-123", OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn missing_email_is_rejected() {
        let mut c = claims();
        c.email = None;
        let err = verify_claims(&c, "client-123", OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn split_name_first_token_and_remainder() {
        assert_eq!(
            split_name("Ada Lovelace"),
            (Some("Ada".into()), Some("Lovelace".into()))
        );
        assert_eq!(
            split_name("Ada King Lovelace"),
            (Some("Ada".into()), Some("King Lovelace".into()))
        );
        assert_eq!(split_name("Ada"), (Some("Ada".into()), None));
        assert_eq!(split_name(""), (None, None));
    }
}
