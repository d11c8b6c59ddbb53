use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::repo::User;
use crate::error::FieldError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Request body for `POST /auth/signup`.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.firstname.trim().len() < 2 {
            errors.push(FieldError::new(
                "firstname",
                "First name must be at least 2 characters long",
            ));
        }
        if self.lastname.trim().len() < 2 {
            errors.push(FieldError::new(
                "lastname",
                "Last name must be at least 2 characters long",
            ));
        }
        if !is_valid_email(self.email.trim()) {
            errors.push(FieldError::new("email", "Invalid email address"));
        }
        if self.phone.trim().len() < 10 {
            errors.push(FieldError::new(
                "phone",
                "Phone number must be at least 10 characters long",
            ));
        }
        if self.password.len() < 6 {
            errors.push(FieldError::new(
                "password",
                "Password must be at least 6 characters long",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Request body for `POST /auth/signin`.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

impl SigninRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if !is_valid_email(self.email.trim()) {
            errors.push(FieldError::new("email", "Invalid email address"));
        }
        if self.password.len() < 6 {
            errors.push(FieldError::new(
                "password",
                "Password must be at least 6 characters long",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Request body for `POST /auth/google-signin`: the authorization code from
/// the client-side OAuth flow.
#[derive(Debug, Deserialize)]
pub struct GoogleSigninRequest {
    pub code: String,
}

/// Profile shape returned by `GET /user`.
#[derive(Debug, Serialize)]
pub struct UserDetails {
    pub id: i64,
    pub email: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserDetails {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            firstname: user.firstname,
            lastname: user.lastname,
            phone: user.phone,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_signup() -> SignupRequest {
        SignupRequest {
            firstname: "Ada".into(),
            lastname: "Lovelace".into(),
            email: "a@x.com".into(),
            phone: "0123456789".into(),
            password: "pw123456".into(),
        }
    }

    #[test]
    fn valid_signup_passes() {
        assert!(valid_signup().validate().is_ok());
    }

    #[test]
    fn signup_rejects_short_fields() {
        let mut req = valid_signup();
        req.firstname = "A".into();
        req.phone = "12345".into();
        req.password = "pw".into();
        let errors = req.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["firstname", "phone", "password"]);
    }

    #[test]
    fn signup_rejects_bad_email() {
        let mut req = valid_signup();
        req.email = "not-an-email".into();
        let errors = req.validate().unwrap_err();
        assert_eq!(errors[0].field, "email");
    }

    #[test]
    fn signin_rejects_bad_email_and_short_password() {
        let req = SigninRequest {
            email: "nope".into(),
            password: "123".into(),
        };
        let errors = req.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn email_regex_accepts_common_shapes() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@sub.domain.org"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a b@x.com"));
    }
}
