use argon2::Config;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::db::user::NewUser;

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 20;

/// Raw registration details, received from a user. These are never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    /// Check the registration is acceptable, then hash the password into a new
    /// non-admin, unverified user.
    pub fn into_user(self, now: DateTime<Utc>) -> Result<NewUser> {
        let username = self.username.trim();
        let email = self.email.trim();
        let username_length = username.chars().count();
        if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&username_length) {
            return Err(Error::BadRequest(format!(
                "Username must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters"
            )));
        }
        if !is_plausible_email(email) {
            return Err(Error::BadRequest(format!("Invalid email address: {email}")));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::BadRequest(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        Ok(NewUser {
            username: username.to_string(),
            email: email.to_lowercase(),
            password_hash: hash_password(&self.password)?,
            is_admin: false,
            is_verified: false,
            created_at: now,
        })
    }
}

/// Salt and hash a password. The result encodes the salt and parameters.
pub fn hash_password(password: &str) -> Result<String> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    Ok(argon2::hash_encoded(
        password.as_bytes(),
        &salt,
        &Config::default(),
    )?)
}

/// A single `@`, a non-empty local part, and a dotted domain without blank labels.
fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// Login credentials.
#[derive(Clone, Deserialize, Serialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}
