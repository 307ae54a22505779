use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime},
    options::FindOptions,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::auth::{hash_password, LoginCredentials, Registration},
    mongodb::{is_duplicate_key_error, Coll, Id},
};

/// Core user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_verified: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Check whether the given password is correct.
    ///
    /// The encoded-hash check compares in constant time. A malformed stored
    /// hash never matches.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Register a new voter.
///
/// Uniqueness of username and email is enforced by the database's unique
/// indexes, so two racing registrations cannot both succeed.
pub async fn register(
    new_users: &Coll<NewUser>,
    users: &Coll<User>,
    registration: Registration,
    now: DateTime<Utc>,
) -> Result<User> {
    let new_user = registration.into_user(now)?;
    match new_users.insert_one(&new_user, None).await {
        Ok(result) => {
            // Unwrap safe because `_id` is always generated as an ObjectId.
            let id = result.inserted_id.as_object_id().unwrap().into();
            Ok(User { id, user: new_user })
        }
        Err(err) if is_duplicate_key_error(&err) => {
            Err(clash(users, new_user.username, new_user.email).await?)
        }
        Err(err) => Err(err.into()),
    }
}

/// Work out which unique field a rejected insert clashed on.
async fn clash(users: &Coll<User>, username: String, email: String) -> Result<Error> {
    let taken = users.find_one(doc! { "username": &username }, None).await?;
    if taken.is_some() {
        Ok(Error::DuplicateUsername(username))
    } else {
        Ok(Error::DuplicateEmail(email))
    }
}

/// Find the user with the given credentials.
///
/// Unknown usernames and wrong passwords are indistinguishable to the caller.
pub async fn authenticate(users: &Coll<User>, credentials: &LoginCredentials) -> Result<User> {
    let user = users
        .find_one(doc! { "username": credentials.username.trim() }, None)
        .await?
        .ok_or(Error::InvalidCredentials)?;
    if user.verify_password(&credentials.password) {
        Ok(user)
    } else {
        Err(Error::InvalidCredentials)
    }
}

/// Every user, oldest first.
pub async fn list_users(users: &Coll<User>) -> Result<Vec<User>> {
    let options = FindOptions::builder().sort(doc! { "created_at": 1, "_id": 1 }).build();
    Ok(users.find(None, options).await?.try_collect().await?)
}

/// The admin account created on a fresh deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    pub admin_username: String,
    pub admin_email: String,
    pub admin_password: String,
}

/// Create the seed admin unless some admin already exists.
///
/// This operation is idempotent. Returns whether an admin was created.
pub async fn ensure_admin_exists(
    users: &Coll<User>,
    new_users: &Coll<NewUser>,
    seed: &AdminSeed,
    now: DateTime<Utc>,
) -> Result<bool> {
    if users.find_one(doc! { "is_admin": true }, None).await?.is_some() {
        return Ok(false);
    }

    let admin = NewUser {
        username: seed.admin_username.clone(),
        email: seed.admin_email.to_lowercase(),
        password_hash: hash_password(&seed.admin_password)?,
        is_admin: true,
        is_verified: true,
        created_at: now,
    };
    match new_users.insert_one(&admin, None).await {
        Ok(_) => Ok(true),
        Err(err) if is_duplicate_key_error(&err) => {
            // Either another instance seeded concurrently, or an ordinary user
            // already holds the seed's username or email.
            if users.find_one(doc! { "is_admin": true }, None).await?.is_some() {
                Ok(false)
            } else {
                Err(clash(users, admin.username, admin.email).await?)
            }
        }
        Err(err) => Err(err.into()),
    }
}
