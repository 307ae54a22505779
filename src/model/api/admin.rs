use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{election::ElectionSummary, id::ApiId},
    db::user::User,
};

/// A user, as shown to admins: no password material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: ApiId,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id.into(),
            username: user.user.username,
            email: user.user.email,
            is_admin: user.user.is_admin,
            is_verified: user.user.is_verified,
            created_at: user.user.created_at,
        }
    }
}

/// Everything on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminDashboard {
    pub elections: Vec<ElectionSummary>,
    pub users: Vec<UserSummary>,
    pub total_votes: u64,
}
