use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::User;

/// User fields safe to show to anyone.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub about_me: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            about_me: u.about_me,
            last_seen: u.last_seen,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: PublicUser,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditProfileRequest {
    pub username: String,
    #[serde(default)]
    pub about_me: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: PublicUser,
    pub followers: usize,
    pub following: usize,
    pub is_following: bool, // whether the caller follows this user
}
