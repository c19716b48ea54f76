use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowStatus {
    Followed,
    Unfollowed,
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub status: FollowStatus,
    pub user_id: Uuid,
    /// False when the edge was already in the requested state.
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct IdSetResponse {
    pub user_id: Uuid,
    pub ids: BTreeSet<Uuid>,
}
