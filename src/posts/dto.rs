use serde::{Deserialize, Serialize};

use crate::posts::repo_types::FeedPost;
use crate::store::Page;

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 {
    20
}

impl From<Pagination> for Page {
    fn from(p: Pagination) -> Self {
        Page::new(p.limit, p.offset)
    }
}

/// One page of a newest-first listing. `next_offset` is set when more posts follow.
#[derive(Debug, Serialize)]
pub struct FeedPage {
    pub posts: Vec<FeedPost>,
    pub next_offset: Option<i64>,
}
