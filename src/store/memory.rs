use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{FollowStore, Page, PostStore, StoreError, StoreResult, UserStore};
use crate::posts::repo_types::{FeedPost, NewPost, Post};
use crate::users::repo_types::{NewUser, User};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    posts: Vec<Post>,
    following: HashMap<Uuid, BTreeSet<Uuid>>,
    followers: HashMap<Uuid, BTreeSet<Uuid>>,
}

impl Inner {
    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    fn feed<F>(&self, page: Page, include: F) -> Vec<FeedPost>
    where
        F: Fn(&Post) -> bool,
    {
        let mut feed: Vec<FeedPost> = self
            .posts
            .iter()
            .filter(|p| include(p))
            .map(|p| FeedPost {
                id: p.id,
                body: p.body.clone(),
                created_at: p.created_at,
                author_id: p.user_id,
                author_username: self
                    .users
                    .get(&p.user_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
            })
            .collect();
        feed.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        feed.into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect()
    }
}

/// Process-local store. Every mutation happens under one write lock, so the
/// forward and inverse follow indexes never disagree.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if inner.username_taken(&new.username, None) {
            return Err(StoreError::Duplicate("username".into()));
        }
        if inner.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Duplicate("email".into()));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            about_me: None,
            last_seen: now,
            created_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        username: &str,
        about_me: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let mut inner = self.inner.write().await;
        if inner.username_taken(username, Some(id)) {
            return Err(StoreError::Duplicate("username".into()));
        }
        Ok(inner.users.get_mut(&id).map(|user| {
            user.username = username.to_string();
            user.about_me = about_me.map(str::to_string);
            user.clone()
        }))
    }

    async fn touch_last_seen(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(false);
        };
        user.last_seen = at;
        Ok(true)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create_post(&self, new: NewPost) -> StoreResult<Post> {
        let post = Post {
            id: Uuid::new_v4(),
            body: new.body,
            created_at: new.created_at,
            user_id: new.user_id,
        };
        self.inner.write().await.posts.push(post.clone());
        Ok(post)
    }

    async fn posts_by_author(&self, author_id: Uuid, page: Page) -> StoreResult<Vec<FeedPost>> {
        let inner = self.inner.read().await;
        Ok(inner.feed(page, |p| p.user_id == author_id))
    }

    async fn all_posts(&self, page: Page) -> StoreResult<Vec<FeedPost>> {
        Ok(self.inner.read().await.feed(page, |_| true))
    }

    async fn timeline(&self, user_id: Uuid, page: Page) -> StoreResult<Vec<FeedPost>> {
        let inner = self.inner.read().await;
        let mut authors = inner.following.get(&user_id).cloned().unwrap_or_default();
        authors.insert(user_id);
        Ok(inner.feed(page, |p| authors.contains(&p.user_id)))
    }
}

#[async_trait]
impl FollowStore for MemoryStore {
    async fn insert_follow(&self, follower_id: Uuid, followed_id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let added = inner
            .following
            .entry(follower_id)
            .or_default()
            .insert(followed_id);
        if added {
            inner
                .followers
                .entry(followed_id)
                .or_default()
                .insert(follower_id);
        }
        Ok(added)
    }

    async fn delete_follow(&self, follower_id: Uuid, followed_id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let removed = inner
            .following
            .get_mut(&follower_id)
            .map(|set| set.remove(&followed_id))
            .unwrap_or(false);
        if removed {
            if let Some(set) = inner.followers.get_mut(&followed_id) {
                set.remove(&follower_id);
            }
        }
        Ok(removed)
    }

    async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> StoreResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .following
            .get(&follower_id)
            .is_some_and(|set| set.contains(&followed_id)))
    }

    async fn followed_ids(&self, user_id: Uuid) -> StoreResult<BTreeSet<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner.following.get(&user_id).cloned().unwrap_or_default())
    }

    async fn follower_ids(&self, user_id: Uuid) -> StoreResult<BTreeSet<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner.followers.get(&user_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    async fn user(store: &MemoryStore, name: &str) -> Uuid {
        store
            .create_user(NewUser {
                username: name.into(),
                email: format!("{name}@example.com"),
                password_hash: "x".into(),
            })
            .await
            .unwrap()
            .id
    }

    async fn post_at(store: &MemoryStore, author: Uuid, body: &str, at: OffsetDateTime) -> Post {
        store
            .create_post(NewPost {
                user_id: author,
                body: body.into(),
                created_at: at,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_updates_both_views() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;

        assert!(store.insert_follow(a, b).await.unwrap());
        assert!(store.is_following(a, b).await.unwrap());
        assert!(!store.is_following(b, a).await.unwrap());
        assert_eq!(store.followed_ids(a).await.unwrap(), BTreeSet::from([b]));
        assert_eq!(store.follower_ids(b).await.unwrap(), BTreeSet::from([a]));
        assert!(store.follower_ids(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_insert_and_missing_delete_are_noops() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;

        assert!(store.insert_follow(a, b).await.unwrap());
        assert!(!store.insert_follow(a, b).await.unwrap());
        assert_eq!(store.followed_ids(a).await.unwrap().len(), 1);
        assert_eq!(store.follower_ids(b).await.unwrap().len(), 1);

        assert!(!store.delete_follow(b, a).await.unwrap());
        assert!(store.delete_follow(a, b).await.unwrap());
        assert!(!store.delete_follow(a, b).await.unwrap());
        assert!(store.followed_ids(a).await.unwrap().is_empty());
        assert!(store.follower_ids(b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_read_as_empty() {
        let store = MemoryStore::new();
        let ghost = Uuid::new_v4();
        assert!(!store.is_following(ghost, Uuid::new_v4()).await.unwrap());
        assert!(store.followed_ids(ghost).await.unwrap().is_empty());
        assert!(store.follower_ids(ghost).await.unwrap().is_empty());
        assert!(store.timeline(ghost, Page::new(20, 0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn timeline_merges_own_and_followed_posts_newest_first() {
        let store = MemoryStore::new();
        let me = user(&store, "me").await;
        let friend = user(&store, "friend").await;
        let other = user(&store, "other").await;
        let stranger = user(&store, "stranger").await;
        store.insert_follow(me, friend).await.unwrap();
        store.insert_follow(me, other).await.unwrap();

        post_at(&store, friend, "t3", datetime!(2024-01-01 10:00 UTC)).await;
        post_at(&store, other, "t1", datetime!(2024-01-01 12:00 UTC)).await;
        post_at(&store, stranger, "nope", datetime!(2024-01-01 14:00 UTC)).await;
        post_at(&store, me, "t0", datetime!(2024-01-01 13:00 UTC)).await;
        post_at(&store, friend, "t2", datetime!(2024-01-01 11:00 UTC)).await;

        let bodies: Vec<String> = store
            .timeline(me, Page::new(20, 0))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.body)
            .collect();
        assert_eq!(bodies, ["t0", "t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn touch_last_seen_reports_unknown_users() {
        let store = MemoryStore::new();
        let me = user(&store, "me").await;
        let at = datetime!(2030-01-01 00:00 UTC);
        assert!(store.touch_last_seen(me, at).await.unwrap());
        assert_eq!(store.user_by_id(me).await.unwrap().unwrap().last_seen, at);
        assert!(!store.touch_last_seen(Uuid::new_v4(), at).await.unwrap());
    }

    #[tokio::test]
    async fn equal_timestamps_fall_back_to_post_id() {
        let store = MemoryStore::new();
        let me = user(&store, "me").await;
        let at = datetime!(2024-05-05 05:05 UTC);
        let mut ids = Vec::new();
        for body in ["a", "b", "c"] {
            ids.push(post_at(&store, me, body, at).await.id);
        }
        ids.sort_by(|a, b| b.cmp(a));

        let got: Vec<Uuid> = store
            .timeline(me, Page::new(20, 0))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(got, ids);
    }

    #[tokio::test]
    async fn username_change_cannot_steal_another_name() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        user(&store, "b").await;

        let err = store.update_profile(a, "b", None).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        let updated = store
            .update_profile(a, "a", Some("hello"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.about_me.as_deref(), Some("hello"));
    }
}
