use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::follows::services as follows;
use crate::store::Store;
use crate::users::dto::{EditProfileRequest, MeResponse, ProfileResponse, PublicUser};
use crate::users::repo_types::User;
use crate::validation::{max_len, required, Validator};

pub const USERNAME_TAKEN: &str = "This username is already taken! Please use a different one";

fn edit_profile_rules() -> Validator<EditProfileRequest> {
    Validator::new()
        .rule("username", |r: &EditProfileRequest| required(&r.username))
        .rule("username", |r: &EditProfileRequest| max_len(&r.username, 64))
        .rule("about_me", |r: &EditProfileRequest| {
            max_len(r.about_me.as_deref().unwrap_or_default(), 140)
        })
}

pub async fn find_by_username(store: &dyn Store, username: &str) -> Result<User, AppError> {
    store
        .user_by_username(username)
        .await?
        .ok_or_else(|| AppError::UnknownUser(username.to_string()))
}

pub async fn me(store: &dyn Store, user_id: Uuid) -> Result<MeResponse, AppError> {
    let user = store
        .user_by_id(user_id)
        .await?
        .ok_or(AppError::Unauthorized("User not found"))?;
    let email = user.email.clone();
    Ok(MeResponse {
        user: PublicUser::from(user),
        email,
    })
}

/// Renames the caller and replaces the bio. Keeping one's current username is
/// always allowed; taking someone else's is not. An empty bio clears it.
pub async fn edit_profile(
    store: &dyn Store,
    user_id: Uuid,
    mut req: EditProfileRequest,
) -> Result<PublicUser, AppError> {
    req.username = req.username.trim().to_string();
    req.about_me = req
        .about_me
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let current = store
        .user_by_id(user_id)
        .await?
        .ok_or(AppError::Unauthorized("User not found"))?;

    let mut errors = edit_profile_rules().collect(&req);
    if errors.field("username").is_empty()
        && req.username != current.username
        && store.user_by_username(&req.username).await?.is_some()
    {
        errors.add("username", USERNAME_TAKEN);
    }
    errors.into_result()?;

    let user = store
        .update_profile(user_id, &req.username, req.about_me.as_deref())
        .await?
        .ok_or(AppError::Unauthorized("User not found"))?;
    info!(user_id = %user.id, username = %user.username, "profile updated");
    Ok(PublicUser::from(user))
}

pub async fn profile(
    store: &dyn Store,
    viewer_id: Uuid,
    username: &str,
) -> Result<ProfileResponse, AppError> {
    let user = find_by_username(store, username).await?;
    let followers = follows::followers_of(store, user.id).await?.len();
    let following = follows::followed_ids(store, user.id).await?.len();
    let is_following = follows::is_following(store, viewer_id, user.id).await?;
    Ok(ProfileResponse {
        user: PublicUser::from(user),
        followers,
        following,
        is_following,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::{FollowStore, UserStore};
    use crate::users::repo_types::NewUser;

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

    fn edit(username: &str, about_me: Option<&str>) -> EditProfileRequest {
        EditProfileRequest {
            username: username.into(),
            about_me: about_me.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn keeping_own_username_is_allowed() {
        let store = MemoryStore::new();
        let id = user(&store, "miguel").await;
        let updated = edit_profile(&store, id, edit("miguel", Some("  hi there ")))
            .await
            .unwrap();
        assert_eq!(updated.username, "miguel");
        assert_eq!(updated.about_me.as_deref(), Some("hi there"));

        let cleared = edit_profile(&store, id, edit("miguel", Some("   ")))
            .await
            .unwrap();
        assert!(cleared.about_me.is_none());
    }

    #[tokio::test]
    async fn taking_another_username_is_rejected() {
        let store = MemoryStore::new();
        let id = user(&store, "john").await;
        user(&store, "susan").await;

        let Err(AppError::Validation(errors)) =
            edit_profile(&store, id, edit("susan", None)).await
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors.field("username"), [USERNAME_TAKEN]);
    }

    #[tokio::test]
    async fn long_bio_is_rejected() {
        let store = MemoryStore::new();
        let id = user(&store, "john").await;
        let bio = "x".repeat(141);
        let Err(AppError::Validation(errors)) =
            edit_profile(&store, id, edit("john", Some(&bio))).await
        else {
            panic!("expected validation error");
        };
        assert!(!errors.field("about_me").is_empty());
    }

    #[tokio::test]
    async fn profile_counts_edges_and_reports_viewer_relation() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        let c = user(&store, "c").await;
        store.insert_follow(a, b).await.unwrap();
        store.insert_follow(c, b).await.unwrap();
        store.insert_follow(b, a).await.unwrap();

        let seen_by_a = profile(&store, a, "b").await.unwrap();
        assert_eq!(seen_by_a.followers, 2);
        assert_eq!(seen_by_a.following, 1);
        assert!(seen_by_a.is_following);

        let seen_by_b = profile(&store, b, "c").await.unwrap();
        assert!(!seen_by_b.is_following);

        assert!(matches!(
            profile(&store, a, "ghost").await,
            Err(AppError::UnknownUser(_))
        ));
    }
}
