use tracing::{info, warn};

use crate::auth::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;
use crate::store::Store;
use crate::users::dto::PublicUser;
use crate::users::repo_types::{NewUser, User};
use crate::users::services::USERNAME_TAKEN;
use crate::validation::{email, max_len, min_len, required, Validator};

pub const EMAIL_TAKEN: &str = "This email already has an account! Please use a different one";

fn register_rules() -> Validator<RegisterRequest> {
    Validator::new()
        .rule("username", |r: &RegisterRequest| required(&r.username))
        .rule("username", |r: &RegisterRequest| max_len(&r.username, 64))
        .rule("email", |r: &RegisterRequest| required(&r.email))
        .rule("email", |r: &RegisterRequest| max_len(&r.email, 64))
        .rule("email", |r: &RegisterRequest| email(&r.email))
        .rule("password", |r: &RegisterRequest| min_len(&r.password, 8))
        .rule("password2", |r: &RegisterRequest| {
            if r.password2 != r.password {
                return Err("Field must be equal to password.".into());
            }
            Ok(())
        })
}

fn issue_tokens(keys: &JwtKeys, user: User, with_refresh: bool) -> Result<AuthResponse, AppError> {
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = if with_refresh {
        Some(keys.sign_refresh(user.id)?)
    } else {
        None
    };
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

pub async fn register(
    store: &dyn Store,
    keys: &JwtKeys,
    mut req: RegisterRequest,
) -> Result<AuthResponse, AppError> {
    req.username = req.username.trim().to_string();
    req.email = req.email.trim().to_lowercase();

    let mut errors = register_rules().collect(&req);
    if errors.field("username").is_empty()
        && store.user_by_username(&req.username).await?.is_some()
    {
        errors.add("username", USERNAME_TAKEN);
    }
    if errors.field("email").is_empty() && store.user_by_email(&req.email).await?.is_some() {
        errors.add("email", EMAIL_TAKEN);
    }
    if !errors.is_empty() {
        warn!(username = %req.username, "registration rejected");
        return Err(errors.into());
    }

    let password_hash = hash_password(&req.password)?;
    let user = store
        .create_user(NewUser {
            username: req.username,
            email: req.email,
            password_hash,
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    issue_tokens(keys, user, true)
}

pub async fn login(
    store: &dyn Store,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<AuthResponse, AppError> {
    let username = req.username.trim();
    let Some(user) = store.user_by_username(username).await? else {
        warn!(%username, "login unknown username");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = %user.id, remember_me = req.remember_me, "user logged in");
    issue_tokens(keys, user, req.remember_me)
}

pub async fn refresh(
    store: &dyn Store,
    keys: &JwtKeys,
    refresh_token: &str,
) -> Result<AuthResponse, AppError> {
    let claims = keys.verify_refresh(refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Unauthorized("Invalid refresh token")
    })?;
    let user = store
        .user_by_id(claims.sub)
        .await?
        .ok_or(AppError::Unauthorized("User not found"))?;
    issue_tokens(keys, user, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::UserStore;
    use crate::config::JwtConfig;

    fn keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    fn form(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: "password123".into(),
            password2: "password123".into(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let store = MemoryStore::new();
        let keys = keys();
        let registered = register(&store, &keys, form(" john ", "John@Example.com"))
            .await
            .unwrap();
        assert_eq!(registered.user.username, "john");
        assert!(registered.refresh_token.is_some());

        let stored = store.user_by_username("john").await.unwrap().unwrap();
        assert_eq!(stored.email, "john@example.com");
        assert_ne!(stored.password_hash, "password123");

        let session = login(
            &store,
            &keys,
            LoginRequest {
                username: "john".into(),
                password: "password123".into(),
                remember_me: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(keys.verify(&session.access_token).unwrap().sub, stored.id);
        assert!(session.refresh_token.is_none());
    }

    #[tokio::test]
    async fn register_reports_every_problem() {
        let store = MemoryStore::new();
        let mut req = form("", "not-an-email");
        req.password = "short".into();
        req.password2 = "different".into();

        let Err(AppError::Validation(errors)) = register(&store, &keys(), req).await else {
            panic!("expected validation error");
        };
        assert!(!errors.field("username").is_empty());
        assert!(!errors.field("email").is_empty());
        assert!(!errors.field("password").is_empty());
        assert!(!errors.field("password2").is_empty());
    }

    #[tokio::test]
    async fn register_rejects_taken_username_and_email() {
        let store = MemoryStore::new();
        register(&store, &keys(), form("susan", "susan@example.com"))
            .await
            .unwrap();

        let Err(AppError::Validation(errors)) =
            register(&store, &keys(), form("susan", "SUSAN@example.com")).await
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors.field("username"), [USERNAME_TAKEN]);
        assert_eq!(errors.field("email"), [EMAIL_TAKEN]);
    }

    #[tokio::test]
    async fn login_hides_which_part_was_wrong() {
        let store = MemoryStore::new();
        register(&store, &keys(), form("bob", "bob@example.com"))
            .await
            .unwrap();

        for (username, password) in [("bob", "wrong-password"), ("nobody", "password123")] {
            let err = login(
                &store,
                &keys(),
                LoginRequest {
                    username: username.into(),
                    password: password.into(),
                    remember_me: true,
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AppError::InvalidCredentials));
        }
    }

    #[tokio::test]
    async fn refresh_issues_new_pair_for_refresh_tokens_only() {
        let store = MemoryStore::new();
        let keys = keys();
        let registered = register(&store, &keys, form("ann", "ann@example.com"))
            .await
            .unwrap();

        let refreshed = refresh(&store, &keys, registered.refresh_token.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(refreshed.user.id, registered.user.id);

        let err = refresh(&store, &keys, &registered.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
