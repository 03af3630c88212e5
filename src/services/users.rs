use crate::{
    constants::AVATAR_IMAGE_DIR,
    cryptography::{hash_password, verify_password},
    error::{ApiError, FieldErrors},
    form::{AvatarForm, LoginForm, PasswordForm, UserForm},
    images::ImageStore,
    jwt::{issue_token, revoke_tokens, SessionData, TokenSigner},
    pagination::{PageContext, PageRequest},
    schema::{Id, NewUser},
    store::Store,
    views::{user_to_read_view, AvatarRead, TokenRead, UserCreated, UserRead},
};

const MIN_LEN_PASSWORD: usize = 8;

fn hash(password: &str) -> Result<String, ApiError> {
    hash_password(password).map_err(|e| ApiError::Internal(format!("Could not hash password: {e}")))
}

fn password_matches(password: &str, password_hash: &str) -> Result<bool, ApiError> {
    verify_password(password, password_hash)
        .map_err(|e| ApiError::Internal(format!("Stored password hash is unreadable: {e}")))
}

pub async fn register<S: Store>(store: &S, form: UserForm) -> Result<UserCreated, ApiError> {
    let user = form.validate()?;

    let mut errors = FieldErrors::new();
    if user.password.chars().count() < MIN_LEN_PASSWORD {
        errors.add(
            "password",
            format!("This password is too short. It must contain at least {MIN_LEN_PASSWORD} characters."),
        );
    }
    if store.find_user_by_username(&user.username).await?.is_some() {
        errors.add("username", "A user with that username already exists.");
    }
    if store.find_user_by_email(&user.email).await?.is_some() {
        errors.add("email", "A user with that email already exists.");
    }
    errors.into_result()?;

    let created = store
        .create_user(NewUser {
            password: hash(&user.password)?,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        })
        .await?
        .ok_or_else(|| {
            ApiError::Conflict(String::from(
                "A user with that username or email already exists.",
            ))
        })?;

    log::info!("> Registered user {} ({})", created.id, created.username);
    Ok(UserCreated::from(created))
}

pub async fn get<S: Store>(
    store: &S,
    viewer: Option<&SessionData>,
    id: Id,
) -> Result<UserRead, ApiError> {
    let user = store
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {id} not found")))?;
    user_to_read_view(store, viewer.map(SessionData::user_id), user).await
}

pub async fn list<S: Store>(
    store: &S,
    viewer: Option<&SessionData>,
    page: PageRequest,
    base_url: &str,
) -> Result<PageContext<UserRead>, ApiError> {
    let viewer = viewer.map(SessionData::user_id);
    let (users, total) = store.list_users(page.limit, page.offset).await?;

    let mut results = Vec::with_capacity(users.len());
    for user in users {
        results.push(user_to_read_view(store, viewer, user).await?);
    }
    Ok(PageContext::from_rows(results, total, page, base_url))
}

pub async fn me<S: Store>(store: &S, session: &SessionData) -> Result<UserRead, ApiError> {
    user_to_read_view(store, Some(session.user_id()), session.user.clone()).await
}

pub async fn set_password<S: Store>(
    store: &S,
    session: &SessionData,
    form: PasswordForm,
) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    let current = form.current_password.unwrap_or_default();
    let new = form.new_password.unwrap_or_default();

    if current.is_empty() {
        errors.add("current_password", "This field is required.");
    } else if !password_matches(&current, &session.user.password)? {
        errors.add("current_password", "Wrong password.");
    }
    if new.is_empty() {
        errors.add("new_password", "This field is required.");
    } else if new.chars().count() < MIN_LEN_PASSWORD {
        errors.add(
            "new_password",
            format!("This password is too short. It must contain at least {MIN_LEN_PASSWORD} characters."),
        );
    }
    errors.into_result()?;

    store.set_password(session.user_id(), &hash(&new)?).await?;
    log::info!("> User {} changed their password", session.user_id());
    Ok(())
}

/// Replaces the caller's avatar. The previous file is dropped.
pub async fn set_avatar<S: Store>(
    store: &S,
    images: &dyn ImageStore,
    session: &SessionData,
    form: AvatarForm,
) -> Result<AvatarRead, ApiError> {
    let data = form
        .avatar
        .filter(|avatar| !avatar.trim().is_empty())
        .ok_or_else(|| ApiError::validation("avatar", "This field is required."))?;
    let url = images
        .store(&data, AVATAR_IMAGE_DIR)
        .await
        .map_err(|e| e.into_api("avatar"))?;

    store.set_avatar(session.user_id(), Some(&url)).await?;
    if let Some(old) = &session.user.avatar {
        if let Err(e) = images.remove(old).await {
            log::warn!("> Could not remove avatar {old}: {e}");
        }
    }

    Ok(AvatarRead { avatar: Some(url) })
}

pub async fn clear_avatar<S: Store>(
    store: &S,
    images: &dyn ImageStore,
    session: &SessionData,
) -> Result<(), ApiError> {
    store.set_avatar(session.user_id(), None).await?;
    if let Some(old) = &session.user.avatar {
        if let Err(e) = images.remove(old).await {
            log::warn!("> Could not remove avatar {old}: {e}");
        }
    }
    Ok(())
}

pub async fn login<S: Store>(
    store: &S,
    signer: &TokenSigner,
    form: LoginForm,
) -> Result<TokenRead, ApiError> {
    let invalid = || {
        ApiError::validation(
            "non_field_errors",
            "Unable to log in with provided credentials.",
        )
    };

    let (email, password) = match (form.email, form.password) {
        (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
            (email, password)
        }
        _ => return Err(invalid()),
    };

    let user = store
        .find_user_by_email(email.trim())
        .await?
        .ok_or_else(invalid)?;
    if !password_matches(&password, &user.password)? {
        log::debug!("> Failed login for user {}", user.id);
        return Err(invalid());
    }

    let auth_token = issue_token(store, signer, &user).await?;
    log::info!("> User {} logged in", user.id);
    Ok(TokenRead { auth_token })
}

pub async fn logout<S: Store>(store: &S, session: &SessionData) -> Result<(), ApiError> {
    revoke_tokens(store, session.user_id()).await?;
    log::info!("> User {} logged out", session.user_id());
    Ok(())
}
