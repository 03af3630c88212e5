use crate::{
    error::ApiError,
    jwt::SessionData,
    pagination::{PageContext, PageRequest},
    schema::{Id, User},
    store::Store,
    views::{followed_author_view, FollowedAuthor},
};

async fn fetch_author<S: Store>(store: &S, author_id: Id) -> Result<User, ApiError> {
    store
        .get_user(author_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {author_id} not found")))
}

fn check_recipes_limit(recipes_limit: Option<i64>) -> Result<Option<i64>, ApiError> {
    match recipes_limit {
        Some(limit) if limit < 0 => Err(ApiError::validation(
            "recipes_limit",
            "Ensure this value is greater than or equal to 0.",
        )),
        limit => Ok(limit),
    }
}

pub async fn follow<S: Store>(
    store: &S,
    session: &SessionData,
    author_id: Id,
    recipes_limit: Option<i64>,
) -> Result<FollowedAuthor, ApiError> {
    let recipes_limit = check_recipes_limit(recipes_limit)?;
    let user_id = session.user_id();
    if author_id == user_id {
        return Err(ApiError::validation("author", "You cannot follow yourself."));
    }
    let author = fetch_author(store, author_id).await?;

    if !store.add_follow(user_id, author_id).await? {
        return Err(ApiError::Conflict(format!(
            "You already follow {}",
            author.username
        )));
    }

    log::debug!("> User {user_id} follows {author_id}");
    followed_author_view(store, Some(user_id), author, recipes_limit).await
}

pub async fn unfollow<S: Store>(
    store: &S,
    session: &SessionData,
    author_id: Id,
) -> Result<(), ApiError> {
    let user_id = session.user_id();
    let author = fetch_author(store, author_id).await?;

    if !store.remove_follow(user_id, author_id).await? {
        return Err(ApiError::Missing(format!(
            "You do not follow {}",
            author.username
        )));
    }

    log::debug!("> User {user_id} unfollowed {author_id}");
    Ok(())
}

pub async fn list_followed<S: Store>(
    store: &S,
    session: &SessionData,
    recipes_limit: Option<i64>,
    page: PageRequest,
    base_url: &str,
) -> Result<PageContext<FollowedAuthor>, ApiError> {
    let recipes_limit = check_recipes_limit(recipes_limit)?;
    let user_id = session.user_id();
    let (authors, total) = store.list_followed(user_id, page.limit, page.offset).await?;

    let mut results = Vec::with_capacity(authors.len());
    for author in authors {
        results.push(followed_author_view(store, Some(user_id), author, recipes_limit).await?);
    }
    Ok(PageContext::from_rows(results, total, page, base_url))
}
