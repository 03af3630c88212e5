use std::{str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use warp::{
    http::{header, StatusCode},
    reject::{self, Rejection},
    reply::{self, Response},
    Reply,
};

use super::AppState;
use crate::{
    authoring::{self, RecipeQuery},
    constants::SHOPPING_LIST_FILENAME,
    error::ApiError,
    follows,
    form::{AvatarForm, LoginForm, PasswordForm, RecipeForm, UserForm},
    jwt::SessionData,
    pagination::PageRequest,
    relations,
    schema::{Id, RelationKind},
    shopping,
    store::Store,
    users,
};

type HandlerResult = Result<Response, Rejection>;

#[derive(Deserialize, Debug, Default)]
pub(super) struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize, Debug, Default)]
pub(super) struct SubscriptionQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    recipes_limit: Option<i64>,
}

#[derive(Deserialize, Debug, Default)]
pub(super) struct IngredientQuery {
    name: Option<String>,
}

fn json<T: Serialize>(value: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

fn ok<T: Serialize>(value: &T) -> Response {
    json(value, StatusCode::OK)
}

fn created<T: Serialize>(value: &T) -> Response {
    json(value, StatusCode::CREATED)
}

fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

fn not_found(what: &str, id: Id) -> Rejection {
    reject::custom(ApiError::NotFound(format!("{what} {id} not found")))
}

fn parse<T: FromStr>(field: &str, value: &str) -> Result<T, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::validation(field, format!("Invalid value: {value}")))
}

fn flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "True")
}

/// Splits a recipe list query into its filter and page, given repeated `tags`.
fn recipe_query(
    pairs: Vec<(String, String)>,
) -> Result<(RecipeQuery, Option<i64>, Option<i64>), ApiError> {
    let mut query = RecipeQuery::default();
    let mut limit = None;
    let mut offset = None;

    for (key, value) in pairs {
        match key.as_str() {
            "author" => query.author = Some(parse("author", &value)?),
            "tags" => query.tags.push(value),
            "is_favorited" => query.is_favorited = flag(&value),
            "is_in_shopping_cart" => query.is_in_shopping_cart = flag(&value),
            "limit" => limit = Some(parse("limit", &value)?),
            "offset" => offset = Some(parse("offset", &value)?),
            _ => {}
        }
    }
    Ok((query, limit, offset))
}

/// List url with every parameter but the paging ones, for next/previous links.
fn page_base(url: String, raw_query: &str) -> String {
    let kept: Vec<&str> = raw_query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| !pair.starts_with("limit=") && !pair.starts_with("offset="))
        .collect();
    if kept.is_empty() {
        url
    } else {
        format!("{url}?{}", kept.join("&"))
    }
}

// users

pub(super) async fn list_users<S: Store>(
    query: PageQuery,
    session: Option<SessionData>,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let page = PageRequest::new(query.limit, query.offset, state.config.page_size);
    let listed = users::list(
        &state.store,
        session.as_ref(),
        page,
        &state.url("/api/users/"),
    )
    .await
    .map_err(reject::custom)?;
    Ok(ok(&listed))
}

pub(super) async fn register<S: Store>(form: UserForm, state: Arc<AppState<S>>) -> HandlerResult {
    let user = users::register(&state.store, form)
        .await
        .map_err(reject::custom)?;
    Ok(created(&user))
}

pub(super) async fn me<S: Store>(session: SessionData, state: Arc<AppState<S>>) -> HandlerResult {
    let user = users::me(&state.store, &session)
        .await
        .map_err(reject::custom)?;
    Ok(ok(&user))
}

pub(super) async fn get_user<S: Store>(
    id: Id,
    session: Option<SessionData>,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let user = users::get(&state.store, session.as_ref(), id)
        .await
        .map_err(reject::custom)?;
    Ok(ok(&user))
}

pub(super) async fn set_password<S: Store>(
    session: SessionData,
    form: PasswordForm,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    users::set_password(&state.store, &session, form)
        .await
        .map_err(reject::custom)?;
    Ok(no_content())
}

pub(super) async fn set_avatar<S: Store>(
    session: SessionData,
    form: AvatarForm,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let avatar = users::set_avatar(&state.store, state.images.as_ref(), &session, form)
        .await
        .map_err(reject::custom)?;
    Ok(ok(&avatar))
}

pub(super) async fn clear_avatar<S: Store>(
    session: SessionData,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    users::clear_avatar(&state.store, state.images.as_ref(), &session)
        .await
        .map_err(reject::custom)?;
    Ok(no_content())
}

pub(super) async fn subscriptions<S: Store>(
    query: SubscriptionQuery,
    session: SessionData,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let page = PageRequest::new(query.limit, query.offset, state.config.page_size);
    let mut base = state.url("/api/users/subscriptions/");
    if let Some(limit) = query.recipes_limit {
        base = format!("{base}?recipes_limit={limit}");
    }

    let listed = follows::list_followed(&state.store, &session, query.recipes_limit, page, &base)
        .await
        .map_err(reject::custom)?;
    Ok(ok(&listed))
}

pub(super) async fn subscribe<S: Store>(
    id: Id,
    query: SubscriptionQuery,
    session: SessionData,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let author = follows::follow(&state.store, &session, id, query.recipes_limit)
        .await
        .map_err(reject::custom)?;
    Ok(created(&author))
}

pub(super) async fn unsubscribe<S: Store>(
    id: Id,
    session: SessionData,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    follows::unfollow(&state.store, &session, id)
        .await
        .map_err(reject::custom)?;
    Ok(no_content())
}

// auth

pub(super) async fn login<S: Store>(form: LoginForm, state: Arc<AppState<S>>) -> HandlerResult {
    let token = users::login(&state.store, &state.signer, form)
        .await
        .map_err(reject::custom)?;
    Ok(ok(&token))
}

pub(super) async fn logout<S: Store>(session: SessionData, state: Arc<AppState<S>>) -> HandlerResult {
    users::logout(&state.store, &session)
        .await
        .map_err(reject::custom)?;
    Ok(no_content())
}

// tags and ingredients

pub(super) async fn list_tags<S: Store>(state: Arc<AppState<S>>) -> HandlerResult {
    let tags = state.store.list_tags().await.map_err(reject::custom)?;
    Ok(ok(&tags))
}

pub(super) async fn get_tag<S: Store>(id: Id, state: Arc<AppState<S>>) -> HandlerResult {
    let tag = state
        .store
        .get_tags(&[id])
        .await
        .map_err(reject::custom)?
        .pop()
        .ok_or_else(|| not_found("Tag", id))?;
    Ok(ok(&tag))
}

pub(super) async fn list_ingredients<S: Store>(
    query: IngredientQuery,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let prefix = query.name.as_deref().filter(|name| !name.is_empty());
    let ingredients = state
        .store
        .list_ingredients(prefix)
        .await
        .map_err(reject::custom)?;
    Ok(ok(&ingredients))
}

pub(super) async fn get_ingredient<S: Store>(id: Id, state: Arc<AppState<S>>) -> HandlerResult {
    let ingredient = state
        .store
        .get_ingredients(&[id])
        .await
        .map_err(reject::custom)?
        .pop()
        .ok_or_else(|| not_found("Ingredient", id))?;
    Ok(ok(&ingredient))
}

// recipes

pub(super) async fn list_recipes<S: Store>(
    pairs: Vec<(String, String)>,
    raw_query: String,
    session: Option<SessionData>,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let (query, limit, offset) = recipe_query(pairs).map_err(reject::custom)?;
    let page = PageRequest::new(limit, offset, state.config.page_size);
    let base = page_base(state.url("/api/recipes/"), &raw_query);

    let listed = authoring::list(&state.store, session.as_ref(), query, page, &base)
        .await
        .map_err(reject::custom)?;
    Ok(ok(&listed))
}

pub(super) async fn create_recipe<S: Store>(
    session: SessionData,
    form: RecipeForm,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let recipe = authoring::create(&state.store, state.images.as_ref(), &session, form)
        .await
        .map_err(reject::custom)?;
    Ok(created(&recipe))
}

pub(super) async fn get_recipe<S: Store>(
    id: Id,
    session: Option<SessionData>,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let recipe = authoring::get(&state.store, session.as_ref(), id)
        .await
        .map_err(reject::custom)?;
    Ok(ok(&recipe))
}

pub(super) async fn update_recipe<S: Store>(
    id: Id,
    session: SessionData,
    form: RecipeForm,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let recipe = authoring::update(&state.store, state.images.as_ref(), &session, id, form)
        .await
        .map_err(reject::custom)?;
    Ok(ok(&recipe))
}

pub(super) async fn delete_recipe<S: Store>(
    id: Id,
    session: SessionData,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    authoring::delete(&state.store, state.images.as_ref(), &session, id)
        .await
        .map_err(reject::custom)?;
    Ok(no_content())
}

pub(super) async fn get_link<S: Store>(id: Id, state: Arc<AppState<S>>) -> HandlerResult {
    let link = authoring::get_link(&state.store, &state.config.public_url, id)
        .await
        .map_err(reject::custom)?;
    Ok(ok(&link))
}

/// Ids-only shape of the recipe, for its author's edit form.
pub(super) async fn edit_recipe<S: Store>(
    id: Id,
    session: SessionData,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let form = authoring::edit_form(&state.store, &session, id)
        .await
        .map_err(reject::custom)?;
    Ok(ok(&form))
}

pub(super) async fn follow_short_link<S: Store>(code: String, state: Arc<AppState<S>>) -> HandlerResult {
    let id = authoring::resolve_short_link(&state.store, &code)
        .await
        .map_err(reject::custom)?;
    let location = state.url(&format!("/recipes/{id}/"));

    Ok(reply::with_header(StatusCode::FOUND, header::LOCATION, location).into_response())
}

pub(super) async fn add_relation<S: Store>(
    id: Id,
    kind: RelationKind,
    session: SessionData,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let recipe = relations::add(&state.store, kind, &session, id)
        .await
        .map_err(reject::custom)?;
    Ok(created(&recipe))
}

pub(super) async fn remove_relation<S: Store>(
    id: Id,
    kind: RelationKind,
    session: SessionData,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    relations::remove(&state.store, kind, &session, id)
        .await
        .map_err(reject::custom)?;
    Ok(no_content())
}

pub(super) async fn download_shopping_cart<S: Store>(
    session: SessionData,
    state: Arc<AppState<S>>,
) -> HandlerResult {
    let list = shopping::build(&state.store, &session)
        .await
        .map_err(reject::custom)?;

    Ok(reply::with_header(
        list,
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    )
    .into_response())
}
