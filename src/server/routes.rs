use std::sync::Arc;

use serde::de::DeserializeOwned;
use warp::{reject::Rejection, Filter};

use super::{handlers, with_state, AppState, Route};
use crate::{
    constants::MAX_BODY_BYTES,
    form::{AvatarForm, LoginForm, PasswordForm, RecipeForm, UserForm},
    middleware::{with_possible_session, with_session},
    schema::{Id, RelationKind},
    store::Store,
};

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// The undecoded query string, empty when the request has none.
fn raw_query() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::query::raw().or_else(|_| async { Ok::<_, Rejection>((String::new(),)) })
}

pub(super) fn api<S: Store>(state: Arc<AppState<S>>) -> Route {
    users(state.clone())
        .or(auth(state.clone()))
        .unify()
        .or(reference_data(state.clone()))
        .unify()
        .or(recipes(state))
        .unify()
        .boxed()
}

pub(super) fn short_links<S: Store>(state: Arc<AppState<S>>) -> Route {
    warp::path!("s" / String)
        .and(warp::get())
        .and(with_state(state))
        .and_then(handlers::follow_short_link::<S>)
        .boxed()
}

fn users<S: Store>(state: Arc<AppState<S>>) -> Route {
    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(warp::query::<handlers::PageQuery>())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::list_users::<S>);

    let register = warp::path!("api" / "users")
        .and(warp::post())
        .and(json_body::<UserForm>())
        .and(with_state(state.clone()))
        .and_then(handlers::register::<S>);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::me::<S>);

    let set_password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body::<PasswordForm>())
        .and(with_state(state.clone()))
        .and_then(handlers::set_password::<S>);

    let set_avatar = warp::path!("api" / "users" / "me" / "avatar")
        .and(warp::put())
        .and(with_session(state.clone()))
        .and(json_body::<AvatarForm>())
        .and(with_state(state.clone()))
        .and_then(handlers::set_avatar::<S>);

    let clear_avatar = warp::path!("api" / "users" / "me" / "avatar")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::clear_avatar::<S>);

    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(warp::query::<handlers::SubscriptionQuery>())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::subscriptions::<S>);

    let subscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::post())
        .and(warp::query::<handlers::SubscriptionQuery>())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::subscribe::<S>);

    let unsubscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::unsubscribe::<S>);

    let detail = warp::path!("api" / "users" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state))
        .and_then(handlers::get_user::<S>);

    list.or(register)
        .unify()
        .or(me)
        .unify()
        .or(set_password)
        .unify()
        .or(set_avatar)
        .unify()
        .or(clear_avatar)
        .unify()
        .or(subscriptions)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .or(detail)
        .unify()
        .boxed()
}

fn auth<S: Store>(state: Arc<AppState<S>>) -> Route {
    let login = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(json_body::<LoginForm>())
        .and(with_state(state.clone()))
        .and_then(handlers::login::<S>);

    let logout = warp::path!("api" / "auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(handlers::logout::<S>);

    login.or(logout).unify().boxed()
}

fn reference_data<S: Store>(state: Arc<AppState<S>>) -> Route {
    let tags = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::list_tags::<S>);

    let tag = warp::path!("api" / "tags" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::get_tag::<S>);

    let ingredients = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(warp::query::<handlers::IngredientQuery>())
        .and(with_state(state.clone()))
        .and_then(handlers::list_ingredients::<S>);

    let ingredient = warp::path!("api" / "ingredients" / Id)
        .and(warp::get())
        .and(with_state(state))
        .and_then(handlers::get_ingredient::<S>);

    tags.or(tag)
        .unify()
        .or(ingredients)
        .unify()
        .or(ingredient)
        .unify()
        .boxed()
}

fn recipes<S: Store>(state: Arc<AppState<S>>) -> Route {
    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(warp::query::<Vec<(String, String)>>())
        .and(raw_query())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::list_recipes::<S>);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body::<RecipeForm>())
        .and(with_state(state.clone()))
        .and_then(handlers::create_recipe::<S>);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::download_shopping_cart::<S>);

    let detail = warp::path!("api" / "recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::get_recipe::<S>);

    let update = warp::path!("api" / "recipes" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_body::<RecipeForm>())
        .and(with_state(state.clone()))
        .and_then(handlers::update_recipe::<S>);

    let delete = warp::path!("api" / "recipes" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::delete_recipe::<S>);

    let link = warp::path!("api" / "recipes" / Id / "get-link")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::get_link::<S>);

    let edit = warp::path!("api" / "recipes" / Id / "edit")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::edit_recipe::<S>);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(link)
        .unify()
        .or(edit)
        .unify()
        .or(relation(state.clone(), RelationKind::Favorite, "favorite"))
        .unify()
        .or(relation(state, RelationKind::Cart, "shopping_cart"))
        .unify()
        .boxed()
}

/// `POST` adds, `DELETE` removes, at `/api/recipes/{id}/{segment}/`.
fn relation<S: Store>(state: Arc<AppState<S>>, kind: RelationKind, segment: &'static str) -> Route {
    let path = warp::path("api")
        .and(warp::path("recipes"))
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end());
    let kind = warp::any().map(move || kind);

    let add = path
        .clone()
        .and(warp::post())
        .and(kind.clone())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::add_relation::<S>);

    let remove = path
        .and(warp::delete())
        .and(kind)
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(handlers::remove_relation::<S>);

    add.or(remove).unify().boxed()
}
