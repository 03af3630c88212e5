use std::sync::Arc;

use serde_json::{json, Value};
use warp::http::StatusCode;

use super::{app, AppState};
use crate::{
    config::Config,
    images::PIXEL,
    memory::MemoryStore,
    schema::{Id, Ingredient, Tag},
    store::Store,
};

fn state() -> Arc<AppState<MemoryStore>> {
    let mut config = Config::with_secret("test-secret");
    config.public_url = String::from("http://testserver");
    config.media_root =
        std::env::temp_dir().join(format!("foodgram-http-{}", uuid::Uuid::new_v4()));
    Arc::new(AppState::new(MemoryStore::new(), config).unwrap())
}

fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

async fn sign_up(state: &Arc<AppState<MemoryStore>>, username: &str) -> (Id, String) {
    let api = app(state.clone());
    let email = format!("{username}@example.com");

    let response = warp::test::request()
        .method("POST")
        .path("/api/users/")
        .json(&json!({
            "email": email,
            "username": username,
            "first_name": "Test",
            "last_name": "User",
            "password": "s3cret-pass",
        }))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body(&response)["id"].as_i64().unwrap() as Id;

    let response = warp::test::request()
        .method("POST")
        .path("/api/auth/token/login/")
        .json(&json!({ "email": email, "password": "s3cret-pass" }))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body(&response)["auth_token"].as_str().unwrap().to_string();

    (id, format!("Token {token}"))
}

async fn reference_data(state: &Arc<AppState<MemoryStore>>) -> (Vec<Tag>, Vec<Ingredient>) {
    let tags = vec![
        state.store.create_tag("Breakfast", "breakfast").await.unwrap(),
        state.store.create_tag("Dinner", "dinner").await.unwrap(),
    ];
    let ingredients = vec![
        state.store.create_ingredient("flour", "g").await.unwrap(),
        state.store.create_ingredient("milk", "ml").await.unwrap(),
    ];
    (tags, ingredients)
}

fn recipe_payload(tags: &[Tag], ingredients: &[Ingredient], amount: i32) -> Value {
    json!({
        "ingredients": ingredients
            .iter()
            .map(|i| json!({ "id": i.id, "amount": amount }))
            .collect::<Vec<_>>(),
        "tags": tags.iter().map(|t| t.id).collect::<Vec<_>>(),
        "image": PIXEL,
        "name": "Pancakes",
        "text": "Mix and fry",
        "cooking_time": 15,
    })
}

async fn post_recipe(state: &Arc<AppState<MemoryStore>>, token: &str, payload: &Value) -> Value {
    let response = warp::test::request()
        .method("POST")
        .path("/api/recipes/")
        .header("authorization", token)
        .json(payload)
        .reply(&app(state.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body(&response)
}

#[tokio::test]
async fn registration_hides_password_and_rejects_duplicates() {
    let state = state();
    let api = app(state.clone());
    let payload = json!({
        "email": "anna@example.com",
        "username": "chef_anna",
        "first_name": "Anna",
        "last_name": "Smith",
        "password": "s3cret-pass",
    });

    let response = warp::test::request()
        .method("POST")
        .path("/api/users/")
        .json(&payload)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body(&response);
    assert_eq!(created["username"], "chef_anna");
    assert!(created.get("password").is_none());

    let response = warp::test::request()
        .method("POST")
        .path("/api/users/")
        .json(&payload)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body(&response).get("username").is_some());
}

#[tokio::test]
async fn me_requires_a_token() {
    let state = state();
    let api = app(state.clone());
    let (id, token) = sign_up(&state, "chef_anna").await;

    let response = warp::test::request()
        .path("/api/users/me/")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = warp::test::request()
        .path("/api/users/me/")
        .header("authorization", &token)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response)["id"], id);

    let response = warp::test::request()
        .method("POST")
        .path("/api/auth/token/logout/")
        .header("authorization", &token)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = warp::test::request()
        .path("/api/users/me/")
        .header("authorization", &token)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn recipe_round_trip_through_favorites() {
    let state = state();
    let api = app(state.clone());
    let (tags, ingredients) = reference_data(&state).await;
    let (author_id, token) = sign_up(&state, "chef_anna").await;

    let created = post_recipe(&state, &token, &recipe_payload(&tags, &ingredients, 100)).await;
    assert_eq!(created["author"]["id"], author_id);
    assert_eq!(created["tags"].as_array().unwrap().len(), 2);
    assert_eq!(created["ingredients"].as_array().unwrap().len(), 2);
    let id = created["id"].as_i64().unwrap();

    let favorite = format!("/api/recipes/{id}/favorite/");
    let response = warp::test::request()
        .method("POST")
        .path(&favorite)
        .header("authorization", &token)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        body(&response),
        json!({
            "id": id,
            "name": "Pancakes",
            "image": created["image"],
            "cooking_time": 15,
        })
    );

    let response = warp::test::request()
        .method("POST")
        .path(&favorite)
        .header("authorization", &token)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = warp::test::request()
        .path(&format!("/api/recipes/{id}/"))
        .header("authorization", &token)
        .reply(&api)
        .await;
    assert_eq!(body(&response)["is_favorited"], true);

    let response = warp::test::request()
        .path(&format!("/api/recipes/{id}/"))
        .reply(&api)
        .await;
    assert_eq!(body(&response)["is_favorited"], false);

    for expected in [StatusCode::NO_CONTENT, StatusCode::BAD_REQUEST] {
        let response = warp::test::request()
            .method("DELETE")
            .path(&favorite)
            .header("authorization", &token)
            .reply(&api)
            .await;
        assert_eq!(response.status(), expected);
    }

    let response = warp::test::request()
        .method("POST")
        .path("/api/recipes/999/favorite/")
        .header("authorization", &token)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_recipe_is_field_keyed() {
    let state = state();
    let api = app(state.clone());
    let (tags, ingredients) = reference_data(&state).await;
    let (_, token) = sign_up(&state, "chef_anna").await;

    let mut payload = recipe_payload(&tags, &ingredients, 100);
    payload["cooking_time"] = json!(0);
    payload["tags"] = json!([tags[0].id, tags[0].id]);

    let response = warp::test::request()
        .method("POST")
        .path("/api/recipes/")
        .header("authorization", &token)
        .json(&payload)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let errors = body(&response);
    assert!(errors.get("cooking_time").is_some());
    assert!(errors.get("tags").is_some());

    let response = warp::test::request()
        .method("POST")
        .path("/api/recipes/")
        .json(&recipe_payload(&tags, &ingredients, 100))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn strangers_cannot_edit() {
    let state = state();
    let api = app(state.clone());
    let (tags, ingredients) = reference_data(&state).await;
    let (_, anna) = sign_up(&state, "chef_anna").await;
    let (_, bob) = sign_up(&state, "hungry_bob").await;

    let created = post_recipe(&state, &anna, &recipe_payload(&tags, &ingredients, 100)).await;
    let path = format!("/api/recipes/{}/", created["id"]);

    let response = warp::test::request()
        .method("PATCH")
        .path(&path)
        .header("authorization", &bob)
        .json(&recipe_payload(&tags, &ingredients, 5))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = warp::test::request()
        .method("DELETE")
        .path(&path)
        .header("authorization", &bob)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let edit_path = format!("{path}edit/");
    let response = warp::test::request()
        .path(&edit_path)
        .header("authorization", &bob)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = warp::test::request()
        .path(&edit_path)
        .header("authorization", &anna)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let form = body(&response);
    assert_eq!(form["tags"], json!([tags[0].id, tags[1].id]));
    assert_eq!(form["ingredients"][0]["amount"], 100);
    assert!(form.get("is_favorited").is_none());

    let response = warp::test::request()
        .method("DELETE")
        .path(&path)
        .header("authorization", &anna)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn shopping_list_download() {
    let state = state();
    let api = app(state.clone());
    let (tags, ingredients) = reference_data(&state).await;
    let (_, token) = sign_up(&state, "chef_anna").await;

    let response = warp::test::request()
        .path("/api/recipes/download_shopping_cart/")
        .header("authorization", &token)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let first = post_recipe(&state, &token, &recipe_payload(&tags, &ingredients[..1], 100)).await;
    let second = post_recipe(&state, &token, &recipe_payload(&tags, &ingredients[..1], 50)).await;
    for recipe in [&first, &second] {
        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/recipes/{}/shopping_cart/", recipe["id"]))
            .header("authorization", &token)
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = warp::test::request()
        .path("/api/recipes/download_shopping_cart/")
        .header("authorization", &token)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"shopping_cart_list.txt\""
    );
    assert_eq!(response.body().as_ref(), "- flour — 150 g".as_bytes());
}

#[tokio::test]
async fn short_link_redirects() {
    let state = state();
    let api = app(state.clone());
    let (tags, ingredients) = reference_data(&state).await;
    let (_, token) = sign_up(&state, "chef_anna").await;
    let created = post_recipe(&state, &token, &recipe_payload(&tags, &ingredients, 100)).await;
    let id = created["id"].as_i64().unwrap();

    let response = warp::test::request()
        .path(&format!("/api/recipes/{id}/get-link/"))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let link = body(&response)["short-link"].as_str().unwrap().to_string();
    let path = link.trim_start_matches("http://testserver");
    assert!(path.starts_with("/s/"));

    let response = warp::test::request().path(path).reply(&api).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()["location"],
        format!("http://testserver/recipes/{id}/").as_str()
    );

    let response = warp::test::request().path("/s/zzzzzz/").reply(&api).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recipe_list_pages_and_filters() {
    let state = state();
    let api = app(state.clone());
    let (tags, ingredients) = reference_data(&state).await;
    let (_, token) = sign_up(&state, "chef_anna").await;

    for _ in 0..3 {
        post_recipe(&state, &token, &recipe_payload(&tags[..1], &ingredients, 10)).await;
    }
    post_recipe(&state, &token, &recipe_payload(&tags[1..], &ingredients, 10)).await;

    let response = warp::test::request()
        .path("/api/recipes/?tags=breakfast&limit=2")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body(&response);
    assert_eq!(page["count"], 3);
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert_eq!(
        page["next"],
        "http://testserver/api/recipes/?tags=breakfast&limit=2&offset=2"
    );
    assert_eq!(page["previous"], Value::Null);

    let response = warp::test::request()
        .path("/api/recipes/?tags=breakfast&tags=dinner")
        .reply(&api)
        .await;
    assert_eq!(body(&response)["count"], 4);
}

#[tokio::test]
async fn subscriptions_flow() {
    let state = state();
    let api = app(state.clone());
    let (tags, ingredients) = reference_data(&state).await;
    let (anna_id, anna) = sign_up(&state, "chef_anna").await;
    let (bob_id, bob) = sign_up(&state, "hungry_bob").await;
    post_recipe(&state, &anna, &recipe_payload(&tags, &ingredients, 10)).await;

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/api/users/{bob_id}/subscribe/"))
        .header("authorization", &bob)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/api/users/{anna_id}/subscribe/?recipes_limit=1"))
        .header("authorization", &bob)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let followed = body(&response);
    assert_eq!(followed["is_subscribed"], true);
    assert_eq!(followed["recipes_count"], 1);

    let response = warp::test::request()
        .path("/api/users/subscriptions/")
        .header("authorization", &bob)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response)["count"], 1);

    let response = warp::test::request()
        .path(&format!("/api/users/{anna_id}/"))
        .header("authorization", &bob)
        .reply(&api)
        .await;
    assert_eq!(body(&response)["is_subscribed"], true);
}

#[tokio::test]
async fn unknown_routes_and_reference_data() {
    let state = state();
    let api = app(state.clone());
    let (tags, _) = reference_data(&state).await;

    let response = warp::test::request().path("/api/nothing/").reply(&api).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = warp::test::request()
        .path(&format!("/api/tags/{}/", tags[1].id))
        .reply(&api)
        .await;
    assert_eq!(body(&response)["slug"], "dinner");

    let response = warp::test::request()
        .path("/api/ingredients/?name=fl")
        .reply(&api)
        .await;
    let found = body(&response);
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["measurement_unit"], "g");
}

#[tokio::test]
async fn huge_offsets_return_empty_pages() {
    let state = state();
    let api = app(state.clone());
    let (tags, ingredients) = reference_data(&state).await;
    let (_, token) = sign_up(&state, "chef_anna").await;
    post_recipe(&state, &token, &recipe_payload(&tags, &ingredients, 10)).await;

    for path in [
        "/api/recipes/?offset=9223372036854775807",
        "/api/users/?offset=9223372036854775800&limit=100",
    ] {
        let response = warp::test::request().path(path).reply(&api).await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = body(&response);
        assert_eq!(page["count"], 1);
        assert_eq!(page["results"], json!([]));
        assert_eq!(page["next"], Value::Null);
    }
}

#[tokio::test]
async fn negative_recipes_limit_is_a_bad_request() {
    let state = state();
    let api = app(state.clone());
    let (anna_id, _) = sign_up(&state, "chef_anna").await;
    let (_, bob) = sign_up(&state, "hungry_bob").await;

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/api/users/{anna_id}/subscribe/?recipes_limit=-1"))
        .header("authorization", &bob)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body(&response)["recipes_limit"].is_array());

    let response = warp::test::request()
        .path("/api/users/subscriptions/?recipes_limit=-1")
        .header("authorization", &bob)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
