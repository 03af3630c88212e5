use std::collections::HashSet;

use crate::{
    constants::{RECIPE_IMAGE_DIR, SHORT_LINK_ATTEMPTS, SHORT_LINK_LENGTH},
    cryptography::generate_short_code,
    error::ApiError,
    form::{RecipeForm, ValidRecipe},
    images::ImageStore,
    jwt::SessionData,
    pagination::{PageContext, PageRequest},
    permissions::ensure_author,
    schema::{Id, NewRecipe, Recipe, RecipeChanges, RecipeFilter},
    store::Store,
    views::{to_read_view, to_write_view, RecipeRead, RecipeWrite, ShortLink},
};

/// Recipe list query as it arrives. The viewer-relative flags only apply
/// to authenticated callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeQuery {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeQuery {
    pub fn into_filter(self, viewer: Option<Id>) -> RecipeFilter {
        RecipeFilter {
            author: self.author,
            tags: self.tags,
            favorited_by: viewer.filter(|_| self.is_favorited),
            in_cart_of: viewer.filter(|_| self.is_in_shopping_cart),
        }
    }
}

async fn fetch<S: Store>(store: &S, id: Id) -> Result<Recipe, ApiError> {
    store
        .get_recipe(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Recipe {id} not found")))
}

/// Every tag and ingredient the payload names must exist.
async fn check_references<S: Store>(store: &S, recipe: &ValidRecipe) -> Result<(), ApiError> {
    let tags = store.get_tags(&recipe.tag_ids).await?;
    if tags.len() != recipe.tag_ids.len() {
        let known: HashSet<Id> = tags.iter().map(|tag| tag.id).collect();
        let unknown: Vec<String> = recipe
            .tag_ids
            .iter()
            .filter(|id| !known.contains(id))
            .map(Id::to_string)
            .collect();
        return Err(ApiError::validation(
            "tags",
            format!("Unknown tags: {}", unknown.join(", ")),
        ));
    }

    let ids: Vec<Id> = recipe.parts.iter().map(|part| part.ingredient_id).collect();
    let ingredients = store.get_ingredients(&ids).await?;
    if ingredients.len() != ids.len() {
        let known: HashSet<Id> = ingredients.iter().map(|i| i.id).collect();
        if let Some(id) = ids.iter().find(|id| !known.contains(id)) {
            return Err(ApiError::NotFound(format!("Ingredient {id} not found")));
        }
    }
    Ok(())
}

async fn store_image(images: &dyn ImageStore, data_uri: &str) -> Result<String, ApiError> {
    images
        .store(data_uri, RECIPE_IMAGE_DIR)
        .await
        .map_err(|e| e.into_api("image"))
}

async fn discard_image(images: &dyn ImageStore, url: &str) {
    if let Err(e) = images.remove(url).await {
        log::warn!("> Could not remove image {url}: {e}");
    }
}

pub async fn create<S: Store>(
    store: &S,
    images: &dyn ImageStore,
    session: &SessionData,
    form: RecipeForm,
) -> Result<RecipeRead, ApiError> {
    let recipe = form.validate(true)?;
    check_references(store, &recipe).await?;

    let image = match &recipe.image {
        Some(data) => Some(store_image(images, data).await?),
        None => None,
    };

    let short_code = || generate_short_code(SHORT_LINK_LENGTH);
    match insert_with_short_link(store, session.user_id(), recipe, image.clone(), short_code).await {
        Ok(created) => {
            log::info!(
                "> User {} created recipe {} ({})",
                session.user_id(),
                created.id,
                created.short_link
            );
            to_read_view(store, Some(session.user_id()), created).await
        }
        Err(e) => {
            if let Some(url) = image {
                discard_image(images, &url).await;
            }
            Err(e)
        }
    }
}

/// Short links are random; a taken one is regenerated a bounded number of times.
async fn insert_with_short_link<S: Store>(
    store: &S,
    author_id: Id,
    recipe: ValidRecipe,
    image: Option<String>,
    mut next_code: impl FnMut() -> String,
) -> Result<Recipe, ApiError> {
    for attempt in 1..=SHORT_LINK_ATTEMPTS {
        let new = NewRecipe {
            author_id,
            name: recipe.name.clone(),
            text: recipe.text.clone(),
            cooking_time: recipe.cooking_time,
            image: image.clone(),
            short_link: next_code(),
            tag_ids: recipe.tag_ids.clone(),
            parts: recipe.parts.clone(),
        };
        if let Some(created) = store.insert_recipe(new).await? {
            return Ok(created);
        }
        log::debug!("> Short link collision on attempt {attempt}");
    }
    Err(ApiError::Internal(String::from(
        "Could not allocate a unique short link",
    )))
}

/// Replaces the recipe's fields, tags and quantities. A missing image keeps the old one.
pub async fn update<S: Store>(
    store: &S,
    images: &dyn ImageStore,
    session: &SessionData,
    id: Id,
    form: RecipeForm,
) -> Result<RecipeRead, ApiError> {
    let existing = fetch(store, id).await?;
    ensure_author(session, existing.author_id)?;

    let recipe = form.validate(false)?;
    check_references(store, &recipe).await?;

    let image = match &recipe.image {
        Some(data) => Some(store_image(images, data).await?),
        None => None,
    };

    let changes = RecipeChanges {
        name: recipe.name,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
        image: image.clone(),
        tag_ids: recipe.tag_ids,
        parts: recipe.parts,
    };
    let updated = match store.update_recipe(id, changes).await {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(url) = &image {
                discard_image(images, url).await;
            }
            return Err(e);
        }
    };

    if let (Some(_), Some(old)) = (&image, &existing.image) {
        discard_image(images, old).await;
    }

    log::info!("> User {} updated recipe {id}", session.user_id());
    to_read_view(store, Some(session.user_id()), updated).await
}

pub async fn delete<S: Store>(
    store: &S,
    images: &dyn ImageStore,
    session: &SessionData,
    id: Id,
) -> Result<(), ApiError> {
    let existing = fetch(store, id).await?;
    ensure_author(session, existing.author_id)?;

    store.delete_recipe(id).await?;
    if let Some(url) = &existing.image {
        discard_image(images, url).await;
    }

    log::info!("> User {} deleted recipe {id}", session.user_id());
    Ok(())
}

pub async fn get<S: Store>(
    store: &S,
    viewer: Option<&SessionData>,
    id: Id,
) -> Result<RecipeRead, ApiError> {
    let recipe = fetch(store, id).await?;
    to_read_view(store, viewer.map(SessionData::user_id), recipe).await
}

/// Newest first.
pub async fn list<S: Store>(
    store: &S,
    viewer: Option<&SessionData>,
    query: RecipeQuery,
    page: PageRequest,
    base_url: &str,
) -> Result<PageContext<RecipeRead>, ApiError> {
    let viewer = viewer.map(SessionData::user_id);
    let filter = query.into_filter(viewer);
    let (recipes, total) = store.list_recipes(&filter, page.limit, page.offset).await?;

    let mut results = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        results.push(to_read_view(store, viewer, recipe).await?);
    }
    Ok(PageContext::from_rows(results, total, page, base_url))
}

/// The write shape of an existing recipe, for its author to edit.
pub async fn edit_form<S: Store>(
    store: &S,
    session: &SessionData,
    id: Id,
) -> Result<RecipeWrite, ApiError> {
    let recipe = fetch(store, id).await?;
    ensure_author(session, recipe.author_id)?;

    let tags = store.list_recipe_tags(id).await?;
    let parts = store.list_recipe_parts(id).await?;
    Ok(to_write_view(&recipe, &tags, &parts))
}

pub async fn get_link<S: Store>(
    store: &S,
    public_url: &str,
    id: Id,
) -> Result<ShortLink, ApiError> {
    let recipe = fetch(store, id).await?;
    Ok(ShortLink {
        short_link: format!("{public_url}/s/{}/", recipe.short_link),
    })
}

pub async fn resolve_short_link<S: Store>(store: &S, code: &str) -> Result<Id, ApiError> {
    store
        .find_recipe_by_short_link(code)
        .await?
        .map(|recipe| recipe.id)
        .ok_or_else(|| ApiError::NotFound(String::from("Short link not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        form::IngredientEntry,
        images::{MediaDir, PIXEL},
        memory::MemoryStore,
        schema::NewUser,
        schema::{Ingredient, Tag, User},
    };

    struct Fixture {
        store: MemoryStore,
        media: MediaDir,
        anna: SessionData,
        bob: SessionData,
        tags: Vec<Tag>,
        ingredients: Vec<Ingredient>,
    }

    async fn user(store: &MemoryStore, username: &str) -> SessionData {
        let user: User = store
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                first_name: String::from("First"),
                last_name: String::from("Last"),
                password: String::from("hash"),
            })
            .await
            .unwrap()
            .unwrap();
        SessionData { user }
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let anna = user(&store, "chef_anna").await;
        let bob = user(&store, "hungry_bob").await;
        let tags = vec![
            store.create_tag("Breakfast", "breakfast").await.unwrap(),
            store.create_tag("Dinner", "dinner").await.unwrap(),
        ];
        let ingredients = vec![
            store.create_ingredient("flour", "g").await.unwrap(),
            store.create_ingredient("milk", "ml").await.unwrap(),
            store.create_ingredient("egg", "pcs").await.unwrap(),
        ];
        let root = std::env::temp_dir().join(format!("foodgram-test-{}", uuid::Uuid::new_v4()));
        Fixture {
            store,
            media: MediaDir::new(root, "http://testserver"),
            anna,
            bob,
            tags,
            ingredients,
        }
    }

    fn form(fx: &Fixture) -> RecipeForm {
        RecipeForm {
            ingredients: Some(
                fx.ingredients
                    .iter()
                    .map(|i| IngredientEntry { id: i.id, amount: 100 })
                    .collect(),
            ),
            tags: Some(fx.tags.iter().map(|t| t.id).collect()),
            image: Some(PIXEL.to_string()),
            name: Some(String::from("Pancakes")),
            text: Some(String::from("Mix and fry")),
            cooking_time: Some(20),
        }
    }

    #[tokio::test]
    async fn create_links_every_tag_and_ingredient() {
        let fx = fixture().await;
        let recipe = create(&fx.store, &fx.media, &fx.anna, form(&fx)).await.unwrap();

        assert_eq!(recipe.tags.len(), 2);
        assert_eq!(recipe.ingredients.len(), 3);
        assert_eq!(recipe.author.id, fx.anna.user_id());
        assert!(!recipe.is_favorited);
        assert!(recipe.image.unwrap().starts_with("http://testserver/media/recipes/"));
    }

    #[tokio::test]
    async fn duplicate_ingredient_persists_nothing() {
        let fx = fixture().await;
        let mut form = form(&fx);
        form.ingredients = Some(vec![
            IngredientEntry { id: fx.ingredients[0].id, amount: 1 },
            IngredientEntry { id: fx.ingredients[0].id, amount: 2 },
        ]);

        let result = create(&fx.store, &fx.media, &fx.anna, form).await;
        assert!(matches!(result, Err(ApiError::Validation(ref e)) if e.contains("ingredients")));
        assert_eq!(fx.store.count_author_recipes(fx.anna.user_id()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_references() {
        let fx = fixture().await;

        let mut bad_tag = form(&fx);
        bad_tag.tags = Some(vec![fx.tags[0].id, 999]);
        assert!(matches!(
            create(&fx.store, &fx.media, &fx.anna, bad_tag).await,
            Err(ApiError::Validation(ref e)) if e.contains("tags")
        ));

        let mut bad_ingredient = form(&fx);
        bad_ingredient.ingredients = Some(vec![IngredientEntry { id: 999, amount: 5 }]);
        assert!(matches!(
            create(&fx.store, &fx.media, &fx.anna, bad_ingredient).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn only_the_author_may_change_a_recipe() {
        let fx = fixture().await;
        let recipe = create(&fx.store, &fx.media, &fx.anna, form(&fx)).await.unwrap();

        let mut changed = form(&fx);
        changed.name = Some(String::from("Crepes"));
        assert!(matches!(
            update(&fx.store, &fx.media, &fx.bob, recipe.id, changed.clone()).await,
            Err(ApiError::PermissionDenied(_))
        ));
        assert!(matches!(
            delete(&fx.store, &fx.media, &fx.bob, recipe.id).await,
            Err(ApiError::PermissionDenied(_))
        ));

        let updated = update(&fx.store, &fx.media, &fx.anna, recipe.id, changed)
            .await
            .unwrap();
        assert_eq!(updated.name, "Crepes");
    }

    #[tokio::test]
    async fn update_replaces_collections_and_keeps_image() {
        let fx = fixture().await;
        let recipe = create(&fx.store, &fx.media, &fx.anna, form(&fx)).await.unwrap();
        let original = fx.store.get_recipe(recipe.id).await.unwrap().unwrap();

        let changed = RecipeForm {
            ingredients: Some(vec![IngredientEntry { id: fx.ingredients[2].id, amount: 4 }]),
            tags: Some(vec![fx.tags[1].id]),
            image: None,
            ..form(&fx)
        };
        let updated = update(&fx.store, &fx.media, &fx.anna, recipe.id, changed)
            .await
            .unwrap();

        assert_eq!(updated.tags, vec![fx.tags[1].clone()]);
        assert_eq!(updated.ingredients.len(), 1);
        assert_eq!(updated.ingredients[0].amount, 4);
        assert_eq!(updated.image, original.image);

        let stored = fx.store.get_recipe(recipe.id).await.unwrap().unwrap();
        assert_eq!(stored.short_link, original.short_link);
    }

    #[tokio::test]
    async fn short_links_are_unique_and_resolve() {
        let fx = fixture().await;
        let mut links = HashSet::new();
        for _ in 0..5 {
            let recipe = create(&fx.store, &fx.media, &fx.anna, form(&fx)).await.unwrap();
            let link = get_link(&fx.store, "http://testserver", recipe.id).await.unwrap();
            let code = link
                .short_link
                .trim_start_matches("http://testserver/s/")
                .trim_end_matches('/')
                .to_string();
            assert_eq!(resolve_short_link(&fx.store, &code).await.unwrap(), recipe.id);
            assert!(links.insert(code));
        }
        assert!(matches!(
            resolve_short_link(&fx.store, "nope").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn short_link_collisions_regenerate_until_exhausted() {
        let fx = fixture().await;
        let taken = create(&fx.store, &fx.media, &fx.anna, form(&fx)).await.unwrap();
        let taken_code = fx.store.get_recipe(taken.id).await.unwrap().unwrap().short_link;

        let colliding = |collisions: usize| {
            let taken_code = taken_code.clone();
            let mut calls = 0;
            move || {
                calls += 1;
                if calls <= collisions {
                    taken_code.clone()
                } else {
                    format!("free{calls}")
                }
            }
        };

        let recipe = form(&fx).validate(true).unwrap();
        let created = insert_with_short_link(
            &fx.store,
            fx.anna.user_id(),
            recipe,
            None,
            colliding(SHORT_LINK_ATTEMPTS - 1),
        )
        .await
        .unwrap();
        assert_eq!(created.short_link, format!("free{SHORT_LINK_ATTEMPTS}"));

        let recipe = form(&fx).validate(true).unwrap();
        assert!(matches!(
            insert_with_short_link(
                &fx.store,
                fx.anna.user_id(),
                recipe,
                None,
                colliding(SHORT_LINK_ATTEMPTS),
            )
            .await,
            Err(ApiError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn list_filters() {
        let fx = fixture().await;
        let first = create(&fx.store, &fx.media, &fx.anna, form(&fx)).await.unwrap();
        let mut dinner = form(&fx);
        dinner.tags = Some(vec![fx.tags[1].id]);
        let second = create(&fx.store, &fx.media, &fx.bob, dinner).await.unwrap();

        let page = PageRequest::new(None, None, 6);
        let all = list(&fx.store, None, RecipeQuery::default(), page, "http://t/api/recipes/")
            .await
            .unwrap();
        assert_eq!(all.count, 2);
        assert_eq!(all.results[0].id, second.id);

        let query = RecipeQuery {
            tags: vec![String::from("breakfast")],
            ..Default::default()
        };
        let breakfast = list(&fx.store, None, query, page, "http://t/api/recipes/")
            .await
            .unwrap();
        assert_eq!(breakfast.count, 1);
        assert_eq!(breakfast.results[0].id, first.id);

        let query = RecipeQuery {
            author: Some(fx.bob.user_id()),
            ..Default::default()
        };
        let by_bob = list(&fx.store, None, query, page, "http://t/api/recipes/")
            .await
            .unwrap();
        assert_eq!(by_bob.count, 1);
        assert_eq!(by_bob.results[0].id, second.id);

        let query = RecipeQuery {
            is_favorited: true,
            ..Default::default()
        };
        let anonymous = list(&fx.store, None, query.clone(), page, "http://t/api/recipes/")
            .await
            .unwrap();
        assert_eq!(anonymous.count, 2);
        let favorites = list(&fx.store, Some(&fx.anna), query, page, "http://t/api/recipes/")
            .await
            .unwrap();
        assert_eq!(favorites.count, 0);
    }

    #[tokio::test]
    async fn edit_form_is_author_only() {
        let fx = fixture().await;
        let recipe = create(&fx.store, &fx.media, &fx.anna, form(&fx)).await.unwrap();

        let write = edit_form(&fx.store, &fx.anna, recipe.id).await.unwrap();
        assert_eq!(write.tags.len(), 2);
        assert_eq!(write.ingredients.len(), 3);
        assert!(edit_form(&fx.store, &fx.bob, recipe.id).await.is_err());
    }

    #[tokio::test]
    async fn delete_removes_recipe() {
        let fx = fixture().await;
        let recipe = create(&fx.store, &fx.media, &fx.anna, form(&fx)).await.unwrap();
        delete(&fx.store, &fx.media, &fx.anna, recipe.id).await.unwrap();
        assert!(matches!(
            get(&fx.store, None, recipe.id).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
