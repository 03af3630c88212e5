//! Favorites and the shopping cart share one add/remove protocol, picked by
//! [`RelationKind`].

use crate::{
    error::ApiError,
    jwt::SessionData,
    schema::{Id, Recipe, RelationKind},
    store::Store,
    views::RecipeShort,
};

async fn fetch<S: Store>(store: &S, recipe_id: Id) -> Result<Recipe, ApiError> {
    store
        .get_recipe(recipe_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Recipe {recipe_id} not found")))
}

pub async fn add<S: Store>(
    store: &S,
    kind: RelationKind,
    session: &SessionData,
    recipe_id: Id,
) -> Result<RecipeShort, ApiError> {
    let recipe = fetch(store, recipe_id).await?;

    if !store.add_relation(kind, session.user_id(), recipe_id).await? {
        return Err(ApiError::Conflict(String::from(kind.already_exists())));
    }

    log::debug!(
        "> User {} added recipe {recipe_id} to {}",
        session.user_id(),
        kind.table()
    );
    Ok(RecipeShort::from(recipe))
}

pub async fn remove<S: Store>(
    store: &S,
    kind: RelationKind,
    session: &SessionData,
    recipe_id: Id,
) -> Result<(), ApiError> {
    fetch(store, recipe_id).await?;

    if !store
        .remove_relation(kind, session.user_id(), recipe_id)
        .await?
    {
        return Err(ApiError::Missing(String::from(kind.not_present())));
    }

    log::debug!(
        "> User {} removed recipe {recipe_id} from {}",
        session.user_id(),
        kind.table()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::MemoryStore,
        schema::{IngredientAmount, NewRecipe, NewUser},
    };

    async fn setup() -> (MemoryStore, SessionData, Id) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                username: String::from("chef_anna"),
                email: String::from("anna@example.com"),
                first_name: String::from("Anna"),
                last_name: String::from("Smith"),
                password: String::from("hash"),
            })
            .await
            .unwrap()
            .unwrap();
        let tag = store.create_tag("Lunch", "lunch").await.unwrap();
        let flour = store.create_ingredient("flour", "g").await.unwrap();
        let recipe = store
            .insert_recipe(NewRecipe {
                author_id: user.id,
                name: String::from("Bread"),
                text: String::from("Bake"),
                cooking_time: 60,
                image: None,
                short_link: String::from("bread1"),
                tag_ids: vec![tag.id],
                parts: vec![IngredientAmount {
                    ingredient_id: flour.id,
                    amount: 500,
                }],
            })
            .await
            .unwrap()
            .unwrap();
        let session = SessionData { user };
        (store, session, recipe.id)
    }

    #[tokio::test]
    async fn second_add_conflicts_and_keeps_one_row() {
        for kind in [RelationKind::Favorite, RelationKind::Cart] {
            let (store, session, recipe_id) = setup().await;

            let short = add(&store, kind, &session, recipe_id).await.unwrap();
            assert_eq!(short.name, "Bread");
            assert!(matches!(
                add(&store, kind, &session, recipe_id).await,
                Err(ApiError::Conflict(_))
            ));
            assert_eq!(store.count_relations(kind, session.user_id()).await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn removing_absent_relation_is_a_bad_request() {
        let (store, session, recipe_id) = setup().await;

        assert!(matches!(
            remove(&store, RelationKind::Favorite, &session, recipe_id).await,
            Err(ApiError::Missing(_))
        ));

        add(&store, RelationKind::Favorite, &session, recipe_id)
            .await
            .unwrap();
        remove(&store, RelationKind::Favorite, &session, recipe_id)
            .await
            .unwrap();
        assert!(!store
            .has_relation(RelationKind::Favorite, session.user_id(), recipe_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_recipe_is_not_found() {
        let (store, session, _) = setup().await;
        assert!(matches!(
            add(&store, RelationKind::Cart, &session, 4242).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            remove(&store, RelationKind::Cart, &session, 4242).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn kinds_are_independent() {
        let (store, session, recipe_id) = setup().await;
        add(&store, RelationKind::Favorite, &session, recipe_id)
            .await
            .unwrap();
        add(&store, RelationKind::Cart, &session, recipe_id)
            .await
            .unwrap();
        remove(&store, RelationKind::Favorite, &session, recipe_id)
            .await
            .unwrap();
        assert!(store
            .has_relation(RelationKind::Cart, session.user_id(), recipe_id)
            .await
            .unwrap());
    }
}
