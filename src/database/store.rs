use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    actions::{follows, ingredients, recipes, relations, tags, tokens, users},
    error::ApiError,
    schema::{
        Id, Ingredient, NewRecipe, NewUser, Recipe, RecipeChanges, RecipeFilter, RecipePart,
        RelationKind, Tag, User,
    },
};

/// Repository over every persisted record. Relation traversal is an explicit call,
/// never a lazy field access.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    // users

    /// `None` when the username or email is already taken.
    async fn create_user(&self, user: NewUser) -> Result<Option<User>, ApiError>;
    async fn get_user(&self, id: Id) -> Result<Option<User>, ApiError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;
    async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), ApiError>;
    async fn set_password(&self, user_id: Id, password_hash: &str) -> Result<(), ApiError>;
    async fn set_avatar(&self, user_id: Id, avatar: Option<&str>) -> Result<(), ApiError>;

    // tokens

    /// One token per user: returns the existing key, or stores `key`.
    async fn get_or_create_token(&self, user_id: Id, key: &str) -> Result<String, ApiError>;
    async fn find_token(&self, key: &str) -> Result<Option<Id>, ApiError>;
    async fn delete_tokens(&self, user_id: Id) -> Result<u64, ApiError>;

    // reference data

    async fn create_tag(&self, name: &str, slug: &str) -> Result<Tag, ApiError>;
    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError>;
    async fn get_tags(&self, ids: &[Id]) -> Result<Vec<Tag>, ApiError>;
    async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Ingredient, ApiError>;
    async fn list_ingredients(&self, name_prefix: Option<&str>)
        -> Result<Vec<Ingredient>, ApiError>;
    async fn get_ingredients(&self, ids: &[Id]) -> Result<Vec<Ingredient>, ApiError>;

    // recipes

    /// Writes the recipe, its tag links and its quantities as one unit.
    /// `None` when the short link is already taken.
    async fn insert_recipe(&self, recipe: NewRecipe) -> Result<Option<Recipe>, ApiError>;
    /// Replaces tags and quantities wholesale. The short link is left alone.
    async fn update_recipe(&self, id: Id, changes: RecipeChanges) -> Result<Recipe, ApiError>;
    async fn delete_recipe(&self, id: Id) -> Result<bool, ApiError>;
    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, ApiError>;
    async fn find_recipe_by_short_link(&self, code: &str) -> Result<Option<Recipe>, ApiError>;
    /// Newest first, with the total number of matches.
    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recipe>, i64), ApiError>;
    async fn list_recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, ApiError>;
    async fn list_recipe_parts(&self, recipe_id: Id) -> Result<Vec<RecipePart>, ApiError>;
    async fn list_author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, ApiError>;
    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, ApiError>;

    // favorites / cart

    /// `false` when the pair already exists.
    async fn add_relation(&self, kind: RelationKind, user_id: Id, recipe_id: Id)
        -> Result<bool, ApiError>;
    /// `false` when there was nothing to remove.
    async fn remove_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, ApiError>;
    async fn has_relation(&self, kind: RelationKind, user_id: Id, recipe_id: Id)
        -> Result<bool, ApiError>;
    async fn count_relations(&self, kind: RelationKind, user_id: Id) -> Result<i64, ApiError>;
    /// Every quantity line of every recipe in the user's cart.
    async fn list_cart_parts(&self, user_id: Id) -> Result<Vec<RecipePart>, ApiError>;

    // follows

    /// `false` when the edge already exists.
    async fn add_follow(&self, user_id: Id, author_id: Id) -> Result<bool, ApiError>;
    async fn remove_follow(&self, user_id: Id, author_id: Id) -> Result<bool, ApiError>;
    async fn is_following(&self, user_id: Id, author_id: Id) -> Result<bool, ApiError>;
    async fn list_followed(
        &self,
        user_id: Id,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), ApiError>;
}

#[async_trait]
impl Store for Pool<Postgres> {
    async fn create_user(&self, user: NewUser) -> Result<Option<User>, ApiError> {
        users::create_user(user, self).await
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, ApiError> {
        users::get_user_by_id(self, id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        users::get_user_by_email(self, email).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        users::get_user(self, username).await
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), ApiError> {
        users::list_users(limit, offset, self).await
    }

    async fn set_password(&self, user_id: Id, password_hash: &str) -> Result<(), ApiError> {
        users::update_password(user_id, password_hash, self).await
    }

    async fn set_avatar(&self, user_id: Id, avatar: Option<&str>) -> Result<(), ApiError> {
        users::update_avatar(user_id, avatar, self).await
    }

    async fn get_or_create_token(&self, user_id: Id, key: &str) -> Result<String, ApiError> {
        tokens::get_or_create_token(user_id, key, self).await
    }

    async fn find_token(&self, key: &str) -> Result<Option<Id>, ApiError> {
        tokens::find_token(key, self).await
    }

    async fn delete_tokens(&self, user_id: Id) -> Result<u64, ApiError> {
        tokens::delete_tokens(user_id, self).await
    }

    async fn create_tag(&self, name: &str, slug: &str) -> Result<Tag, ApiError> {
        tags::create_tag(name, slug, self).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        tags::list_tags(self).await
    }

    async fn get_tags(&self, ids: &[Id]) -> Result<Vec<Tag>, ApiError> {
        tags::get_tags(ids, self).await
    }

    async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Ingredient, ApiError> {
        ingredients::create_ingredient(name, measurement_unit, self).await
    }

    async fn list_ingredients(
        &self,
        name_prefix: Option<&str>,
    ) -> Result<Vec<Ingredient>, ApiError> {
        ingredients::list_ingredients(name_prefix, self).await
    }

    async fn get_ingredients(&self, ids: &[Id]) -> Result<Vec<Ingredient>, ApiError> {
        ingredients::get_ingredients(ids, self).await
    }

    async fn insert_recipe(&self, recipe: NewRecipe) -> Result<Option<Recipe>, ApiError> {
        recipes::create_recipe(recipe, self).await
    }

    async fn update_recipe(&self, id: Id, changes: RecipeChanges) -> Result<Recipe, ApiError> {
        recipes::update_recipe(id, changes, self).await
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, ApiError> {
        recipes::delete_recipe(id, self).await
    }

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, ApiError> {
        recipes::get_recipe(id, self).await
    }

    async fn find_recipe_by_short_link(&self, code: &str) -> Result<Option<Recipe>, ApiError> {
        recipes::find_recipe_by_short_link(code, self).await
    }

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recipe>, i64), ApiError> {
        recipes::fetch_recipes(filter, limit, offset, self).await
    }

    async fn list_recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, ApiError> {
        tags::list_recipe_tags(self, recipe_id).await
    }

    async fn list_recipe_parts(&self, recipe_id: Id) -> Result<Vec<RecipePart>, ApiError> {
        recipes::list_recipe_parts(self, recipe_id).await
    }

    async fn list_author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, ApiError> {
        recipes::list_author_recipes(author_id, limit, self).await
    }

    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, ApiError> {
        recipes::count_author_recipes(author_id, self).await
    }

    async fn add_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, ApiError> {
        relations::add_relation(kind, user_id, recipe_id, self).await
    }

    async fn remove_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, ApiError> {
        relations::remove_relation(kind, user_id, recipe_id, self).await
    }

    async fn has_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, ApiError> {
        relations::has_relation(kind, user_id, recipe_id, self).await
    }

    async fn count_relations(&self, kind: RelationKind, user_id: Id) -> Result<i64, ApiError> {
        relations::count_relations(kind, user_id, self).await
    }

    async fn list_cart_parts(&self, user_id: Id) -> Result<Vec<RecipePart>, ApiError> {
        relations::list_cart_parts(user_id, self).await
    }

    async fn add_follow(&self, user_id: Id, author_id: Id) -> Result<bool, ApiError> {
        follows::add_follow(user_id, author_id, self).await
    }

    async fn remove_follow(&self, user_id: Id, author_id: Id) -> Result<bool, ApiError> {
        follows::remove_follow(user_id, author_id, self).await
    }

    async fn is_following(&self, user_id: Id, author_id: Id) -> Result<bool, ApiError> {
        follows::is_following(user_id, author_id, self).await
    }

    async fn list_followed(
        &self,
        user_id: Id,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), ApiError> {
        follows::list_followed(user_id, limit, offset, self).await
    }
}
