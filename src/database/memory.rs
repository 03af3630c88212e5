use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::ApiError,
    schema::{
        Id, Ingredient, IngredientAmount, NewRecipe, NewUser, Recipe, RecipeChanges, RecipeFilter, RecipePart,
        RelationKind, Tag, User,
    },
    store::Store,
};

#[derive(Debug, Clone)]
struct Quantity {
    recipe_id: Id,
    ingredient_id: Id,
    amount: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Membership {
    user_id: Id,
    recipe_id: Id,
}

#[derive(Debug, Default)]
struct Tables {
    sequence: Id,
    users: Vec<User>,
    tokens: Vec<(String, Id)>,
    tags: Vec<Tag>,
    ingredients: Vec<Ingredient>,
    recipes: Vec<Recipe>,
    recipe_tags: Vec<(Id, Id)>,
    quantities: Vec<Quantity>,
    favorites: Vec<Membership>,
    cart_items: Vec<Membership>,
    // (user, author)
    follows: Vec<(Id, Id)>,
}

impl Tables {
    fn next_id(&mut self) -> Id {
        self.sequence += 1;
        self.sequence
    }

    fn relation(&self, kind: RelationKind) -> &Vec<Membership> {
        match kind {
            RelationKind::Favorite => &self.favorites,
            RelationKind::Cart => &self.cart_items,
        }
    }

    fn relation_mut(&mut self, kind: RelationKind) -> &mut Vec<Membership> {
        match kind {
            RelationKind::Favorite => &mut self.favorites,
            RelationKind::Cart => &mut self.cart_items,
        }
    }

    fn parts(&self, recipe_ids: &[Id]) -> Vec<RecipePart> {
        recipe_ids
            .iter()
            .flat_map(|recipe_id| {
                self.quantities
                    .iter()
                    .filter(move |q| q.recipe_id == *recipe_id)
            })
            .filter_map(|q| {
                self.ingredients
                    .iter()
                    .find(|i| i.id == q.ingredient_id)
                    .map(|i| RecipePart {
                        recipe_id: q.recipe_id,
                        ingredient_id: i.id,
                        name: i.name.to_owned(),
                        measurement_unit: i.measurement_unit.to_owned(),
                        amount: q.amount,
                    })
            })
            .collect()
    }

    fn replace_links(&mut self, recipe_id: Id, tag_ids: &[Id], parts: &[IngredientAmount]) {
        self.recipe_tags.retain(|(r, _)| *r != recipe_id);
        self.quantities.retain(|q| q.recipe_id != recipe_id);

        self.recipe_tags
            .extend(tag_ids.iter().map(|tag_id| (recipe_id, *tag_id)));
        self.quantities.extend(parts.iter().map(|part| Quantity {
            recipe_id,
            ingredient_id: part.ingredient_id,
            amount: part.amount,
        }));
    }

    fn remove_recipe(&mut self, id: Id) -> bool {
        let before = self.recipes.len();
        self.recipes.retain(|r| r.id != id);
        self.recipe_tags.retain(|(r, _)| *r != id);
        self.quantities.retain(|q| q.recipe_id != id);
        self.favorites.retain(|m| m.recipe_id != id);
        self.cart_items.retain(|m| m.recipe_id != id);
        before != self.recipes.len()
    }
}

/// Store kept in process memory. Enforces the same uniqueness and cascade rules
/// as the Postgres schema.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T: Clone>(rows: &[T], limit: i64, offset: i64) -> Vec<T> {
    rows.iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<Option<User>, ApiError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| {
            u.username == user.username || u.email.eq_ignore_ascii_case(&user.email)
        }) {
            return Ok(None);
        }

        let row = User {
            id: tables.next_id(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password: user.password,
            avatar: None,
        };
        tables.users.push(row.clone());
        Ok(Some(row))
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), ApiError> {
        let tables = self.tables.read().await;
        Ok((
            page(&tables.users, limit, offset),
            tables.users.len() as i64,
        ))
    }

    async fn set_password(&self, user_id: Id, password_hash: &str) -> Result<(), ApiError> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.password = password_hash.to_string();
        }
        Ok(())
    }

    async fn set_avatar(&self, user_id: Id, avatar: Option<&str>) -> Result<(), ApiError> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.avatar = avatar.map(str::to_string);
        }
        Ok(())
    }

    async fn get_or_create_token(&self, user_id: Id, key: &str) -> Result<String, ApiError> {
        let mut tables = self.tables.write().await;
        if let Some((existing, _)) = tables.tokens.iter().find(|(_, owner)| *owner == user_id) {
            return Ok(existing.clone());
        }
        tables.tokens.push((key.to_string(), user_id));
        Ok(key.to_string())
    }

    async fn find_token(&self, key: &str) -> Result<Option<Id>, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tokens
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, user_id)| *user_id))
    }

    async fn delete_tokens(&self, user_id: Id) -> Result<u64, ApiError> {
        let mut tables = self.tables.write().await;
        let before = tables.tokens.len();
        tables.tokens.retain(|(_, owner)| *owner != user_id);
        Ok((before - tables.tokens.len()) as u64)
    }

    async fn create_tag(&self, name: &str, slug: &str) -> Result<Tag, ApiError> {
        let mut tables = self.tables.write().await;
        if tables.tags.iter().any(|t| t.name == name || t.slug == slug) {
            return Err(ApiError::Conflict(format!("Tag '{name}' already exists")));
        }
        let tag = Tag {
            id: tables.next_id(),
            name: name.to_string(),
            slug: slug.to_string(),
        };
        tables.tags.push(tag.clone());
        Ok(tag)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        Ok(self.tables.read().await.tags.clone())
    }

    async fn get_tags(&self, ids: &[Id]) -> Result<Vec<Tag>, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tags
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Ingredient, ApiError> {
        let mut tables = self.tables.write().await;
        if tables.ingredients.iter().any(|i| i.name == name) {
            return Err(ApiError::Conflict(format!(
                "Ingredient '{name}' already exists"
            )));
        }
        let ingredient = Ingredient {
            id: tables.next_id(),
            name: name.to_string(),
            measurement_unit: measurement_unit.to_string(),
        };
        tables.ingredients.push(ingredient.clone());
        Ok(ingredient)
    }

    async fn list_ingredients(
        &self,
        name_prefix: Option<&str>,
    ) -> Result<Vec<Ingredient>, ApiError> {
        let tables = self.tables.read().await;
        let prefix = name_prefix.map(str::to_lowercase);
        let mut rows: Vec<Ingredient> = tables
            .ingredients
            .iter()
            .filter(|i| match &prefix {
                Some(prefix) => i.name.to_lowercase().starts_with(prefix.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get_ingredients(&self, ids: &[Id]) -> Result<Vec<Ingredient>, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables
            .ingredients
            .iter()
            .filter(|i| ids.contains(&i.id))
            .cloned()
            .collect())
    }

    async fn insert_recipe(&self, recipe: NewRecipe) -> Result<Option<Recipe>, ApiError> {
        let mut tables = self.tables.write().await;
        if tables
            .recipes
            .iter()
            .any(|r| r.short_link == recipe.short_link)
        {
            return Ok(None);
        }

        let row = Recipe {
            id: tables.next_id(),
            author_id: recipe.author_id,
            name: recipe.name,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
            image: recipe.image,
            short_link: recipe.short_link,
        };
        tables.replace_links(row.id, &recipe.tag_ids, &recipe.parts);
        tables.recipes.push(row.clone());
        Ok(Some(row))
    }

    async fn update_recipe(&self, id: Id, changes: RecipeChanges) -> Result<Recipe, ApiError> {
        let mut tables = self.tables.write().await;
        let row = {
            let recipe = tables
                .recipes
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| ApiError::NotFound(format!("No recipe exists with id {id}")))?;
            recipe.name = changes.name;
            recipe.text = changes.text;
            recipe.cooking_time = changes.cooking_time;
            if let Some(image) = changes.image {
                recipe.image = Some(image);
            }
            recipe.clone()
        };
        tables.replace_links(id, &changes.tag_ids, &changes.parts);
        Ok(row)
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, ApiError> {
        Ok(self.tables.write().await.remove_recipe(id))
    }

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables.recipes.iter().find(|r| r.id == id).cloned())
    }

    async fn find_recipe_by_short_link(&self, code: &str) -> Result<Option<Recipe>, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipes
            .iter()
            .find(|r| r.short_link == code)
            .cloned())
    }

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recipe>, i64), ApiError> {
        let tables = self.tables.read().await;
        let tagged = |recipe_id: Id| {
            tables.recipe_tags.iter().any(|(r, tag_id)| {
                *r == recipe_id
                    && tables
                        .tags
                        .iter()
                        .any(|t| t.id == *tag_id && filter.tags.contains(&t.slug))
            })
        };
        let member = |kind: RelationKind, user_id: Id, recipe_id: Id| {
            tables
                .relation(kind)
                .contains(&Membership { user_id, recipe_id })
        };

        let mut rows: Vec<Recipe> = tables
            .recipes
            .iter()
            .filter(|r| filter.author.map_or(true, |author| r.author_id == author))
            .filter(|r| filter.tags.is_empty() || tagged(r.id))
            .filter(|r| {
                filter
                    .favorited_by
                    .map_or(true, |user_id| member(RelationKind::Favorite, user_id, r.id))
            })
            .filter(|r| {
                filter
                    .in_cart_of
                    .map_or(true, |user_id| member(RelationKind::Cart, user_id, r.id))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));

        let total = rows.len() as i64;
        Ok((page(&rows, limit, offset), total))
    }

    async fn list_recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, ApiError> {
        let tables = self.tables.read().await;
        let mut tags: Vec<Tag> = tables
            .tags
            .iter()
            .filter(|t| tables.recipe_tags.contains(&(recipe_id, t.id)))
            .cloned()
            .collect();
        tags.sort_by_key(|t| t.id);
        Ok(tags)
    }

    async fn list_recipe_parts(&self, recipe_id: Id) -> Result<Vec<RecipePart>, ApiError> {
        Ok(self.tables.read().await.parts(&[recipe_id]))
    }

    async fn list_author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, ApiError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Recipe> = tables
            .recipes
            .iter()
            .filter(|r| r.author_id == author_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        if let Some(limit) = limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(rows)
    }

    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipes
            .iter()
            .filter(|r| r.author_id == author_id)
            .count() as i64)
    }

    async fn add_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, ApiError> {
        let mut tables = self.tables.write().await;
        let membership = Membership { user_id, recipe_id };
        let rows = tables.relation_mut(kind);
        if rows.contains(&membership) {
            return Ok(false);
        }
        rows.push(membership);
        Ok(true)
    }

    async fn remove_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, ApiError> {
        let mut tables = self.tables.write().await;
        let membership = Membership { user_id, recipe_id };
        let rows = tables.relation_mut(kind);
        let before = rows.len();
        rows.retain(|m| *m != membership);
        Ok(before != rows.len())
    }

    async fn has_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables
            .relation(kind)
            .contains(&Membership { user_id, recipe_id }))
    }

    async fn count_relations(&self, kind: RelationKind, user_id: Id) -> Result<i64, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables
            .relation(kind)
            .iter()
            .filter(|m| m.user_id == user_id)
            .count() as i64)
    }

    async fn list_cart_parts(&self, user_id: Id) -> Result<Vec<RecipePart>, ApiError> {
        let tables = self.tables.read().await;
        let recipe_ids: Vec<Id> = tables
            .cart_items
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.recipe_id)
            .collect();
        Ok(tables.parts(&recipe_ids))
    }

    async fn add_follow(&self, user_id: Id, author_id: Id) -> Result<bool, ApiError> {
        let mut tables = self.tables.write().await;
        if tables.follows.contains(&(user_id, author_id)) {
            return Ok(false);
        }
        tables.follows.push((user_id, author_id));
        Ok(true)
    }

    async fn remove_follow(&self, user_id: Id, author_id: Id) -> Result<bool, ApiError> {
        let mut tables = self.tables.write().await;
        let before = tables.follows.len();
        tables.follows.retain(|edge| *edge != (user_id, author_id));
        Ok(before != tables.follows.len())
    }

    async fn is_following(&self, user_id: Id, author_id: Id) -> Result<bool, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables.follows.contains(&(user_id, author_id)))
    }

    async fn list_followed(
        &self,
        user_id: Id,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), ApiError> {
        let tables = self.tables.read().await;
        let authors: Vec<User> = tables
            .follows
            .iter()
            .filter(|(user, _)| *user == user_id)
            .filter_map(|(_, author)| tables.users.iter().find(|u| u.id == *author).cloned())
            .collect();
        let total = authors.len() as i64;
        Ok((page(&authors, limit, offset), total))
    }
}
