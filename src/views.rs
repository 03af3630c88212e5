//! External representations. Read shapes are fully hydrated and carry
//! fields computed for the viewer; the write shape only references ids.

use serde::Serialize;

use crate::{
    error::ApiError,
    form::IngredientEntry,
    schema::{Id, Recipe, RecipePart, RelationKind, Tag, User},
    store::Store,
};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserRead {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub avatar: Option<String>,
}

/// Returned once, on registration.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserCreated {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for UserCreated {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct QuantityRead {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipePart> for QuantityRead {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.ingredient_id,
            name: part.name,
            measurement_unit: part.measurement_unit,
            amount: part.amount,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeRead {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserRead,
    pub ingredients: Vec<QuantityRead>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeShort {
    pub id: Id,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

impl From<Recipe> for RecipeShort {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            image: recipe.image,
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeWrite {
    pub ingredients: Vec<IngredientEntry>,
    pub tags: Vec<Id>,
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FollowedAuthor {
    #[serde(flatten)]
    pub user: UserRead,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ShortLink {
    #[serde(rename = "short-link")]
    pub short_link: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AvatarRead {
    pub avatar: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenRead {
    pub auth_token: String,
}

pub async fn user_to_read_view<S: Store>(
    store: &S,
    viewer: Option<Id>,
    user: User,
) -> Result<UserRead, ApiError> {
    let is_subscribed = match viewer {
        Some(viewer) if viewer != user.id => store.is_following(viewer, user.id).await?,
        _ => false,
    };

    Ok(UserRead {
        email: user.email,
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed,
        avatar: user.avatar,
    })
}

pub async fn to_read_view<S: Store>(
    store: &S,
    viewer: Option<Id>,
    recipe: Recipe,
) -> Result<RecipeRead, ApiError> {
    let author = store
        .get_user(recipe.author_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Recipe {} has no author", recipe.id)))?;
    let author = user_to_read_view(store, viewer, author).await?;
    let tags = store.list_recipe_tags(recipe.id).await?;
    let ingredients = store
        .list_recipe_parts(recipe.id)
        .await?
        .into_iter()
        .map(QuantityRead::from)
        .collect();

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            store
                .has_relation(RelationKind::Favorite, viewer, recipe.id)
                .await?,
            store.has_relation(RelationKind::Cart, viewer, recipe.id).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeRead {
        id: recipe.id,
        tags,
        author,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub fn to_write_view(recipe: &Recipe, tags: &[Tag], parts: &[RecipePart]) -> RecipeWrite {
    RecipeWrite {
        ingredients: parts
            .iter()
            .map(|part| IngredientEntry {
                id: part.ingredient_id,
                amount: part.amount,
            })
            .collect(),
        tags: tags.iter().map(|tag| tag.id).collect(),
        image: recipe.image.to_owned(),
        name: recipe.name.to_owned(),
        text: recipe.text.to_owned(),
        cooking_time: recipe.cooking_time,
    }
}

/// An author with their newest recipes, `recipes_limit` of them when given.
pub async fn followed_author_view<S: Store>(
    store: &S,
    viewer: Option<Id>,
    author: User,
    recipes_limit: Option<i64>,
) -> Result<FollowedAuthor, ApiError> {
    let recipes = store
        .list_author_recipes(author.id, recipes_limit)
        .await?
        .into_iter()
        .map(RecipeShort::from)
        .collect();
    let recipes_count = store.count_author_recipes(author.id).await?;

    Ok(FollowedAuthor {
        user: user_to_read_view(store, viewer, author).await?,
        recipes,
        recipes_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipe() -> Recipe {
        Recipe {
            id: 7,
            author_id: 1,
            name: String::from("Pancakes"),
            text: String::from("Mix and fry"),
            cooking_time: 20,
            image: Some(String::from("http://x/media/recipes/a.png")),
            short_link: String::from("abc123"),
        }
    }

    #[test]
    fn write_view_references_ids_only() {
        let tags = vec![Tag {
            id: 3,
            name: String::from("Breakfast"),
            slug: String::from("breakfast"),
        }];
        let parts = vec![RecipePart {
            recipe_id: 7,
            ingredient_id: 11,
            name: String::from("flour"),
            measurement_unit: String::from("g"),
            amount: 200,
        }];

        let view = serde_json::to_value(to_write_view(&recipe(), &tags, &parts)).unwrap();
        assert_eq!(
            view,
            json!({
                "ingredients": [{ "id": 11, "amount": 200 }],
                "tags": [3],
                "image": "http://x/media/recipes/a.png",
                "name": "Pancakes",
                "text": "Mix and fry",
                "cooking_time": 20,
            })
        );
    }

    #[test]
    fn short_link_uses_dashed_key() {
        let link = ShortLink {
            short_link: String::from("http://x/s/abc123/"),
        };
        assert_eq!(
            serde_json::to_value(link).unwrap(),
            json!({ "short-link": "http://x/s/abc123/" })
        );
    }

    #[test]
    fn followed_author_is_flat() {
        let author = FollowedAuthor {
            user: UserRead {
                email: String::from("anna@example.com"),
                id: 1,
                username: String::from("chef_anna"),
                first_name: String::from("Anna"),
                last_name: String::from("Smith"),
                is_subscribed: true,
                avatar: None,
            },
            recipes: vec![RecipeShort::from(recipe())],
            recipes_count: 1,
        };
        let value = serde_json::to_value(author).unwrap();
        assert_eq!(value["username"], "chef_anna");
        assert_eq!(value["recipes"][0]["id"], 7);
        assert_eq!(value["recipes_count"], 1);
    }
}
