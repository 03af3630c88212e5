use crate::{
    error::{ApiError, QueryError},
    schema::{Id, Tag},
};

use sqlx::{Pool, Postgres};

pub async fn create_tag(name: &str, slug: &str, pool: &Pool<Postgres>) -> Result<Tag, ApiError> {
    let tag: Option<Tag> = sqlx::query_as(
        "INSERT INTO tags (name, slug) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *",
    )
    .bind(name)
    .bind(slug)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    tag.ok_or_else(|| ApiError::Conflict(format!("Tag '{name}' already exists")))
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, ApiError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn get_tags(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Tag>, ApiError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = ANY($1) ORDER BY id")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn list_recipe_tags(pool: &Pool<Postgres>, recipe_id: Id) -> Result<Vec<Tag>, ApiError> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(list)
}
