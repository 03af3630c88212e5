use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, QueryError},
    schema::{Id, RecipePart, RelationKind},
};

pub async fn add_relation(
    kind: RelationKind,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let table = kind.table();
    let result = sqlx::query(&format!(
        "INSERT INTO {table} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

pub async fn remove_relation(
    kind: RelationKind,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let table = kind.table();
    let result = sqlx::query(&format!(
        "DELETE FROM {table} WHERE user_id = $1 AND recipe_id = $2"
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

pub async fn has_relation(
    kind: RelationKind,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let table = kind.table();
    let result: Option<(Id,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {table} WHERE user_id = $1 AND recipe_id = $2"
    ))
    .bind(user_id)
    .bind(recipe_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.is_some())
}

pub async fn count_relations(
    kind: RelationKind,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<i64, ApiError> {
    let table = kind.table();
    let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table} WHERE user_id = $1"))
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(count.0)
}

pub async fn list_cart_parts(user_id: Id, pool: &Pool<Postgres>) -> Result<Vec<RecipePart>, ApiError> {
    let rows: Vec<RecipePart> = sqlx::query_as("
        SELECT iq.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name, i.measurement_unit AS measurement_unit, iq.amount AS amount
        FROM cart_items c
        INNER JOIN ingredient_quantities iq ON iq.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = iq.ingredient_id
        WHERE c.user_id = $1
        ORDER BY c.id, iq.id
    ")
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}
