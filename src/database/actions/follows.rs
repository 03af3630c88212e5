use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, QueryError},
    schema::{Id, User},
};

pub async fn add_follow(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<bool, ApiError> {
    let result = sqlx::query(
        "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

pub async fn remove_follow(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<bool, ApiError> {
    let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

pub async fn is_following(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<bool, ApiError> {
    let row: Option<(Id,)> =
        sqlx::query_as("SELECT author_id FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row.is_some())
}

pub async fn list_followed(
    user_id: Id,
    limit: i64,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<(Vec<User>, i64), ApiError> {
    let rows: Vec<User> = sqlx::query_as(
        "
        SELECT u.*
        FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1
        ORDER BY f.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM follows WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok((rows, total_count.0))
}
