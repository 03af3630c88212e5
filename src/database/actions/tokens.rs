use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, QueryError},
    schema::Id,
};

/// Stores `key` unless the user already has a token, then returns the stored key.
pub async fn get_or_create_token(user_id: Id, key: &str, pool: &Pool<Postgres>) -> Result<String, ApiError> {
    sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
        .bind(key)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    let row: (String,) = sqlx::query_as("SELECT key FROM auth_tokens WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row.0)
}

pub async fn find_token(key: &str, pool: &Pool<Postgres>) -> Result<Option<Id>, ApiError> {
    let row: Option<(Id,)> = sqlx::query_as("SELECT user_id FROM auth_tokens WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row.map(|r| r.0))
}

pub async fn delete_tokens(user_id: Id, pool: &Pool<Postgres>) -> Result<u64, ApiError> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(result.rows_affected())
}
