use crate::{
    error::{ApiError, QueryError},
    schema::{Id, NewUser, User},
};

use sqlx::{Pool, Postgres};

pub async fn get_user(pool: &Pool<Postgres>, username: &str) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(&*pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&*pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(&*pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Creates a user; `password` must already be hashed
pub async fn create_user(user: NewUser, pool: &Pool<Postgres>) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (username, email, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(user.username)
    .bind(user.email)
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.password)
    .fetch_optional(&*pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn list_users(
    limit: i64,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<(Vec<User>, i64), ApiError> {
    let rows: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY id LIMIT $1 OFFSET $2")
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok((rows, total_count.0))
}

pub async fn update_password(
    user_id: Id,
    password_hash: &str,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

pub async fn update_avatar(
    user_id: Id,
    avatar: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
        .bind(avatar)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}
