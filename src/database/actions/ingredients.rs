use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, QueryError},
    schema::{Id, Ingredient},
};

pub async fn create_ingredient(
    name: &str,
    measurement_unit: &str,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| ApiError::Conflict(format!("Ingredient '{name}' already exists")))
}

/// Case-insensitive name prefix search, alphabetical.
pub async fn list_ingredients(
    name_prefix: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ApiError> {
    let rows: Vec<Ingredient> = match name_prefix {
        Some(prefix) => {
            let pattern = format!("{}%", escape_like(prefix));
            sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name")
                .bind(pattern)
                .fetch_all(pool)
                .await
                .map_err(QueryError::from)?
        }
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn get_ingredients(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Ingredient>, ApiError> {
    let rows: Vec<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
