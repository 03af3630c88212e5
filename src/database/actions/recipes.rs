use crate::{
    error::{ApiError, QueryError},
    schema::{Id, IngredientAmount, NewRecipe, Recipe, RecipeChanges, RecipeFilter, RecipePart},
};

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

fn push_filter(query_builder: &mut QueryBuilder<Postgres>, filter: &RecipeFilter) {
    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query_builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }
    if let Some(user_id) = filter.favorited_by {
        query_builder
            .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
    if let Some(user_id) = filter.in_cart_of {
        query_builder
            .push(" AND EXISTS (SELECT 1 FROM cart_items c WHERE c.recipe_id = r.id AND c.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
}

/// Returns one page of matching recipes and the number of matches overall.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    limit: i64,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<(Vec<Recipe>, i64), ApiError> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.* FROM recipes r WHERE TRUE");
    push_filter(&mut query_builder, filter);
    query_builder
        .push(" ORDER BY r.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<Recipe> = query_builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
    push_filter(&mut count_builder, filter);

    let total_count: (i64,) = count_builder
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok((rows, total_count.0))
}

pub async fn list_recipe_parts(pool: &Pool<Postgres>, recipe_id: Id) -> Result<Vec<RecipePart>, ApiError> {
    let rows: Vec<RecipePart> = sqlx::query_as("
        SELECT iq.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name, i.measurement_unit AS measurement_unit, iq.amount AS amount
        FROM ingredient_quantities iq
        INNER JOIN ingredients i ON i.id = iq.ingredient_id
        WHERE iq.recipe_id = $1
        ORDER BY iq.id
    ")
    .bind(recipe_id)
    .fetch_all(pool).await.map_err(QueryError::from)?;

    Ok(rows)
}

/// Inserts the recipe row, its tags and its quantities in one transaction.
/// Returns `None` if the short link collides with an existing recipe.
pub async fn create_recipe(recipe: NewRecipe, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let row: Option<Recipe> = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, cooking_time, image, short_link)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (short_link) DO NOTHING
        RETURNING *
    ",
    )
    .bind(recipe.author_id)
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .bind(&recipe.image)
    .bind(&recipe.short_link)
    .fetch_optional(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    let Some(row) = row else {
        tr.rollback()
            .await
            .map_err(|_| QueryError::new("Could not roll back transaction".to_owned()))?;
        return Ok(None);
    };

    insert_tags(&mut tr, row.id, &recipe.tag_ids).await?;
    insert_parts(&mut tr, row.id, &recipe.parts).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    Ok(Some(row))
}

pub async fn update_recipe(id: Id, changes: RecipeChanges, pool: &Pool<Postgres>) -> Result<Recipe, ApiError> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let row: Option<Recipe> = sqlx::query_as(
        "
        UPDATE recipes SET name = $1, text = $2, cooking_time = $3, image = COALESCE($4, image)
        WHERE id = $5
        RETURNING *
    ",
    )
    .bind(&changes.name)
    .bind(&changes.text)
    .bind(changes.cooking_time)
    .bind(&changes.image)
    .bind(id)
    .fetch_optional(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    let row = row.ok_or_else(|| ApiError::NotFound(format!("No recipe exists with id {id}")))?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM ingredient_quantities WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    insert_tags(&mut tr, id, &changes.tag_ids).await?;
    insert_parts(&mut tr, id, &changes.parts).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    Ok(row)
}

async fn insert_tags(
    tr: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    tag_ids: &[Id],
) -> Result<(), ApiError> {
    if tag_ids.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query_builder.push_values(tag_ids.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

async fn insert_parts(
    tr: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    parts: &[IngredientAmount],
) -> Result<(), ApiError> {
    if parts.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO ingredient_quantities (recipe_id, ingredient_id, amount) ");
    query_builder.push_values(parts.iter(), |mut b, part| {
        b.push_bind(recipe_id)
            .push_bind(part.ingredient_id)
            .push_bind(part.amount);
    });

    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Quantities, tag links and relations go through `ON DELETE CASCADE`.
pub async fn delete_recipe(id: Id, pool: &Pool<Postgres>) -> Result<bool, ApiError> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(&*pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn find_recipe_by_short_link(code: &str, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE short_link = $1")
        .bind(code)
        .fetch_optional(&*pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn list_author_recipes(
    author_id: Id,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, ApiError> {
    // LIMIT NULL means no limit
    let limit = limit.map(|limit| limit.max(0));
    let rows: Vec<Recipe> =
        sqlx::query_as("SELECT * FROM recipes WHERE author_id = $1 ORDER BY id DESC LIMIT $2")
            .bind(author_id)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn count_author_recipes(author_id: Id, pool: &Pool<Postgres>) -> Result<i64, ApiError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(count.0)
}
