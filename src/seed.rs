use std::path::Path;

use serde::Deserialize;

use crate::{error::ApiError, store::Store};

#[derive(Deserialize, Debug, Default)]
pub struct SeedTag {
    pub name: String,
    pub slug: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct SeedIngredient {
    pub name: String,
    pub measurement_unit: String,
}

/// Reference data file: `{"tags": [...], "ingredients": [...]}`.
#[derive(Deserialize, Debug, Default)]
pub struct ReferenceData {
    #[serde(default)]
    pub tags: Vec<SeedTag>,
    #[serde(default)]
    pub ingredients: Vec<SeedIngredient>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub tags: usize,
    pub ingredients: usize,
    pub skipped: usize,
}

/// Inserts every record not already present. Rerunning is harmless.
pub async fn apply<S: Store>(store: &S, data: ReferenceData) -> Result<SeedReport, ApiError> {
    let mut report = SeedReport::default();

    let known_tags = store.list_tags().await?;
    for tag in data.tags {
        if known_tags
            .iter()
            .any(|t| t.name == tag.name || t.slug == tag.slug)
        {
            report.skipped += 1;
            continue;
        }
        match store.create_tag(&tag.name, &tag.slug).await {
            Ok(_) => report.tags += 1,
            Err(ApiError::Conflict(_)) => report.skipped += 1,
            Err(e) => return Err(e),
        }
    }

    let known_ingredients = store.list_ingredients(None).await?;
    for ingredient in data.ingredients {
        if known_ingredients.iter().any(|i| i.name == ingredient.name) {
            report.skipped += 1;
            continue;
        }
        match store
            .create_ingredient(&ingredient.name, &ingredient.measurement_unit)
            .await
        {
            Ok(_) => report.ingredients += 1,
            Err(ApiError::Conflict(_)) => report.skipped += 1,
            Err(e) => return Err(e),
        }
    }

    log::info!(
        "> Seeded {} tags and {} ingredients ({} already present)",
        report.tags,
        report.ingredients,
        report.skipped
    );
    Ok(report)
}

pub async fn apply_file<S: Store>(store: &S, path: &Path) -> Result<SeedReport, ApiError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ApiError::Internal(format!("Could not read {}: {e}", path.display())))?;
    let data: ReferenceData = serde_json::from_str(&raw)
        .map_err(|e| ApiError::Internal(format!("Malformed seed file {}: {e}", path.display())))?;
    apply(store, data).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn seeding_twice_skips_existing() {
        let store = MemoryStore::new();
        let raw = r#"{
            "tags": [{ "name": "Breakfast", "slug": "breakfast" }],
            "ingredients": [
                { "name": "flour", "measurement_unit": "g" },
                { "name": "milk", "measurement_unit": "ml" }
            ]
        }"#;

        let first = apply(&store, serde_json::from_str(raw).unwrap()).await.unwrap();
        assert_eq!(
            first,
            SeedReport {
                tags: 1,
                ingredients: 2,
                skipped: 0
            }
        );

        let second = apply(&store, serde_json::from_str(raw).unwrap()).await.unwrap();
        assert_eq!(second.skipped, 3);
        assert_eq!(store.list_ingredients(None).await.unwrap().len(), 2);
    }
}
