use std::collections::BTreeMap;

use crate::{
    error::ApiError,
    jwt::SessionData,
    schema::{RecipePart, RelationKind},
    store::Store,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Sums amounts per (ingredient name, unit). Lines come out ordered by unit,
/// then by name.
pub fn aggregate(parts: &[RecipePart]) -> Vec<ShoppingLine> {
    let mut totals: BTreeMap<(&str, &str), i64> = BTreeMap::new();
    for part in parts {
        *totals
            .entry((part.measurement_unit.as_str(), part.name.as_str()))
            .or_default() += i64::from(part.amount);
    }

    totals
        .into_iter()
        .map(|((unit, name), amount)| ShoppingLine {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        })
        .collect()
}

pub fn render(lines: &[ShoppingLine]) -> String {
    lines
        .iter()
        .map(|line| {
            format!(
                "- {} — {} {}",
                line.name, line.amount, line.measurement_unit
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The caller's cart as a plain text list.
pub async fn build<S: Store>(store: &S, session: &SessionData) -> Result<String, ApiError> {
    let user_id = session.user_id();
    if store.count_relations(RelationKind::Cart, user_id).await? == 0 {
        return Err(ApiError::EmptyCart);
    }

    let parts = store.list_cart_parts(user_id).await?;
    let lines = aggregate(&parts);
    log::debug!("> Built shopping list of {} lines for user {user_id}", lines.len());
    Ok(render(&lines))
}
