use crate::{error::ApiError, jwt::SessionData, schema::Id};

/// Writes to a recipe belong to its author. Safe methods are routed without
/// this check, and `/users/me/` routes take their subject from the session.
pub fn ensure_author(session: &SessionData, author_id: Id) -> Result<(), ApiError> {
    if session.user_id() != author_id {
        return Err(ApiError::PermissionDenied(String::from(
            "Only the author may change this recipe",
        )));
    }
    Ok(())
}
