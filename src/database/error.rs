use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use warp::{http::StatusCode, reject::Reject};

#[derive(Debug, Error)]
#[error("{info}")]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("Column not found: {e}")),
            e => Self::new(format!("{e}")),
        }
    }
}

/// Messages keyed by the request field they complain about.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Uniqueness violation on a favorite, cart entry or follow.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// Removal of a relation that does not exist.
    #[error("{0}")]
    Missing(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Authentication credentials were not provided")]
    Unauthenticated,

    #[error("Shopping cart is empty")]
    EmptyCart,

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ApiError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::Conflict(_)
            | ApiError::Missing(_)
            | ApiError::EmptyCart => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) | ApiError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::Internal(_) | ApiError::Query(_) => {
                json!({ "detail": "Internal server error" })
            }
            e => json!({ "detail": e.to_string() }),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(value: sqlx::Error) -> Self {
        Self::Query(QueryError::from(value))
    }
}

impl Reject for ApiError {}
