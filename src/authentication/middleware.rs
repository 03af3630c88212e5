use std::sync::Arc;

use warp::{
    reject::{self, Rejection},
    Filter,
};

use super::jwt::{verify_session, SessionData};
use crate::{error::ApiError, server::AppState, store::Store};

/// Pulls the key out of `Authorization: Token <key>`. `Bearer` is accepted too.
fn token_from_header(header: Option<String>) -> Option<String> {
    let header = header?;
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        Some(token.to_string())
    } else {
        None
    }
}

/// Anonymous requests pass through as `None`. A token that is present but
/// invalid is still rejected.
pub fn with_possible_session<S: Store>(
    state: Arc<AppState<S>>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let state = state.clone();
        async move {
            match token_from_header(header) {
                None => Ok(None),
                Some(token) => verify_session(&state.store, &state.signer, &token)
                    .await
                    .map(Some)
                    .map_err(reject::custom),
            }
        }
    })
}

pub fn with_session<S: Store>(
    state: Arc<AppState<S>>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_possible_session(state).and_then(|session: Option<SessionData>| async move {
        session.ok_or_else(|| reject::custom(ApiError::Unauthenticated))
    })
}
