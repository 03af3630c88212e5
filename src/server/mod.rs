use std::{convert::Infallible, sync::Arc};

use warp::{filters::BoxedFilter, reply::Response, Filter, Reply};

use crate::{
    config::Config,
    error::ApiError,
    images::{ImageStore, MediaDir},
    jwt::TokenSigner,
    store::Store,
};

mod handlers;
mod rejection;
mod routes;

pub use rejection::handle_rejection;

/// Everything a request handler needs, shared behind an `Arc`.
pub struct AppState<S> {
    pub store: S,
    pub signer: TokenSigner,
    pub images: Arc<dyn ImageStore>,
    pub config: Config,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, config: Config) -> Result<Self, ApiError> {
        let signer = TokenSigner::new(&config.secret_key, config.token_ttl_hours)?;
        let images = Arc::new(MediaDir::new(&config.media_root, &config.public_url));

        Ok(Self {
            store,
            signer,
            images,
            config,
        })
    }

    /// Absolute url of an api path such as `/api/recipes/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.public_url)
    }
}

/// The full application: api, short links and media, with errors rendered as json.
pub fn app<S: Store>(
    state: Arc<AppState<S>>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path("media")
        .and(warp::fs::dir(state.config.media_root.clone()))
        .map(|file: warp::fs::File| file.into_response());

    routes::api(state.clone())
        .or(routes::short_links(state))
        .unify()
        .or(media)
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(warp::log("foodgram"))
}

pub async fn serve<S: Store>(state: Arc<AppState<S>>) {
    let addr = state.config.bind_addr;
    log::info!("> Listening on {addr}");
    warp::serve(app(state)).run(addr).await;
}

fn with_state<S: Store>(
    state: Arc<AppState<S>>,
) -> impl Filter<Extract = (Arc<AppState<S>>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

type Route = BoxedFilter<(Response,)>;

#[cfg(test)]
mod tests;
