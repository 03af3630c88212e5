use std::{error::Error, sync::Arc};

use foodgram_sdk::{
    config::Config,
    memory::MemoryStore,
    seed,
    server::{self, AppState},
    store::Store,
};
use sqlx::postgres::PgPoolOptions;

const MAX_CONNECTIONS: u32 = 10;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("> {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;

    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect(&url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            log::info!("> Connected to postgres, migrations applied");
            start(pool, config).await
        }
        None => {
            log::warn!("> DATABASE_URL not set, using the in-process store");
            start(MemoryStore::new(), config).await
        }
    }
}

async fn start<S: Store>(store: S, config: Config) -> Result<(), Box<dyn Error>> {
    if let Some(path) = &config.seed_file {
        seed::apply_file(&store, path).await?;
    }
    tokio::fs::create_dir_all(&config.media_root).await?;

    let state = Arc::new(AppState::new(store, config)?);
    server::serve(state).await;
    Ok(())
}
