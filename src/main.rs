// src/main.rs

use std::sync::Arc;

use tracing::info;

use enquiry_chat_server::{app, config::Config, state::AppState, store::PgMessageStore};

/// The main entry point for our application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may be set directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let store = PgMessageStore::connect(&config.database_url).await?;
    info!("database setup complete");

    let state = AppState::new(Arc::new(store));
    let router = app(state);

    info!("chat server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, router.into_make_service()).await?;

    Ok(())
}
