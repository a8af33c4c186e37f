//! Crew roster service.
//!
//! Serves the crew roster from SQLite over a small REST API.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crew_roster::config::Config;
use crew_roster::db::{self, Repository};
use crew_roster::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting crew roster service");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        page_size = config.page_size,
        debounce_ms = config.search_debounce.as_millis() as u64,
        timeout_ms = config.request_timeout.as_millis() as u64,
        "Engine settings"
    );

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (CREW_API_PSK). Authentication is disabled!");
    }

    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));
    tracing::info!("Roster holds {} crew members", repo.count_crew().await?);

    let state = AppState {
        repo,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
