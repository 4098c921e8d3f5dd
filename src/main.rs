use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_console::api::FeedApiClient;
use feed_console::config::Config;
use feed_console::console::Console;
use feed_console::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feed_console=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("FEED_CONSOLE_CONFIG").unwrap_or_else(|_| "console.toml".to_string());
    let config = Config::load_or_default(&config_path)?;
    info!("Using Feed API at {}", config.api_base);

    let api = FeedApiClient::new(
        config.api_base.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let console = Arc::new(Console::new(api, config.link_missing_comments));

    let state = Arc::new(AppState { console });
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Console starting on http://{}", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
