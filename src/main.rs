use std::sync::Arc;
use std::time::Duration;

use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedpress::config::Config;
use feedpress::fetcher::Fetcher;
use feedpress::routes::{self, AppState};
use feedpress::store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedpress=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load_or_default("blog.toml")?;
    info!("Mirroring feed {}", config.feed_url);

    // Pick the post store once; there is no reconnect later
    let store = store::connect(config.database_url.as_deref()).await;
    info!("Using {} post store", store.backend());

    let fetcher = Arc::new(Fetcher::new(Duration::from_secs(config.fetch_timeout_secs))?);

    // Create app state
    let state = Arc::new(AppState::new(&config, store, fetcher));

    // Build router
    let app = routes::router(state)
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server starting on http://localhost:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
