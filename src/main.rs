use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use scrobble_relay::config::Config;
use scrobble_relay::services::{set_proxy, DrainScheduler, ErrorPolicy, LastfmClient, QueuingClient};
use scrobble_relay::api;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scrobble_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    set_proxy(config.proxy.clone());

    // The blocking HTTP client must be built off the async runtime
    let client = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || -> scrobble_relay::Result<QueuingClient> {
            let lastfm = LastfmClient::with_base_url(
                config.lastfm_api_url.clone(),
                config.lastfm_api_key.clone(),
                config.lastfm_api_secret.clone(),
            )?;
            QueuingClient::with_client(
                &config.lastfm_api_key,
                &config.lastfm_api_secret,
                config.lastfm_session_key.clone(),
                lastfm,
            )
        })
        .await??
    };
    let client = Arc::new(client);

    if !client.has_session() {
        tracing::warn!("LASTFM_SESSION_KEY not set, events will be queued until a session is supplied");
    }

    // Start the periodic drain
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = DrainScheduler::new(
        client.clone(),
        config.drain_interval,
        ErrorPolicy::from_fail_fast(config.drain_fail_fast),
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    // Build router
    let app = Router::new()
        .nest("/api/v1", api::routes::<LastfmClient>())
        .with_state(client.clone())
        .layer(TraceLayer::new_for_http())
        .layer(
            cors.allow_methods([Method::GET, Method::POST, Method::PUT])
                .allow_headers([header::CONTENT_TYPE]),
        );

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {:?}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // Flush whatever is still queued before exiting
    shutdown_tx.send(true)?;
    scheduler_handle.await?;

    Ok(())
}
