//! Standalone CRUDS server: reads settings from the environment (or `.env`), loads model
//! definitions, opens the configured backend and serves the Collection+JSON API.
//!
//! Run from repo root: `cargo run -p crudsdb-server`

use crudsdb::{build_app, connect, load_models_from_path, resolve, AppState, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crudsdb=info,crudsdb_server=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let config = load_models_from_path(&settings.models_path).await?;
    let registry = resolve(&config)?;
    tracing::info!(
        models = registry.len(),
        backend = settings.backend.as_str(),
        api_root = %settings.api_root,
        "starting"
    );

    let db = connect(&settings, &registry).await?;
    let state = AppState {
        db,
        registry: Arc::new(registry),
        api_root: settings.api_root.clone(),
    };
    let app = build_app(state, &settings);

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
