use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axpilot::api::{routes::create_router, state::AppState};
use axpilot::config::Config;
use axpilot::desktop::{check_accessibility_permissions, create_provider, MacHost};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    if !check_accessibility_permissions() {
        tracing::warn!(
            "Accessibility access is not granted. Enable it in System Settings > Privacy & Security > Accessibility"
        );
    }

    // Create application state
    let provider = create_provider()?;
    let state = Arc::new(AppState::new(config.clone(), provider, Arc::new(MacHost::new()))?);

    // Build router
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("axpilot starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
