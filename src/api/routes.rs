use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{actions, apps, health, tree};
use super::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Sidecar is only reachable from local front-ends
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:1420"),
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:1420"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Host
        .route("/apps", get(apps::list_apps))
        // Accessibility tree
        .route("/tree", post(tree::build_tree))
        // Actions
        .route("/actions", get(actions::list_actions))
        .route("/act", post(actions::act))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
