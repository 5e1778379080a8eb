use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::state::AppState;
use crate::error::{AppError, Result};
use crate::runs::{ActionCall, MultiActReport};
use crate::tools::ActionDescriptor;

pub async fn list_actions(State(state): State<Arc<AppState>>) -> Json<Vec<ActionDescriptor>> {
    Json(state.executor.registry().descriptors())
}

#[derive(Debug, Deserialize)]
pub struct ActRequest {
    pub actions: Vec<ActionCall>,
}

/// Run an ordered action list against the current registry
pub async fn act(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActRequest>,
) -> Result<Json<MultiActReport>> {
    if let Some(call) = request.actions.iter().find(|c| c.name.trim().is_empty()) {
        return Err(AppError::ValidationError(format!("Action with empty name: {:?}", call)));
    }

    let _guard = state.desktop_lock.lock().await;
    let ctx = state.action_context();
    tracing::info!("Run {} with {} action(s)", ctx.run_id, request.actions.len());

    let report = state.executor.run(&request.actions, &ctx).await;
    Ok(Json(report.for_planner(state.executor.config().max_error_length)))
}
