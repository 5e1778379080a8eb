use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::state::AppState;
use crate::desktop::serializer::{clickable_elements_string, summarize, verbose_tree_string, ElementSummary};
use crate::error::{AppError, Result};

#[derive(Debug, Deserialize)]
pub struct BuildTreeRequest {
    /// Process to target; the current target is reused when absent
    pub pid: Option<i32>,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
pub struct BuildTreeResponse {
    pub pid: i32,
    pub node_count: usize,
    pub interactive_count: usize,
    /// Index-annotated listing for the planner
    pub elements: String,
    pub interactive: Vec<ElementSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<String>,
}

/// Build the tree for a process and make it the session's registry
pub async fn build_tree(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BuildTreeRequest>,
) -> Result<Json<BuildTreeResponse>> {
    if let Some(pid) = request.pid {
        if pid <= 0 {
            return Err(AppError::ValidationError(format!("Invalid pid {}", pid)));
        }
    }

    let _guard = state.desktop_lock.lock().await;
    if let Some(pid) = request.pid {
        state.session.set_target(pid).await;
    }
    let tree = state.session.refresh().await?;

    Ok(Json(BuildTreeResponse {
        pid: tree.pid(),
        node_count: tree.len(),
        interactive_count: tree.interactive_count(),
        elements: clickable_elements_string(&tree),
        interactive: summarize(&tree),
        verbose: request.verbose.then(|| verbose_tree_string(&tree)),
    }))
}
