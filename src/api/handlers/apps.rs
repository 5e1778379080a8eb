use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::state::AppState;
use crate::desktop::RunningApp;
use crate::error::Result;

pub async fn list_apps(State(state): State<Arc<AppState>>) -> Result<Json<Vec<RunningApp>>> {
    let apps = state.host.running_apps().await?;
    Ok(Json(apps))
}
