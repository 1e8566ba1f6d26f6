use crate::models::HealthResponse;
use crate::state::AppState;
use axum::{Json, extract::State};

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let documents = state.market.read().await.stats();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        revision: state.revision(),
        online_users: state.hub.online_users(),
        documents,
    })
}
