use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use ::alerts::CycleOutcome;
use common::{Alert, AlertPatch, Error, NewAlert};

use crate::{ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/alerts", get(list_alerts).post(create_alert))
        .route("/api/alerts/check", post(check_alerts))
        .route(
            "/api/alerts/:id",
            get(get_alert).patch(update_alert).delete(delete_alert),
        )
}

#[derive(Deserialize)]
struct AlertsQuery {
    user_id: Option<String>,
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(q): Query<AlertsQuery>,
) -> ApiResult<Json<Vec<Alert>>> {
    let alerts = match q.user_id.as_deref() {
        Some(user_id) => state.store.list_for_user(user_id).await?,
        None => state.store.list().await?,
    };
    Ok(Json(alerts))
}

async fn create_alert(
    State(state): State<AppState>,
    Json(input): Json<NewAlert>,
) -> ApiResult<(StatusCode, Json<Alert>)> {
    let alert = state.store.create(input).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

async fn get_alert(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Alert>> {
    let alert = state
        .store
        .get(&id)
        .await?
        .ok_or_else(|| Error::alert_not_found(&id))?;
    Ok(Json(alert))
}

async fn update_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<AlertPatch>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.store.update(&id, patch).await?))
}

async fn delete_alert(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    if state.store.delete(&id).await? {
        info!(alert_id = %id, "Alert deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::alert_not_found(id).into())
    }
}

/// Run one evaluation cycle now instead of waiting for the next tick.
async fn check_alerts(State(state): State<AppState>) -> Json<CycleOutcome> {
    Json(state.scheduler.run_cycle().await)
}
