use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing::warn;

use common::Alert;

use crate::AppState;

pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws/alerts", get(ws_alerts_handler))
}

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// WebSocket endpoint that pushes each alert as it triggers.
/// Auth via query param `?token=<DASHBOARD_TOKEN>` (header auth not supported
/// in browser WebSocket API).
async fn ws_alerts_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(q): Query<WsQuery>,
) -> Response {
    let authed = q.token.as_deref().is_some_and(|t| state.token_matches(t));
    if !authed {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    let alert_rx = state.scheduler.subscribe();
    ws.on_upgrade(move |socket| handle_ws(socket, alert_rx))
}

async fn handle_ws(mut socket: WebSocket, mut alert_rx: Receiver<Alert>) {
    loop {
        match alert_rx.recv().await {
            Ok(alert) => {
                let payload = match serde_json::to_string(&alert) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode alert for WebSocket");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => {
                warn!(dropped = n, "WebSocket alert client lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
