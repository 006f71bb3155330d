mod alerts;
mod backtest;
mod health;
mod indicators;
mod ws;

use axum::{middleware, Router};

use crate::{auth::require_auth, AppState};

pub use health::health_router;
pub use ws::ws_router;

/// Every `/api` route, behind bearer-token auth.
pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(alerts::router())
        .merge(indicators::router())
        .merge(backtest::router())
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
