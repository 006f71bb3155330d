mod auth;
mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use alerts::AlertScheduler;
use backtest::StrategyLibrary;
use common::{AlertStore, MarketDataProvider, Result};
use indicators::IndicatorCalculator;

pub use error::{ApiError, ApiResult};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AlertStore>,
    pub market: Arc<dyn MarketDataProvider>,
    pub scheduler: Arc<AlertScheduler>,
    /// Serves `/api/indicators`; separate from the scheduler's own cache.
    pub calculator: Arc<IndicatorCalculator>,
    pub strategies: Arc<StrategyLibrary>,
    pub api_token: String,
}

impl AppState {
    fn token_matches(&self, token: &str) -> bool {
        !self.api_token.is_empty() && token == self.api_token
    }
}

/// The full router: public health check plus the token-protected API.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::ws_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Build and run the Axum API server until the process exits.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Dashboard API listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
