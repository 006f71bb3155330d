use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use ::backtest::{Backtest, BacktestResult, StrategyDefinition};
use common::Error;

use crate::{ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/strategies", get(list_strategies))
        .route("/api/backtest", post(run_backtest))
}

async fn list_strategies(State(state): State<AppState>) -> Json<Vec<StrategyDefinition>> {
    Json(state.strategies.list().to_vec())
}

/// Exactly one of `strategy_id` (library lookup) or `strategy` (inline
/// definition) must be given.
#[derive(Deserialize)]
struct BacktestRequest {
    symbol: String,
    strategy_id: Option<String>,
    strategy: Option<StrategyDefinition>,
    initial_capital: f64,
}

async fn run_backtest(
    State(state): State<AppState>,
    Json(req): Json<BacktestRequest>,
) -> ApiResult<Json<BacktestResult>> {
    let definition = match (req.strategy_id, req.strategy) {
        (Some(id), None) => state
            .strategies
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound {
                entity: "strategy",
                id,
            })?,
        (None, Some(definition)) => definition,
        _ => {
            return Err(Error::Validation(
                "exactly one of 'strategy_id' or 'strategy' is required".into(),
            )
            .into())
        }
    };
    let strategy = definition.compile()?;

    let bars = state.market.series(&req.symbol).await?;
    if bars.is_empty() {
        return Err(Error::NotFound {
            entity: "price history",
            id: req.symbol,
        }
        .into());
    }

    let backtest = Backtest::new(bars, strategy, req.initial_capital)?;
    // Bar-by-bar replay is CPU bound
    let result = tokio::task::spawn_blocking(move || backtest.run())
        .await
        .map_err(|e| Error::Other(format!("backtest task failed: {e}")))?;
    Ok(Json(result))
}
