use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use common::{Error, IndicatorConfig};
use ::indicators::{IndicatorResult, PriceSeries};

use crate::{ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/indicators", post(calculate))
}

/// Either a symbol, whose stored history is used, or explicit closes.
#[derive(Deserialize)]
struct IndicatorRequest {
    symbol: Option<String>,
    closes: Option<Vec<f64>>,
    config: IndicatorConfig,
}

#[derive(Serialize)]
struct IndicatorResponse {
    symbol: Option<String>,
    points: usize,
    config: IndicatorConfig,
    /// `None` when the series is too short for the indicator.
    result: Option<IndicatorResult>,
}

async fn calculate(
    State(state): State<AppState>,
    Json(req): Json<IndicatorRequest>,
) -> ApiResult<Json<IndicatorResponse>> {
    req.config.validate()?;
    let series = match (&req.symbol, req.closes) {
        (_, Some(closes)) => PriceSeries::from_closes(closes),
        (Some(symbol), None) => PriceSeries::from_bars(&state.market.series(symbol).await?),
        (None, None) => {
            return Err(Error::Validation("either 'symbol' or 'closes' is required".into()).into())
        }
    };

    let result = state.calculator.calculate(&series, &req.config);
    Ok(Json(IndicatorResponse {
        symbol: req.symbol,
        points: series.len(),
        config: req.config,
        result,
    }))
}
