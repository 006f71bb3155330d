use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use alerts::{
    AlertEvaluator, AlertScheduler, LogNotifier, SqliteAlertStore, SqliteUserDirectory,
    WebhookNotifier,
};
use backtest::{StrategyFile, StrategyLibrary};
use common::{Config, MarketDataProvider, Notifier};
use indicators::IndicatorCalculator;
use market::{RestMarketData, SqliteMarketData};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(
        interval_secs = cfg.alert_check_interval_secs,
        port = cfg.api_port,
        "Tickwatch starting"
    );

    // ── Database ──────────────────────────────────────────────────────────────
    let db = common::db::connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to open database: {e}"));

    // ── Collaborators (remote when configured, local fallback otherwise) ─────
    let market: Arc<dyn MarketDataProvider> = match &cfg.market_data_url {
        Some(url) => {
            info!(%url, "Using REST market data");
            Arc::new(
                RestMarketData::new(url.clone())
                    .unwrap_or_else(|e| panic!("Invalid market data client: {e}")),
            )
        }
        None => {
            info!("MARKET_DATA_URL not set, reading bars from the database");
            Arc::new(SqliteMarketData::new(db.clone()))
        }
    };

    let notifier: Arc<dyn Notifier> = match &cfg.notify_webhook_url {
        Some(url) => Arc::new(
            WebhookNotifier::new(url.clone())
                .unwrap_or_else(|e| panic!("Invalid notification webhook: {e}")),
        ),
        None => {
            info!("NOTIFY_WEBHOOK_URL not set, notifications are logged only");
            Arc::new(LogNotifier)
        }
    };

    let store = Arc::new(SqliteAlertStore::new(db.clone()));
    let users = Arc::new(SqliteUserDirectory::new(db.clone()));

    // ── Alert scheduler ───────────────────────────────────────────────────────
    let scheduler = Arc::new(AlertScheduler::new(
        store.clone(),
        market.clone(),
        users,
        notifier,
        AlertEvaluator::new(IndicatorCalculator::new(cfg.indicator_cache_capacity)),
        Duration::from_secs(cfg.alert_check_interval_secs),
    ));
    scheduler.start().await;

    // ── Strategy library ──────────────────────────────────────────────────────
    let mut strategies = StrategyLibrary::builtin();
    if let Some(path) = &cfg.strategy_config_path {
        let file = StrategyFile::load(path)
            .unwrap_or_else(|e| panic!("Failed to load strategy file: {e}"));
        strategies.extend(file.strategies);
    }
    info!(count = strategies.list().len(), "Strategies available");

    // ── Dashboard API ─────────────────────────────────────────────────────────
    let api_state = api::AppState {
        store,
        market,
        scheduler: scheduler.clone(),
        calculator: Arc::new(IndicatorCalculator::new(cfg.indicator_cache_capacity)),
        strategies: Arc::new(strategies),
        api_token: cfg.api_token.clone(),
    };
    let server = tokio::spawn(api::serve(api_state, cfg.api_port));

    // ── Run until Ctrl-C or the server dies ───────────────────────────────────
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        }
        joined = server => {
            match joined {
                Ok(Ok(())) => info!("API server exited"),
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
            }
        }
    }

    scheduler.stop().await;
    info!("Tickwatch stopped");
}
