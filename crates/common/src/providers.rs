use async_trait::async_trait;

use crate::{Alert, AlertNotification, AlertPatch, Bar, MarketSnapshot, NewAlert, Result};

/// Source of quotes and price history.
///
/// `Ok(None)` / an empty series means "no data yet" and is not an error:
/// callers skip the symbol and retry on the next cycle.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Latest quote for `symbol`.
    async fn latest_snapshot(&self, symbol: &str) -> Result<Option<MarketSnapshot>>;

    /// Price history for `symbol`, oldest bar first.
    async fn series(&self, symbol: &str) -> Result<Vec<Bar>>;
}

/// Persistence for user alerts.
///
/// Implementations must route `update` through `Alert::apply` so the
/// trigger transition stays one-way.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Alert>>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Alert>>;

    async fn get(&self, id: &str) -> Result<Option<Alert>>;

    async fn create(&self, alert: NewAlert) -> Result<Alert>;

    async fn update(&self, id: &str, patch: AlertPatch) -> Result<Alert>;

    /// Returns `false` when no alert with `id` existed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Resolves the address a user's alert notifications go to.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn email_for(&self, user_id: &str) -> Result<Option<String>>;
}

/// Delivers triggered-alert notifications. Fire-and-forget from the
/// scheduler's point of view: errors are logged, never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &AlertNotification) -> Result<()>;
}
