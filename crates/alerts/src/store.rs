use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    Alert, AlertCondition, AlertPatch, AlertStore, AlertType, Error, IndicatorConfig, NewAlert,
    Result,
};

// ─── In-memory ───────────────────────────────────────────────────────────────

/// Alert store held in process memory. Used by tests and the demo binary
/// when no database is configured.
#[derive(Default, Clone)]
pub struct InMemoryAlertStore {
    alerts: Arc<RwLock<Vec<Alert>>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn list(&self) -> Result<Vec<Alert>> {
        Ok(self.alerts.read().await.clone())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .read()
            .await
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn get(&self, id: &str) -> Result<Option<Alert>> {
        Ok(self.alerts.read().await.iter().find(|a| a.id == id).cloned())
    }

    async fn create(&self, alert: NewAlert) -> Result<Alert> {
        let alert = alert.into_alert(Utc::now())?;
        self.alerts.write().await.push(alert.clone());
        debug!(alert_id = %alert.id, symbol = %alert.symbol, "Alert created");
        Ok(alert)
    }

    async fn update(&self, id: &str, patch: AlertPatch) -> Result<Alert> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::alert_not_found(id))?;
        alert.apply(patch, Utc::now())?;
        Ok(alert.clone())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|a| a.id != id);
        Ok(alerts.len() != before)
    }
}

// ─── SQLite ──────────────────────────────────────────────────────────────────

/// Alert store backed by the `alerts` table.
#[derive(Clone)]
pub struct SqliteAlertStore {
    db: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: String,
    user_id: String,
    symbol: String,
    alert_type: AlertType,
    condition: AlertCondition,
    value: f64,
    message: Option<String>,
    indicator: Option<String>,
    triggered: bool,
    triggered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = Error;

    fn try_from(row: AlertRow) -> Result<Self> {
        let indicator = row
            .indicator
            .as_deref()
            .map(serde_json::from_str::<IndicatorConfig>)
            .transpose()?;
        Ok(Alert {
            id: row.id,
            user_id: row.user_id,
            symbol: row.symbol,
            alert_type: row.alert_type,
            condition: row.condition,
            value: row.value,
            message: row.message,
            indicator,
            triggered: row.triggered,
            triggered_at: row.triggered_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_ALERT: &str = r#"
    SELECT id, user_id, symbol, alert_type, condition, value, message, indicator,
           triggered, triggered_at, created_at, updated_at
    FROM alerts
"#;

impl SqliteAlertStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    fn indicator_json(alert: &Alert) -> Result<Option<String>> {
        Ok(alert
            .indicator
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?)
    }
}

#[async_trait]
impl AlertStore for SqliteAlertStore {
    async fn list(&self) -> Result<Vec<Alert>> {
        let rows: Vec<AlertRow> = sqlx::query_as(&format!("{SELECT_ALERT} ORDER BY created_at ASC"))
            .fetch_all(&self.db)
            .await?;
        rows.into_iter().map(Alert::try_from).collect()
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Alert>> {
        let rows: Vec<AlertRow> = sqlx::query_as(&format!(
            "{SELECT_ALERT} WHERE user_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Alert::try_from).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<Alert>> {
        let row: Option<AlertRow> = sqlx::query_as(&format!("{SELECT_ALERT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(Alert::try_from).transpose()
    }

    async fn create(&self, alert: NewAlert) -> Result<Alert> {
        let alert = alert.into_alert(Utc::now())?;
        sqlx::query(
            r#"
            INSERT INTO alerts (id, user_id, symbol, alert_type, condition, value, message,
                                indicator, triggered, triggered_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.user_id)
        .bind(&alert.symbol)
        .bind(alert.alert_type)
        .bind(alert.condition)
        .bind(alert.value)
        .bind(&alert.message)
        .bind(Self::indicator_json(&alert)?)
        .bind(alert.triggered)
        .bind(alert.triggered_at)
        .bind(alert.created_at)
        .bind(alert.updated_at)
        .execute(&self.db)
        .await?;

        info!(
            alert_id = %alert.id,
            user_id = %alert.user_id,
            symbol = %alert.symbol,
            alert_type = %alert.alert_type,
            "Alert created"
        );
        Ok(alert)
    }

    /// Read-modify-write guarded on the previous `triggered` value, so two
    /// concurrent triggers of the same alert cannot both succeed.
    async fn update(&self, id: &str, patch: AlertPatch) -> Result<Alert> {
        let mut alert = self
            .get(id)
            .await?
            .ok_or_else(|| Error::alert_not_found(id))?;
        let was_triggered = alert.triggered;
        alert.apply(patch, Utc::now())?;

        let updated = sqlx::query(
            r#"
            UPDATE alerts
            SET condition = ?1, value = ?2, message = ?3, triggered = ?4,
                triggered_at = ?5, updated_at = ?6
            WHERE id = ?7 AND triggered = ?8
            "#,
        )
        .bind(alert.condition)
        .bind(alert.value)
        .bind(&alert.message)
        .bind(alert.triggered)
        .bind(alert.triggered_at)
        .bind(alert.updated_at)
        .bind(id)
        .bind(was_triggered)
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Error::InvalidTransition(format!(
                "alert '{id}' changed while being updated"
            )));
        }
        Ok(alert)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
