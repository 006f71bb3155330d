use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use common::{
    Alert, AlertNotification, AlertPatch, AlertStore, AlertType, MarketDataProvider,
    MarketSnapshot, Notifier, Result, UserDirectory,
};

use crate::evaluator::AlertEvaluator;

/// Capacity of the triggered-alert broadcast channel. Slow subscribers
/// lag and miss events rather than block the scheduler.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Counters for one completed evaluation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Untriggered alerts considered.
    pub checked: usize,
    pub triggered: usize,
    /// Alerts with no market data this cycle.
    pub skipped: usize,
    /// Alerts whose check failed with an error.
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was still running.
    Skipped,
}

enum AlertCheck {
    Triggered,
    NotMet,
    NoData,
}

struct Dependencies {
    store: Arc<dyn AlertStore>,
    market: Arc<dyn MarketDataProvider>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    evaluator: AlertEvaluator,
    events: broadcast::Sender<Alert>,
    cycle_in_progress: AtomicBool,
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodically evaluates every untriggered alert and fires the ones whose
/// condition holds.
///
/// At most one timer task exists at a time, and cycles never overlap: a
/// cycle requested while another is in progress is skipped.
pub struct AlertScheduler {
    deps: Arc<Dependencies>,
    interval: Duration,
    task: RwLock<Option<Running>>,
}

/// Clears the in-progress flag however the cycle ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AlertScheduler {
    pub fn new(
        store: Arc<dyn AlertStore>,
        market: Arc<dyn MarketDataProvider>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        evaluator: AlertEvaluator,
        interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            deps: Arc::new(Dependencies {
                store,
                market,
                users,
                notifier,
                evaluator,
                events,
                cycle_in_progress: AtomicBool::new(false),
            }),
            interval,
            task: RwLock::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Receive every alert as it triggers.
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.deps.events.subscribe()
    }

    /// Start ticking every `interval`. A previously started timer is stopped
    /// first. The first cycle runs one interval after start.
    pub async fn start(&self) {
        let mut task = self.task.write().await;
        if let Some(previous) = task.take() {
            let _ = previous.shutdown.send(true);
            debug!("AlertScheduler: replacing previous timer");
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let deps = self.deps.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval() completes its first tick immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let CycleOutcome::Skipped = deps.run_cycle().await {
                            warn!("AlertScheduler: previous cycle still running, tick skipped");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!("AlertScheduler: timer task exited");
        });

        *task = Some(Running {
            shutdown: shutdown_tx,
            handle,
        });
        info!(interval_secs = interval.as_secs_f64(), "AlertScheduler: started");
    }

    /// Stop the timer. A cycle already in progress runs to completion.
    /// Calling `stop` on a stopped scheduler does nothing.
    pub async fn stop(&self) {
        if let Some(running) = self.task.write().await.take() {
            let _ = running.shutdown.send(true);
            info!("AlertScheduler: stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .read()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Run one evaluation cycle now.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.deps.run_cycle().await
    }
}

impl Dependencies {
    async fn run_cycle(&self) -> CycleOutcome {
        if self
            .cycle_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return CycleOutcome::Skipped;
        }
        let _guard = CycleGuard(&self.cycle_in_progress);

        let alerts = match self.store.list().await {
            Ok(alerts) => alerts,
            Err(e) => {
                error!(error = %e, "AlertScheduler: failed to list alerts");
                return CycleOutcome::Completed(CycleReport::default());
            }
        };

        let mut report = CycleReport::default();
        for alert in alerts.into_iter().filter(|a| !a.triggered) {
            report.checked += 1;
            match self.check_alert(&alert).await {
                Ok(AlertCheck::Triggered) => report.triggered += 1,
                Ok(AlertCheck::NotMet) => {}
                Ok(AlertCheck::NoData) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        alert_id = %alert.id,
                        symbol = %alert.symbol,
                        error = %e,
                        "AlertScheduler: alert check failed"
                    );
                }
            }
        }

        info!(
            checked = report.checked,
            triggered = report.triggered,
            skipped = report.skipped,
            failed = report.failed,
            "AlertScheduler: cycle complete"
        );
        CycleOutcome::Completed(report)
    }

    async fn check_alert(&self, alert: &Alert) -> Result<AlertCheck> {
        let Some(snapshot) = self.market.latest_snapshot(&alert.symbol).await? else {
            debug!(alert_id = %alert.id, symbol = %alert.symbol, "No market data, skipping");
            return Ok(AlertCheck::NoData);
        };

        let history = match alert.alert_type {
            AlertType::Technical => self.market.series(&alert.symbol).await?,
            AlertType::Price | AlertType::Volume => Vec::new(),
        };

        if !self.evaluator.evaluate(alert, &snapshot, &history) {
            return Ok(AlertCheck::NotMet);
        }

        let triggered = self
            .store
            .update(&alert.id, AlertPatch::trigger(Utc::now()))
            .await?;
        info!(
            alert_id = %triggered.id,
            user_id = %triggered.user_id,
            symbol = %triggered.symbol,
            condition = %triggered.condition,
            value = triggered.value,
            price = snapshot.price,
            "Alert triggered"
        );

        self.dispatch_notification(&triggered, &snapshot).await;
        // No subscribers is fine
        let _ = self.events.send(triggered);
        Ok(AlertCheck::Triggered)
    }

    async fn dispatch_notification(&self, alert: &Alert, snapshot: &MarketSnapshot) {
        let email = match self.users.email_for(&alert.user_id).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                debug!(user_id = %alert.user_id, "No email on file, notification not sent");
                return;
            }
            Err(e) => {
                warn!(user_id = %alert.user_id, error = %e, "User lookup failed, notification not sent");
                return;
            }
        };

        let notification = AlertNotification {
            email,
            alert: alert.clone(),
            price: snapshot.price,
            change: snapshot.change,
            change_percent: snapshot.change_percent,
        };
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!(alert_id = %alert.id, error = %e, "Failed to send alert notification");
        }
    }
}
