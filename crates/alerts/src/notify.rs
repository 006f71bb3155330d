use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use common::{AlertNotification, Error, Notifier, Result};

/// Plain-text notification body.
pub fn render_body(n: &AlertNotification) -> String {
    let mut body = format!(
        "Your alert for {} has been triggered.\n\
         Condition: {} {}\n\
         Current Price: ${:.2}\n\
         Change: {:+.2} ({:+.2}%)",
        n.alert.symbol, n.alert.condition, n.alert.value, n.price, n.change, n.change_percent
    );
    if let Some(message) = &n.alert.message {
        body.push_str("\nMessage: ");
        body.push_str(message);
    }
    body
}

/// Writes notifications to the log. Used when no delivery endpoint is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, n: &AlertNotification) -> Result<()> {
        info!(
            email = %n.email,
            alert_id = %n.alert.id,
            subject = %n.subject(),
            body = %render_body(n),
            "Alert notification"
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a webhook (mail relay, chat bridge...).
pub struct WebhookNotifier {
    url: String,
    http: Client,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    to: &'a str,
    subject: String,
    text: String,
    #[serde(flatten)]
    notification: &'a AlertNotification,
}

impl WebhookNotifier {
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, n: &AlertNotification) -> Result<()> {
        let payload = WebhookPayload {
            to: &n.email,
            subject: n.subject(),
            text: render_body(n),
            notification: n,
        };

        let resp = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Notification(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Notification(format!("HTTP {status}: {body}")));
        }

        debug!(alert_id = %n.alert.id, "Webhook notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use chrono::Utc;
    use common::{Alert, AlertCondition, AlertType};
    use tokio::sync::Mutex;

    fn notification() -> AlertNotification {
        let now = Utc::now();
        AlertNotification {
            email: "u1@example.com".into(),
            alert: Alert {
                id: "a1".into(),
                user_id: "u1".into(),
                symbol: "AAPL".into(),
                alert_type: AlertType::Price,
                condition: AlertCondition::Above,
                value: 150.0,
                message: Some("take profit".into()),
                indicator: None,
                triggered: true,
                triggered_at: Some(now),
                created_at: now,
                updated_at: now,
            },
            price: 151.234,
            change: -1.5,
            change_percent: -0.98,
        }
    }

    #[test]
    fn body_mentions_price_change_and_message() {
        let body = render_body(&notification());
        assert!(body.contains("Current Price: $151.23"));
        assert!(body.contains("Change: -1.50 (-0.98%)"));
        assert!(body.contains("Message: take profit"));
        assert_eq!(notification().subject(), "Alert Triggered: AAPL ABOVE 150");
    }

    async fn spawn_hook(status: StatusCode) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/hook",
                post(
                    move |State(seen): State<Arc<Mutex<Vec<serde_json::Value>>>>,
                          Json(body): Json<serde_json::Value>| async move {
                        seen.lock().await.push(body);
                        status
                    },
                ),
            )
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/hook"), received)
    }

    #[tokio::test]
    async fn webhook_posts_json() {
        let (url, received) = spawn_hook(StatusCode::OK).await;
        WebhookNotifier::new(url)
            .unwrap()
            .notify(&notification())
            .await
            .unwrap();

        let seen = received.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["to"], "u1@example.com");
        assert_eq!(seen[0]["alert"]["symbol"], "AAPL");
        assert_eq!(seen[0]["price"], 151.234);
    }

    #[tokio::test]
    async fn webhook_rejection_is_an_error() {
        let (url, _) = spawn_hook(StatusCode::BAD_GATEWAY).await;
        let err = WebhookNotifier::new(url)
            .unwrap()
            .notify(&notification())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Notification(_)));
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        assert!(LogNotifier.notify(&notification()).await.is_ok());
    }
}
