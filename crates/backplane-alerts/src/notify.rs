//! Notification message construction and delivery (spec §4.E Notify).

use crate::error::{AlertError, Result};
use crate::types::{AlertType, BurnRateWindow, Dimension, Severity};
use async_trait::async_trait;
use std::time::Duration;

/// Detail carried by an error-rate or TTFB breach, for message building.
pub enum BreachDetail {
    ErrorRate { observed_rate: f64, slo: f64 },
    Ttfb { fraction_exceeding: f64, budget: f64 },
}

pub struct Notification {
    pub severity: Severity,
    pub dimension: Dimension,
    pub window: BurnRateWindow,
    pub burn_rate: f64,
    pub request_count: f64,
    pub detail: BreachDetail,
}

impl Notification {
    /// Render the "Slack-shaped" textual message from spec §4.E.
    pub fn render(&self) -> String {
        let severity_label = match self.severity {
            Severity::Page => "PAGE",
            Severity::Ticket => "TICKET",
        };
        let detail_line = match self.detail {
            BreachDetail::ErrorRate { observed_rate, slo } => format!(
                "error rate {:.4} vs SLO {:.4}",
                observed_rate, slo
            ),
            BreachDetail::Ttfb {
                fraction_exceeding,
                budget,
            } => format!(
                "fraction exceeding threshold {:.4} vs budget {:.4}",
                fraction_exceeding, budget
            ),
        };
        format!(
            "[{severity}] SLO burn-rate alert\nProvider: {provider}\nModel: {model}\nBurn rate: {burn_rate:.1}x (threshold {threshold:.1}x)\nWindow: {long}m/{short}m\n{detail}\nRequests: {count:.0}, Client: {client}",
            severity = severity_label,
            provider = self.dimension.provider,
            model = self.dimension.model,
            burn_rate = self.burn_rate,
            threshold = self.window.burn_rate,
            long = self.window.long_window_minutes,
            short = self.window.short_window_minutes,
            detail = detail_line,
            count = self.request_count,
            client = self.dimension.client,
        )
    }
}

/// Delivers a rendered notification to the channel its severity maps to.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Webhook-backed [`Notifier`]: posts the rendered text with a hard 5s
/// timeout (spec §5 "Cancellation and timeouts").
pub struct WebhookNotifier {
    client: reqwest::Client,
    page_url: Option<String>,
    ticket_url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(page_url: Option<String>, ticket_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("reqwest client builds"),
            page_url,
            ticket_url,
        }
    }

    fn url_for(&self, severity: Severity) -> Option<&str> {
        match severity {
            Severity::Page => self.page_url.as_deref(),
            Severity::Ticket => self.ticket_url.as_deref(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let Some(url) = self.url_for(notification.severity) else {
            return Ok(());
        };
        let body = serde_json::json!({ "text": notification.render() });
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AlertError::Notification(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AlertError::Notification(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
