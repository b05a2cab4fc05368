//! Alert delivery
//!
//! Events go to a [`NotificationSink`] and are kept in the [`AlertOutbox`]
//! so users can list what was sent to them.

use async_trait::async_trait;
use tokio::sync::RwLock;

use shared::AlertEvent;

use crate::error::AppResult;

/// Destination for alert events
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: &AlertEvent) -> AppResult<()>;
}

/// Sink that writes events to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn deliver(&self, event: &AlertEvent) -> AppResult<()> {
        tracing::info!(
            user_id = %event.user_id,
            rule_id = %event.rule_id,
            value = event.observed_value,
            "{}",
            event.message
        );
        Ok(())
    }
}

/// Build the user-facing text of an alert
pub fn alert_message(location_label: &str, description: &str, observed: f64, unit: &str) -> String {
    format!(
        "Weather Alert: {} - {} (observed {:.1}{})",
        location_label, description, observed, unit
    )
}

/// In-memory history of emitted events
#[derive(Default)]
pub struct AlertOutbox {
    events: RwLock<Vec<AlertEvent>>,
}

impl AlertOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, event: AlertEvent) {
        self.events.write().await.push(event);
    }

    /// A user's events, newest first
    pub async fn for_user(&self, user_id: &str) -> Vec<AlertEvent> {
        let events = self.events.read().await;
        events
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_message() {
        assert_eq!(
            alert_message("Oslo", "Heavy rain warning", 86.04, "%"),
            "Weather Alert: Oslo - Heavy rain warning (observed 86.0%)"
        );
    }
}
