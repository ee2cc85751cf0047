//! Where fired alerts go.
//!
//! Dispatching e-mail or any other message is left to the implementation
//! behind [`AlertNotifier`]. The monitor logs a failed notification and
//! moves on; it never retries.

use async_trait::async_trait;
use tokio::sync::mpsc;

use vattenvakt_core::model::AlertFired;
use vattenvakt_telemetry::EventLogger;

use crate::error::NotifyError;

#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: &AlertFired) -> Result<(), NotifyError>;
}

/// Writes every alert to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl AlertNotifier for LoggingNotifier {
    async fn notify(&self, alert: &AlertFired) -> Result<(), NotifyError> {
        EventLogger::log_event(
            "groundwater_alert",
            &[
                ("region", alert.region_id.clone()),
                ("water_level", alert.water_level.to_string()),
                ("limit", alert.limit.to_string()),
                ("target", alert.notify_target.clone()),
                ("reading_at", alert.reading_at.to_rfc3339()),
                ("fired_at", alert.fired_at.to_rfc3339()),
            ],
        );
        Ok(())
    }
}

/// Forwards alerts to an in-process receiver.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<AlertFired>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AlertFired>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl AlertNotifier for ChannelNotifier {
    async fn notify(&self, alert: &AlertFired) -> Result<(), NotifyError> {
        self.sender
            .send(alert.clone())
            .map_err(|_| NotifyError::ChannelClosed)
    }
}
