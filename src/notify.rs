//! Terminal run notification

use async_trait::async_trait;

use crate::{RunId, RunStatus};

/// Terminal notice delivered exactly once per run
#[derive(Clone, Debug)]
pub struct Notification {
    /// The run that reached a terminal state
    pub run_id: RunId,
    /// Final status, `Succeeded` or `Failed`
    pub status: RunStatus,
    /// Steps whose compensation did not succeed, for manual intervention
    pub uncompensated_steps: Vec<Box<str>>,
}

/// Notification delivery failure
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Delivery failed; the engine logs and moves on
    #[error("delivery error: {0}")]
    Delivery(Box<str>),
}

/// Delivers the terminal success/failure notice.
///
/// Fire-and-forget from the engine's perspective: delivery failures are
/// logged but never reopen a terminal run.
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    /// Deliver a terminal notification
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Sink that drops every notification
pub struct NoOpSink;

#[async_trait]
impl NotificationSink for NoOpSink {
    async fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Sink that logs each notification through `tracing`, with the message
/// wording the downstream travel notifier expects
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification.status {
            RunStatus::Succeeded => tracing::info!(
                run_id = %notification.run_id,
                "Your travel reservation is successful"
            ),
            _ => tracing::warn!(
                run_id = %notification.run_id,
                uncompensated = ?notification.uncompensated_steps,
                "Your travel reservation failed"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracing_sink_never_fails_delivery() {
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let sink = TracingSink;
        sink.notify(&Notification {
            run_id: RunId::new("r1"),
            status: RunStatus::Succeeded,
            uncompensated_steps: Vec::new(),
        })
        .await
        .unwrap();
        sink.notify(&Notification {
            run_id: RunId::new("r2"),
            status: RunStatus::Failed,
            uncompensated_steps: vec!["ReserveFlight".into()],
        })
        .await
        .unwrap();
    }
}
