use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::store::{Store, StorePath, WriteBatch};

use super::super::domain::{EntrantStatus, EventId, Identifier};
use super::super::error::AdmissionError;
use super::super::paths;
use super::AdmissionController;

/// A notification that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDelivery {
    pub recipient: String,
    pub error: String,
}

/// Per-recipient outcome of a fan-out. One failed write never blocks the others.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
    pub delivered: Vec<String>,
    pub failed: Vec<FailedDelivery>,
}

impl NotificationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One pending notification write.
pub(crate) struct Outgoing {
    pub recipient: String,
    pub path: StorePath,
    pub message: String,
}

impl<S> AdmissionController<S>
where
    S: Store + 'static,
{
    /// Write one `{message}` notification per entrant currently in `status`.
    pub async fn send_waiting_list_notification(
        &self,
        event_id: &EventId,
        status: EntrantStatus,
        message: &str,
    ) -> Result<NotificationReport, AdmissionError> {
        event_id.require()?;
        let notification_type = status.notification_type();
        let outgoing = self
            .entrants(event_id, status)
            .await?
            .into_iter()
            .map(|entrant_id| Outgoing {
                path: paths::notification(&entrant_id.0, event_id, notification_type),
                recipient: entrant_id.0,
                message: message.to_string(),
            })
            .collect();

        let report = self.deliver(outgoing).await;
        info!(
            %event_id,
            %status,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "waiting list notified"
        );
        Ok(report)
    }

    pub(crate) async fn deliver(&self, outgoing: Vec<Outgoing>) -> NotificationReport {
        let writes = outgoing.into_iter().map(|note| async move {
            let mut batch = WriteBatch::new();
            batch.set(note.path, json!({ "message": note.message }));
            let result = self.store.update(batch).await;
            (note.recipient, result)
        });

        let mut report = NotificationReport::default();
        for (recipient, result) in join_all(writes).await {
            match result {
                Ok(()) => report.delivered.push(recipient),
                Err(error) => {
                    warn!(%recipient, %error, "notification write failed");
                    report.failed.push(FailedDelivery {
                        recipient,
                        error: error.to_string(),
                    });
                }
            }
        }
        report
    }
}
