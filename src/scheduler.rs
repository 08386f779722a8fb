use std::sync::Weak;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::Instrument;

use crate::publish::{OneShotScheduler, PublishNotifier};

/// In-process one-shot timers. Pending timers are lost when the process stops.
pub struct TokioScheduler {
    notifier: Weak<PublishNotifier>,
}

impl TokioScheduler {
    pub fn new(notifier: Weak<PublishNotifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl OneShotScheduler for TokioScheduler {
    async fn schedule_once(&self, at: DateTime<Utc>, post_id: i64) -> Result<(), anyhow::Error> {
        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let notifier = self.notifier.clone();
        let span = tracing::info_span!("Scheduled notification", post_id, %at);

        tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;

                let Some(notifier) = notifier.upgrade() else {
                    tracing::warn!("Application shut down before the notification was due");
                    return;
                };
                if let Err(e) = notifier.send_scheduled(post_id).await {
                    tracing::error!(
                        error.cause_chain = ?e,
                        error.message = %e,
                        "Scheduled notification failed"
                    );
                }
            }
            .instrument(span),
        );

        tracing::info!(post_id, %at, "Notification scheduled");
        Ok(())
    }
}
