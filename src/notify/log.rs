use async_trait::async_trait;
use tracing::info;

use super::backend::{DeltaNotice, Notifier};

/// Notifier used when no transport is configured: the notice only goes to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notice: &DeltaNotice) -> anyhow::Result<()> {
        info!(
            count = notice.count,
            attachment = %notice.attachment.display(),
            "{}", notice.subject
        );
        Ok(())
    }
}
