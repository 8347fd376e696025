use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{info, warn};

use super::backend::{DeltaNotice, Notifier};

/// Posts the notice as a multipart form: text fields plus the export as `attachment`.
/// A mail relay or chat bridge behind the URL does the final delivery.
pub struct WebhookNotifier {
    url: String,
    recipient: Option<String>,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String, recipient: Option<String>) -> Self {
        Self {
            url,
            recipient,
            http: reqwest::Client::new(),
        }
    }

    fn form(&self, notice: &DeltaNotice, bytes: Vec<u8>) -> anyhow::Result<Form> {
        let file_name = notice
            .attachment
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "new_bad_reviews.csv".to_string());

        let part = Part::bytes(bytes).file_name(file_name).mime_str("text/csv")?;
        let mut form = Form::new()
            .text("count", notice.count.to_string())
            .text("subject", notice.subject.clone())
            .text("body", notice.body.clone())
            .part("attachment", part);
        if let Some(ref to) = self.recipient {
            form = form.text("to", to.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notice: &DeltaNotice) -> anyhow::Result<()> {
        let bytes = tokio::fs::read(&notice.attachment)
            .await
            .with_context(|| format!("Failed to read {}", notice.attachment.display()))?;

        let resp = self
            .http
            .post(&self.url)
            .multipart(self.form(notice, bytes)?)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Notification webhook returned non-success");
            anyhow::bail!("Notification webhook returned {status}");
        }

        info!(count = notice.count, "Notification sent");
        Ok(())
    }
}
