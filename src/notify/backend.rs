use std::path::PathBuf;

use async_trait::async_trait;

/// What the operator is told about a run that found new bad reviews.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaNotice {
    pub count: usize,
    pub subject: String,
    pub body: String,
    pub attachment: PathBuf,
}

impl DeltaNotice {
    pub fn new(count: usize, attachment: PathBuf) -> Self {
        Self {
            count,
            subject: format!("{count} New Bad Google Reviews"),
            body: format!(
                "Found {count} new bad reviews. See attached file.\n\nRegards,\nReview watch"
            ),
            attachment,
        }
    }
}

/// Pluggable notification transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: &DeltaNotice) -> anyhow::Result<()>;
}
