pub mod browserless;
pub mod html;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::RawReview;

/// The whole page could not be read. The target is skipped for this run.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("page unreachable: {0}")]
    Unreachable(String),

    #[error("timed out loading page")]
    Timeout,

    #[error("render service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("expected page element missing: {0}")]
    MissingElements(&'static str),
}

impl From<reqwest::Error> for ExtractError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExtractError::Timeout
        } else {
            ExtractError::Unreachable(err.to_string())
        }
    }
}

/// A single review on an otherwise readable page could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("review element missing {0}")]
    MissingField(&'static str),
}

/// What one page read produced. An empty `records` is a valid "no reviews" page.
pub type PageRead = Vec<Result<RawReview, RecordError>>;

/// Source of raw reviews for a page URL.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<PageRead, ExtractError>;
}
