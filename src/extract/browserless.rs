use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{html, ExtractError, PageExtractor, PageRead};

/// How long the render service lets the page settle before snapshotting it.
const SETTLE_MS: u64 = 12_000;

/// Reads review pages through a headless-browser service's `/content` endpoint,
/// which returns the fully rendered HTML.
pub struct BrowserlessExtractor {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessExtractor {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    fn endpoint(&self) -> String {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    async fn content(&self, url: &str) -> Result<String, ExtractError> {
        let body = json!({
            "url": url,
            "gotoOptions": { "waitUntil": "networkidle2" },
            "waitForTimeout": SETTLE_MS,
        });

        let resp = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ExtractError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}

#[async_trait]
impl PageExtractor for BrowserlessExtractor {
    async fn extract(&self, url: &str) -> Result<PageRead, ExtractError> {
        let html = self.content(url).await?;
        debug!(url, bytes = html.len(), "Rendered page received");
        html::parse_reviews(&html)
    }
}
