use chrono::{DateTime, Utc};
use serde::Serialize;

/// One monitored business page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub business_name: String,
    pub url: String,
}

impl Target {
    pub fn new(business_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            business_name: business_name.into(),
            url: url.into(),
        }
    }
}

/// A review as read off the page, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReview {
    pub review_id: Option<String>,
    pub rating_label: String,
    pub reviewer_name: String,
    pub date_label: String,
    pub body_text: String,
    pub avatar_url: String,
}

/// An accepted bad review. Column names follow the exported sheet layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    #[serde(rename = "Business")]
    pub business_name: String,
    #[serde(rename = "Source URL")]
    pub source_url: String,
    #[serde(rename = "Review ID")]
    pub review_id: String,
    #[serde(rename = "Rating")]
    pub rating: u8,
    #[serde(rename = "Reviewer Name")]
    pub reviewer_name: String,
    #[serde(rename = "Review Date")]
    pub review_date: String,
    #[serde(rename = "Review Text")]
    pub review_text: String,
    #[serde(rename = "Profile Image URL")]
    pub avatar_url: String,
    #[serde(rename = "Scraped At", serialize_with = "serialize_scraped_at")]
    pub scraped_at: DateTime<Utc>,
}

pub const SCRAPED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn serialize_scraped_at<S>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.collect_str(&at.format(SCRAPED_AT_FORMAT))
}
