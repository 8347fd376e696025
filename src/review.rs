use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

use crate::ledger::DedupLedger;
use crate::model::{RawReview, Review, Target};

pub const DEFAULT_BAD_THRESHOLD: u8 = 3;
pub const MAX_RATING: u8 = 5;

/// Why a raw review was not accepted. Each reason is final for that record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("review has no id")]
    MissingId,
    #[error("review {0} already seen")]
    Duplicate(String),
    #[error("rating {rating} is above threshold {threshold}")]
    AboveThreshold { rating: u8, threshold: u8 },
}

/// Parse the leading integer of a label like "2 stars" or "1 étoile".
///
/// Anything unparsable or outside 1..=5 counts as the maximum rating, so a bad
/// label can only ever exclude a review.
pub fn parse_rating(label: &str) -> u8 {
    static LEADING_INT: OnceLock<Regex> = OnceLock::new();
    let re = LEADING_INT.get_or_init(|| Regex::new(r"^\s*(\d+)").unwrap());

    re.captures(label)
        .and_then(|c| c[1].parse::<u8>().ok())
        .filter(|r| (1..=MAX_RATING).contains(r))
        .unwrap_or(MAX_RATING)
}

/// Decide whether `raw` is a new bad review for `target`. Pure.
pub fn normalize(
    raw: &RawReview,
    target: &Target,
    ledger: &DedupLedger,
    threshold: u8,
    now: DateTime<Utc>,
) -> Result<Review, Rejection> {
    let review_id = match raw.review_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id,
        _ => return Err(Rejection::MissingId),
    };
    if ledger.contains(review_id) {
        return Err(Rejection::Duplicate(review_id.to_string()));
    }

    let rating = parse_rating(&raw.rating_label);
    if rating > threshold {
        return Err(Rejection::AboveThreshold { rating, threshold });
    }

    Ok(Review {
        business_name: target.business_name.clone(),
        source_url: target.url.clone(),
        review_id: review_id.to_string(),
        rating,
        reviewer_name: raw.reviewer_name.trim().to_string(),
        review_date: raw.date_label.trim().to_string(),
        review_text: raw.body_text.trim().to_string(),
        avatar_url: raw.avatar_url.trim().to_string(),
        scraped_at: now,
    })
}
