use scraper::{ElementRef, Html, Selector};

use super::{ExtractError, PageRead, RecordError};
use crate::model::RawReview;

// Class names used by the rendered place page.
const MAIN_PANEL: &str = r#"div[role="main"]"#;
const REVIEW: &str = "div.jftiEf";
const RATING: &str = "span.kvMYJc";
const REVIEWER: &str = "div.d4r55";
const DATE: &str = "span.rsqaWe";
const TEXT: &str = "span.wiI7pd";
const AVATAR: &str = "img.NBa7we";

const REVIEW_ID_ATTR: &str = "data-review-id";

struct Selectors {
    main: Selector,
    review: Selector,
    rating: Selector,
    reviewer: Selector,
    date: Selector,
    text: Selector,
    avatar: Selector,
}

impl Selectors {
    fn new() -> Self {
        let parse = |s: &str| Selector::parse(s).unwrap();
        Self {
            main: parse(MAIN_PANEL),
            review: parse(REVIEW),
            rating: parse(RATING),
            reviewer: parse(REVIEWER),
            date: parse(DATE),
            text: parse(TEXT),
            avatar: parse(AVATAR),
        }
    }
}

/// Split a rendered review page into raw review records, in page order.
///
/// - No main panel: the page did not render as a place page, so it is an error.
/// - Main panel but no review containers: `Ok` with no records.
/// - A container without rating element or reviewer name becomes a `RecordError`
///   and does not affect its neighbours.
pub fn parse_reviews(html: &str) -> Result<PageRead, ExtractError> {
    let document = Html::parse_document(html);
    let sel = Selectors::new();

    if document.select(&sel.main).next().is_none() {
        return Err(ExtractError::MissingElements(MAIN_PANEL));
    }

    Ok(document
        .select(&sel.review)
        .map(|el| parse_one(el, &sel))
        .collect())
}

fn parse_one(el: ElementRef, sel: &Selectors) -> Result<RawReview, RecordError> {
    let rating = el
        .select(&sel.rating)
        .next()
        .ok_or(RecordError::MissingField(RATING))?;
    let reviewer = el
        .select(&sel.reviewer)
        .next()
        .ok_or(RecordError::MissingField(REVIEWER))?;

    Ok(RawReview {
        review_id: el.value().attr(REVIEW_ID_ATTR).map(String::from),
        rating_label: rating.value().attr("aria-label").unwrap_or_default().to_string(),
        reviewer_name: text_of(reviewer),
        date_label: first_text(el, &sel.date),
        body_text: first_text(el, &sel.text),
        avatar_url: el
            .select(&sel.avatar)
            .next()
            .and_then(|img| img.value().attr("src"))
            .unwrap_or_default()
            .to_string(),
    })
}

fn first_text(el: ElementRef, selector: &Selector) -> String {
    el.select(selector).next().map(text_of).unwrap_or_default()
}

fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_html(id: &str, rating: &str, name: &str) -> String {
        format!(
            r#"<div class="jftiEf" data-review-id="{id}">
                 <img class="NBa7we" src="https://img.example/{id}.png">
                 <div class="d4r55">{name}</div>
                 <span class="kvMYJc" aria-label="{rating}"></span>
                 <span class="rsqaWe">a week ago</span>
                 <span class="wiI7pd">Service was slow.</span>
               </div>"#
        )
    }

    fn page(body: &str) -> String {
        format!(r#"<html><body><div role="main">{body}</div></body></html>"#)
    }

    #[test]
    fn reads_reviews_in_page_order() {
        let html = page(&format!(
            "{}{}",
            review_html("r1", "2 stars", "Ann"),
            review_html("r2", "5 stars", "Bob")
        ));
        let records = parse_reviews(&html).unwrap();
        assert_eq!(records.len(), 2);

        let first = records[0].as_ref().unwrap();
        assert_eq!(first.review_id.as_deref(), Some("r1"));
        assert_eq!(first.rating_label, "2 stars");
        assert_eq!(first.reviewer_name, "Ann");
        assert_eq!(first.date_label, "a week ago");
        assert_eq!(first.body_text, "Service was slow.");
        assert_eq!(first.avatar_url, "https://img.example/r1.png");
        assert_eq!(records[1].as_ref().unwrap().review_id.as_deref(), Some("r2"));
    }

    #[test]
    fn page_without_main_panel_is_unreadable() {
        let err = parse_reviews("<html><body><p>consent wall</p></body></html>").unwrap_err();
        assert!(matches!(err, ExtractError::MissingElements(_)));
    }

    #[test]
    fn readable_page_without_reviews_is_empty() {
        let records = parse_reviews(&page("<h1>Acme</h1>")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn malformed_review_does_not_affect_neighbours() {
        let broken = r#"<div class="jftiEf" data-review-id="rx"><span class="wiI7pd">text only</span></div>"#;
        let html = page(&format!("{}{}", broken, review_html("r2", "1 star", "Cy")));
        let records = parse_reviews(&html).unwrap();
        assert_eq!(records[0], Err(RecordError::MissingField(RATING)));
        assert!(records[1].is_ok());
    }

    #[test]
    fn optional_fields_default_to_empty() {
        let html = page(
            r#"<div class="jftiEf"><div class="d4r55">Dee</div><span class="kvMYJc"></span></div>"#,
        );
        let records = parse_reviews(&html).unwrap();
        let raw = records[0].as_ref().unwrap();
        assert_eq!(raw.review_id, None);
        assert_eq!(raw.rating_label, "");
        assert_eq!(raw.body_text, "");
        assert_eq!(raw.avatar_url, "");
    }
}
