use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{error, info};

use crate::db;
use crate::export;
use crate::ledger::DedupLedger;
use crate::model::Review;
use crate::notify::{DeltaNotice, Notifier};

pub struct ReportOutcome {
    pub new_ids: usize,
    pub new_records: usize,
    pub exported: Option<PathBuf>,
    pub notified: bool,
    /// Set when persistence and export succeeded but the notification did not.
    pub notify_error: Option<anyhow::Error>,
}

/// Hand a finished run to its consumers: persist, then export and notify if
/// anything new was found.
///
/// Persistence always happens and comes first. A notification failure is
/// returned in the outcome rather than as an error, since everything before it
/// is already committed.
pub async fn report(
    conn: &Connection,
    ledger: &DedupLedger,
    delta: &[Review],
    export_path: &Path,
    notifier: Option<&dyn Notifier>,
) -> Result<ReportOutcome> {
    let (new_ids, new_records) =
        db::commit_run(conn, ledger, delta).context("Failed to persist review ledger")?;
    info!(new_ids, new_records, seen = ledger.len(), "Ledger persisted");

    let mut outcome = ReportOutcome {
        new_ids,
        new_records,
        exported: None,
        notified: false,
        notify_error: None,
    };

    if delta.is_empty() {
        info!("No new bad reviews found.");
        return Ok(outcome);
    }

    export::write_csv(export_path, delta)
        .with_context(|| format!("Failed to export delta to {}", export_path.display()))?;
    info!(count = delta.len(), path = %export_path.display(), "Delta exported");
    outcome.exported = Some(export_path.to_path_buf());

    let Some(notifier) = notifier else {
        info!("Notification disabled");
        return Ok(outcome);
    };

    let notice = DeltaNotice::new(delta.len(), export_path.to_path_buf());
    match notifier.send(&notice).await {
        Ok(()) => outcome.notified = true,
        Err(e) => {
            error!(error = %e, "Notification failed");
            outcome.notify_error = Some(e);
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<DeltaNotice>>,
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn send(&self, notice: &DeltaNotice) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(notice.clone());
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl Notifier for Broken {
        async fn send(&self, _notice: &DeltaNotice) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    fn review(id: &str) -> Review {
        Review {
            business_name: "Acme".to_string(),
            source_url: "https://maps.example.com/acme".to_string(),
            review_id: id.to_string(),
            rating: 2,
            reviewer_name: "Ann".to_string(),
            review_date: "today".to_string(),
            review_text: String::new(),
            avatar_url: String::new(),
            scraped_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn empty_delta_persists_ledger_and_stays_quiet() {
        let conn = memory_db();
        let dir = tempfile::tempdir().unwrap();
        let export_path = dir.path().join("delta.csv");
        let ledger: DedupLedger = vec!["old".to_string()].into_iter().collect();
        let recorder = Recorder::default();

        let outcome = report(&conn, &ledger, &[], &export_path, Some(&recorder))
            .await
            .unwrap();

        assert_eq!(outcome.new_ids, 1);
        assert!(outcome.exported.is_none());
        assert!(!outcome.notified);
        assert!(!export_path.exists());
        assert!(recorder.sent.lock().unwrap().is_empty());
        assert_eq!(db::load_ledger(&conn).unwrap(), ledger);
    }

    #[tokio::test]
    async fn non_empty_delta_is_exported_and_notified() {
        let conn = memory_db();
        let dir = tempfile::tempdir().unwrap();
        let export_path = dir.path().join("delta.csv");
        let ledger: DedupLedger = vec!["r1".to_string(), "r2".to_string()].into_iter().collect();
        let delta = vec![review("r1"), review("r2")];
        let recorder = Recorder::default();

        let outcome = report(&conn, &ledger, &delta, &export_path, Some(&recorder))
            .await
            .unwrap();

        assert_eq!(outcome.new_records, 2);
        assert!(outcome.notified);
        assert!(export_path.exists());
        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].count, 2);
        assert_eq!(sent[0].attachment, export_path);
    }

    #[tokio::test]
    async fn notify_failure_keeps_persisted_state() {
        let conn = memory_db();
        let dir = tempfile::tempdir().unwrap();
        let export_path = dir.path().join("delta.csv");
        let ledger: DedupLedger = vec!["r1".to_string()].into_iter().collect();
        let delta = vec![review("r1")];

        let outcome = report(&conn, &ledger, &delta, &export_path, Some(&Broken))
            .await
            .unwrap();

        assert!(!outcome.notified);
        assert!(outcome.notify_error.is_some());
        assert_eq!(db::fetch_reviews(&conn).unwrap().len(), 1);
        assert!(db::load_ledger(&conn).unwrap().contains("r1"));
    }

    #[tokio::test]
    async fn disabled_notifier_still_exports() {
        let conn = memory_db();
        let dir = tempfile::tempdir().unwrap();
        let export_path = dir.path().join("delta.csv");
        let ledger: DedupLedger = vec!["r1".to_string()].into_iter().collect();

        let outcome = report(&conn, &ledger, &[review("r1")], &export_path, None)
            .await
            .unwrap();

        assert!(outcome.exported.is_some());
        assert!(!outcome.notified);
        assert!(outcome.notify_error.is_none());
    }
}
