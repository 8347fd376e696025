use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;

use crate::ledger::DedupLedger;
use crate::model::Review;
use crate::pipeline::ReviewSink;

pub const DEFAULT_DB_PATH: &str = "data/reviews.sqlite";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS seen_reviews (
            review_id     TEXT PRIMARY KEY,
            first_seen_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS bad_reviews (
            id            INTEGER PRIMARY KEY,
            review_id     TEXT UNIQUE NOT NULL,
            business_name TEXT NOT NULL,
            source_url    TEXT NOT NULL,
            rating        INTEGER NOT NULL CHECK(rating BETWEEN 1 AND 5),
            reviewer_name TEXT NOT NULL,
            review_date   TEXT NOT NULL,
            review_text   TEXT NOT NULL,
            avatar_url    TEXT NOT NULL,
            scraped_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_bad_reviews_business ON bad_reviews(business_name);
        ",
    )?;
    Ok(())
}

// ── Ledger ──

pub fn load_ledger(conn: &Connection) -> Result<DedupLedger> {
    let mut stmt = conn.prepare("SELECT review_id FROM seen_reviews")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<DedupLedger, _>>()?;
    Ok(ids)
}

// ── Review store ──

fn insert_review(conn: &Connection, r: &Review) -> Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO seen_reviews (review_id) VALUES (?1)",
        [&r.review_id],
    )?;
    let n = conn.execute(
        "INSERT OR IGNORE INTO bad_reviews
         (review_id, business_name, source_url, rating, reviewer_name, review_date, review_text, avatar_url, scraped_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            r.review_id, r.business_name, r.source_url, r.rating, r.reviewer_name,
            r.review_date, r.review_text, r.avatar_url, r.scraped_at.to_rfc3339(),
        ],
    )?;
    Ok(n)
}

/// Store reviews and their ids in one transaction. Already stored ids are skipped.
pub fn save_reviews(conn: &Connection, reviews: &[Review]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    for r in reviews {
        count += insert_review(&tx, r)?;
    }
    tx.commit()?;
    Ok(count)
}

/// Append-only durability: every accepted review is committed before the run
/// moves on, so a crash can only lose reviews that were never acknowledged.
pub struct AppendLog<'c> {
    conn: &'c Connection,
}

impl<'c> AppendLog<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl ReviewSink for AppendLog<'_> {
    fn record(&mut self, review: &Review) -> Result<()> {
        save_reviews(self.conn, std::slice::from_ref(review))?;
        Ok(())
    }
}

pub fn fetch_reviews(conn: &Connection) -> Result<Vec<Review>> {
    let mut stmt = conn.prepare(
        "SELECT business_name, source_url, review_id, rating, reviewer_name,
                review_date, review_text, avatar_url, scraped_at
         FROM bad_reviews ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let scraped_at: String = row.get(8)?;
            let scraped_at = DateTime::parse_from_rfc3339(&scraped_at)
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e))
                })?
                .with_timezone(&Utc);
            Ok(Review {
                business_name: row.get(0)?,
                source_url: row.get(1)?,
                review_id: row.get(2)?,
                rating: row.get(3)?,
                reviewer_name: row.get(4)?,
                review_date: row.get(5)?,
                review_text: row.get(6)?,
                avatar_url: row.get(7)?,
                scraped_at,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Commit the run: delta records and the full ledger snapshot in one transaction.
/// Returns (new ids, new records). Re-committing the same state adds nothing.
pub fn commit_run(conn: &Connection, ledger: &DedupLedger, delta: &[Review]) -> Result<(usize, usize)> {
    let tx = conn.unchecked_transaction()?;
    let before: i64 = tx.query_row("SELECT COUNT(*) FROM seen_reviews", [], |r| r.get(0))?;
    let mut records = 0;
    for r in delta {
        records += insert_review(&tx, r)?;
    }
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO seen_reviews (review_id) VALUES (?1)")?;
        for id in ledger.snapshot() {
            stmt.execute([id])?;
        }
    }
    let after: i64 = tx.query_row("SELECT COUNT(*) FROM seen_reviews", [], |r| r.get(0))?;
    tx.commit()?;
    Ok(((after - before) as usize, records))
}

// ── Stats ──

pub struct Stats {
    pub seen: i64,
    pub stored: i64,
    pub by_business: Vec<(String, i64)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let seen: i64 = conn.query_row("SELECT COUNT(*) FROM seen_reviews", [], |r| r.get(0))?;
    let stored: i64 = conn.query_row("SELECT COUNT(*) FROM bad_reviews", [], |r| r.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT business_name, COUNT(*) AS n FROM bad_reviews
         GROUP BY business_name ORDER BY n DESC, business_name",
    )?;
    let by_business = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stats {
        seen,
        stored,
        by_business,
    })
}
