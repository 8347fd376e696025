use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use tracing::{debug, error, info, warn};

use crate::extract::{ExtractError, PageExtractor};
use crate::ledger::DedupLedger;
use crate::model::{Review, Target};
use crate::review::{self, Rejection};

/// Durable home for each review the moment it is accepted.
///
/// `record` must either persist the review and its id together or fail without
/// persisting either; the pipeline only admits the id to the ledger afterwards.
pub trait ReviewSink {
    fn record(&mut self, review: &Review) -> Result<()>;
}

/// Sink for snapshot mode: nothing is written until the run is reported.
pub struct Deferred;

impl ReviewSink for Deferred {
    fn record(&mut self, _review: &Review) -> Result<()> {
        Ok(())
    }
}

pub struct TargetFailure {
    pub target: Target,
    pub error: ExtractError,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RejectCounts {
    pub missing_id: usize,
    pub duplicate: usize,
    pub above_threshold: usize,
}

/// Result of one pass over all targets.
pub struct RunOutcome {
    /// Accepted reviews, in target order then page order.
    pub delta: Vec<Review>,
    pub targets_attempted: usize,
    pub failed: Vec<TargetFailure>,
    pub malformed: usize,
    pub rejected: RejectCounts,
    /// Set when the sink refused a review. The run stopped there; `delta`
    /// still holds everything the sink accepted before it.
    pub sink_error: Option<anyhow::Error>,
}

impl RunOutcome {
    fn new() -> Self {
        Self {
            delta: Vec::new(),
            targets_attempted: 0,
            failed: Vec::new(),
            malformed: 0,
            rejected: RejectCounts::default(),
            sink_error: None,
        }
    }
}

pub struct Pipeline<'a> {
    extractor: &'a dyn PageExtractor,
    threshold: u8,
    clock: fn() -> DateTime<Utc>,
    progress: ProgressBar,
}

impl<'a> Pipeline<'a> {
    pub fn new(extractor: &'a dyn PageExtractor, threshold: u8) -> Self {
        Self {
            extractor,
            threshold,
            clock: Utc::now,
            progress: ProgressBar::hidden(),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Visit every target once, in order, admitting new bad reviews to `ledger`
    /// and `sink`.
    ///
    /// Extraction failures and malformed records are skipped. A sink failure
    /// stops the run and is returned in `sink_error`, alongside the reviews
    /// the sink had already committed.
    pub async fn run(
        &self,
        targets: &[Target],
        ledger: &mut DedupLedger,
        sink: &mut dyn ReviewSink,
    ) -> RunOutcome {
        let mut outcome = RunOutcome::new();

        'targets: for target in targets {
            outcome.targets_attempted += 1;
            self.progress.set_message(target.business_name.clone());
            info!(business = %target.business_name, url = %target.url, "Checking target");

            let records = match self.extractor.extract(&target.url).await {
                Ok(records) => records,
                Err(error) => {
                    warn!(business = %target.business_name, %error, "Skipping target");
                    outcome.failed.push(TargetFailure {
                        target: target.clone(),
                        error,
                    });
                    self.progress.inc(1);
                    continue;
                }
            };

            let before = outcome.delta.len();
            for record in records {
                let raw = match record {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(business = %target.business_name, error = %e, "Skipping malformed review");
                        outcome.malformed += 1;
                        continue;
                    }
                };

                match review::normalize(&raw, target, ledger, self.threshold, (self.clock)()) {
                    Ok(accepted) => {
                        let recorded = sink.record(&accepted).with_context(|| {
                            format!("Failed to persist review {}", accepted.review_id)
                        });
                        if let Err(e) = recorded {
                            error!(business = %target.business_name, error = %e, "Stopping run");
                            outcome.sink_error = Some(e);
                            self.progress.inc(1);
                            break 'targets;
                        }
                        ledger.add(accepted.review_id.clone());
                        outcome.delta.push(accepted);
                    }
                    Err(rejection) => {
                        debug!(business = %target.business_name, %rejection, "Rejected review");
                        match rejection {
                            Rejection::MissingId => outcome.rejected.missing_id += 1,
                            Rejection::Duplicate(_) => outcome.rejected.duplicate += 1,
                            Rejection::AboveThreshold { .. } => outcome.rejected.above_threshold += 1,
                        }
                    }
                }
            }

            info!(
                business = %target.business_name,
                new_bad = outcome.delta.len() - before,
                "Target done"
            );
            self.progress.inc(1);
        }

        info!(
            targets = outcome.targets_attempted,
            failed = outcome.failed.len(),
            new_bad = outcome.delta.len(),
            malformed = outcome.malformed,
            stopped = outcome.sink_error.is_some(),
            "Run complete"
        );
        outcome
    }
}
