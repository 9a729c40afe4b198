//! Ingestion and classification stages.
//!
//! Each run is triggered externally and runs to completion against stores
//! it has exclusive access to. Ingestion is all-or-nothing. Classification
//! keeps going past failing items and writes both tables once at the end.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::aggregate::LocationAggregate;
use crate::classifier::{parse_reply, Classifier};
use crate::error::{MonitorError, Result};
use crate::logging::OperationTimer;
use crate::metrics::MetricsCollector;
use crate::models::{DedupKey, Message, ParsedReply};
use crate::search::SearchSource;
use crate::store::MessageStore;

/// Outcome of one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionSummary {
    /// Candidates returned by the search collaborator
    pub fetched: usize,
    /// Candidates that were new and got stored
    pub added: usize,
}

/// Pulls candidate messages and merges them into the message store
pub struct IngestionStage<S> {
    source: S,
    metrics: MetricsCollector,
}

impl<S: SearchSource> IngestionStage<S> {
    /// Stage pulling from `source`
    pub fn new(source: S) -> Self {
        Self {
            source,
            metrics: MetricsCollector::default(),
        }
    }

    /// Candidates from the search collaborator, without storing them.
    pub async fn fetch(&self) -> Result<Vec<Message>> {
        self.source.fetch().await
    }

    /// Fetch and merge. A transport failure aborts the run before the store
    /// is touched.
    pub async fn run(&self, store: &mut MessageStore) -> Result<IngestionSummary> {
        let timer = OperationTimer::new("ingest");

        let candidates = match self.fetch().await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.metrics.record_error(e.kind(), "ingest");
                return Err(e);
            }
        };
        let fetched = candidates.len();

        let added = store.merge_ingested(candidates).inspect_err(|e| {
            self.metrics.record_error(e.kind(), "ingest");
        })?;

        self.metrics.record_ingestion(fetched, added, timer.elapsed());
        info!(fetched, added, total = store.len(), "Ingestion finished");
        timer.finish();

        Ok(IngestionSummary { fetched, added })
    }
}

/// Result of classifying one message
#[derive(Debug)]
pub enum ItemOutcome {
    /// Stored as a report; `date` is the aggregate bucket it counted towards
    Report {
        /// Message key
        key: DedupKey,
        /// Extracted location
        location: String,
        /// Bucket date
        date: String,
    },
    /// Stored as a comment
    Comment {
        /// Message key
        key: DedupKey,
    },
    /// Left unclassified for a future run
    Failed {
        /// Message key
        key: DedupKey,
        /// Why the item failed
        error: MonitorError,
    },
}

/// A message that could not be classified in this run
#[derive(Debug)]
pub struct ItemFailure {
    /// Message key
    pub key: DedupKey,
    /// Why it failed
    pub error: MonitorError,
}

/// Outcome of one classification run
#[derive(Debug, Default)]
pub struct ClassificationSummary {
    /// Unclassified messages at the start of the run
    pub candidates: usize,
    /// Messages whose classification was written
    pub classified: usize,
    /// Of those, how many were reports counted in the aggregate
    pub reports: usize,
    /// Messages left unset
    pub failures: Vec<ItemFailure>,
    /// Wall time of the run
    pub duration: Duration,
}

impl ClassificationSummary {
    /// Number of messages actually updated; the figure reported to users.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.classified
    }

    /// Messages labelled as comments
    #[must_use]
    pub const fn comments(&self) -> usize {
        self.classified - self.reports
    }

    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Report { .. } => {
                self.classified += 1;
                self.reports += 1;
            }
            ItemOutcome::Comment { .. } => self.classified += 1,
            ItemOutcome::Failed { key, error } => self.failures.push(ItemFailure { key, error }),
        }
    }
}

/// Labels every unclassified message and feeds reports into the aggregate
pub struct ClassificationStage<C> {
    classifier: C,
    metrics: MetricsCollector,
}

impl<C: Classifier> ClassificationStage<C> {
    /// Stage labelling through `classifier`
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            metrics: MetricsCollector::default(),
        }
    }

    /// Classify all unset messages in `store`.
    ///
    /// Item failures are collected in the summary and never abort the run.
    /// Only a failure to persist the tables is returned as an error; the
    /// in-memory tables are then ahead of disk and should be reopened.
    pub async fn run(&self, store: &mut MessageStore, aggregate: &mut LocationAggregate) -> Result<ClassificationSummary> {
        let timer = OperationTimer::new("classify");
        let pending = store.unclassified();

        let mut summary = ClassificationSummary {
            candidates: pending.len(),
            ..ClassificationSummary::default()
        };
        if pending.is_empty() {
            info!("No unclassified messages");
            return Ok(summary);
        }

        info!(candidates = pending.len(), "Classifying messages");
        for message in &pending {
            let outcome = self.classify_one(message, store, aggregate).await;
            summary.record(outcome);
        }

        if summary.classified > 0 {
            if let Err(e) = persist_together(store, aggregate) {
                self.metrics.record_error(e.kind(), "classify");
                error!(error = %e, "Failed to persist classification results");
                return Err(e);
            }
        }

        summary.duration = timer.elapsed();
        self.metrics.record_stage_duration("classify", summary.duration);
        info!(
            candidates = summary.candidates,
            classified = summary.classified,
            reports = summary.reports,
            failed = summary.failures.len(),
            "Classification finished"
        );
        timer.finish();

        Ok(summary)
    }

    async fn classify_one(&self, message: &Message, store: &mut MessageStore, aggregate: &mut LocationAggregate) -> ItemOutcome {
        let key = message.key();

        let parsed = match self.classifier.classify(message).await.and_then(|reply| parse_reply(&reply)) {
            Ok(parsed) => parsed,
            Err(error) => return self.failed(key, error),
        };

        match store.update_classification(&key, parsed.clone()) {
            Ok(true) => {}
            Ok(false) => {
                return self.failed(key, MonitorError::Classification("message was already classified".to_string()));
            }
            Err(error) => return self.failed(key, error),
        }

        match parsed {
            ParsedReply::Report { location } => {
                let date = message.date_key();
                aggregate.increment(&location, &date);
                self.metrics.record_classification("report");
                self.metrics.record_report_aggregated();
                ItemOutcome::Report { key, location, date }
            }
            ParsedReply::Comment => {
                self.metrics.record_classification("comment");
                ItemOutcome::Comment { key }
            }
        }
    }

    fn failed(&self, key: DedupKey, error: MonitorError) -> ItemOutcome {
        warn!(key = %key, kind = error.kind(), error = %error, "Failed to classify message, leaving it unset");
        self.metrics.record_classification_failure(error.kind());
        ItemOutcome::Failed { key, error }
    }
}

/// Write both tables so that neither is replaced unless both were written.
///
/// Both tables are staged first; a staging failure leaves the files on disk
/// exactly as they were. Only the final renames can split the pair, and that
/// case is reported as needing a rebuild.
fn persist_together(store: &mut MessageStore, aggregate: &LocationAggregate) -> Result<()> {
    let staged_messages = store.stage()?;
    let staged_locations = aggregate.stage()?;

    staged_messages.commit()?;
    store.mark_persisted();

    let locations_path = staged_locations.path().to_path_buf();
    staged_locations.commit().map_err(|e| MonitorError::Persistence {
        path: locations_path,
        message: format!("message table saved but location aggregate was not ({e}); run `rebuild`"),
    })
}

/// Recompute the aggregate from every report in `store` and persist it.
///
/// Returns the number of reports counted.
pub fn rebuild_aggregate(store: &MessageStore, aggregate: &mut LocationAggregate) -> Result<usize> {
    let timer = OperationTimer::new("rebuild");
    let reports = aggregate.rebuild(store.messages());
    aggregate.persist()?;
    MetricsCollector::default().record_stage_duration("rebuild", timer.elapsed());
    timer.finish();
    Ok(reports)
}
