//! Report counts per location and day.
//!
//! Derived state: each classified report adds one to its bucket. The table
//! can be recomputed from the message store with [`LocationAggregate::rebuild`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{MonitorError, Result};
use crate::models::{Classification, LocationReportBucket, Message};
use crate::schema::locations;
use crate::storage::{self, StagedTable};

/// Location x date report counts backed by a CSV file
#[derive(Debug)]
pub struct LocationAggregate {
    path: PathBuf,
    buckets: Vec<LocationReportBucket>,
    index: HashMap<(String, String), usize>,
}

impl LocationAggregate {
    /// Open the aggregate at `path`, creating an empty table if it is absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        storage::ensure_table(&path, &locations::HEADER)?;

        let rows = storage::read_table(&path, &locations::HEADER)?;
        let mut aggregate = Self::empty(path);

        for (line, record) in rows.records.iter().enumerate() {
            let line = line + 2;
            let location = rows.field(record, 0).to_string();
            let date = rows.field(record, 1).to_string();
            let count = parse_count(rows.field(record, 2)).ok_or_else(|| MonitorError::Persistence {
                path: aggregate.path.clone(),
                message: format!("line {line}: invalid report_count '{}'", rows.field(record, 2)),
            })?;

            if let Some(&i) = aggregate.index.get(&(location.clone(), date.clone())) {
                warn!(line, location = %location, date = %date, "Merging duplicate bucket row");
                aggregate.buckets[i].report_count += count;
            } else {
                aggregate.insert(LocationReportBucket {
                    location,
                    date,
                    report_count: count,
                });
            }
        }

        info!(path = %aggregate.path.display(), buckets = aggregate.buckets.len(), "Loaded location aggregate");
        Ok(aggregate)
    }

    /// Recompute every bucket from the reports in `messages`, replacing the
    /// current contents. Nothing is written until [`persist`](Self::persist).
    pub fn rebuild<'a, I>(&mut self, messages: I) -> usize
    where
        I: IntoIterator<Item = &'a Message>,
    {
        self.buckets.clear();
        self.index.clear();

        let mut reports = 0;
        for message in messages {
            if let Classification::Report { location } = &message.classification {
                self.increment(location, &message.date_key());
                reports += 1;
            }
        }

        info!(reports, buckets = self.buckets.len(), "Rebuilt location aggregate");
        reports
    }

    /// Backing file of this aggregate
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All buckets in creation order
    #[must_use]
    pub fn buckets(&self) -> &[LocationReportBucket] {
        &self.buckets
    }

    /// Count for one key, zero when no bucket exists
    #[must_use]
    pub fn count(&self, location: &str, date: &str) -> u64 {
        self.index
            .get(&(location.to_string(), date.to_string()))
            .map_or(0, |&i| self.buckets[i].report_count)
    }

    /// Total number of reports across all buckets
    #[must_use]
    pub fn total_reports(&self) -> u64 {
        self.buckets.iter().map(|b| b.report_count).sum()
    }

    /// Buckets ordered for display: newest day first, then busiest location.
    #[must_use]
    pub fn sorted_for_display(&self) -> Vec<LocationReportBucket> {
        let mut sorted = self.buckets.clone();
        sorted.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.report_count.cmp(&a.report_count))
                .then_with(|| a.location.cmp(&b.location))
        });
        sorted
    }

    /// Add one report for `(location, date)`, creating the bucket on first use.
    pub fn increment(&mut self, location: &str, date: &str) {
        let key = (location.to_string(), date.to_string());
        if let Some(&i) = self.index.get(&key) {
            self.buckets[i].report_count += 1;
            debug!(location, date, count = self.buckets[i].report_count, "Incremented bucket");
        } else {
            self.insert(LocationReportBucket {
                location: key.0,
                date: key.1,
                report_count: 1,
            });
            debug!(location, date, "Created bucket");
        }
    }

    /// Write every bucket back to the backing file.
    pub fn persist(&self) -> Result<()> {
        self.stage()?.commit()?;
        debug!(path = %self.path.display(), buckets = self.buckets.len(), "Persisted location aggregate");
        Ok(())
    }

    /// Write the buckets to a temporary sibling without replacing the table.
    pub(crate) fn stage(&self) -> Result<StagedTable> {
        storage::stage_table(&self.path, &locations::HEADER, |writer| {
            for bucket in &self.buckets {
                writer.write_record([
                    bucket.location.as_str(),
                    bucket.date.as_str(),
                    bucket.report_count.to_string().as_str(),
                ])?;
            }
            Ok(())
        })
    }

    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            buckets: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, bucket: LocationReportBucket) {
        self.index
            .insert((bucket.location.clone(), bucket.date.clone()), self.buckets.len());
        self.buckets.push(bucket);
    }
}

/// Positive count, accepting the `1.0` style some spreadsheet tools write.
fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let count = raw.parse::<u64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0 && *f >= 1.0 && *f <= u32::MAX as f64)
            .map(|f| f as u64)
    })?;
    (count > 0).then_some(count)
}
