//! Durable table of ingested messages.
//!
//! The whole table is held in memory and rewritten on [`MessageStore::persist`].
//! Rows are identified by their [`DedupKey`]; ingesting a row whose key is
//! already present is a no-op.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::error::{MonitorError, Result};
use crate::models::{Classification, DedupKey, Message, ParsedReply};
use crate::schema::messages;
use crate::storage::{self, StagedTable, TableRows};

/// Ingested messages backed by a CSV file
#[derive(Debug)]
pub struct MessageStore {
    path: PathBuf,
    messages: Vec<Message>,
    index: HashMap<DedupKey, usize>,
    pending_updates: usize,
}

impl MessageStore {
    /// Open the store at `path`, creating an empty table if it is absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        storage::ensure_table(&path, &messages::HEADER)?;

        let rows = storage::read_table(&path, &messages::HEADER)?;
        let mut store = Self {
            path,
            messages: Vec::with_capacity(rows.records.len()),
            index: HashMap::with_capacity(rows.records.len()),
            pending_updates: 0,
        };

        for (line, record) in rows.records.iter().enumerate() {
            let message = decode_row(&store.path, &rows, record, line + 2)?;
            let key = message.key();
            if store.index.contains_key(&key) {
                warn!(line = line + 2, key = %key, "Duplicate message row ignored");
                continue;
            }
            store.index.insert(key, store.messages.len());
            store.messages.push(message);
        }

        info!(path = %store.path.display(), messages = store.messages.len(), "Loaded message store");
        Ok(store)
    }

    /// Backing file of this store
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All messages in ingestion order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of stored messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when no message has been ingested yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Look up a message by its dedup key
    #[must_use]
    pub fn get(&self, key: &DedupKey) -> Option<&Message> {
        self.index.get(key).and_then(|&i| self.messages.get(i))
    }

    /// Merge freshly fetched candidates, skipping any already known.
    ///
    /// Candidates are compared against stored rows and against candidates
    /// accepted earlier in the same call. New rows are appended in arrival
    /// order and the table is persisted when at least one was added.
    pub fn merge_ingested<I>(&mut self, candidates: I) -> Result<usize>
    where
        I: IntoIterator<Item = Message>,
    {
        let mut added = 0;

        for mut candidate in candidates {
            let key = candidate.key();
            if self.index.contains_key(&key) {
                debug!(key = %key, "Skipping duplicate message");
                continue;
            }
            if !candidate.classification.is_unset() {
                debug!(key = %key, "Dropping classification on ingested candidate");
                candidate.classification = Classification::Unset;
            }
            self.index.insert(key, self.messages.len());
            self.messages.push(candidate);
            added += 1;
        }

        if added > 0 {
            self.persist()?;
        }
        Ok(added)
    }

    /// Record the classifier's verdict for the message identified by `key`.
    ///
    /// Changes stay in memory until [`persist`](Self::persist). Returns false
    /// without touching the row when it is already classified.
    pub fn update_classification(&mut self, key: &DedupKey, reply: ParsedReply) -> Result<bool> {
        let classification = reply.into_classification();
        if let Classification::Report { location } = &classification {
            if location.trim().is_empty() {
                return Err(MonitorError::Classification(format!("report for {key} has no location")));
            }
        }

        let message = self
            .index
            .get(key)
            .and_then(|&i| self.messages.get_mut(i))
            .ok_or_else(|| MonitorError::Persistence {
                path: self.path.clone(),
                message: format!("no message with key {key}"),
            })?;

        if !message.classification.is_unset() {
            warn!(key = %key, current = message.classification.label(), "Message already classified");
            return Ok(false);
        }

        message.classification = classification;
        self.pending_updates += 1;
        Ok(true)
    }

    /// Every message still waiting for a classification, in store order.
    #[must_use]
    pub fn unclassified(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.classification.is_unset())
            .cloned()
            .collect()
    }

    /// Number of classification updates not yet written to disk
    #[must_use]
    pub const fn pending_updates(&self) -> usize {
        self.pending_updates
    }

    /// Write the whole table back to its file.
    pub fn persist(&mut self) -> Result<()> {
        self.stage()?.commit()?;
        self.mark_persisted();
        Ok(())
    }

    /// Write the table to a temporary sibling without replacing it yet.
    pub(crate) fn stage(&self) -> Result<StagedTable> {
        storage::stage_table(&self.path, &messages::HEADER, |writer| {
            for message in &self.messages {
                writer.write_record([
                    message.author_id.as_str(),
                    message.text.as_str(),
                    message.posted_at.as_str(),
                    message.classification.label(),
                    message.location(),
                ])?;
            }
            Ok(())
        })
    }

    /// Record that a staged copy of the table was committed.
    pub(crate) fn mark_persisted(&mut self) {
        debug!(path = %self.path.display(), messages = self.messages.len(), "Persisted message store");
        self.pending_updates = 0;
    }
}

fn decode_row(path: &Path, rows: &TableRows, record: &StringRecord, line: usize) -> Result<Message> {
    let author_id = rows.field(record, 0);
    let text = rows.field(record, 1);
    let posted_at = rows.field(record, 2);
    let label = rows.field(record, 3).trim().to_lowercase();
    let location = rows.field(record, 4).trim();

    let classification = if messages::UNSET_MARKERS.contains(&label.as_str()) {
        if !location.is_empty() {
            warn!(line, "Ignoring location on unclassified row");
        }
        Classification::Unset
    } else if label == "report" {
        if location.is_empty() {
            warn!(line, "Report row without location, marking for reclassification");
            Classification::Unset
        } else {
            Classification::Report {
                location: location.to_string(),
            }
        }
    } else if label == "comment" {
        Classification::Comment
    } else {
        return Err(MonitorError::Persistence {
            path: path.to_path_buf(),
            message: format!("line {line}: unknown classification '{label}'"),
        });
    };

    Ok(Message {
        author_id: author_id.to_string(),
        text: text.to_string(),
        posted_at: posted_at.to_string(),
        classification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_unset_markers_decode_as_unset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.csv");
        fs::write(
            &path,
            "user,message,date,classification,location\n\
             1,a,2024-01-01,,\n\
             2,b,2024-01-01,nan,\n\
             3,c,2024-01-01,NaN,\n\
             4,d,2024-01-01,  ,\n\
             5,e,2024-01-01,comment,\n\
             6,f,2024-01-01,report,Centro\n",
        )
        .unwrap();

        let store = MessageStore::open(&path).unwrap();
        let unset: Vec<_> = store.unclassified().into_iter().map(|m| m.author_id).collect();
        assert_eq!(unset, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_unknown_label_is_persistence_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.csv");
        fs::write(&path, "user,message,date,classification,location\n1,a,d,maybe,\n").unwrap();

        let err = MessageStore::open(&path).unwrap_err();
        assert!(err.is_persistence());
    }

    #[test]
    fn test_report_without_location_reloads_as_unset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.csv");
        fs::write(&path, "user,message,date,classification,location\n1,a,d,report,\n").unwrap();

        let store = MessageStore::open(&path).unwrap();
        assert_eq!(store.unclassified().len(), 1);
    }

    #[test]
    fn test_update_classification_is_once_only() {
        let dir = tempdir().unwrap();
        let mut store = MessageStore::open(dir.path().join("m.csv")).unwrap();
        let message = Message::new("7", "rua alagada", "2024-01-10T10:00:00Z");
        store.merge_ingested(vec![message.clone()]).unwrap();

        assert!(store.update_classification(&message.key(), ParsedReply::Comment).unwrap());
        assert_eq!(store.pending_updates(), 1);
        let again = ParsedReply::Report { location: "Centro".into() };
        assert!(!store.update_classification(&message.key(), again).unwrap());
        assert_eq!(store.get(&message.key()).unwrap().classification, Classification::Comment);
    }

    #[test]
    fn test_update_rejects_report_without_location() {
        let dir = tempdir().unwrap();
        let mut store = MessageStore::open(dir.path().join("m.csv")).unwrap();
        let message = Message::new("7", "rua alagada", "2024-01-10T10:00:00Z");
        store.merge_ingested(vec![message.clone()]).unwrap();

        let reply = ParsedReply::Report { location: "  ".into() };
        assert!(store.update_classification(&message.key(), reply).is_err());
        assert!(store.get(&message.key()).unwrap().classification.is_unset());
    }

    #[test]
    fn test_update_unknown_key() {
        let dir = tempdir().unwrap();
        let mut store = MessageStore::open(dir.path().join("m.csv")).unwrap();
        let key = Message::new("1", "x", "y").key();
        assert!(store.update_classification(&key, ParsedReply::Comment).is_err());
    }
}
