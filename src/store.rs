use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data_model::{DocumentProcessingRecord, ProcessingStats, ProcessingUpdate};
use crate::reducer;

/// What to do with an update for a document id the store has never seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownDocumentPolicy {
    /// Ignore the update.
    #[default]
    Drop,
    /// Create a provisional record named after the id, then apply the update.
    Placeholder,
}

/// In-memory set of tracked documents.
#[derive(Debug, Default)]
pub struct StatusStore {
    records: HashMap<String, DocumentProcessingRecord>,
    unknown_documents: UnknownDocumentPolicy,
}

impl StatusStore {
    pub fn new(unknown_documents: UnknownDocumentPolicy) -> Self {
        Self {
            records: HashMap::new(),
            unknown_documents,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, document_id: &str) -> Option<&DocumentProcessingRecord> {
        self.records.get(document_id)
    }

    /// All records, oldest first.
    pub fn records(&self) -> Vec<DocumentProcessingRecord> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        records
    }

    /// Seeds a record after a successful upload.
    ///
    /// A provisional placeholder for the same id keeps its stage progress and
    /// only receives the file metadata; any other existing record is replaced.
    pub fn register_document(
        &mut self,
        document_id: &str,
        filename: &str,
        file_type: &str,
        file_size: u64,
    ) -> &DocumentProcessingRecord {
        let fresh = reducer::new_record(document_id, filename, file_type, file_size, Utc::now());
        let record = self
            .records
            .entry(document_id.to_string())
            .and_modify(|existing| {
                if existing.provisional {
                    debug!(document_id, "Filling in provisional record");
                    existing.filename = fresh.filename.clone();
                    existing.file_type = fresh.file_type.clone();
                    existing.file_size = fresh.file_size;
                    existing.provisional = false;
                } else {
                    debug!(document_id, "Replacing existing record on re-registration");
                    *existing = fresh.clone();
                }
            })
            .or_insert(fresh);
        info!(document_id, filename = %record.filename, "Registered document");
        record
    }

    /// Runs the reducer for one update. Returns the updated record, or `None`
    /// if the update was dropped.
    pub fn apply_update(&mut self, update: &ProcessingUpdate) -> Option<&DocumentProcessingRecord> {
        if !self.records.contains_key(&update.document_id) {
            match self.unknown_documents {
                UnknownDocumentPolicy::Drop => {
                    debug!(document_id = %update.document_id, step = %update.step, "Dropping update for unknown document");
                    return None;
                }
                UnknownDocumentPolicy::Placeholder => {
                    info!(document_id = %update.document_id, "Creating placeholder for unregistered document");
                    let mut placeholder = reducer::new_record(
                        update.document_id.as_str(),
                        update.document_id.as_str(),
                        "unknown",
                        0,
                        update.timestamp.unwrap_or_else(Utc::now),
                    );
                    placeholder.provisional = true;
                    self.records.insert(update.document_id.clone(), placeholder);
                }
            }
        }

        let record = self.records.get_mut(&update.document_id)?;
        if !reducer::apply_update(record, update) {
            warn!(document_id = %update.document_id, step = %update.step, "Record has no matching stage");
        }
        Some(&*record)
    }

    pub fn remove_document(&mut self, document_id: &str) -> Option<DocumentProcessingRecord> {
        let removed = self.records.remove(document_id);
        if removed.is_some() {
            info!(document_id, "Removed document");
        }
        removed
    }

    /// Local optimistic retry. Returns `None` for an unknown id.
    pub fn retry(&mut self, document_id: &str) -> Option<&DocumentProcessingRecord> {
        let record = self.records.get_mut(document_id)?;
        reducer::apply_retry(record, Utc::now());
        info!(document_id, stage = %record.current_stage, "Retrying document locally");
        Some(&*record)
    }

    pub fn stats(&self) -> ProcessingStats {
        ProcessingStats::tally(self.records.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::{DocumentStatus, StageId, StageStatus};

    #[test]
    fn test_unknown_update_is_dropped_by_default() {
        let mut store = StatusStore::default();
        let update = ProcessingUpdate::new("ghost", StageId::VirusScan, StageStatus::Completed);
        assert!(store.apply_update(&update).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_placeholder_policy_creates_provisional_record() {
        let mut store = StatusStore::new(UnknownDocumentPolicy::Placeholder);
        let update = ProcessingUpdate::new("late", StageId::VirusScan, StageStatus::Completed);
        let record = store.apply_update(&update).unwrap();
        assert!(record.provisional);
        assert_eq!(record.filename, "late");
        assert_eq!(record.current_stage, StageId::TextExtraction);

        let record = store.register_document("late", "late.docx", "docx", 77);
        assert!(!record.provisional);
        assert_eq!(record.filename, "late.docx");
        assert_eq!(record.file_size, 77);
        // Progress made before registration survives.
        assert_eq!(record.current_stage, StageId::TextExtraction);
    }

    #[test]
    fn test_reregistration_replaces_record() {
        let mut store = StatusStore::default();
        store.register_document("d1", "a.pdf", "pdf", 1);
        store.apply_update(&ProcessingUpdate::new(
            "d1",
            StageId::VirusScan,
            StageStatus::Failed,
        ));
        let record = store.register_document("d1", "a.pdf", "pdf", 1);
        assert_eq!(record.status, DocumentStatus::Processing);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_stats_counts_by_status() {
        let mut store = StatusStore::default();
        store.register_document("a", "a.pdf", "pdf", 1);
        store.register_document("b", "b.pdf", "pdf", 1);
        store.register_document("c", "c.pdf", "pdf", 1);
        store.apply_update(&ProcessingUpdate::new("b", StageId::VirusScan, StageStatus::Failed));
        for id in &StageId::ALL[1..] {
            store.apply_update(&ProcessingUpdate::new("c", *id, StageStatus::Completed));
        }

        let stats = store.stats();
        assert_eq!(
            stats,
            ProcessingStats {
                total: 3,
                processing: 1,
                completed: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn test_retry_unknown_document() {
        let mut store = StatusStore::default();
        assert!(store.retry("nope").is_none());
    }
}
