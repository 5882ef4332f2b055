//! Pure state transitions for document processing records.
//!
//! Nothing in here touches the network or the clock except through arguments;
//! the store and the tracker decide when these run.

use chrono::{DateTime, Utc};

use crate::data_model::{
    DocumentProcessingRecord, DocumentStatus, ProcessingStage, ProcessingUpdate, StageId,
    StageStatus,
};

/// The canonical stage template for a freshly uploaded document: upload done,
/// virus scan started, everything else pending.
pub fn default_stages() -> Vec<ProcessingStage> {
    StageId::ALL
        .iter()
        .enumerate()
        .map(|(i, id)| match i {
            0 => ProcessingStage {
                progress: Some(100.0),
                ..ProcessingStage::new(*id, StageStatus::Completed)
            },
            1 => ProcessingStage {
                progress: Some(0.0),
                ..ProcessingStage::new(*id, StageStatus::Processing)
            },
            _ => ProcessingStage::new(*id, StageStatus::Pending),
        })
        .collect()
}

pub fn new_record(
    document_id: impl Into<String>,
    filename: impl Into<String>,
    file_type: impl Into<String>,
    file_size: u64,
    started_at: DateTime<Utc>,
) -> DocumentProcessingRecord {
    let stages = default_stages();
    let current_stage = stages
        .iter()
        .find(|stage| stage.status == StageStatus::Processing)
        .map_or(StageId::Upload, |stage| stage.id);
    DocumentProcessingRecord {
        document_id: document_id.into(),
        filename: filename.into(),
        file_type: file_type.into(),
        file_size,
        status: DocumentStatus::Processing,
        current_stage,
        stages,
        started_at,
        error_message: None,
        provisional: false,
    }
}

fn clamp_progress(progress: f32) -> f32 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 100.0)
    }
}

fn all_completed(record: &DocumentProcessingRecord) -> bool {
    record
        .stages
        .iter()
        .all(|stage| stage.status == StageStatus::Completed)
}

/// Applies one backend update to a record.
///
/// Optional fields the update omits keep their previous values. Completing a
/// stage starts the next one at 0%. Returns `false` when the record has no
/// stage matching `update.step`, in which case nothing changes.
pub fn apply_update(record: &mut DocumentProcessingRecord, update: &ProcessingUpdate) -> bool {
    let Some(pos) = record.stages.iter().position(|stage| stage.id == update.step) else {
        return false;
    };

    let repeated_completion = record.stages[pos].status == StageStatus::Completed
        && update.status == StageStatus::Completed;

    let stage = &mut record.stages[pos];
    stage.status = update.status;
    if let Some(progress) = update.progress {
        stage.progress = Some(clamp_progress(progress));
    }
    if let Some(message) = &update.message {
        stage.message = Some(message.clone());
    }
    if let Some(details) = &update.details {
        stage.details = Some(details.clone());
    }

    // A duplicate completion must not drag later stages back to processing.
    if !repeated_completion {
        record.current_stage = update.step;
        if update.status == StageStatus::Completed {
            if let Some(next) = record.stages.get_mut(pos + 1) {
                next.status = StageStatus::Processing;
                next.progress = Some(0.0);
                record.current_stage = next.id;
            }
        }
    }

    if let Some(error) = &update.error_message {
        record.error_message = Some(error.clone());
    }

    record.status = if update.status == StageStatus::Failed {
        DocumentStatus::Failed
    } else if all_completed(record) {
        DocumentStatus::Indexed
    } else {
        DocumentStatus::Processing
    };

    true
}

/// Local optimistic retry: failed stages go back to pending and the earliest
/// unfinished stage restarts. That stage is the only one left processing.
pub fn apply_retry(record: &mut DocumentProcessingRecord, now: DateTime<Utc>) {
    for stage in record
        .stages
        .iter_mut()
        .filter(|stage| stage.status == StageStatus::Failed)
    {
        stage.status = StageStatus::Pending;
        stage.message = None;
    }

    let restart = record
        .stages
        .iter()
        .position(|stage| stage.status != StageStatus::Completed);
    for (pos, stage) in record.stages.iter_mut().enumerate() {
        if Some(pos) == restart {
            stage.status = StageStatus::Processing;
            stage.progress = Some(0.0);
            record.current_stage = stage.id;
        } else if stage.status == StageStatus::Processing {
            stage.status = StageStatus::Pending;
            stage.progress = None;
        }
    }

    record.error_message = None;
    record.started_at = now;
    record.status = if all_completed(record) {
        DocumentStatus::Indexed
    } else {
        DocumentStatus::Processing
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DocumentProcessingRecord {
        new_record("d1", "a.pdf", "pdf", 1024, Utc::now())
    }

    #[test]
    fn test_default_template_shape() {
        let stages = default_stages();
        assert_eq!(stages.len(), 6);
        assert_eq!(stages[0].status, StageStatus::Completed);
        assert_eq!(stages[1].status, StageStatus::Processing);
        assert_eq!(stages[1].progress, Some(0.0));
        assert!(stages[2..]
            .iter()
            .all(|stage| stage.status == StageStatus::Pending));
    }

    #[test]
    fn test_new_record_starts_on_virus_scan() {
        let record = record();
        assert_eq!(record.status, DocumentStatus::Processing);
        assert_eq!(record.current_stage, StageId::VirusScan);
        assert!(!record.provisional);
    }

    #[test]
    fn test_partial_update_keeps_previous_values() {
        let mut record = record();
        let mut update = ProcessingUpdate::new("d1", StageId::VirusScan, StageStatus::Processing);
        update.progress = Some(40.0);
        update.message = Some("scanning".to_string());
        assert!(apply_update(&mut record, &update));

        let bare = ProcessingUpdate::new("d1", StageId::VirusScan, StageStatus::Processing);
        apply_update(&mut record, &bare);
        let stage = record.stage(StageId::VirusScan).unwrap();
        assert_eq!(stage.progress, Some(40.0));
        assert_eq!(stage.message.as_deref(), Some("scanning"));
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut record = record();
        let mut update = ProcessingUpdate::new("d1", StageId::VirusScan, StageStatus::Processing);
        update.progress = Some(250.0);
        apply_update(&mut record, &update);
        assert_eq!(record.stage(StageId::VirusScan).unwrap().progress, Some(100.0));

        update.progress = Some(f32::NAN);
        apply_update(&mut record, &update);
        assert_eq!(record.stage(StageId::VirusScan).unwrap().progress, Some(0.0));
    }

    #[test]
    fn test_completion_advances_next_stage() {
        let mut record = record();
        let update = ProcessingUpdate::new("d1", StageId::VirusScan, StageStatus::Completed);
        apply_update(&mut record, &update);
        let next = record.stage(StageId::TextExtraction).unwrap();
        assert_eq!(next.status, StageStatus::Processing);
        assert_eq!(next.progress, Some(0.0));
        assert_eq!(record.current_stage, StageId::TextExtraction);
        assert_eq!(record.status, DocumentStatus::Processing);
    }

    #[test]
    fn test_duplicate_completion_does_not_regress() {
        let mut record = record();
        for id in &StageId::ALL[1..] {
            apply_update(
                &mut record,
                &ProcessingUpdate::new("d1", *id, StageStatus::Completed),
            );
        }
        assert_eq!(record.status, DocumentStatus::Indexed);

        apply_update(
            &mut record,
            &ProcessingUpdate::new("d1", StageId::VirusScan, StageStatus::Completed),
        );
        assert_eq!(record.status, DocumentStatus::Indexed);
        assert_eq!(record.completed_stage_count(), 6);
    }

    #[test]
    fn test_error_message_persists_until_replaced() {
        let mut record = record();
        let mut failed = ProcessingUpdate::new("d1", StageId::VirusScan, StageStatus::Failed);
        failed.error_message = Some("scan error".to_string());
        apply_update(&mut record, &failed);
        assert_eq!(record.status, DocumentStatus::Failed);

        apply_update(
            &mut record,
            &ProcessingUpdate::new("d1", StageId::VirusScan, StageStatus::Processing),
        );
        assert_eq!(record.status, DocumentStatus::Processing);
        assert_eq!(record.error_message.as_deref(), Some("scan error"));
    }

    #[test]
    fn test_retry_resets_failed_stages() {
        let mut record = record();
        let mut failed = ProcessingUpdate::new("d1", StageId::VirusScan, StageStatus::Failed);
        failed.message = Some("infected".to_string());
        failed.error_message = Some("scan error".to_string());
        apply_update(&mut record, &failed);

        let before = record.started_at;
        apply_retry(&mut record, before + chrono::Duration::seconds(5));

        let stage = record.stage(StageId::VirusScan).unwrap();
        assert_eq!(stage.status, StageStatus::Processing);
        assert_eq!(stage.progress, Some(0.0));
        assert_eq!(stage.message, None);
        assert_eq!(record.error_message, None);
        assert_eq!(record.status, DocumentStatus::Processing);
        assert!(record.started_at > before);
    }

    #[test]
    fn test_retry_on_indexed_record_keeps_indexed() {
        let mut record = record();
        for id in &StageId::ALL[1..] {
            apply_update(
                &mut record,
                &ProcessingUpdate::new("d1", *id, StageStatus::Completed),
            );
        }
        apply_retry(&mut record, Utc::now());
        assert_eq!(record.status, DocumentStatus::Indexed);
    }

    #[test]
    fn test_retry_restarts_earliest_unfinished_stage_only() {
        let mut record = record();
        apply_update(
            &mut record,
            &ProcessingUpdate::new("d1", StageId::KeywordIndex, StageStatus::Failed),
        );

        apply_retry(&mut record, Utc::now());

        let processing: Vec<_> = record
            .stages
            .iter()
            .filter(|stage| stage.status == StageStatus::Processing)
            .map(|stage| stage.id)
            .collect();
        assert_eq!(processing, vec![StageId::VirusScan]);
        assert_eq!(record.current_stage, StageId::VirusScan);
        assert_eq!(
            record.stage(StageId::KeywordIndex).unwrap().status,
            StageStatus::Pending
        );
        assert_eq!(
            record.stage(StageId::TextExtraction).unwrap().status,
            StageStatus::Pending
        );
    }
}
