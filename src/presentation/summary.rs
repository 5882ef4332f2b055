use indicatif::HumanBytes;

use crate::data_model::{DocumentProcessingRecord, ProcessingStats};

/// One-line summary of the whole store, e.g.
/// `3 documents | 1 processing | 1 indexed | 1 failed | live`.
pub fn summary_line(stats: &ProcessingStats, connected: bool) -> String {
    let link = if connected { "live" } else { "offline" };
    if stats.total == 0 {
        return format!("No documents tracked | {}", link);
    }
    let noun = if stats.total == 1 { "document" } else { "documents" };
    format!(
        "{} {} | {} processing | {} indexed | {} failed | {}",
        stats.total, noun, stats.processing, stats.completed, stats.failed, link
    )
}

pub fn record_header(record: &DocumentProcessingRecord) -> String {
    format!(
        "{} ({}, {}) - {}",
        record.filename,
        record.file_type,
        HumanBytes(record.file_size),
        record.status
    )
}
