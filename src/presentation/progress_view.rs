use std::collections::HashMap;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::summary::summary_line;
use super::timeline::current_stage_message;
use crate::data_model::{DocumentProcessingRecord, DocumentStatus, ProcessingStats};

const BAR_TEMPLATE: &str = "{prefix:>28.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}";

/// Multi-bar terminal view: a summary line on top and one bar per document.
///
/// Bar length is the number of stages and bar position is the number of
/// completed stages, so the drawn fraction always matches the record.
pub struct ProgressBoard {
    multi: MultiProgress,
    summary: ProgressBar,
    bars: HashMap<String, ProgressBar>,
    style: ProgressStyle,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Board that tracks state but draws nothing.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let summary = multi.add(ProgressBar::new(0));
        summary.set_style(
            ProgressStyle::default_bar()
                .template("{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar()) // Fallback style
            .progress_chars("=> ");
        Self {
            multi,
            summary,
            bars: HashMap::new(),
            style,
        }
    }

    /// Brings the bars in line with `records`: new records get a bar,
    /// removed ones lose theirs.
    pub fn render(
        &mut self,
        records: &[DocumentProcessingRecord],
        stats: &ProcessingStats,
        connected: bool,
    ) {
        self.summary.set_message(summary_line(stats, connected));

        self.bars.retain(|document_id, bar| {
            let keep = records.iter().any(|r| &r.document_id == document_id);
            if !keep {
                bar.finish_and_clear();
                self.multi.remove(bar);
            }
            keep
        });

        for record in records {
            let bar = self
                .bars
                .entry(record.document_id.clone())
                .or_insert_with(|| {
                    let bar = self.multi.add(ProgressBar::new(record.stages.len() as u64));
                    bar.set_style(self.style.clone());
                    bar
                });
            bar.set_length(record.stages.len() as u64);
            bar.set_position(record.completed_stage_count() as u64);
            bar.set_prefix(record.filename.clone());
            bar.set_message(current_stage_message(record));
        }
    }

    /// Leaves final states on screen.
    pub fn finish(&mut self, records: &[DocumentProcessingRecord]) {
        for record in records {
            if let Some(bar) = self.bars.get(&record.document_id) {
                let message = current_stage_message(record);
                match record.status {
                    DocumentStatus::Indexed => bar.finish_with_message(message),
                    _ => bar.abandon_with_message(message),
                }
            }
        }
        self.summary.finish();
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Current bar position for a document (completed stage count).
    pub fn position_of(&self, document_id: &str) -> Option<u64> {
        self.bars.get(document_id).map(|bar| bar.position())
    }

    pub fn length_of(&self, document_id: &str) -> Option<u64> {
        self.bars.get(document_id).and_then(|bar| bar.length())
    }

    pub fn message_of(&self, document_id: &str) -> Option<String> {
        self.bars.get(document_id).map(|bar| bar.message())
    }
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}
