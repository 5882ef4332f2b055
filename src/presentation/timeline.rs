use crate::data_model::{DocumentProcessingRecord, DocumentStatus, ProcessingStage, StageStatus};

pub fn stage_marker(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Completed => "[x]",
        StageStatus::Processing => "[>]",
        StageStatus::Failed => "[!]",
        StageStatus::Pending => "[ ]",
    }
}

fn stage_line(stage: &ProcessingStage) -> String {
    let mut line = format!("{} {}", stage_marker(stage.status), stage.label);
    if stage.status == StageStatus::Processing {
        let progress = stage.progress.unwrap_or(0.0);
        line.push_str(&format!(" {:.0}%", progress));
    }
    if let Some(message) = &stage.message {
        line.push_str(" - ");
        line.push_str(message);
    }
    line
}

/// Stepper view of a record, one line per stage. Details are only listed
/// when `expanded`.
pub fn render_timeline(record: &DocumentProcessingRecord, expanded: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(record.stages.len());
    for stage in &record.stages {
        lines.push(stage_line(stage));
        if expanded {
            for detail in stage.details.iter().flatten() {
                lines.push(format!("      - {}", detail));
            }
        }
    }
    if expanded {
        if let Some(error) = &record.error_message {
            lines.push(format!("Error: {}", error));
        }
    }
    lines
}

/// Short status text for the record's current stage, used as a bar message.
pub fn current_stage_message(record: &DocumentProcessingRecord) -> String {
    match record.status {
        DocumentStatus::Indexed => "indexed".to_string(),
        DocumentStatus::Failed => match &record.error_message {
            Some(error) => format!("failed: {}", error),
            None => "failed".to_string(),
        },
        DocumentStatus::Uploaded | DocumentStatus::Processing => {
            match record.stage(record.current_stage) {
                Some(stage) if stage.status == StageStatus::Processing => {
                    format!("{} {:.0}%", stage.label, stage.progress.unwrap_or(0.0))
                }
                Some(stage) => stage.label.clone(),
                None => record.current_stage.label().to_string(),
            }
        }
    }
}
