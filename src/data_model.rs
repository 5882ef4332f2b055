use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the fixed processing pipeline, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Upload,
    #[serde(alias = "virus-scan")]
    VirusScan,
    #[serde(alias = "text-extraction")]
    TextExtraction,
    #[serde(alias = "keyword-index", alias = "keyword_indexing")]
    KeywordIndex,
    #[serde(alias = "vector-index", alias = "vector_indexing")]
    VectorIndex,
    #[serde(alias = "relational-index", alias = "relational_indexing")]
    RelationalIndex,
}

impl StageId {
    pub const ALL: [StageId; 6] = [
        StageId::Upload,
        StageId::VirusScan,
        StageId::TextExtraction,
        StageId::KeywordIndex,
        StageId::VectorIndex,
        StageId::RelationalIndex,
    ];

    /// Position of the stage in the pipeline.
    pub fn index(self) -> usize {
        match self {
            StageId::Upload => 0,
            StageId::VirusScan => 1,
            StageId::TextExtraction => 2,
            StageId::KeywordIndex => 3,
            StageId::VectorIndex => 4,
            StageId::RelationalIndex => 5,
        }
    }

    /// The stage that follows this one, if any.
    pub fn next(self) -> Option<StageId> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            StageId::Upload => "Upload",
            StageId::VirusScan => "Virus scan",
            StageId::TextExtraction => "Text extraction",
            StageId::KeywordIndex => "Keyword indexing",
            StageId::VectorIndex => "Vector indexing",
            StageId::RelationalIndex => "Relational indexing",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageId::Upload => "upload",
            StageId::VirusScan => "virus_scan",
            StageId::TextExtraction => "text_extraction",
            StageId::KeywordIndex => "keyword_index",
            StageId::VectorIndex => "vector_index",
            StageId::RelationalIndex => "relational_index",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Overall status of a tracked document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Indexed,
    Failed,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Indexed => "indexed",
            DocumentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStage {
    pub id: StageId,
    pub label: String,
    pub status: StageStatus,
    /// Percent complete, 0 to 100.
    pub progress: Option<f32>,
    pub message: Option<String>,
    pub details: Option<Vec<String>>,
}

impl ProcessingStage {
    pub fn new(id: StageId, status: StageStatus) -> Self {
        Self {
            id,
            label: id.label().to_string(),
            status,
            progress: None,
            message: None,
            details: None,
        }
    }
}

/// One tracked document and its pipeline state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentProcessingRecord {
    pub document_id: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
    pub status: DocumentStatus,
    pub current_stage: StageId,
    pub stages: Vec<ProcessingStage>,
    pub started_at: DateTime<Utc>,
    pub error_message: Option<String>,
    /// Set on placeholder records created from an update that arrived before registration.
    #[serde(default)]
    pub provisional: bool,
}

impl DocumentProcessingRecord {
    pub fn stage(&self, id: StageId) -> Option<&ProcessingStage> {
        self.stages.iter().find(|stage| stage.id == id)
    }

    pub fn completed_stage_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|stage| stage.status == StageStatus::Completed)
            .count()
    }

    /// Fraction of stages completed, in `[0.0, 1.0]`.
    pub fn completion_fraction(&self) -> f64 {
        if self.stages.is_empty() {
            return 0.0;
        }
        self.completed_stage_count() as f64 / self.stages.len() as f64
    }

    /// Indexed and failed records expect no further work until a retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, DocumentStatus::Indexed | DocumentStatus::Failed)
    }
}

/// A status event pushed by the backend for one document and one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingUpdate {
    pub document_id: String,
    pub step: StageId,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ProcessingUpdate {
    /// Bare update with no optional fields set.
    pub fn new(document_id: impl Into<String>, step: StageId, status: StageStatus) -> Self {
        Self {
            document_id: document_id.into(),
            step,
            status,
            progress: None,
            message: None,
            details: None,
            error_message: None,
            timestamp: None,
        }
    }
}

/// Control request sent to the backend over the update socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    RetryProcessing {
        #[serde(rename = "documentId")]
        document_id: String,
    },
    CancelProcessing {
        #[serde(rename = "documentId")]
        document_id: String,
    },
}

impl ControlMessage {
    pub fn document_id(&self) -> &str {
        match self {
            ControlMessage::RetryProcessing { document_id }
            | ControlMessage::CancelProcessing { document_id } => document_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::RetryProcessing { .. } => "retry_processing",
            ControlMessage::CancelProcessing { .. } => "cancel_processing",
        }
    }
}

/// Record counts by overall status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total: usize,
    /// Records that are `uploaded` or `processing`.
    pub processing: usize,
    /// Records that are `indexed`.
    pub completed: usize,
    pub failed: usize,
}

impl ProcessingStats {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a DocumentProcessingRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut stats, record| {
            stats.total += 1;
            match record.status {
                DocumentStatus::Uploaded | DocumentStatus::Processing => stats.processing += 1,
                DocumentStatus::Indexed => stats.completed += 1,
                DocumentStatus::Failed => stats.failed += 1,
            }
            stats
        })
    }
}

/// Response of the upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    #[serde(alias = "id", alias = "document_id")]
    pub document_id: String,
    #[serde(default = "default_receipt_status")]
    pub status: DocumentStatus,
}

fn default_receipt_status() -> DocumentStatus {
    DocumentStatus::Uploaded
}
