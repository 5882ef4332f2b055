//! The watcher's two phases: seed the tracker from uploads, then follow
//! snapshots until the caller's shutdown signal or until nothing is left in
//! flight.

use std::future::Future;
use std::path::PathBuf;

use tracing::{error, info};

use crate::api::DocumentApi;
use crate::data_model::{DocumentProcessingRecord, ProcessingStats};
use crate::error::TrackerError;
use crate::tracker::ProcessingTracker;

#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub tracked: Vec<DocumentProcessingRecord>,
    pub failed: Vec<(PathBuf, TrackerError)>,
}

/// Uploads each path in order and registers every accepted document.
/// A rejected upload is logged and reported; it never touches the store.
pub async fn upload_and_track(
    api: &DocumentApi,
    tracker: &ProcessingTracker,
    paths: &[PathBuf],
) -> UploadOutcome {
    let mut outcome = UploadOutcome::default();
    for path in paths {
        match api.upload_file(path).await {
            Ok(uploaded) => {
                let record = tracker
                    .track_upload(
                        &uploaded.receipt,
                        &uploaded.filename,
                        &uploaded.file_type,
                        uploaded.file_size,
                    )
                    .await;
                outcome.tracked.push(record);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Upload failed");
                outcome.failed.push((path.clone(), e));
            }
        }
    }
    info!(
        tracked = outcome.tracked.len(),
        failed = outcome.failed.len(),
        "Uploads finished"
    );
    outcome
}

/// True once there is at least one record and every record is indexed or failed.
pub fn is_idle(records: &[DocumentProcessingRecord]) -> bool {
    !records.is_empty() && records.iter().all(DocumentProcessingRecord::is_terminal)
}

/// Calls `render` with the current snapshot, then again after every store or
/// connectivity change. Returns the stats of the last rendered snapshot.
pub async fn run_watch<F, S>(
    tracker: &ProcessingTracker,
    mut render: F,
    exit_when_idle: bool,
    shutdown: S,
) -> ProcessingStats
where
    F: FnMut(&[DocumentProcessingRecord], &ProcessingStats, bool),
    S: Future<Output = ()>,
{
    let mut records_rx = tracker.subscribe();
    let mut connected_rx = tracker.connected();
    // An offline tracker has no connectivity sender.
    let mut connectivity_open = true;
    tokio::pin!(shutdown);

    loop {
        let records = records_rx.borrow_and_update().clone();
        let connected = *connected_rx.borrow_and_update();
        let stats = ProcessingStats::tally(&records);
        render(&records, &stats, connected);

        if exit_when_idle && is_idle(&records) {
            info!(
                indexed = stats.completed,
                failed = stats.failed,
                "All tracked documents finished"
            );
            return stats;
        }

        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                return stats;
            }
            changed = records_rx.changed() => {
                if changed.is_err() {
                    return stats;
                }
            }
            changed = connected_rx.changed(), if connectivity_open => {
                if changed.is_err() {
                    connectivity_open = false;
                }
            }
        }
    }
}
