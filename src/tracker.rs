//! Owned processing status tracker: one store, one optional update channel,
//! and a snapshot feed for whatever renders it.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{ControlTransport, UpdateChannel};
use crate::config::TrackerConfig;
use crate::data_model::{
    ControlMessage, DocumentProcessingRecord, ProcessingStats, ProcessingUpdate, UploadReceipt,
};
use crate::error::{Result, TrackerError};
use crate::store::{StatusStore, UnknownDocumentPolicy};
use crate::utils::prometheus_metrics::*;

struct Shared {
    store: RwLock<StatusStore>,
    snapshot_tx: watch::Sender<Vec<DocumentProcessingRecord>>,
}

impl Shared {
    fn publish(&self, store: &StatusStore) {
        DOCUMENTS_TRACKED.set(store.len() as f64);
        self.snapshot_tx.send_replace(store.records());
    }

    async fn apply(&self, update: &ProcessingUpdate) -> bool {
        let timer = UPDATE_APPLY_DURATION_SECONDS.start_timer();
        let mut store = self.store.write().await;
        let applied = store.apply_update(update).is_some();
        if applied {
            UPDATES_APPLIED_TOTAL.inc();
            self.publish(&store);
        } else {
            UPDATES_DROPPED_TOTAL.inc();
        }
        drop(store);
        timer.observe_duration();
        applied
    }
}

pub struct ProcessingTracker {
    shared: Arc<Shared>,
    transport: Option<Arc<dyn ControlTransport>>,
    connected_rx: watch::Receiver<bool>,
    pump: Option<JoinHandle<()>>,
}

impl ProcessingTracker {
    /// A tracker with no update channel. Updates must be fed through
    /// [`ProcessingTracker::apply_update`].
    pub fn offline(unknown_documents: UnknownDocumentPolicy) -> Self {
        let (_, connected_rx) = watch::channel(false);
        Self {
            shared: Self::shared(unknown_documents),
            transport: None,
            connected_rx,
            pump: None,
        }
    }

    /// Wires a transport and its update stream into a fresh store.
    pub fn with_transport(
        unknown_documents: UnknownDocumentPolicy,
        transport: Arc<dyn ControlTransport>,
        mut updates: mpsc::Receiver<ProcessingUpdate>,
    ) -> Self {
        let shared = Self::shared(unknown_documents);
        let pump_shared = Arc::clone(&shared);
        let pump = tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                pump_shared.apply(&update).await;
            }
            debug!("Update stream ended");
        });

        Self {
            shared,
            connected_rx: transport.connected(),
            transport: Some(transport),
            pump: Some(pump),
        }
    }

    /// Opens the backend update socket described by `config` and starts tracking.
    pub fn connect(config: &TrackerConfig) -> Result<Self> {
        let (updates_tx, updates_rx) = mpsc::channel(config.store.update_buffer);
        let channel = UpdateChannel::spawn(config.channel_config(), updates_tx)?;
        info!(url = %config.channel_config().redacted_url(), "Processing tracker started");
        Ok(Self::with_transport(
            config.store.unknown_documents,
            Arc::new(channel),
            updates_rx,
        ))
    }

    fn shared(unknown_documents: UnknownDocumentPolicy) -> Arc<Shared> {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        Arc::new(Shared {
            store: RwLock::new(StatusStore::new(unknown_documents)),
            snapshot_tx,
        })
    }

    pub fn is_connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Connectivity signal for presentation.
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    /// Record snapshots, republished after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<DocumentProcessingRecord>> {
        self.shared.snapshot_tx.subscribe()
    }

    pub async fn records(&self) -> Vec<DocumentProcessingRecord> {
        self.shared.store.read().await.records()
    }

    pub async fn get(&self, document_id: &str) -> Option<DocumentProcessingRecord> {
        self.shared.store.read().await.get(document_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.shared.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shared.store.read().await.is_empty()
    }

    pub async fn stats(&self) -> ProcessingStats {
        self.shared.store.read().await.stats()
    }

    pub async fn register_document(
        &self,
        document_id: &str,
        filename: &str,
        file_type: &str,
        file_size: u64,
    ) -> DocumentProcessingRecord {
        let mut store = self.shared.store.write().await;
        let record = store
            .register_document(document_id, filename, file_type, file_size)
            .clone();
        self.shared.publish(&store);
        record
    }

    /// Seeds the store from an upload response.
    pub async fn track_upload(
        &self,
        receipt: &UploadReceipt,
        filename: &str,
        file_type: &str,
        file_size: u64,
    ) -> DocumentProcessingRecord {
        debug!(document_id = %receipt.document_id, status = %receipt.status, "Tracking uploaded document");
        self.register_document(&receipt.document_id, filename, file_type, file_size)
            .await
    }

    /// Applies one update as if it came off the socket. Returns `false` if it was dropped.
    pub async fn apply_update(&self, update: &ProcessingUpdate) -> bool {
        self.shared.apply(update).await
    }

    pub async fn remove_document(&self, document_id: &str) -> Option<DocumentProcessingRecord> {
        let mut store = self.shared.store.write().await;
        let removed = store.remove_document(document_id);
        if removed.is_some() {
            self.shared.publish(&store);
        }
        removed
    }

    /// Optimistically restarts failed stages and asks the backend to retry.
    pub async fn retry(&self, document_id: &str) -> Result<DocumentProcessingRecord> {
        let record = {
            let mut store = self.shared.store.write().await;
            let record = store
                .retry(document_id)
                .cloned()
                .ok_or_else(|| TrackerError::UnknownDocument(document_id.to_string()))?;
            self.shared.publish(&store);
            record
        };
        self.emit(ControlMessage::RetryProcessing {
            document_id: document_id.to_string(),
        })
        .await;
        Ok(record)
    }

    /// Asks the backend to cancel, then forgets the document without waiting
    /// for an acknowledgement.
    pub async fn cancel(&self, document_id: &str) -> Result<DocumentProcessingRecord> {
        if self.get(document_id).await.is_none() {
            return Err(TrackerError::UnknownDocument(document_id.to_string()));
        }
        self.emit(ControlMessage::CancelProcessing {
            document_id: document_id.to_string(),
        })
        .await;
        self.remove_document(document_id)
            .await
            .ok_or_else(|| TrackerError::UnknownDocument(document_id.to_string()))
    }

    async fn emit(&self, message: ControlMessage) -> bool {
        let Some(transport) = &self.transport else {
            debug!(kind = message.kind(), "No update channel; control message not sent");
            return false;
        };
        let kind = message.kind();
        match transport.send_control(message).await {
            Ok(sent) => sent,
            Err(e) => {
                warn!(error = %e, kind, "Failed to queue control message");
                false
            }
        }
    }

    /// Closes the channel and stops applying updates.
    pub async fn shutdown(mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
            let _ = pump.await;
        }
        info!("Processing tracker stopped");
    }
}

impl Drop for ProcessingTracker {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
