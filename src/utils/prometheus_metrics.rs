// src/utils/prometheus_metrics.rs

use once_cell::sync::Lazy;
use prometheus::{register_counter, register_gauge, register_histogram, Counter, Gauge, Histogram};

// Update channel
pub static UPDATES_RECEIVED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracker_updates_received_total",
        "Total number of payloads received on the processing update socket."
    )
    .expect("Failed to register UPDATES_RECEIVED_TOTAL counter")
});

pub static MALFORMED_MESSAGES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracker_malformed_messages_total",
        "Total number of socket payloads that did not parse as a processing update."
    )
    .expect("Failed to register MALFORMED_MESSAGES_TOTAL counter")
});

pub static CONNECTION_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracker_connection_errors_total",
        "Total number of failed connects and socket errors."
    )
    .expect("Failed to register CONNECTION_ERRORS_TOTAL counter")
});

pub static RECONNECT_ATTEMPTS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracker_reconnect_attempts_total",
        "Total number of scheduled reconnects."
    )
    .expect("Failed to register RECONNECT_ATTEMPTS_TOTAL counter")
});

pub static CHANNEL_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "tracker_channel_connected",
        "1 while the processing update socket is open, 0 otherwise."
    )
    .expect("Failed to register CHANNEL_CONNECTED gauge")
});

pub static CONTROL_MESSAGES_SENT_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracker_control_messages_sent_total",
        "Total number of retry/cancel requests written to the socket."
    )
    .expect("Failed to register CONTROL_MESSAGES_SENT_TOTAL counter")
});

pub static CONTROL_MESSAGES_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracker_control_messages_dropped_total",
        "Total number of retry/cancel requests dropped while disconnected or on write failure."
    )
    .expect("Failed to register CONTROL_MESSAGES_DROPPED_TOTAL counter")
});

// Store
pub static UPDATES_APPLIED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracker_updates_applied_total",
        "Total number of processing updates applied to a tracked document."
    )
    .expect("Failed to register UPDATES_APPLIED_TOTAL counter")
});

pub static UPDATES_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracker_updates_dropped_total",
        "Total number of processing updates for documents that are not tracked."
    )
    .expect("Failed to register UPDATES_DROPPED_TOTAL counter")
});

pub static DOCUMENTS_TRACKED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "tracker_documents_tracked",
        "Number of documents currently held in the status store."
    )
    .expect("Failed to register DOCUMENTS_TRACKED gauge")
});

pub static UPDATE_APPLY_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tracker_update_apply_duration_seconds",
        "Histogram of time spent applying one update, lock wait included."
    )
    .expect("Failed to register UPDATE_APPLY_DURATION_SECONDS histogram")
});

// Uploads
pub static UPLOADS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("tracker_uploads_total", "Total number of successful uploads.")
        .expect("Failed to register UPLOADS_TOTAL counter")
});

pub static UPLOAD_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracker_upload_errors_total",
        "Total number of uploads that failed or were rejected."
    )
    .expect("Failed to register UPLOAD_ERRORS_TOTAL counter")
});
