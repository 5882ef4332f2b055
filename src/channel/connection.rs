use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Url;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, instrument, warn};

use super::backoff::ReconnectPolicy;
use super::ControlTransport;
use crate::data_model::{ControlMessage, ProcessingUpdate};
use crate::error::{Result, TrackerError};
use crate::utils::prometheus_metrics::*;

const MAX_LOGGED_PAYLOAD: usize = 256;

/// Where the bearer token goes on the socket handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPlacement {
    /// Appended as a query parameter (`?token=...` by default).
    #[default]
    Query,
    /// Sent as `Authorization: Bearer ...`.
    Header,
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub ws_url: String,
    pub token: Option<String>,
    pub token_placement: TokenPlacement,
    pub token_param: String,
    pub reconnect: ReconnectPolicy,
    /// Capacity of the outbound control queue.
    pub outbound_buffer: usize,
}

impl ChannelConfig {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            token: None,
            token_placement: TokenPlacement::Query,
            token_param: "token".to_string(),
            reconnect: ReconnectPolicy::default(),
            outbound_buffer: 32,
        }
    }

    /// The endpoint URL, with the token attached when it travels in the query.
    pub fn endpoint_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.ws_url).map_err(|e| {
            TrackerError::ConfigError(format!("Invalid WebSocket URL '{}': {}", self.ws_url, e))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TrackerError::ConfigError(format!(
                "WebSocket URL must use ws:// or wss://, got '{}'",
                self.ws_url
            )));
        }
        if let (TokenPlacement::Query, Some(token)) = (self.token_placement, &self.token) {
            url.query_pairs_mut().append_pair(&self.token_param, token);
        }
        Ok(url)
    }

    /// Endpoint URL safe to log.
    pub fn redacted_url(&self) -> String {
        match self.endpoint_url() {
            Ok(mut url) => {
                let pairs: Vec<(String, String)> = url
                    .query_pairs()
                    .map(|(k, v)| {
                        let v = if k == self.token_param.as_str() {
                            "***".to_string()
                        } else {
                            v.into_owned()
                        };
                        (k.into_owned(), v)
                    })
                    .collect();
                if !pairs.is_empty() {
                    url.query_pairs_mut().clear().extend_pairs(pairs);
                }
                url.to_string()
            }
            Err(_) => self.ws_url.clone(),
        }
    }

    /// Builds the handshake request for one connection attempt.
    pub fn connect_request(&self) -> Result<Request> {
        let url = self.endpoint_url()?;
        let mut request = url.as_str().into_client_request()?;
        if let (TokenPlacement::Header, Some(token)) = (self.token_placement, &self.token) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                TrackerError::ConfigError(format!("Token is not a valid header value: {}", e))
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(request)
    }
}

/// Parses one socket payload as a [`ProcessingUpdate`].
///
/// Malformed payloads are logged and counted, never fatal.
pub fn decode_update(payload: &[u8]) -> Option<ProcessingUpdate> {
    UPDATES_RECEIVED_TOTAL.inc();
    match serde_json::from_slice::<ProcessingUpdate>(payload) {
        Ok(update) => Some(update),
        Err(e) => {
            let text = String::from_utf8_lossy(payload);
            let shown: String = text.chars().take(MAX_LOGGED_PAYLOAD).collect();
            warn!(error = %e, payload = %shown, "Dropping malformed processing update");
            MALFORMED_MESSAGES_TOTAL.inc();
            None
        }
    }
}

enum SessionEnd {
    Closed,
    Shutdown,
}

struct ChannelTask {
    config: ChannelConfig,
    updates: mpsc::Sender<ProcessingUpdate>,
    outbound_rx: mpsc::Receiver<ControlMessage>,
    connected_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ChannelTask {
    async fn run(mut self) {
        let mut rng = StdRng::from_entropy();
        let mut attempt: u32 = 0;

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            let request = match self.config.connect_request() {
                Ok(request) => request,
                Err(e) => {
                    error!(error = %e, "Cannot build update socket request. Channel stopping.");
                    break;
                }
            };

            let connected = tokio::select! {
                result = connect_async(request) => Some(result),
                _ = self.shutdown_rx.changed() => None,
            };

            match connected {
                None => break,
                Some(Ok((stream, _response))) => {
                    info!(url = %self.config.redacted_url(), "Connected to processing update endpoint");
                    attempt = 0;
                    self.discard_queued_controls();
                    self.set_connected(true);
                    let end = self.session(stream).await;
                    self.set_connected(false);
                    self.discard_queued_controls();
                    if let SessionEnd::Shutdown = end {
                        break;
                    }
                    warn!("Processing update socket closed");
                }
                Some(Err(e)) => {
                    CONNECTION_ERRORS_TOTAL.inc();
                    error!(error = %e, url = %self.config.redacted_url(), "Failed to connect to processing update endpoint");
                }
            }

            attempt = attempt.saturating_add(1);
            if !self.config.reconnect.allows(attempt) {
                warn!(attempt, "Reconnect attempts exhausted. Channel stopping.");
                break;
            }
            let delay = self.config.reconnect.delay_for_attempt(attempt, &mut rng);
            RECONNECT_ATTEMPTS_TOTAL.inc();
            info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to processing update endpoint"
            );
            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.shutdown_rx.changed() => break,
            }
        }

        debug!("Update channel task finished");
    }

    /// Drops control messages queued for a session that is gone. They must
    /// not reach the backend on a later connection. Returns how many were dropped.
    fn discard_queued_controls(&mut self) -> usize {
        let mut dropped = 0;
        while let Ok(message) = self.outbound_rx.try_recv() {
            CONTROL_MESSAGES_DROPPED_TOTAL.inc();
            warn!(kind = message.kind(), document_id = %message.document_id(), "Update socket closed before control message was sent; dropped");
            dropped += 1;
        }
        dropped
    }

    fn set_connected(&self, connected: bool) {
        let _ = self.connected_tx.send(connected);
        CHANNEL_CONNECTED.set(if connected { 1.0 } else { 0.0 });
    }

    #[instrument(skip_all)]
    async fn session(&mut self, stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> SessionEnd {
        let (mut sink, mut source) = stream.split();
        loop {
            tokio::select! {
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !deliver(&self.updates, text.as_bytes()).await {
                            return SessionEnd::Shutdown;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if !deliver(&self.updates, &data).await {
                            return SessionEnd::Shutdown;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "Server closed the update socket");
                        return SessionEnd::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        CONNECTION_ERRORS_TOTAL.inc();
                        error!(error = %e, "Update socket error");
                        return SessionEnd::Closed;
                    }
                    None => return SessionEnd::Closed,
                },
                Some(message) = self.outbound_rx.recv() => {
                    let payload = match serde_json::to_string(&message) {
                        Ok(payload) => payload,
                        Err(e) => {
                            error!(error = %e, "Failed to serialize control message");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(payload)).await {
                        CONTROL_MESSAGES_DROPPED_TOTAL.inc();
                        error!(error = %e, kind = message.kind(), document_id = %message.document_id(), "Failed to send control message");
                        return SessionEnd::Closed;
                    }
                    CONTROL_MESSAGES_SENT_TOTAL.inc();
                    debug!(kind = message.kind(), document_id = %message.document_id(), "Sent control message");
                },
                _ = self.shutdown_rx.changed() => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        debug!(error = %e, "Close frame not delivered");
                    }
                    return SessionEnd::Shutdown;
                }
            }
        }
    }
}

/// Hands one payload to the tracker. Returns `false` once nobody is listening.
async fn deliver(updates: &mpsc::Sender<ProcessingUpdate>, payload: &[u8]) -> bool {
    let Some(update) = decode_update(payload) else {
        return true;
    };
    debug!(document_id = %update.document_id, step = %update.step, status = ?update.status, "Received processing update");
    if updates.send(update).await.is_err() {
        debug!("Update receiver dropped");
        return false;
    }
    true
}

/// Handle to the background socket task.
///
/// Dropping the handle stops the task; [`ControlTransport::close`] also waits
/// for it to finish.
pub struct UpdateChannel {
    outbound_tx: mpsc::Sender<ControlMessage>,
    connected_rx: watch::Receiver<bool>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateChannel {
    /// Starts connecting in the background. Parsed updates are sent to `updates`.
    pub fn spawn(config: ChannelConfig, updates: mpsc::Sender<ProcessingUpdate>) -> Result<Self> {
        // Surface URL and token mistakes now rather than on every reconnect.
        config.connect_request()?;
        if config.token.is_none() {
            warn!(url = %config.ws_url, "No token configured for the update channel");
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer.max(1));
        let (connected_tx, connected_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = ChannelTask {
            config,
            updates,
            outbound_rx,
            connected_tx,
            shutdown_rx,
        };
        let handle = tokio::spawn(task.run());

        Ok(Self {
            outbound_tx,
            connected_rx,
            shutdown_tx,
            task: Mutex::new(Some(handle)),
        })
    }

    pub fn is_connected(&self) -> bool {
        *self.connected_rx.borrow()
    }
}

#[async_trait]
impl ControlTransport for UpdateChannel {
    async fn send_control(&self, message: ControlMessage) -> Result<bool> {
        if !self.is_connected() {
            CONTROL_MESSAGES_DROPPED_TOTAL.inc();
            warn!(kind = message.kind(), document_id = %message.document_id(), "Update channel disconnected; control message dropped");
            return Ok(false);
        }
        self.outbound_tx
            .send(message)
            .await
            .map_err(|_| TrackerError::ChannelClosed)?;
        Ok(true)
    }

    fn connected(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    async fn close(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Update channel task panicked");
            }
        }
    }
}

impl Drop for UpdateChannel {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
