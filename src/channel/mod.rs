// Update channel: live connection to the backend's processing-update socket.

pub mod backoff;
pub mod connection;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::data_model::ControlMessage;
use crate::error::Result;

pub use backoff::ReconnectPolicy;
pub use connection::{decode_update, ChannelConfig, TokenPlacement, UpdateChannel};

/// Outbound side of the update channel as seen by the tracker.
#[async_trait]
pub trait ControlTransport: Send + Sync {
    /// Queues a control message for the backend. `Ok(false)` means the
    /// message was dropped because the socket is not connected.
    async fn send_control(&self, message: ControlMessage) -> Result<bool>;

    /// Connectivity signal; `true` while a socket is open.
    fn connected(&self) -> watch::Receiver<bool>;

    /// Stops the transport. No updates are delivered once this returns.
    async fn close(&self);
}
