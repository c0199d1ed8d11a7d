use std::future::Future;
use std::pin::Pin;

/// A text message posted in a watched room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub room_id: String,
    pub sender: String,
    /// Display name if one could be resolved, otherwise the user id.
    pub sender_display_name: String,
    pub body: String,
    pub origin_server_ts: u64,
}

/// Room activity surfaced to the relay runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message(InboundMessage),
    Reaction {
        room_id: String,
        sender: String,
        /// The reacted-to event id.
        relates_to: Option<String>,
        key: Option<String>,
    },
}

/// Sends text into a room.
pub trait DeliveryGateway: Send + Sync {
    fn send<'a>(
        &'a self,
        room_id: &'a str,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// A chat transport that can both receive room events and deliver messages.
pub trait Channel: DeliveryGateway {
    /// Human-readable channel name
    fn name(&self) -> &str;

    /// Start listening for room events (long-running). Returns `Ok` once the
    /// receiver has gone away.
    fn listen<'a>(
        &'a self,
        tx: tokio::sync::mpsc::Sender<InboundEvent>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    fn health_check<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move { true })
    }
}
