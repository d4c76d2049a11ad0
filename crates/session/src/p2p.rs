//! The P2P channel contract.
//!
//! Sessions are negotiated over a UDP-based peer channel owned by code
//! outside this crate. The core consumes it through the [`Channel`] trait:
//! request/response sends plus topic handlers. Wire records are
//! serde-encoded; the actual codec on the wire is the channel owner's
//! concern.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TOPIC_SESSION_CREATE: &str = "session-create";
pub const TOPIC_SESSION_ACKNOWLEDGE: &str = "session-acknowledge";
pub const TOPIC_SESSION_DESTROY: &str = "session-destroy";
pub const TOPIC_SESSION_STATUS: &str = "session-status";
pub const TOPIC_PAYMENT_INVOICE: &str = "payment-invoice";

/// Status code sent by a consumer tearing down its own session.
pub const CODE_DESTROYED_BY_CONSUMER: u32 = 1;

/// Errors crossing the channel boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("channel closed")]
    Closed,

    #[error("malformed payload: {0}")]
    Codec(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

/// An opaque message crossing the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub data: Vec<u8>,
}

impl Message {
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, ChannelError> {
        let data = serde_json::to_vec(value).map_err(|e| ChannelError::Codec(e.to_string()))?;
        Ok(Self { data })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ChannelError> {
        serde_json::from_slice(&self.data).map_err(|e| ChannelError::Codec(e.to_string()))
    }
}

pub type HandlerResult = Result<Option<Message>, ChannelError>;
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
pub type TopicHandler = Arc<dyn Fn(Message) -> HandlerFuture + Send + Sync>;

/// The consumed P2P channel: request/response sends plus topic handlers.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Send a request on a topic and await the peer's response.
    async fn send(&self, topic: &str, message: &Message) -> Result<Message, ChannelError>;

    /// Register the handler invoked for inbound requests on a topic.
    fn handle(&self, topic: &str, handler: TopicHandler);
}

/// Consumer info carried in a session request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerInfo {
    pub id: String,
    pub hermes_id: String,
    pub payment_version: String,
}

/// Inbound request on `session-create`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub consumer: Option<ConsumerInfo>,
    pub proposal_id: i64,
    #[serde(default)]
    pub config: Vec<u8>,
}

/// Response to `session-create`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    pub payment_info: String,
    #[serde(default)]
    pub config: Vec<u8>,
}

/// Inbound payload on `session-acknowledge` and `session-destroy`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub consumer_id: String,
    pub session_id: String,
}

/// Inbound payload on `session-status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub consumer_id: String,
    pub session_id: String,
    pub code: u32,
    pub message: String,
}
