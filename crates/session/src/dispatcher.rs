//! Wires the P2P session topics to the session manager.

use std::sync::Arc;

use tracing::{debug, warn};

use veilnet_core::event::SessionId;
use veilnet_core::identity::Identity;

use crate::manager::SessionManager;
use crate::p2p::{
    Channel, ChannelError, Message, SessionInfo, SessionRequest, SessionResponse, SessionStatus,
    CODE_DESTROYED_BY_CONSUMER, TOPIC_SESSION_ACKNOWLEDGE, TOPIC_SESSION_CREATE,
    TOPIC_SESSION_DESTROY, TOPIC_SESSION_STATUS,
};

/// Payment scheme version advertised in session responses.
const PAYMENT_INFO: &str = "v3";

/// Decodes inbound session requests and drives the manager.
pub struct SessionDispatcher {
    manager: Arc<SessionManager>,
}

impl SessionDispatcher {
    pub fn new(manager: Arc<SessionManager>) -> Arc<Self> {
        Arc::new(Self { manager })
    }

    /// Register all session topic handlers on the channel.
    pub fn attach(self: &Arc<Self>, channel: &dyn Channel) {
        let d = self.clone();
        channel.handle(
            TOPIC_SESSION_CREATE,
            Arc::new(move |msg| {
                let d = d.clone();
                Box::pin(async move { d.handle_create(msg).await })
            }),
        );

        let d = self.clone();
        channel.handle(
            TOPIC_SESSION_ACKNOWLEDGE,
            Arc::new(move |msg| {
                let d = d.clone();
                Box::pin(async move { d.handle_acknowledge(msg) })
            }),
        );

        let d = self.clone();
        channel.handle(
            TOPIC_SESSION_DESTROY,
            Arc::new(move |msg| {
                let d = d.clone();
                Box::pin(async move { d.handle_destroy(msg) })
            }),
        );

        let d = self.clone();
        channel.handle(
            TOPIC_SESSION_STATUS,
            Arc::new(move |msg| {
                let d = d.clone();
                Box::pin(async move { d.handle_status(msg) })
            }),
        );
    }

    async fn handle_create(&self, msg: Message) -> Result<Option<Message>, ChannelError> {
        let request: SessionRequest = msg.decode()?;
        let session = self
            .manager
            .start(&request)
            .await
            .map_err(|e| ChannelError::Rejected(e.to_string()))?;

        let config = session
            .config()
            .map(|c| serde_json::to_vec(&c).unwrap_or_default())
            .unwrap_or_default();
        let response = SessionResponse {
            id: session.id().to_string(),
            payment_info: PAYMENT_INFO.to_string(),
            config,
        };
        Ok(Some(Message::encode(&response)?))
    }

    fn handle_acknowledge(&self, msg: Message) -> Result<Option<Message>, ChannelError> {
        let info: SessionInfo = msg.decode()?;
        self.manager
            .acknowledge(
                &Identity::from_address(&info.consumer_id),
                &SessionId::new(info.session_id),
            )
            .map_err(|e| ChannelError::Rejected(e.to_string()))?;
        Ok(None)
    }

    fn handle_destroy(&self, msg: Message) -> Result<Option<Message>, ChannelError> {
        let info: SessionInfo = msg.decode()?;
        self.manager
            .destroy(
                &Identity::from_address(&info.consumer_id),
                &SessionId::new(info.session_id),
            )
            .map_err(|e| ChannelError::Rejected(e.to_string()))?;
        Ok(None)
    }

    /// Status ingress is advisory; only a consumer-initiated destroy
    /// changes anything.
    fn handle_status(&self, msg: Message) -> Result<Option<Message>, ChannelError> {
        let status: SessionStatus = msg.decode()?;
        if status.code == CODE_DESTROYED_BY_CONSUMER {
            let consumer = Identity::from_address(&status.consumer_id);
            let session_id = SessionId::new(status.session_id);
            if let Err(e) = self.manager.destroy(&consumer, &session_id) {
                debug!(session = %session_id, "status destroy ignored: {e}");
            }
        } else {
            warn!(
                code = status.code,
                message = %status.message,
                "unhandled session status",
            );
        }
        Ok(None)
    }
}
