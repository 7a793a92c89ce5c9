//! Live relay for chat delivery.
//!
//! Services publish through this trait. The transport (WebSocket fan-out)
//! lives in the API crate and is injected at startup.

use async_trait::async_trait;
use pulse_common::AppResult;
use std::sync::Arc;

use crate::services::messaging::MessageDetail;

/// Publishes chat events to connected clients.
///
/// Delivery is at-most-once: recipients without a live session simply miss
/// the event and pick the message up from history.
#[async_trait]
pub trait LiveRelay: Send + Sync {
    /// Publish a newly persisted message to each recipient's channel.
    async fn publish_new_message(
        &self,
        recipient_ids: &[String],
        message: &MessageDetail,
    ) -> AppResult<()>;
}

/// A relay that drops every event, for tests and headless tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLiveRelay;

#[async_trait]
impl LiveRelay for NoOpLiveRelay {
    async fn publish_new_message(
        &self,
        _recipient_ids: &[String],
        _message: &MessageDetail,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Shared handle to a live relay.
pub type LiveRelayService = Arc<dyn LiveRelay>;
