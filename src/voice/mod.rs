//! Voice transport seam: where encoded frames leave the engine.

pub mod paced;

pub use paced::{PacedConnector, PacedSink};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::common::{
    errors::{RoomError, SinkError},
    types::{ChannelId, RoomId},
};

/// A live voice connection accepting Opus frames.
#[async_trait]
pub trait VoiceSink: Send + Sync {
    /// Whether the transport still accepts frames. Delivery stops once false.
    fn is_ready(&self) -> bool;

    async fn send_frame(&self, frame: Bytes) -> Result<(), SinkError>;

    /// Leaves the voice channel. Called once when the room is torn down.
    async fn release(&self);
}

/// Joins voice channels on behalf of new rooms.
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn join(
        &self,
        room: &RoomId,
        channel: &ChannelId,
    ) -> Result<Arc<dyn VoiceSink>, RoomError>;
}
