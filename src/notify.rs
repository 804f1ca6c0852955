//! Announcements to a room's text channel.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::common::{errors::AnnounceError, types::RoomId};

#[async_trait]
pub trait Announcer: Send + Sync {
    async fn notify(&self, room: &RoomId, text: &str) -> Result<(), AnnounceError>;
}

/// Sends `text` and logs a failure; announcements are never retried.
pub async fn announce(announcer: &dyn Announcer, room: &RoomId, text: &str) {
    if let Err(e) = announcer.notify(room, text).await {
        warn!("[{}] failed to send message '{}': {}", room, text, e);
    }
}

/// Writes announcements to the log under the `announce` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAnnouncer;

#[async_trait]
impl Announcer for LogAnnouncer {
    async fn notify(&self, room: &RoomId, text: &str) -> Result<(), AnnounceError> {
        info!(target: "announce", "[{}] {}", room, text);
        Ok(())
    }
}
