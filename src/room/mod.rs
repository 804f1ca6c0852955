//! Rooms: one voice session each, with its own queue and scheduler.

pub mod queue;
pub mod registry;
pub mod scheduler;

pub use queue::{ControlOutcome, NowPlayingInfo, PlayStatus, QueueSnapshot, RoomQueue};
pub use registry::{Placement, RoomRegistry, RoomRequest};

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::{
    common::{
        errors::RoomError,
        types::{ChannelId, RoomId},
    },
    voice::VoiceSink,
};

/// A queue control action applied by the room's scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Skip,
    Stop,
    Pause,
    Resume,
    Autoplay(bool),
}

/// Everything a room's scheduler receives on its signal line, in order.
#[derive(Debug)]
pub enum RoomSignal {
    Control(Control, Option<oneshot::Sender<ControlOutcome>>),
    /// New work was enqueued.
    Wake,
}

pub struct Room {
    pub id: RoomId,
    pub voice_channel: ChannelId,
    pub text_channel: ChannelId,
    pub sink: Arc<dyn VoiceSink>,
    pub queue: RoomQueue,
    signals: flume::Sender<RoomSignal>,
}

impl Room {
    pub fn new(
        id: RoomId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        sink: Arc<dyn VoiceSink>,
        signal_capacity: usize,
    ) -> (Arc<Self>, flume::Receiver<RoomSignal>) {
        let (signals, rx) = flume::bounded(signal_capacity.max(1));
        let room = Arc::new(Self {
            id,
            voice_channel,
            text_channel,
            sink,
            queue: RoomQueue::new(),
            signals,
        });
        (room, rx)
    }

    /// Queues a signal without waiting.
    pub fn signal(&self, signal: RoomSignal) -> Result<(), RoomError> {
        self.signals.try_send(signal).map_err(|e| match e {
            flume::TrySendError::Full(_) => RoomError::Busy,
            flume::TrySendError::Disconnected(_) => RoomError::Closed,
        })
    }

    /// Nudges the scheduler after an enqueue. A full line already guarantees
    /// it will run again soon, so that case is ignored.
    pub fn wake(&self) {
        let _ = self.signal(RoomSignal::Wake);
    }

    /// Rejects commands from outside the room's channels.
    pub fn check_channels(
        &self,
        voice_channel: &ChannelId,
        text_channel: &ChannelId,
    ) -> Result<(), RoomError> {
        if voice_channel != &self.voice_channel {
            return Err(RoomError::WrongVoiceChannel(self.voice_channel.clone()));
        }
        if text_channel != &self.text_channel {
            return Err(RoomError::WrongTextChannel(self.text_channel.clone()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("voice_channel", &self.voice_channel)
            .field("text_channel", &self.text_channel)
            .field("queue", &self.queue)
            .finish()
    }
}
