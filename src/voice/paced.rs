use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{VoiceConnector, VoiceSink};
use crate::{
    audio::constants::FRAME_DURATION_MS,
    common::{
        errors::{RoomError, SinkError},
        types::{ChannelId, RoomId},
    },
};

/// Frames buffered ahead of the transmit clock (~200 ms).
const PACED_QUEUE_FRAMES: usize = 10;

/// A sink that drains frames at the real-time 20 ms cadence.
///
/// Producers are back-pressured by the bounded queue, so a session streams at
/// playback speed instead of as fast as the decoder runs.
pub struct PacedSink {
    tx: flume::Sender<Bytes>,
    ready: Arc<AtomicBool>,
    transmitted: Arc<AtomicU64>,
    cancel_token: CancellationToken,
    label: String,
}

impl PacedSink {
    pub fn start(label: impl Into<String>) -> Arc<Self> {
        let label = label.into();
        let (tx, rx) = flume::bounded::<Bytes>(PACED_QUEUE_FRAMES);
        let ready = Arc::new(AtomicBool::new(true));
        let transmitted = Arc::new(AtomicU64::new(0));
        let cancel_token = CancellationToken::new();

        tokio::spawn(transmit_loop(
            rx,
            transmitted.clone(),
            ready.clone(),
            cancel_token.clone(),
            label.clone(),
        ));

        Arc::new(Self {
            tx,
            ready,
            transmitted,
            cancel_token,
            label,
        })
    }

    pub fn transmitted(&self) -> u64 {
        self.transmitted.load(Ordering::Relaxed)
    }
}

async fn transmit_loop(
    rx: flume::Receiver<Bytes>,
    transmitted: Arc<AtomicU64>,
    ready: Arc<AtomicBool>,
    cancel_token: CancellationToken,
    label: String,
) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_millis(FRAME_DURATION_MS));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = interval.tick() => {
                if rx.try_recv().is_ok() {
                    transmitted.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    ready.store(false, Ordering::Release);
    debug!(
        "[{}] transmit loop stopped after {} frames",
        label,
        transmitted.load(Ordering::Relaxed)
    );
}

#[async_trait]
impl VoiceSink for PacedSink {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn send_frame(&self, frame: Bytes) -> Result<(), SinkError> {
        if !self.is_ready() {
            return Err(SinkError("voice connection closed".into()));
        }
        self.tx
            .send_async(frame)
            .await
            .map_err(|_| SinkError("transmit loop stopped".into()))
    }

    async fn release(&self) {
        self.ready.store(false, Ordering::Release);
        self.cancel_token.cancel();
        info!("[{}] voice connection released", self.label);
    }
}

/// Hands out a fresh [`PacedSink`] per room.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacedConnector;

#[async_trait]
impl VoiceConnector for PacedConnector {
    async fn join(
        &self,
        room: &RoomId,
        channel: &ChannelId,
    ) -> Result<Arc<dyn VoiceSink>, RoomError> {
        info!("[{}] joining voice channel {}", room, channel);
        Ok(PacedSink::start(format!("{}/{}", room, channel)))
    }
}
