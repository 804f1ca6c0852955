use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    deliver::deliver_frames,
    pipeline::Pipeline,
    state::{SessionOutcome, SessionShared, SessionState},
};
use crate::{
    audio::{
        DecodeSource,
        constants::{FRAME_BYTES, FRAME_SAMPLES},
    },
    common::{
        errors::SessionError,
        types::{RoomId, StreamId},
    },
    tracks::Track,
    voice::VoiceSink,
};

/// Handle to one track being decoded, encoded and delivered.
///
/// Dropping the handle does not stop the stream; call [`StreamSession::stop`].
#[derive(Debug, Clone)]
pub struct StreamSession {
    id: StreamId,
    track: Arc<Track>,
    shared: Arc<SessionShared>,
    cancel_token: CancellationToken,
}

impl StreamSession {
    /// Spawns the session. The receiver yields exactly one outcome.
    pub fn start(
        room: RoomId,
        track: Arc<Track>,
        sink: Arc<dyn VoiceSink>,
        pipeline: &Pipeline,
    ) -> (Self, oneshot::Receiver<SessionOutcome>) {
        let id = StreamId::generate();
        let shared = Arc::new(SessionShared::new());
        let cancel_token = CancellationToken::new();
        let (done_tx, done_rx) = oneshot::channel();

        info!(
            "[{}] [{}] creating stream session for '{}' ({})",
            room, id, track.title, track.locator
        );

        let runner = SessionRunner {
            label: format!("[{}] [{}]", room, id),
            track: track.clone(),
            sink,
            pipeline: pipeline.clone(),
            shared: shared.clone(),
            cancel_token: cancel_token.clone(),
        };

        tokio::spawn(async move {
            let outcome = runner.run().await;
            let _ = done_tx.send(outcome);
        });

        (
            Self {
                id,
                track,
                shared,
                cancel_token,
            },
            done_rx,
        )
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn frames_sent(&self) -> u64 {
        self.shared.frames_sent()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    /// Returns `false` if the session was already paused.
    pub fn pause(&self) -> bool {
        self.shared.set_paused(true)
    }

    /// Returns `false` if the session was not paused.
    pub fn resume(&self) -> bool {
        self.shared.set_paused(false)
    }

    /// Requests cancellation; the outcome arrives on the completion receiver.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    #[cfg(test)]
    pub(crate) fn idle(track: Arc<Track>) -> Self {
        Self {
            id: StreamId::generate(),
            track,
            shared: Arc::new(SessionShared::new()),
            cancel_token: CancellationToken::new(),
        }
    }
}

enum DecodeEnd {
    Eof,
    Cancelled,
    /// The deliver worker went away first.
    Disconnected,
    Failed(std::io::Error),
}

struct SessionRunner {
    label: String,
    track: Arc<Track>,
    sink: Arc<dyn VoiceSink>,
    pipeline: Pipeline,
    shared: Arc<SessionShared>,
    cancel_token: CancellationToken,
}

impl SessionRunner {
    async fn run(self) -> SessionOutcome {
        let outcome = self.stream().await;
        self.shared.finish(outcome.state());

        match &outcome {
            SessionOutcome::Finished => info!(
                "{} finished after {} frames",
                self.label,
                self.shared.frames_sent()
            ),
            SessionOutcome::Cancelled => info!(
                "{} stopped after {} frames",
                self.label,
                self.shared.frames_sent()
            ),
            SessionOutcome::Failed(e) => warn!("{} failed: {}", self.label, e),
        }
        outcome
    }

    async fn stream(&self) -> SessionOutcome {
        let mut source = match self.pipeline.opener.open(&self.track) {
            Ok(source) => source,
            Err(e) => return SessionOutcome::Failed(e),
        };

        let encoder = match self.pipeline.encoders.create() {
            Ok(encoder) => encoder,
            Err(e) => {
                source.kill().await;
                return SessionOutcome::Failed(e);
            }
        };

        let (tx, rx) = flume::bounded::<Vec<i16>>(self.pipeline.handoff_capacity);
        let worker = tokio::spawn(deliver_frames(
            rx,
            encoder,
            self.sink.clone(),
            self.shared.clone(),
            self.cancel_token.clone(),
            self.label.clone(),
        ));

        self.shared.begin_streaming();
        let end = self.decode(source.as_mut(), &tx).await;

        source.kill().await;
        drop(tx);

        let delivered = match worker.await {
            Ok(result) => result,
            Err(e) => Err(SessionError::Worker(e.to_string())),
        };

        if self.cancel_token.is_cancelled() {
            return SessionOutcome::Cancelled;
        }

        match (end, delivered) {
            (_, Err(e)) => SessionOutcome::Failed(e),
            (DecodeEnd::Failed(e), Ok(())) => SessionOutcome::Failed(SessionError::Decode(e)),
            (DecodeEnd::Cancelled, Ok(())) => SessionOutcome::Cancelled,
            (DecodeEnd::Eof | DecodeEnd::Disconnected, Ok(())) => SessionOutcome::Finished,
        }
    }

    async fn decode(
        &self,
        source: &mut dyn DecodeSource,
        tx: &flume::Sender<Vec<i16>>,
    ) -> DecodeEnd {
        let mut buf = vec![0u8; FRAME_BYTES];

        loop {
            if self.shared.is_paused() {
                tokio::select! {
                    biased;
                    _ = self.cancel_token.cancelled() => return DecodeEnd::Cancelled,
                    _ = tokio::time::sleep(self.pipeline.pause_poll) => {}
                }
                if tx.is_disconnected() {
                    return DecodeEnd::Disconnected;
                }
                continue;
            }

            let read = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return DecodeEnd::Cancelled,
                read = source.read_block(&mut buf) => read,
            };

            match read {
                Ok(true) => {}
                Ok(false) => {
                    debug!("{} end of stream", self.label);
                    return DecodeEnd::Eof;
                }
                Err(e) => {
                    warn!("{} failed to read audio buffer: {}", self.label, e);
                    return DecodeEnd::Failed(e);
                }
            }

            let mut pcm = vec![0i16; FRAME_SAMPLES];
            LittleEndian::read_i16_into(&buf, &mut pcm);

            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return DecodeEnd::Cancelled,
                sent = tx.send_async(pcm) => {
                    if sent.is_err() {
                        return DecodeEnd::Disconnected;
                    }
                }
            }
        }
    }
}
