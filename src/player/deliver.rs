use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::state::SessionShared;
use crate::{audio::FrameEncoder, common::errors::SessionError, voice::VoiceSink};

/// Encode/deliver half of a stream session.
///
/// Drains PCM blocks in arrival order, encodes each one and hands it to the
/// sink. Returns `Ok` when the handoff closes, on cancellation, or when the
/// sink stops being ready; any encode or send error is returned as is.
pub async fn deliver_frames(
    rx: flume::Receiver<Vec<i16>>,
    mut encoder: Box<dyn FrameEncoder>,
    sink: Arc<dyn VoiceSink>,
    shared: Arc<SessionShared>,
    cancel_token: CancellationToken,
    label: String,
) -> Result<(), SessionError> {
    loop {
        let pcm = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Ok(()),
            msg = rx.recv_async() => match msg {
                Ok(pcm) => pcm,
                Err(_) => {
                    debug!("{} PCM handoff closed", label);
                    return Ok(());
                }
            },
        };

        let frame = encoder.encode(&pcm).map_err(|e| {
            warn!("{} encoding error: {}", label, e);
            e
        })?;

        if !sink.is_ready() {
            debug!("{} voice sink not ready, stopping delivery", label);
            return Ok(());
        }

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Ok(()),
            sent = sink.send_frame(frame) => sent?,
        }
        shared.record_frame();
    }
}
