use audiopus::{Application, Bitrate, Channels, SampleRate, coder::Encoder as OpusEncoder};
use bytes::Bytes;

use super::{EncoderFactory, FrameEncoder};
use crate::{
    audio::constants::{FRAME_SAMPLES, MAX_OPUS_FRAME_BYTES},
    common::errors::SessionError,
};

/// PCM i16 → Opus bytes encoder.
/// Encodes 960-sample (20 ms) stereo frames at 48 kHz.
pub struct OpusCodecEncoder {
    encoder: OpusEncoder,
    out: Vec<u8>,
}

impl OpusCodecEncoder {
    /// Create a new encoder at 48 kHz stereo with the AUDIO application profile.
    pub fn new() -> Result<Self, SessionError> {
        let mut encoder =
            OpusEncoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
                .map_err(|e| SessionError::EncoderInit(e.to_string()))?;
        encoder
            .set_bitrate(Bitrate::Auto)
            .map_err(|e| SessionError::EncoderInit(e.to_string()))?;

        Ok(Self {
            encoder,
            out: vec![0u8; MAX_OPUS_FRAME_BYTES],
        })
    }
}

impl FrameEncoder for OpusCodecEncoder {
    fn encode(&mut self, pcm: &[i16]) -> Result<Bytes, SessionError> {
        if pcm.len() != FRAME_SAMPLES {
            return Err(SessionError::Encode(format!(
                "expected {} samples, got {}",
                FRAME_SAMPLES,
                pcm.len()
            )));
        }

        let size = self
            .encoder
            .encode(pcm, &mut self.out)
            .map_err(|e| SessionError::Encode(e.to_string()))?;
        Ok(Bytes::copy_from_slice(&self.out[..size]))
    }
}

/// Builds one [`OpusCodecEncoder`] per stream session.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpusEncoderFactory;

impl EncoderFactory for OpusEncoderFactory {
    fn create(&self) -> Result<Box<dyn FrameEncoder>, SessionError> {
        Ok(Box::new(OpusCodecEncoder::new()?))
    }
}
