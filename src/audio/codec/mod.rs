pub mod opus_encoder;

pub use opus_encoder::{OpusCodecEncoder, OpusEncoderFactory};

use bytes::Bytes;

use crate::common::errors::SessionError;

/// Turns one interleaved PCM frame into one codec frame.
///
/// Each stream session owns its own encoder; frames are encoded in the order
/// they arrive.
pub trait FrameEncoder: Send {
    fn encode(&mut self, pcm: &[i16]) -> Result<Bytes, SessionError>;
}

/// Creates a fresh [`FrameEncoder`] for every stream session.
pub trait EncoderFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn FrameEncoder>, SessionError>;
}
