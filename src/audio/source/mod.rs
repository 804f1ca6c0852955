//! `DecodeSource`: the raw PCM byte stream feeding one stream session.
//!
//! # Module layout
//!
//! ```text
//! src/audio/source/
//! ├── mod.rs      ← DecodeSource + SourceOpener traits
//! └── ffmpeg.rs   ← FfmpegSource (external decoder process)
//! ```

pub mod ffmpeg;

pub use ffmpeg::{FfmpegOpener, FfmpegSource};

use async_trait::async_trait;

use crate::{common::errors::SessionError, tracks::Track};

/// A decoder producing 48 kHz stereo s16le PCM.
#[async_trait]
pub trait DecodeSource: Send {
    /// Fills `buf` completely.
    ///
    /// Returns `Ok(false)` at end of stream, including when the stream ends
    /// part-way through `buf` (the partial block is dropped).
    async fn read_block(&mut self, buf: &mut [u8]) -> std::io::Result<bool>;

    /// Terminates the decoder and reaps it. Safe to call more than once.
    async fn kill(&mut self);
}

/// Starts a [`DecodeSource`] for a track.
pub trait SourceOpener: Send + Sync {
    fn open(&self, track: &Track) -> Result<Box<dyn DecodeSource>, SessionError>;
}
