use std::{sync::Arc, time::Duration};

use crate::{
    audio::{EncoderFactory, FfmpegOpener, OpusEncoderFactory, SourceOpener},
    configs::PlayerConfig,
};

/// Everything a stream session needs besides its track and sink.
#[derive(Clone)]
pub struct Pipeline {
    pub opener: Arc<dyn SourceOpener>,
    pub encoders: Arc<dyn EncoderFactory>,
    /// Bounded capacity of the decode → encode handoff, in PCM blocks.
    pub handoff_capacity: usize,
    pub pause_poll: Duration,
}

impl Pipeline {
    pub fn new(
        opener: Arc<dyn SourceOpener>,
        encoders: Arc<dyn EncoderFactory>,
        config: &PlayerConfig,
    ) -> Self {
        Self {
            opener,
            encoders,
            handoff_capacity: config.handoff_capacity.max(1),
            pause_poll: config.pause_poll(),
        }
    }

    /// ffmpeg decoding and Opus encoding.
    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(
            Arc::new(FfmpegOpener::new(config.decoder_path.clone())),
            Arc::new(OpusEncoderFactory),
            config,
        )
    }
}
