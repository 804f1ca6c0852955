pub mod codec;
pub mod constants;
pub mod source;

pub use codec::{EncoderFactory, FrameEncoder, OpusCodecEncoder, OpusEncoderFactory};
pub use source::{DecodeSource, FfmpegOpener, FfmpegSource, SourceOpener};
