//! Fixed audio format shared by the decoder, the encoder and the voice sink.
//!
//! The pipeline runs a single configuration: 48 kHz stereo, 16-bit
//! little-endian PCM, 20 ms frames.

// ── Sample / PCM ─────────────────────────────────────────────────────────────

/// Output sample rate requested from the decoder and fed to Opus (Hz).
pub const SAMPLE_RATE: u32 = 48_000;

/// Interleaved channel count.
pub const CHANNELS: usize = 2;

/// Samples per channel in one 20 ms frame.
pub const FRAME_SIZE: usize = 960;

/// Interleaved i16 samples in one frame (960 × 2).
pub const FRAME_SAMPLES: usize = FRAME_SIZE * CHANNELS;

/// Raw PCM bytes read from the decoder per frame.
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

/// Frame period used to pace delivery to the voice transport.
pub const FRAME_DURATION_MS: u64 = 20;

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Upper bound on one encoded Opus packet.
pub const MAX_OPUS_FRAME_BYTES: usize = FRAME_SIZE * CHANNELS;

// ── Decoder process ──────────────────────────────────────────────────────────

/// Buffered reader capacity wrapped around the decoder's stdout.
pub const DECODER_READ_BUFFER: usize = 16 * 1_024;
