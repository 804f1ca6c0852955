//! Error types shared across the playback engine.

use thiserror::Error;

use crate::common::types::ChannelId;

/// Why a stream session ended in the `Failed` state.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to spawn decoder `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("decoder stdout pipe unavailable")]
    Pipe,

    #[error("opus encoder init failed: {0}")]
    EncoderInit(String),

    #[error("opus encode failed: {0}")]
    Encode(String),

    #[error("decoder read failed: {0}")]
    Decode(#[from] std::io::Error),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("delivery task aborted: {0}")]
    Worker(String),
}

/// The voice transport refused a frame.
#[derive(Debug, Clone, Error)]
#[error("voice sink rejected frame: {0}")]
pub struct SinkError(pub String);

/// An announcement could not be delivered.
#[derive(Debug, Clone, Error)]
#[error("announce failed: {0}")]
pub struct AnnounceError(pub String);

/// Failures of the track resolver collaborator.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no tracks found for `{0}`")]
    NotFound(String),

    #[error("invalid locator `{0}`")]
    InvalidLocator(String),

    #[error("resolver backend error: {0}")]
    Backend(String),

    #[error("resolver io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures creating or addressing a room.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("failed to join voice channel `{channel}`: {reason}")]
    VoiceJoin { channel: ChannelId, reason: String },

    #[error("You must be in '{0}' voice channel")]
    WrongVoiceChannel(ChannelId),

    #[error("You must be in '{0}' text channel to issue this command")]
    WrongTextChannel(ChannelId),

    #[error("nothing is playing in this room")]
    NotActive,

    #[error("room control line is full, try again")]
    Busy,

    #[error("room is shutting down")]
    Closed,
}

/// Failures surfaced to whoever issued a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command `{0}`")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Couldn't find the requested song: {0}")]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("No pending search results. Use `search <query>` first")]
    NoPendingSearch,

    #[error("Pick a number between 1 and {0}")]
    SelectionOutOfRange(usize),
}
