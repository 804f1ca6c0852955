use std::process::Stdio;

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, BufReader},
    process::{Child, ChildStdout, Command},
};
use tracing::debug;

use super::{DecodeSource, SourceOpener};
use crate::{
    audio::constants::{CHANNELS, DECODER_READ_BUFFER, SAMPLE_RATE},
    common::errors::SessionError,
    tracks::Track,
};

/// Builds the decoder argument list for a locator.
///
/// Network locators get reconnect flags so a dropped connection does not end
/// the track early.
pub fn decoder_args(locator: &str) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];

    if locator.starts_with("http://") || locator.starts_with("https://") {
        args.extend(
            [
                "-reconnect",
                "1",
                "-reconnect_streamed",
                "1",
                "-reconnect_delay_max",
                "5",
            ]
            .map(String::from),
        );
    }

    args.extend([
        "-i".to_string(),
        locator.to_string(),
        "-f".to_string(),
        "s16le".to_string(),
        "-ar".to_string(),
        SAMPLE_RATE.to_string(),
        "-ac".to_string(),
        CHANNELS.to_string(),
        "pipe:1".to_string(),
    ]);
    args
}

/// An ffmpeg child process decoding one locator to stdout.
pub struct FfmpegSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    reaped: bool,
}

impl FfmpegSource {
    pub fn spawn(program: &str, locator: &str) -> Result<Self, SessionError> {
        let mut child = Command::new(program)
            .args(decoder_args(locator))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SessionError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(SessionError::Pipe)?;
        debug!("spawned {} (pid {:?}) for {}", program, child.id(), locator);

        Ok(Self {
            child,
            stdout: BufReader::with_capacity(DECODER_READ_BUFFER, stdout),
            reaped: false,
        })
    }
}

#[async_trait]
impl DecodeSource for FfmpegSource {
    async fn read_block(&mut self, buf: &mut [u8]) -> std::io::Result<bool> {
        match self.stdout.read_exact(buf).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn kill(&mut self) {
        if self.reaped {
            return;
        }
        self.reaped = true;
        // Already exited on its own at EOF; start_kill then just fails.
        let _ = self.child.start_kill();
        match self.child.wait().await {
            Ok(status) => debug!("decoder exited: {}", status),
            Err(e) => debug!("decoder wait failed: {}", e),
        }
    }
}

/// Opens an [`FfmpegSource`] using a configured binary path.
pub struct FfmpegOpener {
    program: String,
}

impl FfmpegOpener {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SourceOpener for FfmpegOpener {
    fn open(&self, track: &Track) -> Result<Box<dyn DecodeSource>, SessionError> {
        Ok(Box::new(FfmpegSource::spawn(&self.program, &track.locator)?))
    }
}
