use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayerConfig {
    /// Decoder binary spawned once per stream session.
    #[serde(default = "default_decoder_path")]
    pub decoder_path: String,
    /// Scheduler pacing tick used to notice "idle and queue non-empty".
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Raw PCM blocks buffered between the decode and encode stages.
    #[serde(default = "default_handoff_capacity")]
    pub handoff_capacity: usize,
    /// How often a paused decode loop re-checks the paused flag.
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
    /// Queued control signals per room before senders see "busy".
    #[serde(default = "default_signal_capacity")]
    pub signal_capacity: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// How long unselected search results are kept.
    #[serde(default = "default_search_ttl_secs")]
    pub search_ttl_secs: u64,
    /// Related tracks requested from the resolver per autoplay step.
    #[serde(default = "default_autoplay_candidates")]
    pub autoplay_candidates: usize,
}

impl PlayerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.max(1))
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            decoder_path: default_decoder_path(),
            tick_interval_ms: default_tick_interval_ms(),
            handoff_capacity: default_handoff_capacity(),
            pause_poll_ms: default_pause_poll_ms(),
            signal_capacity: default_signal_capacity(),
            search_limit: default_search_limit(),
            search_ttl_secs: default_search_ttl_secs(),
            autoplay_candidates: default_autoplay_candidates(),
        }
    }
}

fn default_decoder_path() -> String {
    "ffmpeg".to_string()
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_handoff_capacity() -> usize {
    2
}

fn default_pause_poll_ms() -> u64 {
    20
}

fn default_signal_capacity() -> usize {
    32
}

fn default_search_limit() -> usize {
    5
}

fn default_search_ttl_secs() -> u64 {
    300
}

fn default_autoplay_candidates() -> usize {
    5
}
