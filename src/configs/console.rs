use serde::{Deserialize, Serialize};

/// Identity used by the stdin front-end.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConsoleConfig {
    #[serde(default = "default_room_id")]
    pub room_id: String,
    #[serde(default = "default_voice_channel")]
    pub voice_channel: String,
    #[serde(default = "default_text_channel")]
    pub text_channel: String,
    #[serde(default = "default_user")]
    pub user: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            room_id: default_room_id(),
            voice_channel: default_voice_channel(),
            text_channel: default_text_channel(),
            user: default_user(),
        }
    }
}

fn default_room_id() -> String {
    "console".to_string()
}

fn default_voice_channel() -> String {
    "voice".to_string()
}

fn default_text_channel() -> String {
    "text".to_string()
}

fn default_user() -> String {
    "console".to_string()
}
