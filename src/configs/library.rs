use serde::{Deserialize, Serialize};

/// Directory served by the bundled local resolver.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LibraryConfig {
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            extensions: default_extensions(),
        }
    }
}

fn default_root() -> String {
    "./music".to_string()
}

fn default_extensions() -> Vec<String> {
    ["mp3", "flac", "ogg", "opus", "wav", "m4a", "webm", "mka"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
