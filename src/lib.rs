pub mod audio;
pub mod commands;
pub mod common;
pub mod configs;
pub mod notify;
pub mod player;
pub mod room;
pub mod server;
pub mod sources;
pub mod tracks;
pub mod voice;

#[cfg(test)]
pub(crate) mod test_support;
