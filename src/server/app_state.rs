use std::sync::Arc;

use crate::{
    commands::Dispatcher,
    configs::Config,
    notify::LogAnnouncer,
    player::Pipeline,
    room::{RoomRegistry, RoomRequest},
    sources::LocalResolver,
    voice::PacedConnector,
};

/// Top-level application state.
pub struct AppState {
    pub registry: RoomRegistry,
    pub dispatcher: Dispatcher,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = RoomRegistry::new(
            Arc::new(PacedConnector),
            Arc::new(LocalResolver::new(&config.library)),
            Arc::new(LogAnnouncer),
            Pipeline::from_config(&config.player),
            config.player.clone(),
        );
        let dispatcher = Dispatcher::new(registry.clone());

        Self {
            registry,
            dispatcher,
            config,
        }
    }

    /// The identity stdin commands are issued under.
    pub fn console_request(&self) -> RoomRequest {
        let console = &self.config.console;
        RoomRequest::new(
            console.room_id.as_str(),
            console.voice_channel.as_str(),
            console.text_channel.as_str(),
            console.user.as_str(),
        )
    }
}
