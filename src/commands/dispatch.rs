use tracing::{debug, info};

use super::{Command, HELP};
use crate::{
    common::errors::{CommandError, ResolveError, RoomError},
    notify::announce,
    room::{Control, ControlOutcome, Placement, RoomRegistry, RoomRequest},
    tracks::Track,
};

/// Routes parsed commands to the room registry and builds the reply text.
#[derive(Clone)]
pub struct Dispatcher {
    registry: RoomRegistry,
}

impl Dispatcher {
    pub fn new(registry: RoomRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, req: &RoomRequest, command: Command) -> Result<String, CommandError> {
        debug!("[{}] '{:?}' command received from {}", req.room, command, req.user);

        match command {
            Command::Play { query, now } => {
                self.guard(req)?;
                let track = self
                    .registry
                    .resolver()
                    .search(&query, 1)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| ResolveError::NotFound(query.clone()))?;
                self.enqueue(req, track, now).await
            }
            Command::PlayUrl { url, now } => {
                self.guard(req)?;
                let track = self.registry.resolver().resolve_direct(&url).await?;
                self.enqueue(req, track, now).await
            }
            Command::Search { query } => {
                self.guard(req)?;
                let limit = self.registry.settings().search_limit.max(1);
                let results = self.registry.resolver().search(&query, limit).await?;
                let reply = search_results_message(&results);
                self.registry
                    .search_cache()
                    .store(req.room.clone(), req.user.clone(), results);
                Ok(reply)
            }
            Command::Select { index } => {
                let cache = self.registry.search_cache();
                let mut results = cache
                    .take(&req.room, &req.user)
                    .ok_or(CommandError::NoPendingSearch)?;
                if index == 0 || index > results.len() {
                    let len = results.len();
                    cache.store(req.room.clone(), req.user.clone(), results);
                    return Err(CommandError::SelectionOutOfRange(len));
                }
                let track = results.swap_remove(index - 1);
                self.enqueue(req, track, false).await
            }
            Command::Pause => self.control(req, Control::Pause).await,
            Command::Resume => self.control(req, Control::Resume).await,
            Command::Skip => self.control(req, Control::Skip).await,
            Command::EmptyQueue => self.control(req, Control::Stop).await,
            Command::Autoplay(on) => self.control(req, Control::Autoplay(on)).await,
            Command::ShowQueue => Ok(self
                .registry
                .snapshot(&req.room)
                .map(|s| s.render())
                .unwrap_or_else(|| "Queue is empty".to_string())),
            Command::Help => Ok(HELP.to_string()),
        }
    }

    /// Rejects requests for an existing room from other channels before any
    /// resolver work happens.
    fn guard(&self, req: &RoomRequest) -> Result<(), RoomError> {
        match self.registry.get(&req.room) {
            Some(room) => room.check_channels(&req.voice_channel, &req.text_channel),
            None => Ok(()),
        }
    }

    async fn enqueue(&self, req: &RoomRequest, track: Track, now: bool) -> Result<String, CommandError> {
        let placement = if now { Placement::Front } else { Placement::Back };
        let track = track.requested_by(req.user.clone());
        let reply = adding_to_queue_message(&track, now);
        self.registry.enqueue(req, track, placement).await?;
        Ok(reply)
    }

    async fn control(&self, req: &RoomRequest, control: Control) -> Result<String, CommandError> {
        match self.registry.control(req, control).await {
            Ok(outcome) => {
                info!("[{}] {}", req.room, outcome.message());
                Ok(outcome.message())
            }
            Err(RoomError::NotActive) => match idle_outcome(control) {
                Some(outcome) => {
                    let message = outcome.message();
                    announce(self.registry.announcer(), &req.room, &message).await;
                    Ok(message)
                }
                None => Err(RoomError::NotActive.into()),
            },
            Err(e) => Err(e.into()),
        }
    }
}

/// What a control reports when the room does not exist at all.
fn idle_outcome(control: Control) -> Option<ControlOutcome> {
    match control {
        Control::Skip => Some(ControlOutcome::NothingToSkip),
        Control::Stop => Some(ControlOutcome::NothingToStop),
        Control::Pause => Some(ControlOutcome::NothingToPause),
        Control::Resume => Some(ControlOutcome::NothingToResume),
        Control::Autoplay(_) => None,
    }
}

pub fn adding_to_queue_message(track: &Track, now: bool) -> String {
    let header = if now { "Adding to Queue Top" } else { "Adding to Queue" };
    format!("**{}** \n\n{}", header, track.summary())
}

pub fn search_results_message(results: &[Track]) -> String {
    let mut msg = String::from("**Search Results**\n\n");
    for (idx, track) in results.iter().enumerate() {
        msg.push_str(&format!(
            "{}. `{}` -- `{}` | `{}`\n",
            idx + 1,
            track.duration_display(),
            track.title,
            track.channel_name
        ));
    }
    msg.push_str("\nUse `select <n>` to add one to the queue");
    msg
}
