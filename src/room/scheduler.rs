use std::{sync::Arc, time::Duration};

use rand::seq::SliceRandom;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::{Control, ControlOutcome, Room, RoomSignal, registry::RoomRegistry};
use crate::{
    common::{errors::SessionError, types::StreamId},
    notify::announce,
    player::{SessionOutcome, StreamSession},
    tracks::Track,
};

const AUTOPLAY_FAILED: &str = "Failed to find next song for autoplay. Switching off autoplay";

/// How long a stopping session gets to report before the room is released.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct Running {
    id: StreamId,
    done: oneshot::Receiver<SessionOutcome>,
}

enum Advance {
    Started(Running),
    /// Nothing to start but the room stays (autoplay will retry, or a
    /// session is still live).
    Waiting,
    Drained,
}

/// Per-room supervisory loop; the only writer of now-playing transitions.
pub(crate) struct Scheduler {
    room: Arc<Room>,
    signals: flume::Receiver<RoomSignal>,
    registry: RoomRegistry,
}

impl Scheduler {
    pub(crate) fn new(
        room: Arc<Room>,
        signals: flume::Receiver<RoomSignal>,
        registry: RoomRegistry,
    ) -> Self {
        Self {
            room,
            signals,
            registry,
        }
    }

    pub(crate) async fn run(self) {
        let shutdown = self.registry.shutdown_token();
        let mut tick = tokio::time::interval(self.registry.settings().tick_interval());
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut current: Option<Running> = None;
        info!("[{}] scheduler started", self.room.id);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.room.queue.halt();
                    self.room.queue.close();
                    if let Some(running) = current.take() {
                        let _ = tokio::time::timeout(SHUTDOWN_GRACE, running.done).await;
                    }
                    break;
                }
                (id, outcome) = wait_completion(&mut current) => {
                    current = None;
                    self.on_complete(&id, outcome).await;
                }
                signal = self.signals.recv_async() => match signal {
                    Ok(RoomSignal::Control(control, reply)) => self.apply(control, reply).await,
                    Ok(RoomSignal::Wake) => {}
                    Err(_) => break,
                },
                _ = tick.tick() => {}
            }

            if current.is_some() {
                continue;
            }
            match self.advance().await {
                Advance::Started(running) => current = Some(running),
                Advance::Waiting => {}
                Advance::Drained => {
                    if self.registry.teardown(&self.room) {
                        break;
                    }
                }
            }
        }

        self.room.sink.release().await;
        self.registry.forget(&self.room);
        info!("[{}] scheduler stopped, voice released", self.room.id);
    }

    async fn apply(&self, control: Control, reply: Option<oneshot::Sender<ControlOutcome>>) {
        let queue = &self.room.queue;
        let outcome = match control {
            Control::Skip => queue.skip(),
            Control::Stop => queue.stop_all(),
            Control::Pause => queue.pause(),
            Control::Resume => queue.resume(),
            Control::Autoplay(on) => queue.set_autoplay(on),
        };

        let message = outcome.message();
        info!("[{}] {:?}: {}", self.room.id, control, message);
        if outcome.is_noop() {
            announce(self.registry.announcer(), &self.room.id, &message).await;
        }
        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    async fn on_complete(
        &self,
        id: &StreamId,
        outcome: Result<SessionOutcome, oneshot::error::RecvError>,
    ) {
        let outcome = outcome.unwrap_or_else(|_| {
            SessionOutcome::Failed(SessionError::Worker(
                "session ended without reporting".to_string(),
            ))
        });

        let track = self.room.queue.finish(id);
        let title = track.as_ref().map(|t| t.title.as_str()).unwrap_or("<skipped>");

        match outcome {
            SessionOutcome::Finished => {
                info!("[{}] [{}] finished playing {}", self.room.id, id, title)
            }
            SessionOutcome::Cancelled => {
                debug!("[{}] [{}] stream stopped", self.room.id, id)
            }
            SessionOutcome::Failed(e) => {
                warn!("[{}] [{}] failed to stream {}: {}", self.room.id, id, title, e);
                if let Some(track) = &track {
                    announce(
                        self.registry.announcer(),
                        &self.room.id,
                        &format!("Failed to play '{}'", track.title),
                    )
                    .await;
                }
            }
        }
    }

    async fn advance(&self) -> Advance {
        if self.room.queue.is_playing() {
            return Advance::Waiting;
        }

        let Some(track) = self.next_track().await else {
            return if self.room.queue.is_idle() {
                Advance::Drained
            } else {
                Advance::Waiting
            };
        };

        let (session, done) = StreamSession::start(
            self.room.id.clone(),
            track.clone(),
            self.room.sink.clone(),
            self.registry.pipeline(),
        );
        let id = session.id().clone();
        self.room.queue.begin(session);

        info!("[{}] [{}] playing {}", self.room.id, id, track.title);
        announce(
            self.registry.announcer(),
            &self.room.id,
            &now_playing_message(&track),
        )
        .await;

        Advance::Started(Running { id, done })
    }

    /// Related track when autoplay is on, otherwise the queue head.
    async fn next_track(&self) -> Option<Arc<Track>> {
        let queue = &self.room.queue;
        if queue.autoplay() {
            match queue.autoplay_seed() {
                Some(seed) => match self.related(&seed).await {
                    Ok(track) => return Some(track),
                    Err(reason) => self.autoplay_failed(&reason).await,
                },
                None if queue.has_pending() => {}
                None => self.autoplay_failed("nothing has played yet").await,
            }
        }
        queue.pop_next()
    }

    async fn related(&self, seed: &Track) -> Result<Arc<Track>, String> {
        let limit = self.registry.settings().autoplay_candidates.max(1);
        let candidates = self
            .registry
            .resolver()
            .related_to(&seed.source_id, limit)
            .await
            .map_err(|e| e.to_string())?;

        let picked = candidates
            .into_iter()
            .filter(|t| t.source_id != seed.source_id)
            .collect::<Vec<_>>()
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| format!("no tracks related to '{}'", seed.title))?;

        Ok(Arc::new(picked))
    }

    async fn autoplay_failed(&self, reason: &str) {
        if self.room.queue.disable_autoplay() {
            warn!("[{}] {}. Got error [{}]", self.room.id, AUTOPLAY_FAILED, reason);
            announce(self.registry.announcer(), &self.room.id, AUTOPLAY_FAILED).await;
        }
    }
}

async fn wait_completion(
    current: &mut Option<Running>,
) -> (StreamId, Result<SessionOutcome, oneshot::error::RecvError>) {
    match current {
        Some(running) => {
            let outcome = (&mut running.done).await;
            (running.id.clone(), outcome)
        }
        None => std::future::pending().await,
    }
}

pub fn now_playing_message(track: &Track) -> String {
    format!("**Playing** \n\n{}", track.summary())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        room::{Placement, RoomRequest},
        test_support::*,
    };

    #[test]
    fn now_playing_names_track_and_requester() {
        let track = (*track("Song")).clone().requested_by("arsh".into());
        assert_eq!(
            now_playing_message(&track),
            "**Playing** \n\n`0:03` -- `Song` | `Test` | Requested by -- `arsh`"
        );
    }

    #[tokio::test]
    async fn plays_queue_in_order_then_tears_down() {
        let h = Harness::new(StubResolver::default());
        let req = RoomRequest::new("room", "voice", "text", "user");

        let room = h
            .registry
            .enqueue(&req, plain_track("T1"), Placement::Back)
            .await
            .unwrap();
        h.registry
            .enqueue(&req, plain_track("T2"), Placement::Back)
            .await
            .unwrap();

        // Starts within one tick and streams.
        eventually(|| room.queue.is_playing()).await;
        let first = room.queue.snapshot().now_playing.unwrap();
        assert_eq!(first.track.title, "T1");

        eventually(|| h.registry.get(&req.room).is_none()).await;
        eventually(|| h.sink().is_released()).await;

        assert_eq!(h.sink().frames().len(), 2 * BLOCKS_PER_TRACK);
        let played: Vec<String> = h
            .announcer
            .messages()
            .into_iter()
            .filter(|m| m.starts_with("**Playing**"))
            .collect();
        assert_eq!(played.len(), 2);
        assert!(played[0].contains("`T1`"));
        assert!(played[1].contains("`T2`"));
        assert!(played[0].contains("Requested by -- `user`"));
    }

    #[tokio::test]
    async fn skip_moves_to_next_track() {
        let h = Harness::slow(StubResolver::default());
        let req = RoomRequest::new("room", "voice", "text", "user");
        let room = h
            .registry
            .enqueue(&req, plain_track("T1"), Placement::Back)
            .await
            .unwrap();
        h.registry
            .enqueue(&req, plain_track("T2"), Placement::Back)
            .await
            .unwrap();
        eventually(|| room.queue.is_playing()).await;

        let outcome = h.registry.control(&req, Control::Skip).await.unwrap();
        assert!(matches!(outcome, ControlOutcome::Skipped(t) if t.title == "T1"));

        eventually(|| {
            room.queue
                .snapshot()
                .now_playing
                .is_some_and(|np| np.track.title == "T2")
        })
        .await;
        h.registry.control(&req, Control::Stop).await.unwrap();
        eventually(|| h.sink().is_released()).await;
    }

    #[tokio::test]
    async fn stop_clears_pending_and_completes_once() {
        let h = Harness::slow(StubResolver::default());
        let req = RoomRequest::new("room", "voice", "text", "user");
        let room = h
            .registry
            .enqueue(&req, plain_track("T1"), Placement::Back)
            .await
            .unwrap();
        for name in ["T2", "T3", "T4"] {
            h.registry
                .enqueue(&req, plain_track(name), Placement::Back)
                .await
                .unwrap();
        }
        eventually(|| room.queue.is_playing()).await;

        match h.registry.control(&req, Control::Stop).await.unwrap() {
            ControlOutcome::Stopped { current, cleared } => {
                assert_eq!(current.unwrap().title, "T1");
                assert_eq!(cleared, 3);
            }
            other => panic!("unexpected {:?}", other),
        }

        eventually(|| h.registry.get(&req.room).is_none()).await;
        assert_eq!(h.opener.opened(), ["mem://T1"]);
        assert_eq!(h.opener.kills(), 1);
    }

    #[tokio::test]
    async fn idle_controls_are_announced() {
        let h = Harness::slow(StubResolver::default());
        let req = RoomRequest::new("room", "voice", "text", "user");
        let room = h
            .registry
            .enqueue(&req, plain_track("T1"), Placement::Back)
            .await
            .unwrap();
        eventually(|| room.queue.is_playing()).await;

        h.registry.control(&req, Control::Pause).await.unwrap();
        let again = h.registry.control(&req, Control::Pause).await.unwrap();
        assert!(matches!(again, ControlOutcome::AlreadyPaused));
        eventually(|| {
            h.announcer
                .messages()
                .contains(&"Queue is already paused".to_string())
        })
        .await;
        h.registry.control(&req, Control::Stop).await.unwrap();
    }

    #[tokio::test]
    async fn failing_autoplay_warns_once_and_falls_back() {
        let h = Harness::new(StubResolver::default().failing_related());
        let req = RoomRequest::new("room", "voice", "text", "user");
        let room = h
            .registry
            .enqueue(&req, plain_track("T1"), Placement::Back)
            .await
            .unwrap();
        room.signal(RoomSignal::Control(Control::Autoplay(true), None))
            .unwrap();
        h.registry
            .enqueue(&req, plain_track("T2"), Placement::Back)
            .await
            .unwrap();

        eventually(|| h.registry.get(&req.room).is_none()).await;

        let warnings = h
            .announcer
            .messages()
            .into_iter()
            .filter(|m| m == AUTOPLAY_FAILED)
            .count();
        assert_eq!(warnings, 1);
        assert!(!room.queue.autoplay());
        assert_eq!(h.opener.opened(), ["mem://T1", "mem://T2"]);
    }

    #[tokio::test]
    async fn autoplay_picks_related_track() {
        let resolver = StubResolver::default().with_related(vec![plain_track("T3")]);
        let h = Harness::new(resolver);
        let req = RoomRequest::new("room", "voice", "text", "user");
        let room = h
            .registry
            .enqueue(&req, plain_track("T1"), Placement::Back)
            .await
            .unwrap();
        h.registry
            .control(&req, Control::Autoplay(true))
            .await
            .unwrap();

        // T3 plays next; when T3 finishes the only related track is itself,
        // so autoplay switches off and the room drains.
        eventually(|| h.registry.get(&req.room).is_none()).await;
        assert_eq!(h.opener.opened(), ["mem://T1", "mem://T3"]);
        assert!(!room.queue.autoplay());
        assert!(
            h.announcer
                .messages()
                .iter()
                .any(|m| m.contains("`T3`") && m.contains("`autoplay`"))
        );
    }

    #[tokio::test]
    async fn failed_session_is_announced_and_skipped() {
        let h = Harness::new(StubResolver::default());
        h.opener.fail_locator("mem://bad");
        let req = RoomRequest::new("room", "voice", "text", "user");
        h.registry
            .enqueue(&req, plain_track("bad"), Placement::Back)
            .await
            .unwrap();
        h.registry
            .enqueue(&req, plain_track("good"), Placement::Back)
            .await
            .unwrap();

        eventually(|| h.registry.get(&req.room).is_none()).await;
        assert!(
            h.announcer
                .messages()
                .contains(&"Failed to play 'bad'".to_string())
        );
        assert_eq!(h.sink().frames().len(), BLOCKS_PER_TRACK);
    }

    #[tokio::test]
    async fn shutdown_stops_rooms_and_releases_voice() {
        let h = Harness::slow(StubResolver::default());
        let req = RoomRequest::new("room", "voice", "text", "user");
        let room = h
            .registry
            .enqueue(&req, plain_track("T1"), Placement::Back)
            .await
            .unwrap();
        eventually(|| room.queue.is_playing()).await;

        h.registry.shutdown(Duration::from_secs(5)).await;
        assert_eq!(h.registry.room_count(), 0);
        assert!(h.sink().is_released());
        assert_eq!(h.opener.kills(), 1);
    }
}
