use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Control, ControlOutcome, QueueSnapshot, Room, RoomSignal, scheduler::Scheduler};
use crate::{
    common::{
        errors::RoomError,
        types::{ChannelId, RoomId, UserId},
    },
    configs::PlayerConfig,
    notify::Announcer,
    player::Pipeline,
    sources::{SearchCache, TrackResolver},
    tracks::Track,
    voice::VoiceConnector,
};

/// Who is asking, and from where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRequest {
    pub room: RoomId,
    pub voice_channel: ChannelId,
    pub text_channel: ChannelId,
    pub user: UserId,
}

impl RoomRequest {
    pub fn new(
        room: impl Into<RoomId>,
        voice_channel: impl Into<ChannelId>,
        text_channel: impl Into<ChannelId>,
        user: impl Into<UserId>,
    ) -> Self {
        Self {
            room: room.into(),
            voice_channel: voice_channel.into(),
            text_channel: text_channel.into(),
            user: user.into(),
        }
    }
}

/// Where an enqueued track goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Back,
    Front,
}

struct Inner {
    rooms: DashMap<RoomId, Arc<Room>>,
    connector: Arc<dyn VoiceConnector>,
    resolver: Arc<dyn TrackResolver>,
    announcer: Arc<dyn Announcer>,
    pipeline: Pipeline,
    settings: PlayerConfig,
    search_cache: SearchCache,
    shutdown: CancellationToken,
}

/// Process-wide map of live rooms plus the collaborators their schedulers use.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<Inner>,
}

impl RoomRegistry {
    pub fn new(
        connector: Arc<dyn VoiceConnector>,
        resolver: Arc<dyn TrackResolver>,
        announcer: Arc<dyn Announcer>,
        pipeline: Pipeline,
        settings: PlayerConfig,
    ) -> Self {
        let search_cache = SearchCache::new(settings.search_ttl());
        Self {
            inner: Arc::new(Inner {
                rooms: DashMap::new(),
                connector,
                resolver,
                announcer,
                pipeline,
                settings,
                search_cache,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn get(&self, room: &RoomId) -> Option<Arc<Room>> {
        self.inner.rooms.get(room).map(|r| r.value().clone())
    }

    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }

    pub fn resolver(&self) -> &dyn TrackResolver {
        self.inner.resolver.as_ref()
    }

    pub fn announcer(&self) -> &dyn Announcer {
        self.inner.announcer.as_ref()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    pub fn settings(&self) -> &PlayerConfig {
        &self.inner.settings
    }

    pub fn search_cache(&self) -> &SearchCache {
        &self.inner.search_cache
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Adds a track to the request's room, creating and joining the room first
    /// if needed. Voice join failures leave no room behind.
    pub async fn enqueue(
        &self,
        req: &RoomRequest,
        track: Track,
        placement: Placement,
    ) -> Result<Arc<Room>, RoomError> {
        let track = Arc::new(track.requested_by(req.user.clone()));

        loop {
            // A closing room only reopens as a new one outside shutdown.
            if self.inner.shutdown.is_cancelled() {
                return Err(RoomError::Closed);
            }

            let room = match self.get(&req.room) {
                Some(room) => {
                    room.check_channels(&req.voice_channel, &req.text_channel)?;
                    room
                }
                None => self.create(req).await?,
            };

            let added = match placement {
                Placement::Back => room.queue.enqueue_back(track.clone()),
                Placement::Front => room.queue.enqueue_front(track.clone()),
            };

            match added {
                Ok(position) => {
                    info!(
                        "[{}] queued '{}' at position {} ({:?})",
                        req.room, track.title, position, placement
                    );
                    room.wake();
                    return Ok(room);
                }
                // Torn down between lookup and enqueue; the next pass creates a new room.
                Err(RoomError::Closed) => {
                    debug!("[{}] room closed during enqueue, retrying", req.room);
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn create(&self, req: &RoomRequest) -> Result<Arc<Room>, RoomError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(RoomError::Closed);
        }
        let sink = self
            .inner
            .connector
            .join(&req.room, &req.voice_channel)
            .await?;

        let (room, signals) = Room::new(
            req.room.clone(),
            req.voice_channel.clone(),
            req.text_channel.clone(),
            sink.clone(),
            self.inner.settings.signal_capacity,
        );

        if self.inner.shutdown.is_cancelled() {
            sink.release().await;
            return Err(RoomError::Closed);
        }

        let existing = match self.inner.rooms.entry(req.room.clone()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(room.clone());
                None
            }
        };

        if let Some(existing) = existing {
            // Another request created the room while we were joining.
            sink.release().await;
            existing.check_channels(&req.voice_channel, &req.text_channel)?;
            return Ok(existing);
        }

        info!(
            "[{}] room created for voice channel {}",
            req.room, req.voice_channel
        );
        tokio::spawn(Scheduler::new(room.clone(), signals, self.clone()).run());
        Ok(room)
    }

    /// Sends a control action to the room's scheduler and waits for the outcome.
    pub async fn control(
        &self,
        req: &RoomRequest,
        control: Control,
    ) -> Result<ControlOutcome, RoomError> {
        let room = self.get(&req.room).ok_or(RoomError::NotActive)?;
        room.check_channels(&req.voice_channel, &req.text_channel)?;

        let (tx, rx) = oneshot::channel();
        room.signal(RoomSignal::Control(control, Some(tx)))?;
        rx.await.map_err(|_| RoomError::Closed)
    }

    pub fn snapshot(&self, room: &RoomId) -> Option<QueueSnapshot> {
        self.get(room).map(|r| r.queue.snapshot())
    }

    /// Removes `room` if it is still registered and idle. Once this returns
    /// `true` the room refuses new tracks.
    pub(crate) fn teardown(&self, room: &Arc<Room>) -> bool {
        let removed = self
            .inner
            .rooms
            .remove_if(&room.id, |_, r| Arc::ptr_eq(r, room) && r.queue.close_if_idle())
            .is_some();

        if removed {
            self.inner.search_cache.purge_room(&room.id);
            info!("[{}] queue drained, room removed", room.id);
        } else if self.get(&room.id).is_none() {
            // Already gone (shutdown); make sure late enqueues are refused.
            room.queue.close();
            return true;
        }
        removed
    }

    /// Drops `room` from the map after its scheduler exits.
    pub(crate) fn forget(&self, room: &Arc<Room>) {
        self.inner
            .rooms
            .remove_if(&room.id, |_, r| Arc::ptr_eq(r, room));
        self.inner.search_cache.purge_room(&room.id);
    }

    /// Stops every room and waits up to `grace` for their schedulers to exit.
    pub async fn shutdown(&self, grace: Duration) {
        info!("Shutting down {} room(s)", self.room_count());
        self.inner.shutdown.cancel();

        let drained = tokio::time::timeout(grace, async {
            while !self.inner.rooms.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "{} room(s) still running after shutdown grace period",
                self.room_count()
            );
        }
    }
}
