use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::{
    common::{errors::RoomError, types::StreamId},
    player::{SessionState, StreamSession},
    tracks::Track,
};

/// Whether the now-playing slot still holds a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    Playing,
    Finished,
}

#[derive(Debug)]
pub struct NowPlaying {
    pub track: Arc<Track>,
    pub session: StreamSession,
    pub status: PlayStatus,
}

/// Result of a queue control operation.
#[derive(Debug, Clone)]
pub enum ControlOutcome {
    Skipped(Arc<Track>),
    NothingToSkip,
    Stopped {
        current: Option<Arc<Track>>,
        cleared: usize,
    },
    NothingToStop,
    Paused(Arc<Track>),
    AlreadyPaused,
    NothingToPause,
    Resumed(Arc<Track>),
    AlreadyPlaying,
    NothingToResume,
    Autoplay(bool),
}

impl ControlOutcome {
    /// True when the request did nothing because of the queue's state.
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            Self::NothingToSkip
                | Self::NothingToStop
                | Self::AlreadyPaused
                | Self::NothingToPause
                | Self::AlreadyPlaying
                | Self::NothingToResume
        )
    }

    pub fn message(&self) -> String {
        match self {
            Self::Skipped(track) => format!("Skipped song '{}'", track.title),
            Self::NothingToSkip => "No song is playing. Nothing to skip".to_string(),
            Self::Stopped { current, cleared } => match current {
                Some(track) => format!(
                    "Stopped '{}' and removed {} song(s) from the queue",
                    track.title, cleared
                ),
                None => format!("Removed {} song(s) from the queue", cleared),
            },
            Self::NothingToStop => "No songs in queue. Nothing to stop".to_string(),
            Self::Paused(track) => format!("Paused song '{}'", track.title),
            Self::AlreadyPaused => "Queue is already paused".to_string(),
            Self::NothingToPause => "No song is playing. Nothing to pause".to_string(),
            Self::Resumed(track) => format!("Resumed song '{}'", track.title),
            Self::AlreadyPlaying => "Queue is already playing".to_string(),
            Self::NothingToResume => "No song is playing. Nothing to resume".to_string(),
            Self::Autoplay(true) => "Autoplay is on".to_string(),
            Self::Autoplay(false) => "Autoplay is off".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NowPlayingInfo {
    pub track: Arc<Track>,
    pub frames_sent: u64,
    pub state: SessionState,
}

/// Point-in-time copy of a queue for listings.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub now_playing: Option<NowPlayingInfo>,
    pub pending: Vec<Arc<Track>>,
    pub paused: bool,
    pub autoplay: bool,
}

impl QueueSnapshot {
    pub fn render(&self) -> String {
        if self.now_playing.is_none() && self.pending.is_empty() {
            return "Queue is empty".to_string();
        }

        let mut msg = String::from("**Current Tracks in Queue**\n");
        if let Some(np) = &self.now_playing {
            msg.push_str(&format!(
                "\n**Now Playing**{}\n{}\n",
                if self.paused { " (paused)" } else { "" },
                np.track.summary()
            ));
        }
        if !self.pending.is_empty() {
            msg.push('\n');
            for (idx, track) in self.pending.iter().enumerate() {
                msg.push_str(&format!("{}. {}\n", idx + 1, track.summary()));
            }
        }
        if self.autoplay {
            msg.push_str("\nAutoplay is on\n");
        }
        msg
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Arc<Track>>,
    now_playing: Option<NowPlaying>,
    paused: bool,
    autoplay: bool,
    /// Last track that left the now-playing slot; seeds autoplay.
    last_finished: Option<Arc<Track>>,
    /// Set once the room is torn down; later enqueues are refused.
    closed: bool,
}

impl QueueState {
    fn active(&self) -> Option<&NowPlaying> {
        self.now_playing
            .as_ref()
            .filter(|np| np.status == PlayStatus::Playing)
    }

    fn take_active(&mut self) -> Option<NowPlaying> {
        if self.active().is_some() {
            self.now_playing.take()
        } else {
            None
        }
    }
}

/// Pending tracks plus the now-playing slot of one room.
///
/// The lock is only held for the field updates themselves, never across an
/// await.
#[derive(Debug, Default)]
pub struct RoomQueue {
    state: Mutex<QueueState>,
}

impl RoomQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a track. Returns its 1-based position in the pending list.
    pub fn enqueue_back(&self, track: Arc<Track>) -> Result<usize, RoomError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RoomError::Closed);
        }
        state.pending.push_back(track);
        Ok(state.pending.len())
    }

    /// Puts a track at the head of the pending list.
    pub fn enqueue_front(&self, track: Arc<Track>) -> Result<usize, RoomError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RoomError::Closed);
        }
        state.pending.push_front(track);
        Ok(1)
    }

    pub fn skip(&self) -> ControlOutcome {
        let mut state = self.state.lock();
        match state.take_active() {
            Some(np) => {
                np.session.stop();
                state.paused = false;
                state.last_finished = Some(np.track.clone());
                ControlOutcome::Skipped(np.track)
            }
            None => ControlOutcome::NothingToSkip,
        }
    }

    /// Stops the current track, clears the pending list and turns autoplay off.
    pub fn stop_all(&self) -> ControlOutcome {
        let mut state = self.state.lock();
        let current = state.take_active().map(|np| {
            np.session.stop();
            np.track
        });
        let cleared = state.pending.len();
        state.pending.clear();
        state.autoplay = false;
        state.paused = false;

        if current.is_none() && cleared == 0 {
            return ControlOutcome::NothingToStop;
        }
        if let Some(track) = &current {
            state.last_finished = Some(track.clone());
        }
        ControlOutcome::Stopped { current, cleared }
    }

    pub fn pause(&self) -> ControlOutcome {
        let mut state = self.state.lock();
        let Some(np) = state.active() else {
            return ControlOutcome::NothingToPause;
        };
        if state.paused {
            return ControlOutcome::AlreadyPaused;
        }
        np.session.pause();
        let track = np.track.clone();
        state.paused = true;
        ControlOutcome::Paused(track)
    }

    pub fn resume(&self) -> ControlOutcome {
        let mut state = self.state.lock();
        let Some(np) = state.active() else {
            return ControlOutcome::NothingToResume;
        };
        if !state.paused {
            return ControlOutcome::AlreadyPlaying;
        }
        np.session.resume();
        let track = np.track.clone();
        state.paused = false;
        ControlOutcome::Resumed(track)
    }

    pub fn set_autoplay(&self, on: bool) -> ControlOutcome {
        self.state.lock().autoplay = on;
        ControlOutcome::Autoplay(on)
    }

    /// Turns autoplay off. Returns `true` only if it was on.
    pub fn disable_autoplay(&self) -> bool {
        std::mem::replace(&mut self.state.lock().autoplay, false)
    }

    pub fn autoplay(&self) -> bool {
        self.state.lock().autoplay
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().active().is_some()
    }

    /// Nothing playing, nothing pending and autoplay off.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.active().is_none() && state.pending.is_empty() && !state.autoplay
    }

    pub fn has_pending(&self) -> bool {
        !self.state.lock().pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn pop_next(&self) -> Option<Arc<Track>> {
        self.state.lock().pending.pop_front()
    }

    /// Track related-track lookups start from.
    pub fn autoplay_seed(&self) -> Option<Arc<Track>> {
        let state = self.state.lock();
        state
            .now_playing
            .as_ref()
            .map(|np| np.track.clone())
            .or_else(|| state.last_finished.clone())
    }

    /// Installs a freshly started session in the now-playing slot.
    pub fn begin(&self, session: StreamSession) {
        let mut state = self.state.lock();
        state.paused = false;
        state.now_playing = Some(NowPlaying {
            track: session.track().clone(),
            session,
            status: PlayStatus::Playing,
        });
    }

    /// Marks the session finished if it still owns the slot.
    pub fn finish(&self, id: &StreamId) -> Option<Arc<Track>> {
        let mut state = self.state.lock();
        let np = state
            .now_playing
            .as_mut()
            .filter(|np| np.session.id() == id && np.status == PlayStatus::Playing)?;
        np.status = PlayStatus::Finished;
        let track = np.track.clone();
        state.last_finished = Some(track.clone());
        Some(track)
    }

    /// Stops whatever is playing without touching the pending list.
    pub fn halt(&self) {
        if let Some(np) = self.state.lock().active() {
            np.session.stop();
        }
    }

    /// Closes the queue if it is idle. Enqueues fail afterwards.
    pub fn close_if_idle(&self) -> bool {
        let mut state = self.state.lock();
        let idle = state.active().is_none() && state.pending.is_empty() && !state.autoplay;
        if idle {
            state.closed = true;
        }
        idle
    }

    /// Closes the queue unconditionally, dropping pending tracks.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending.clear();
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock();
        QueueSnapshot {
            now_playing: state.active().map(|np| NowPlayingInfo {
                track: np.track.clone(),
                frames_sent: np.session.frames_sent(),
                state: np.session.state(),
            }),
            pending: state.pending.iter().cloned().collect(),
            paused: state.paused,
            autoplay: state.autoplay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::track;

    fn titles(queue: &RoomQueue) -> Vec<String> {
        queue
            .snapshot()
            .pending
            .iter()
            .map(|t| t.title.clone())
            .collect()
    }

    #[test]
    fn front_and_back_ordering() {
        let queue = RoomQueue::new();
        queue.enqueue_front(track("A")).unwrap();
        queue.enqueue_back(track("B")).unwrap();
        queue.enqueue_front(track("C")).unwrap();
        assert_eq!(titles(&queue), ["C", "A", "B"]);

        let order: Vec<_> = std::iter::from_fn(|| queue.pop_next())
            .map(|t| t.title.clone())
            .collect();
        assert_eq!(order, ["C", "A", "B"]);
    }

    #[test]
    fn idle_controls_report_nothing_to_do() {
        let queue = RoomQueue::new();
        assert!(matches!(queue.skip(), ControlOutcome::NothingToSkip));
        assert!(matches!(queue.stop_all(), ControlOutcome::NothingToStop));
        assert!(matches!(queue.pause(), ControlOutcome::NothingToPause));
        assert!(matches!(queue.resume(), ControlOutcome::NothingToResume));
        assert_eq!(
            queue.skip().message(),
            "No song is playing. Nothing to skip"
        );
    }

    #[test]
    fn skip_stops_and_clears_the_slot() {
        let queue = RoomQueue::new();
        let session = StreamSession::idle(track("A"));
        queue.begin(session.clone());
        assert!(queue.is_playing());

        assert!(matches!(queue.skip(), ControlOutcome::Skipped(t) if t.title == "A"));
        assert!(session.is_stopped());
        assert!(!queue.is_playing());
        assert_eq!(queue.autoplay_seed().unwrap().title, "A");
        assert!(matches!(queue.skip(), ControlOutcome::NothingToSkip));
    }

    #[test]
    fn pause_and_resume_follow_the_slot() {
        let queue = RoomQueue::new();
        let session = StreamSession::idle(track("A"));
        queue.begin(session.clone());

        assert!(matches!(queue.resume(), ControlOutcome::AlreadyPlaying));
        assert!(matches!(queue.pause(), ControlOutcome::Paused(_)));
        assert!(session.is_paused());
        assert!(matches!(queue.pause(), ControlOutcome::AlreadyPaused));
        assert!(matches!(queue.resume(), ControlOutcome::Resumed(_)));
        assert!(!session.is_paused());
    }

    #[test]
    fn finished_slot_counts_as_idle() {
        let queue = RoomQueue::new();
        let session = StreamSession::idle(track("A"));
        queue.begin(session.clone());
        queue.pause();

        assert_eq!(queue.finish(session.id()).unwrap().title, "A");
        assert!(queue.finish(session.id()).is_none());
        assert!(!queue.is_playing());
        assert!(matches!(queue.skip(), ControlOutcome::NothingToSkip));
        assert!(queue.snapshot().now_playing.is_none());

        // The paused flag outlives the track until the next one begins.
        assert!(queue.is_paused());
        queue.begin(StreamSession::idle(track("B")));
        assert!(!queue.is_paused());
    }

    #[test]
    fn stop_all_clears_everything() {
        let queue = RoomQueue::new();
        let session = StreamSession::idle(track("A"));
        queue.begin(session.clone());
        for name in ["B", "C", "D"] {
            queue.enqueue_back(track(name)).unwrap();
        }
        queue.set_autoplay(true);

        match queue.stop_all() {
            ControlOutcome::Stopped { current, cleared } => {
                assert_eq!(current.unwrap().title, "A");
                assert_eq!(cleared, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(session.is_stopped());
        assert!(!queue.autoplay());
        assert!(queue.is_idle());
    }

    #[test]
    fn disable_autoplay_reports_once() {
        let queue = RoomQueue::new();
        queue.set_autoplay(true);
        assert!(queue.disable_autoplay());
        assert!(!queue.disable_autoplay());
    }

    #[test]
    fn closed_queue_refuses_tracks() {
        let queue = RoomQueue::new();
        queue.enqueue_back(track("A")).unwrap();
        assert!(!queue.close_if_idle());
        queue.pop_next();
        assert!(queue.close_if_idle());
        assert!(matches!(
            queue.enqueue_back(track("B")),
            Err(RoomError::Closed)
        ));
        assert!(matches!(
            queue.enqueue_front(track("B")),
            Err(RoomError::Closed)
        ));
    }

    #[test]
    fn snapshot_renders_numbered_listing() {
        let queue = RoomQueue::new();
        assert_eq!(queue.snapshot().render(), "Queue is empty");

        queue.begin(StreamSession::idle(track("A")));
        queue.enqueue_back(track("B")).unwrap();
        let text = queue.snapshot().render();
        assert!(text.contains("**Now Playing**"));
        assert!(text.contains("`A`"));
        assert!(text.contains("1. `0:03` -- `B`"));
    }
}
