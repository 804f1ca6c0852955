//! In-memory collaborators shared by the unit tests.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{
    audio::{
        DecodeSource, EncoderFactory, FrameEncoder, SourceOpener,
        constants::{FRAME_BYTES, FRAME_SAMPLES},
    },
    common::{
        errors::{AnnounceError, ResolveError, RoomError, SessionError, SinkError},
        types::{ChannelId, RoomId},
    },
    configs::PlayerConfig,
    notify::Announcer,
    player::{Pipeline, SessionOutcome},
    room::RoomRegistry,
    sources::TrackResolver,
    tracks::{Track, TrackOrigin},
    voice::{VoiceConnector, VoiceSink},
};

pub const BLOCKS_PER_TRACK: usize = 25;

const TIMEOUT: Duration = Duration::from_secs(5);

pub fn room() -> RoomId {
    RoomId::from("room")
}

pub fn plain_track(name: &str) -> Track {
    Track {
        locator: format!("mem://{}", name),
        title: name.to_string(),
        duration: Duration::from_secs(3),
        requester: None,
        channel_id: "test".to_string(),
        channel_name: "Test".to_string(),
        source_id: name.to_string(),
        origin: TrackOrigin::Catalog,
    }
}

pub fn track(name: &str) -> Arc<Track> {
    Arc::new(plain_track(name))
}

/// `n` PCM blocks whose bytes encode their index, so reordering shows up.
pub fn numbered_blocks(n: usize) -> Vec<Vec<u8>> {
    (0..n)
        .map(|i| {
            (0..FRAME_BYTES)
                .map(|j| ((i * 31 + j) % 251) as u8)
                .collect()
        })
        .collect()
}

pub async fn wait(done: oneshot::Receiver<SessionOutcome>) -> SessionOutcome {
    tokio::time::timeout(TIMEOUT, done)
        .await
        .expect("session did not complete in time")
        .expect("session dropped its completion")
}

pub async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub fn test_settings() -> PlayerConfig {
    PlayerConfig {
        tick_interval_ms: 10,
        pause_poll_ms: 5,
        handoff_capacity: 2,
        ..PlayerConfig::default()
    }
}

pub fn test_pipeline(opener: Arc<dyn SourceOpener>, encoders: Arc<dyn EncoderFactory>) -> Pipeline {
    Pipeline::new(opener, encoders, &test_settings())
}

// ── Decode source ────────────────────────────────────────────────────────────

#[derive(Default)]
struct OpenerState {
    opened: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    killed: Arc<AtomicBool>,
    kills: Arc<AtomicUsize>,
    kill_delay: Arc<Mutex<Option<Duration>>>,
}

/// Serves the same PCM bytes for every locator.
#[derive(Clone)]
pub struct MemoryOpener {
    data: Arc<Vec<u8>>,
    fail_after: Option<usize>,
    fail_open: bool,
    state: Arc<OpenerState>,
}

impl MemoryOpener {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
            fail_after: None,
            fail_open: false,
            state: Arc::default(),
        }
    }

    /// Reads fail once `blocks` full blocks were returned.
    pub fn fail_after(mut self, blocks: usize) -> Self {
        self.fail_after = Some(blocks);
        self
    }

    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn fail_locator(&self, locator: &str) {
        self.state.failing.lock().insert(locator.to_string());
    }

    pub fn killed_flag(&self) -> Arc<AtomicBool> {
        self.state.killed.clone()
    }

    /// Makes every later `kill` take `delay` before it reports.
    pub fn slow_kill(&self, delay: Duration) {
        *self.state.kill_delay.lock() = Some(delay);
    }

    pub fn kills(&self) -> usize {
        self.state.kills.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.opened.lock().clone()
    }
}

impl SourceOpener for MemoryOpener {
    fn open(&self, track: &Track) -> Result<Box<dyn DecodeSource>, SessionError> {
        if self.fail_open || self.state.failing.lock().contains(&track.locator) {
            return Err(SessionError::Pipe);
        }
        self.state.opened.lock().push(track.locator.clone());
        Ok(Box::new(MemorySource {
            data: self.data.clone(),
            pos: 0,
            blocks_read: 0,
            fail_after: self.fail_after,
            reaped: false,
            killed: self.state.killed.clone(),
            kills: self.state.kills.clone(),
            kill_delay: self.state.kill_delay.clone(),
        }))
    }
}

struct MemorySource {
    data: Arc<Vec<u8>>,
    pos: usize,
    blocks_read: usize,
    fail_after: Option<usize>,
    reaped: bool,
    killed: Arc<AtomicBool>,
    kills: Arc<AtomicUsize>,
    kill_delay: Arc<Mutex<Option<Duration>>>,
}

#[async_trait]
impl DecodeSource for MemorySource {
    async fn read_block(&mut self, buf: &mut [u8]) -> std::io::Result<bool> {
        tokio::task::yield_now().await;
        if self.fail_after.is_some_and(|n| self.blocks_read >= n) {
            return Err(std::io::Error::other("decoder crashed"));
        }

        let remaining = self.data.len() - self.pos;
        if remaining < buf.len() {
            self.pos = self.data.len();
            return Ok(false);
        }
        buf.copy_from_slice(&self.data[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        self.blocks_read += 1;
        Ok(true)
    }

    async fn kill(&mut self) {
        if !self.reaped {
            self.reaped = true;
            let delay = *self.kill_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.killed.store(true, Ordering::SeqCst);
            self.kills.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ── Encoders ─────────────────────────────────────────────────────────────────

/// Emits the PCM samples back as little-endian bytes.
pub struct RawEncoder;

impl FrameEncoder for RawEncoder {
    fn encode(&mut self, pcm: &[i16]) -> Result<Bytes, SessionError> {
        assert_eq!(pcm.len(), FRAME_SAMPLES);
        Ok(pcm.iter().flat_map(|s| s.to_le_bytes()).collect())
    }
}

pub struct RawEncoderFactory;

impl EncoderFactory for RawEncoderFactory {
    fn create(&self) -> Result<Box<dyn FrameEncoder>, SessionError> {
        Ok(Box::new(RawEncoder))
    }
}

pub struct FailingEncoder;

impl FrameEncoder for FailingEncoder {
    fn encode(&mut self, _pcm: &[i16]) -> Result<Bytes, SessionError> {
        Err(SessionError::Encode("bad frame".to_string()))
    }
}

pub struct FailingEncoderFactory;

impl EncoderFactory for FailingEncoderFactory {
    fn create(&self) -> Result<Box<dyn FrameEncoder>, SessionError> {
        Ok(Box::new(FailingEncoder))
    }
}

// ── Voice ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<Vec<u8>>>,
    delay: Option<Duration>,
    not_ready: AtomicBool,
    released: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn set_ready(&self, ready: bool) {
        self.not_ready.store(!ready, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().clone()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceSink for RecordingSink {
    fn is_ready(&self) -> bool {
        !self.not_ready.load(Ordering::SeqCst)
    }

    async fn send_frame(&self, frame: Bytes) -> Result<(), SinkError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.frames.lock().push(frame.to_vec());
        Ok(())
    }

    async fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.set_ready(false);
    }
}

/// Hands out a fresh [`RecordingSink`] per join.
#[derive(Default)]
pub struct FakeConnector {
    delay: Option<Duration>,
    fail: AtomicBool,
    sinks: Mutex<Vec<Arc<RecordingSink>>>,
}

impl FakeConnector {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_joins(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sinks(&self) -> Vec<Arc<RecordingSink>> {
        self.sinks.lock().clone()
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn join(
        &self,
        _room: &RoomId,
        channel: &ChannelId,
    ) -> Result<Arc<dyn VoiceSink>, RoomError> {
        tokio::task::yield_now().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(RoomError::VoiceJoin {
                channel: channel.clone(),
                reason: "no permission".to_string(),
            });
        }
        let sink = match self.delay {
            Some(delay) => RecordingSink::with_delay(delay),
            None => RecordingSink::new(),
        };
        self.sinks.lock().push(sink.clone());
        Ok(sink)
    }
}

// ── Announcer / resolver ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingAnnouncer {
    messages: Mutex<Vec<String>>,
}

impl RecordingAnnouncer {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn notify(&self, _room: &RoomId, text: &str) -> Result<(), AnnounceError> {
        self.messages.lock().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct StubResolver {
    search: Vec<Track>,
    related: Vec<Track>,
    related_fails: bool,
}

impl StubResolver {
    pub fn with_search(mut self, tracks: Vec<Track>) -> Self {
        self.search = tracks;
        self
    }

    pub fn with_related(mut self, tracks: Vec<Track>) -> Self {
        self.related = tracks;
        self
    }

    pub fn failing_related(mut self) -> Self {
        self.related_fails = true;
        self
    }
}

#[async_trait]
impl TrackResolver for StubResolver {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ResolveError> {
        let hits: Vec<Track> = self
            .search
            .iter()
            .filter(|t| t.title.to_lowercase().contains(&query.to_lowercase()))
            .take(limit)
            .cloned()
            .collect();
        if hits.is_empty() {
            return Err(ResolveError::NotFound(query.to_string()));
        }
        Ok(hits)
    }

    async fn resolve_direct(&self, locator: &str) -> Result<Track, ResolveError> {
        let name = locator
            .strip_prefix("mem://")
            .ok_or_else(|| ResolveError::InvalidLocator(locator.to_string()))?;
        let mut track = plain_track(name);
        track.origin = TrackOrigin::Direct;
        Ok(track)
    }

    async fn related_to(
        &self,
        _source_id: &str,
        limit: usize,
    ) -> Result<Vec<Track>, ResolveError> {
        if self.related_fails {
            return Err(ResolveError::Backend("quota exceeded".to_string()));
        }
        Ok(self.related.iter().take(limit).cloned().collect())
    }
}

// ── Room harness ─────────────────────────────────────────────────────────────

pub struct Harness {
    pub registry: RoomRegistry,
    pub opener: MemoryOpener,
    pub connector: Arc<FakeConnector>,
    pub announcer: Arc<RecordingAnnouncer>,
}

impl Harness {
    /// Tracks of [`BLOCKS_PER_TRACK`] frames at 2 ms each.
    pub fn new(resolver: StubResolver) -> Self {
        Self::build(resolver, BLOCKS_PER_TRACK, Duration::from_millis(2))
    }

    /// Tracks long enough that tests must stop them.
    pub fn slow(resolver: StubResolver) -> Self {
        Self::build(resolver, 2000, Duration::from_millis(5))
    }

    fn build(resolver: StubResolver, blocks: usize, frame_delay: Duration) -> Self {
        let opener = MemoryOpener::new(numbered_blocks(blocks).concat());
        let connector = Arc::new(FakeConnector::new(frame_delay));
        let announcer = Arc::new(RecordingAnnouncer::default());
        let registry = RoomRegistry::new(
            connector.clone(),
            Arc::new(resolver),
            announcer.clone(),
            test_pipeline(Arc::new(opener.clone()), Arc::new(RawEncoderFactory)),
            test_settings(),
        );
        Self {
            registry,
            opener,
            connector,
            announcer,
        }
    }

    /// Sink of the first room created.
    pub fn sink(&self) -> Arc<RecordingSink> {
        self.connector.sinks()[0].clone()
    }
}
