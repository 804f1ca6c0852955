use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use symphonia::core::{
    codecs::CODEC_TYPE_NULL,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::{MetadataOptions, MetadataRevision, StandardTagKey},
    probe::Hint,
};
use tracing::{debug, warn};

use super::TrackResolver;
use crate::{
    common::{errors::ResolveError, types::AnyResult},
    configs::LibraryConfig,
    tracks::{Track, TrackOrigin},
};

/// Resolves tracks from a directory of audio files.
///
/// Search matches every query word against the path relative to the library
/// root; related tracks are other files in the same directory.
#[derive(Debug, Clone)]
pub struct LocalResolver {
    root: PathBuf,
    extensions: Vec<String>,
}

#[derive(Debug, Default)]
struct Probed {
    title: String,
    artist: String,
    duration: Duration,
}

impl LocalResolver {
    pub fn new(config: &LibraryConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root),
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    fn is_audio(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    fn scan(&self, dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.scan(&path, out)?;
            } else if self.is_audio(&path) {
                out.push(path);
            }
        }
        Ok(())
    }

    fn search_blocking(&self, query: &str, limit: usize) -> Result<Vec<Track>, ResolveError> {
        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        if words.is_empty() {
            return Err(ResolveError::NotFound(query.to_string()));
        }

        let mut files = Vec::new();
        self.scan(&self.root, &mut files)?;
        files.sort();

        let tracks: Vec<Track> = files
            .into_iter()
            .filter(|path| {
                let rel = path
                    .strip_prefix(&self.root)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .to_lowercase();
                words.iter().all(|w| rel.contains(w.as_str()))
            })
            .take(limit)
            .map(|path| self.track_for(&path, TrackOrigin::Catalog))
            .collect();

        if tracks.is_empty() {
            return Err(ResolveError::NotFound(query.to_string()));
        }
        Ok(tracks)
    }

    fn related_blocking(&self, source_id: &str, limit: usize) -> Result<Vec<Track>, ResolveError> {
        let seed = Path::new(source_id);
        let dir = seed
            .parent()
            .ok_or_else(|| ResolveError::InvalidLocator(source_id.to_string()))?;

        let mut siblings: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && self.is_audio(path) && path != seed)
            .collect();
        siblings.shuffle(&mut rand::thread_rng());

        Ok(siblings
            .into_iter()
            .take(limit)
            .map(|path| self.track_for(&path, TrackOrigin::Catalog))
            .collect())
    }

    fn track_for(&self, path: &Path, origin: TrackOrigin) -> Track {
        let probed = probe_file(path).unwrap_or_else(|e| {
            debug!("Local source: failed to probe '{}': {}", path.display(), e);
            Probed::default()
        });

        let title = if probed.title.is_empty() {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
                .to_string()
        } else {
            probed.title
        };

        let dir = path.parent().unwrap_or(&self.root);
        let channel_id = dir
            .strip_prefix(&self.root)
            .unwrap_or(dir)
            .to_string_lossy()
            .to_string();
        let channel_name = if probed.artist.is_empty() {
            dir.file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("Library")
                .to_string()
        } else {
            probed.artist
        };

        let locator = path.to_string_lossy().to_string();
        Track {
            source_id: locator.clone(),
            locator,
            title,
            duration: probed.duration,
            requester: None,
            channel_id,
            channel_name,
            origin,
        }
    }
}

fn read_tags(revision: &MetadataRevision, probed: &mut Probed) {
    for tag in revision.tags() {
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) if probed.title.is_empty() => {
                probed.title = tag.value.to_string()
            }
            Some(StandardTagKey::Artist) | Some(StandardTagKey::AlbumArtist)
                if probed.artist.is_empty() =>
            {
                probed.artist = tag.value.to_string()
            }
            _ => {}
        }
    }
}

fn probe_file(path: &Path) -> AnyResult<Probed> {
    let file = std::fs::File::open(path)?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(&ext.to_lowercase());
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut info = Probed::default();

    // ID3 and similar containers surface tags on the probe, not the reader.
    if let Some(revision) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
        read_tags(revision, &mut info);
    }

    let mut format = probed.format;
    if let Some(revision) = format.metadata().current() {
        read_tags(revision, &mut info);
    }

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or("no audio track found")?;

    if let (Some(n_frames), Some(rate)) = (track.codec_params.n_frames, track.codec_params.sample_rate)
    {
        if rate > 0 {
            info.duration = Duration::from_millis(n_frames * 1000 / rate as u64);
        }
    }

    Ok(info)
}

fn web_track(url: &str) -> Track {
    let name = url
        .split(|c: char| c == '?' || c == '#')
        .next()
        .and_then(|u| u.trim_end_matches('/').rsplit('/').next())
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or(url);

    Track {
        locator: url.to_string(),
        title: name.to_string(),
        duration: Duration::ZERO,
        requester: None,
        channel_id: "web".to_string(),
        channel_name: "Web".to_string(),
        source_id: url.to_string(),
        origin: TrackOrigin::Direct,
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ResolveError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ResolveError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        warn!("Local source: task join error: {}", e);
        ResolveError::Backend(e.to_string())
    })?
}

#[async_trait]
impl TrackResolver for LocalResolver {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ResolveError> {
        let this = self.clone();
        let query = query.to_string();
        blocking(move || this.search_blocking(&query, limit)).await
    }

    async fn resolve_direct(&self, locator: &str) -> Result<Track, ResolveError> {
        let locator = locator.trim();
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return Ok(web_track(locator));
        }

        let path = PathBuf::from(locator.strip_prefix("file://").unwrap_or(locator));
        if !path.is_file() {
            return Err(ResolveError::InvalidLocator(locator.to_string()));
        }

        debug!("Local source probing file: {}", path.display());
        let this = self.clone();
        blocking(move || Ok(this.track_for(&path, TrackOrigin::Direct))).await
    }

    async fn related_to(
        &self,
        source_id: &str,
        limit: usize,
    ) -> Result<Vec<Track>, ResolveError> {
        if source_id.starts_with("http://") || source_id.starts_with("https://") {
            return Ok(Vec::new());
        }
        let this = self.clone();
        let source_id = source_id.to_string();
        blocking(move || this.related_blocking(&source_id, limit)).await
    }
}
