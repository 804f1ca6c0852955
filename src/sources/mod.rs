//! Track resolution: turning user queries and locators into [`Track`]s.

pub mod cache;
pub mod local;

pub use cache::SearchCache;
pub use local::LocalResolver;

use async_trait::async_trait;

use crate::{common::errors::ResolveError, tracks::Track};

/// Catalog collaborator used by commands and autoplay.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Up to `limit` catalog matches, best first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ResolveError>;

    /// A single track for a URL or path the user supplied.
    async fn resolve_direct(&self, locator: &str) -> Result<Track, ResolveError>;

    /// Up to `limit` tracks related to the track with `source_id`.
    /// An empty list is a valid answer.
    async fn related_to(&self, source_id: &str, limit: usize)
    -> Result<Vec<Track>, ResolveError>;
}
