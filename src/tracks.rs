//! The immutable playable item passed between resolver, queue and session.

use std::time::Duration;

use serde::Serialize;

use crate::common::types::UserId;

/// Where a track came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackOrigin {
    /// Resolved from a locator the user supplied.
    Direct,
    /// Picked from catalog search or related-track results.
    Catalog,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// URL or path handed to the decoder.
    pub locator: String,
    pub title: String,
    pub duration: Duration,
    pub requester: Option<UserId>,
    pub channel_id: String,
    pub channel_name: String,
    /// Catalog id; the seed for related-track lookups.
    pub source_id: String,
    pub origin: TrackOrigin,
}

impl Track {
    /// Returns a copy stamped with the requesting user.
    pub fn requested_by(mut self, user: UserId) -> Self {
        self.requester = Some(user);
        self
    }

    pub fn requester_name(&self) -> &str {
        self.requester.as_deref().unwrap_or("autoplay")
    }

    /// `m:ss`, or `h:mm:ss` for tracks an hour or longer.
    pub fn duration_display(&self) -> String {
        format_duration(self.duration)
    }

    /// One line used in queue listings and enqueue replies.
    pub fn summary(&self) -> String {
        format!(
            "`{}` -- `{}` | `{}` | Requested by -- `{}`",
            self.duration_display(),
            self.title,
            self.channel_name,
            self.requester_name()
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_render_like_a_player() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
        assert_eq!(format_duration(Duration::from_secs(205)), "3:25");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn summary_names_requester() {
        let track = Track {
            locator: "/music/a.mp3".into(),
            title: "Song A".into(),
            duration: Duration::from_secs(61),
            requester: None,
            channel_id: "albums".into(),
            channel_name: "Albums".into(),
            source_id: "a".into(),
            origin: TrackOrigin::Catalog,
        };
        assert!(track.summary().ends_with("Requested by -- `autoplay`"));

        let track = track.requested_by(UserId::from("arsh"));
        assert_eq!(
            track.summary(),
            "`1:01` -- `Song A` | `Albums` | Requested by -- `arsh`"
        );
    }
}
