//! Playback data model: tracks, status and the observable state snapshot.

use crate::error::PlaybackFailure;
use bridge_traits::{MediaItem, RepeatMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single playable audio item.
///
/// Identity is the `id`; the other fields are display metadata handed over by
/// the content provider and are never modified by the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    pub audio_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        audio_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            audio_url: audio_url.into(),
            image_url: None,
            duration_ms: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Lock-screen metadata for this track.
    pub fn to_media_item(&self) -> MediaItem {
        MediaItem {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            url: self.audio_url.clone(),
            artwork_url: self.image_url.clone(),
            duration: self.duration_ms.map(Duration::from_millis),
        }
    }
}

/// Coarse lifecycle of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Nothing loaded, stopped, or the queue ran out.
    #[default]
    Idle,
    /// A load was issued and the native player has not confirmed it yet.
    Loading,
    /// The native player confirmed the current track.
    Ready,
    /// The native player failed; `current` and `queue` are preserved.
    Error,
}

/// The canonical "now playing" snapshot observed by every screen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub is_playing: bool,
    pub position_ms: u64,
    /// Unknown until the native player or the track metadata reports it.
    pub duration_ms: Option<u64>,
    pub status: PlaybackStatus,
    pub repeat: RepeatMode,
    /// Last failure while `status == Error`.
    pub error: Option<PlaybackFailure>,
}

impl PlaybackState {
    pub fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|track| track.id.as_str())
    }

    /// Index of `current` within `queue`.
    pub fn current_index(&self) -> Option<usize> {
        let id = self.current_id()?;
        self.queue.iter().position(|track| track.id == id)
    }

    /// `current` is either absent or an element of `queue`.
    pub fn is_consistent(&self) -> bool {
        match self.current_id() {
            None => true,
            Some(id) => self.queue.iter().any(|track| track.id == id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_decodes_provider_record() {
        let json = r#"{
            "id": "t1",
            "title": "Ocean Breath",
            "artist": "Calm Lab",
            "audioUrl": "https://cdn.example.com/t1.mp3",
            "imageUrl": "https://cdn.example.com/t1.jpg"
        }"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.id, "t1");
        assert_eq!(track.artist.as_deref(), Some("Calm Lab"));
        assert_eq!(track.duration_ms, None);
    }

    #[test]
    fn media_item_carries_lock_screen_metadata() {
        let item = Track::new("t1", "Ocean Breath", "https://x/t1.mp3")
            .with_image_url("https://x/t1.jpg")
            .with_duration_ms(180_000)
            .to_media_item();
        assert_eq!(item.url, "https://x/t1.mp3");
        assert_eq!(item.artwork_url.as_deref(), Some("https://x/t1.jpg"));
        assert_eq!(item.duration, Some(Duration::from_secs(180)));
    }

    #[test]
    fn default_state_is_idle_and_consistent() {
        let state = PlaybackState::default();
        assert_eq!(state.status, PlaybackStatus::Idle);
        assert!(state.is_consistent());
        assert_eq!(state.current_index(), None);
    }

    #[test]
    fn inconsistent_state_is_detected() {
        let state = PlaybackState {
            current: Some(Track::new("t9", "Lost", "u9")),
            queue: vec![Track::new("t1", "One", "u1")],
            ..Default::default()
        };
        assert!(!state.is_consistent());
        assert_eq!(state.current_index(), None);
    }
}
