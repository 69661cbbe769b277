use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use crate::source::youtube_video_id;

/// A queued or playing piece of audio: the URL the user gave us plus a display title.
///
/// The title is derived from the URL shape the first time it is asked for and
/// cached; a track never changes after construction.
#[derive(Debug, Clone)]
pub struct Track {
    url: String,
    title: OnceLock<String>,
}

impl Track {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim().to_string(),
            title: OnceLock::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Human readable title for the HUD
    pub fn title(&self) -> &str {
        self.title.get_or_init(|| Self::derive_title(&self.url))
    }

    fn derive_title(url: &str) -> String {
        if url.contains("youtube.com") || url.contains("youtu.be") {
            return match youtube_video_id(url) {
                Some(id) => {
                    let short: String = id.chars().take(8).collect();
                    format!("YouTube Video ({}...)", short)
                }
                None => "YouTube Music".to_string(),
            };
        }

        let local_path = match url.strip_prefix("file://") {
            Some(path) => Some(path),
            None if !url.contains("://") && !url.is_empty() => Some(url),
            None => None,
        };

        if let Some(path) = local_path {
            return Path::new(path)
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .unwrap_or_else(|| "Custom Audio".to_string());
        }

        if url.starts_with("http") {
            "Online Audio".to_string()
        } else {
            "Custom Audio".to_string()
        }
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Track {}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.title(), self.url)
    }
}

/// Identifier of one playback session; a new one is minted every time a line is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Output volume as a percentage in `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Volume(f32);

impl Volume {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 100.0;

    /// Clamp an arbitrary value into range. NaN is treated as silence.
    pub fn new(percent: f32) -> Self {
        if percent.is_nan() {
            return Self(Self::MIN);
        }
        Self(percent.clamp(Self::MIN, Self::MAX))
    }

    pub fn percent(&self) -> f32 {
        self.0
    }

    /// Map onto a gain control's decibel range.
    ///
    /// `db = min + (max - min) * log10(volume / 10 + 1)`, clamped to the range
    /// because the curve overshoots `max` slightly near 100%.
    pub fn to_decibels(&self, min_db: f32, max_db: f32) -> f32 {
        let curve = (self.0 / 10.0 + 1.0).log10();
        (min_db + (max_db - min_db) * curve).clamp(min_db, max_db)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(80.0)
    }
}

/// Controller state as exposed to collaborators
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Resolving,
    Playing,
    Paused,
    Stopping,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Resolving => "Resolving",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Stopping => "Stopping",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the HUD receives on every audible transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackNotification {
    pub is_playing: bool,
    pub title: String,
}

impl PlaybackNotification {
    pub fn new(is_playing: bool, title: impl Into<String>) -> Self {
        Self {
            is_playing,
            title: title.into(),
        }
    }
}

/// Point-in-time snapshot of the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub current_url: Option<String>,
    pub current_title: String,
    pub session: Option<SessionId>,
    pub play_count: u32,
    pub volume: f32,
    pub looping: bool,
    pub operator_paused: bool,
    pub queue: Vec<String>,
    pub audio_format: Option<String>,
    /// Playback position within the current track
    pub position: Duration,
}

impl PlayerStatus {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            current_url: None,
            current_title: "No track playing".to_string(),
            session: None,
            play_count: 0,
            volume: Volume::default().percent(),
            looping: false,
            operator_paused: false,
            queue: Vec::new(),
            audio_format: None,
            position: Duration::ZERO,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, PlaybackState::Idle)
    }

    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_watch_title() {
        let track = Track::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42");
        assert_eq!(track.title(), "YouTube Video (dQw4w9Wg...)");
    }

    #[test]
    fn test_youtu_be_title() {
        let track = Track::new("https://youtu.be/abc123XYZ99?si=share");
        assert_eq!(track.title(), "YouTube Video (abc123XY...)");
    }

    #[test]
    fn test_youtube_without_id_title() {
        let track = Track::new("https://www.youtube.com/feed/trending");
        assert_eq!(track.title(), "YouTube Music");
    }

    #[test]
    fn test_local_file_title_strips_extension() {
        let track = Track::new("file:///music/boss fight.wav");
        assert_eq!(track.title(), "boss fight");

        let bare = Track::new("/music/ambient.flac");
        assert_eq!(bare.title(), "ambient");
    }

    #[test]
    fn test_other_titles() {
        assert_eq!(Track::new("https://radio.example.com/stream.mp3").title(), "Online Audio");
        assert_eq!(Track::new("ftp://example.com/a.wav").title(), "Custom Audio");
    }

    #[test]
    fn test_track_equality_by_url() {
        let a = Track::new("file:///a.wav");
        let b = Track::new(" file:///a.wav ");
        assert_eq!(a, b);
        assert_ne!(a, Track::new("file:///b.wav"));
    }

    #[test]
    fn test_volume_clamps() {
        assert_eq!(Volume::new(150.0).percent(), 100.0);
        assert_eq!(Volume::new(-10.0).percent(), 0.0);
        assert_eq!(Volume::new(f32::NAN).percent(), 0.0);
        assert_eq!(Volume::new(42.5).percent(), 42.5);
    }

    #[test]
    fn test_volume_decibel_curve() {
        let (min, max) = (-80.0, 6.0206);

        assert_eq!(Volume::new(0.0).to_decibels(min, max), min);
        // log10(11) > 1, so full volume pins to the top of the range
        assert_eq!(Volume::new(100.0).to_decibels(min, max), max);

        let expected = min + (max - min) * 9.0f32.log10();
        assert!((Volume::new(80.0).to_decibels(min, max) - expected).abs() < 1e-4);

        // Monotonic
        let quiet = Volume::new(20.0).to_decibels(min, max);
        let loud = Volume::new(60.0).to_decibels(min, max);
        assert!(quiet < loud);
    }

    #[test]
    fn test_playback_state_display() {
        assert_eq!(PlaybackState::Idle.to_string(), "Idle");
        assert_eq!(PlaybackState::Paused.as_str(), "Paused");
    }

    #[test]
    fn test_player_status_defaults() {
        let status = PlayerStatus::default();
        assert!(status.is_idle());
        assert!(!status.is_playing());
        assert_eq!(status.queue_size(), 0);
        assert_eq!(status.current_title, "No track playing");
        assert_eq!(status.volume, 80.0);
    }

    #[test]
    fn test_player_status_serializes_to_json() {
        let mut status = PlayerStatus::new();
        status.state = PlaybackState::Playing;
        status.session = Some(SessionId(3));
        status.queue = vec!["file:///b.wav".to_string()];

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"Playing\""));
        assert!(json.contains("file:///b.wav"));

        let back: PlayerStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back.session, Some(SessionId(3)));
    }
}
