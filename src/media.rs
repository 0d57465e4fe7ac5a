//! The content tech seen through a narrow trait.
//!
//! Everything the engine needs from the playback element and its surrounding
//! player chrome is expressed here. Hosts implement [`MediaElement`] over
//! their real player; [`crate::sim::SimulatedMedia`] implements it in memory.

use crate::error::MediaError;
use serde::{Deserialize, Serialize};

/// Display mode of a text track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackMode {
    Disabled,
    Hidden,
    Showing,
}

/// Which track list a track belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackList {
    /// Tracks added by the integrator (`<track>` elements, sidecar files).
    Remote,
    /// Every track the element knows about, in-band ones included.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTrack {
    pub id: TrackId,
    /// `metadata`, `captions`, `subtitles` ...
    pub kind: String,
    pub mode: TrackMode,
}

impl TextTrack {
    pub fn new(id: u32, kind: &str, mode: TrackMode) -> Self {
        TextTrack {
            id: TrackId(id),
            kind: kind.to_string(),
            mode,
        }
    }

    pub fn is_metadata(&self) -> bool {
        self.kind == "metadata"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

/// A source to load into the element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    pub src: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

/// Presentation flags toggled on the player container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerClass {
    AdLoading,
    AdPlaying,
    Live,
    HasStarted,
    Fullscreen,
}

impl PlayerClass {
    pub fn css_name(self) -> &'static str {
        match self {
            PlayerClass::AdLoading => "vjs-ad-loading",
            PlayerClass::AdPlaying => "vjs-ad-playing",
            PlayerClass::Live => "vjs-live",
            PlayerClass::HasStarted => "vjs-has-started",
            PlayerClass::Fullscreen => "vjs-fullscreen",
        }
    }
}

pub trait MediaElement {
    // --- playback ---

    fn paused(&self) -> bool;
    fn ended(&self) -> bool;
    fn play(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self);
    fn current_time(&self) -> f64;
    fn seek(&mut self, time: f64) -> Result<(), MediaError>;
    /// `f64::INFINITY` for live streams.
    fn duration(&self) -> f64;
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);

    // --- source ---

    /// The `src` attribute as last assigned.
    fn src(&self) -> String;
    /// The source the element is actually rendering.
    fn current_src(&self) -> String;
    fn current_type(&self) -> String;
    fn set_source(&mut self, source: MediaSource);
    fn load(&mut self);

    // --- readiness ---

    fn ready_state(&self) -> u8;
    /// `None` when the element does not expose seekable ranges at all.
    fn seekable(&self) -> Option<Vec<TimeRange>>;

    // --- text tracks ---

    fn text_tracks(&self, list: TrackList) -> Vec<TextTrack>;
    fn set_track_mode(&mut self, list: TrackList, id: TrackId, mode: TrackMode);

    // --- tech element attributes ---

    fn poster(&self) -> Option<String>;
    fn set_poster(&mut self, poster: &str);
    fn remove_poster(&mut self);
    fn style(&self) -> Option<String>;
    fn set_style(&mut self, style: &str);

    // --- player chrome ---

    fn has_class(&self, class: PlayerClass) -> bool;
    fn add_class(&mut self, class: PlayerClass);
    fn remove_class(&mut self, class: PlayerClass);
    fn plays_inline(&self) -> bool;
    fn dimensions(&self) -> (u32, u32);
    /// Hide the player and put a black placeholder of the given size in its place.
    fn show_placeholder(&mut self, width: u32, height: u32);
    /// Remove the placeholder and unhide the player. No-op if none is shown.
    fn remove_placeholder(&mut self);
}

/// True for live streams, including the iOS 8 report of zero duration.
pub fn is_live<M: MediaElement + ?Sized>(media: &M, platform: &crate::config::Platform) -> bool {
    let duration = media.duration();
    if duration.is_infinite() {
        return true;
    }
    platform.is_ios_version("8") && duration == 0.0
}

/// Content keeps playing muted behind ads only for live streams on
/// platforms that can play two things at once.
pub fn should_play_content_behind_ad<M: MediaElement + ?Sized>(
    media: &M,
    platform: &crate::config::Platform,
) -> bool {
    !platform.ios && !platform.android && media.duration().is_infinite()
}
