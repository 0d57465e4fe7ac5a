//! Event vocabulary shared by the media element, the ad integration and the
//! orchestration engine.
//!
//! Every event has a wire name (`playing`, `adplaying`, `contentended`,
//! `adtimeout` ...). Names are parsed into [`EventType`] once at the boundary
//! and the engine only ever matches on the enum.

use crate::error::AdsError;
use crate::state::AdState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw events emitted by the playback element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaEvent {
    LoadStart,
    Suspend,
    Abort,
    Error,
    Emptied,
    Stalled,
    LoadedMetadata,
    LoadedData,
    CanPlay,
    CanPlayThrough,
    Playing,
    Waiting,
    Seeking,
    Seeked,
    Ended,
    DurationChange,
    TimeUpdate,
    Progress,
    Play,
    Pause,
    RateChange,
    Resize,
    VolumeChange,
    FirstPlay,
    LoadedAllData,
}

impl MediaEvent {
    pub const ALL: [MediaEvent; 25] = [
        MediaEvent::LoadStart,
        MediaEvent::Suspend,
        MediaEvent::Abort,
        MediaEvent::Error,
        MediaEvent::Emptied,
        MediaEvent::Stalled,
        MediaEvent::LoadedMetadata,
        MediaEvent::LoadedData,
        MediaEvent::CanPlay,
        MediaEvent::CanPlayThrough,
        MediaEvent::Playing,
        MediaEvent::Waiting,
        MediaEvent::Seeking,
        MediaEvent::Seeked,
        MediaEvent::Ended,
        MediaEvent::DurationChange,
        MediaEvent::TimeUpdate,
        MediaEvent::Progress,
        MediaEvent::Play,
        MediaEvent::Pause,
        MediaEvent::RateChange,
        MediaEvent::Resize,
        MediaEvent::VolumeChange,
        MediaEvent::FirstPlay,
        MediaEvent::LoadedAllData,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MediaEvent::LoadStart => "loadstart",
            MediaEvent::Suspend => "suspend",
            MediaEvent::Abort => "abort",
            MediaEvent::Error => "error",
            MediaEvent::Emptied => "emptied",
            MediaEvent::Stalled => "stalled",
            MediaEvent::LoadedMetadata => "loadedmetadata",
            MediaEvent::LoadedData => "loadeddata",
            MediaEvent::CanPlay => "canplay",
            MediaEvent::CanPlayThrough => "canplaythrough",
            MediaEvent::Playing => "playing",
            MediaEvent::Waiting => "waiting",
            MediaEvent::Seeking => "seeking",
            MediaEvent::Seeked => "seeked",
            MediaEvent::Ended => "ended",
            MediaEvent::DurationChange => "durationchange",
            MediaEvent::TimeUpdate => "timeupdate",
            MediaEvent::Progress => "progress",
            MediaEvent::Play => "play",
            MediaEvent::Pause => "pause",
            MediaEvent::RateChange => "ratechange",
            MediaEvent::Resize => "resize",
            MediaEvent::VolumeChange => "volumechange",
            MediaEvent::FirstPlay => "firstplay",
            MediaEvent::LoadedAllData => "loadedalldata",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        MediaEvent::ALL.iter().copied().find(|e| e.name() == name)
    }
}

/// Events signalled by the ad integration or synthesized by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdsEvent {
    AdsReady,
    AdStart,
    AdEnd,
    AdSkip,
    AdsError,
    AdsCanceled,
    NoPreroll,
    NoPostroll,
    AdTimeout,
    ReadyForPreroll,
    ContentPlayback,
    ContentUpdate,
    ContentResumed,
    AdsAdStarted,
}

impl AdsEvent {
    pub const ALL: [AdsEvent; 14] = [
        AdsEvent::AdsReady,
        AdsEvent::AdStart,
        AdsEvent::AdEnd,
        AdsEvent::AdSkip,
        AdsEvent::AdsError,
        AdsEvent::AdsCanceled,
        AdsEvent::NoPreroll,
        AdsEvent::NoPostroll,
        AdsEvent::AdTimeout,
        AdsEvent::ReadyForPreroll,
        AdsEvent::ContentPlayback,
        AdsEvent::ContentUpdate,
        AdsEvent::ContentResumed,
        AdsEvent::AdsAdStarted,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AdsEvent::AdsReady => "adsready",
            AdsEvent::AdStart => "adstart",
            AdsEvent::AdEnd => "adend",
            AdsEvent::AdSkip => "adskip",
            AdsEvent::AdsError => "adserror",
            AdsEvent::AdsCanceled => "adscanceled",
            AdsEvent::NoPreroll => "nopreroll",
            AdsEvent::NoPostroll => "nopostroll",
            AdsEvent::AdTimeout => "adtimeout",
            AdsEvent::ReadyForPreroll => "readyforpreroll",
            AdsEvent::ContentPlayback => "contentplayback",
            AdsEvent::ContentUpdate => "contentupdate",
            AdsEvent::ContentResumed => "contentresumed",
            AdsEvent::AdsAdStarted => "ads-ad-started",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        AdsEvent::ALL.iter().copied().find(|e| e.name() == name)
    }
}

/// Namespace prepended to a media event when it is redispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Prefix {
    Ad,
    Content,
}

impl Prefix {
    pub fn as_str(self) -> &'static str {
        match self {
            Prefix::Ad => "ad",
            Prefix::Content => "content",
        }
    }
}

/// The type tag of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EventType {
    Media(MediaEvent),
    Prefixed(Prefix, MediaEvent),
    Ads(AdsEvent),
    FullscreenChange,
}

impl EventType {
    pub const PLAY: EventType = EventType::Media(MediaEvent::Play);
    pub const PLAYING: EventType = EventType::Media(MediaEvent::Playing);
    pub const ENDED: EventType = EventType::Media(MediaEvent::Ended);

    /// The raw media event, if this is one.
    pub fn as_media(self) -> Option<MediaEvent> {
        match self {
            EventType::Media(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_media(self, event: MediaEvent) -> bool {
        self == EventType::Media(event)
    }

    pub fn is_ads(self, event: AdsEvent) -> bool {
        self == EventType::Ads(event)
    }

    pub fn is_prefixed(self, prefix: Prefix, event: MediaEvent) -> bool {
        self == EventType::Prefixed(prefix, event)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Media(m) => write!(f, "{}", m.name()),
            EventType::Prefixed(p, m) => write!(f, "{}{}", p.as_str(), m.name()),
            EventType::Ads(a) => write!(f, "{}", a.name()),
            EventType::FullscreenChange => write!(f, "fullscreenchange"),
        }
    }
}

impl FromStr for EventType {
    type Err = AdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Integration names win over prefix parsing: `adend` is not `ad` + `end`.
        if let Some(a) = AdsEvent::from_name(s) {
            return Ok(EventType::Ads(a));
        }
        if let Some(m) = MediaEvent::from_name(s) {
            return Ok(EventType::Media(m));
        }
        if s == "fullscreenchange" {
            return Ok(EventType::FullscreenChange);
        }
        for prefix in [Prefix::Content, Prefix::Ad] {
            if let Some(rest) = s.strip_prefix(prefix.as_str()) {
                if let Some(m) = MediaEvent::from_name(rest) {
                    return Ok(EventType::Prefixed(prefix, m));
                }
            }
        }
        Err(AdsError::UnknownEvent(s.to_string()))
    }
}

impl TryFrom<String> for EventType {
    type Error = AdsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.to_string()
    }
}

/// Metadata attached to an event.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EventPayload {
    #[default]
    None,
    /// A renamed event: the renamer's state and the consumed original.
    Redispatched { state: AdState, original: Box<Event> },
    ContentUpdate {
        old_value: String,
        new_value: String,
    },
    /// Compatibility notification carrying the event that entered content playback.
    ContentPlayback { trigger_event: Option<EventType> },
}

impl EventPayload {
    pub fn is_none(&self) -> bool {
        matches!(self, EventPayload::None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventType,
    #[serde(skip_serializing_if = "EventPayload::is_none")]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(kind: EventType) -> Self {
        Event {
            kind,
            payload: EventPayload::None,
        }
    }

    pub fn redispatched(prefix: Prefix, state: AdState, original: Event) -> Option<Self> {
        let media = original.kind.as_media()?;
        Some(Event {
            kind: EventType::Prefixed(prefix, media),
            payload: EventPayload::Redispatched {
                state,
                original: Box::new(original),
            },
        })
    }

    pub fn content_update(old_value: String, new_value: String) -> Self {
        Event {
            kind: EventType::Ads(AdsEvent::ContentUpdate),
            payload: EventPayload::ContentUpdate {
                old_value,
                new_value,
            },
        }
    }

    pub fn content_playback(trigger_event: Option<EventType>) -> Self {
        Event {
            kind: EventType::Ads(AdsEvent::ContentPlayback),
            payload: EventPayload::ContentPlayback { trigger_event },
        }
    }

    /// The consumed original of a renamed event.
    pub fn original(&self) -> Option<&Event> {
        match &self.payload {
            EventPayload::Redispatched { original, .. } => Some(original),
            _ => None,
        }
    }
}

impl From<EventType> for Event {
    fn from(kind: EventType) -> Self {
        Event::new(kind)
    }
}

impl From<MediaEvent> for Event {
    fn from(m: MediaEvent) -> Self {
        Event::new(EventType::Media(m))
    }
}

impl From<AdsEvent> for Event {
    fn from(a: AdsEvent) -> Self {
        Event::new(EventType::Ads(a))
    }
}
