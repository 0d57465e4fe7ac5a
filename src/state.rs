//! Orchestration states and the transition table.
//!
//! [`decide`] is a pure function of `(state, event type, conditions)`. The
//! session applies the returned effects and then, if the destination differs,
//! runs the exit and entry actions.

use crate::error::AdsError;
use crate::event::{AdsEvent, EventType, MediaEvent, Prefix};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AdState {
    /// A source is set; nothing has been requested yet.
    ContentSet,
    /// The integration reported `adsready` before play was requested.
    AdsReady,
    /// Play was requested; waiting for `adsready`. Wire name `ads-ready?`.
    AwaitingAdsReady,
    /// Preroll opportunity signalled; waiting for `adstart`. Wire name `preroll?`.
    AwaitingPreroll,
    AdPlayback,
    ContentResuming,
    /// Content ended; waiting for a postroll. Wire name `postroll?`.
    AwaitingPostroll,
    ContentPlayback,
}

impl AdState {
    pub const ALL: [AdState; 8] = [
        AdState::ContentSet,
        AdState::AdsReady,
        AdState::AwaitingAdsReady,
        AdState::AwaitingPreroll,
        AdState::AdPlayback,
        AdState::ContentResuming,
        AdState::AwaitingPostroll,
        AdState::ContentPlayback,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AdState::ContentSet => "content-set",
            AdState::AdsReady => "ads-ready",
            AdState::AwaitingAdsReady => "ads-ready?",
            AdState::AwaitingPreroll => "preroll?",
            AdState::AdPlayback => "ad-playback",
            AdState::ContentResuming => "content-resuming",
            AdState::AwaitingPostroll => "postroll?",
            AdState::ContentPlayback => "content-playback",
        }
    }
}

impl fmt::Display for AdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AdState {
    type Err = AdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdState::ALL
            .iter()
            .copied()
            .find(|state| state.name() == s)
            .ok_or_else(|| AdsError::UnknownState(s.to_string()))
    }
}

impl TryFrom<String> for AdState {
    type Error = AdsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AdState> for String {
    fn from(value: AdState) -> Self {
        value.name().to_string()
    }
}

/// Session facts a handler is allowed to look at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Conditions {
    pub paused: bool,
    pub content_has_ended: bool,
    pub play_content_behind_ad: bool,
}

/// Side effects a handler requests, applied in order before the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Defer-pause the element while the ad decision is pending.
    CancelContentPlay,
    /// Strip the element's poster so it does not flash between sources.
    RemoveNativePoster,
    EmitReadyForPreroll,
    /// Queue `adend` so listeners see a consistent close of the break.
    TriggerAdEnd,
    /// Queue `ended` one tick later.
    DeferEnded,
    MarkContentEnded,
}

/// Result of a handler: an optional destination and the effects to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub next: Option<AdState>,
    pub effects: Vec<Effect>,
}

impl Decision {
    fn to(next: AdState) -> Self {
        Decision {
            next: Some(next),
            effects: Vec::new(),
        }
    }

    fn to_with(next: AdState, effects: Vec<Effect>) -> Self {
        Decision {
            next: Some(next),
            effects,
        }
    }

    fn stay(effects: Vec<Effect>) -> Self {
        Decision {
            next: None,
            effects,
        }
    }
}

/// Look up the handler for `event` in `state`.
///
/// `None` means the state has no handler for this event type and the event
/// is ignored.
pub fn decide(state: AdState, event: EventType, cond: &Conditions) -> Option<Decision> {
    use AdState::*;
    use AdsEvent as A;
    use EventType::{Ads, Media, Prefixed};

    let decision = match (state, event) {
        (ContentSet, Media(MediaEvent::Play)) => Decision::to_with(
            AwaitingAdsReady,
            vec![Effect::CancelContentPlay, Effect::RemoveNativePoster],
        ),
        (ContentSet, Ads(A::AdsReady)) => Decision::to(AdsReady),
        (ContentSet, Ads(A::AdsCanceled | A::AdsError | A::AdSkip)) => Decision::to(ContentPlayback),

        (AdsReady, Media(MediaEvent::Play)) => {
            Decision::to_with(AwaitingPreroll, vec![Effect::CancelContentPlay])
        }
        (AdsReady, Ads(A::AdSkip | A::AdsError)) => Decision::to(ContentPlayback),

        (AwaitingAdsReady, Media(MediaEvent::Play)) => {
            Decision::stay(vec![Effect::CancelContentPlay])
        }
        (AwaitingAdsReady, Ads(A::AdsReady)) => Decision::to(AwaitingPreroll),
        (AwaitingAdsReady, Ads(A::AdsCanceled | A::AdSkip | A::AdTimeout | A::AdsError)) => {
            Decision::to(ContentPlayback)
        }

        (AwaitingPreroll, Media(MediaEvent::Play)) => {
            Decision::stay(vec![Effect::CancelContentPlay])
        }
        (AwaitingPreroll, Ads(A::AdStart)) => Decision::to(AdPlayback),
        (AwaitingPreroll, Ads(A::AdSkip | A::AdTimeout | A::AdsError | A::NoPreroll)) => {
            Decision::to(ContentPlayback)
        }

        (AdPlayback, Ads(A::AdEnd)) => Decision::to(ContentResuming),
        (AdPlayback, Ads(A::AdsError)) => {
            Decision::to_with(ContentResuming, vec![Effect::TriggerAdEnd])
        }

        (ContentResuming, Ads(A::ContentUpdate)) => Decision::to(ContentSet),
        (ContentResuming, Ads(A::ContentResumed))
        | (ContentResuming, Media(MediaEvent::Playing | MediaEvent::Ended)) => {
            Decision::to(ContentPlayback)
        }

        (AwaitingPostroll, Ads(A::AdStart)) => Decision::to(AdPlayback),
        (AwaitingPostroll, Ads(A::AdSkip | A::AdTimeout | A::AdsError)) => {
            Decision::to_with(ContentResuming, vec![Effect::DeferEnded])
        }
        (AwaitingPostroll, Ads(A::ContentUpdate)) => Decision::to(AwaitingAdsReady),

        (ContentPlayback, Ads(A::AdsReady)) => Decision::stay(vec![Effect::EmitReadyForPreroll]),
        (ContentPlayback, Ads(A::AdStart)) => Decision::to(AdPlayback),
        (ContentPlayback, Ads(A::ContentUpdate)) => {
            let effects = if cond.play_content_behind_ad {
                Vec::new()
            } else {
                vec![Effect::CancelContentPlay]
            };
            let next = if cond.paused {
                ContentSet
            } else {
                AwaitingAdsReady
            };
            Decision::to_with(next, effects)
        }
        (ContentPlayback, Prefixed(Prefix::Content, MediaEvent::Ended)) => {
            if cond.content_has_ended {
                // Postrolls were already handled; go straight to the resume path.
                Decision::to(ContentResuming)
            } else {
                Decision::to_with(AwaitingPostroll, vec![Effect::MarkContentEnded])
            }
        }

        _ => return None,
    };
    Some(decision)
}
