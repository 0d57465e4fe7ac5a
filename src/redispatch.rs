//! Event Redispatcher: rename or swallow raw element events depending on
//! the orchestration phase.
//!
//! Only raw media events are considered. Integration events, already
//! prefixed events and `fullscreenchange` always pass untouched.

use crate::event::{EventType, MediaEvent, Prefix};
use crate::media::MediaElement;
use crate::snapshot::{self, Snapshot};
use crate::state::AdState;

/// What to do with a raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redispatch {
    Pass,
    /// Consume the original and deliver it again with this prefix.
    Rename(Prefix),
    Suppress,
}

/// The session facts the rules read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedispatchView {
    /// The element was reused for the ad. False when no snapshot is held.
    pub recycled: bool,
    pub stitched_ads: bool,
    /// A snapshot is held and the element has not yet switched back to its source.
    pub source_pending: bool,
    /// A snapshot is held and it recorded the content as ended.
    pub snapshot_ended: bool,
}

impl RedispatchView {
    pub fn observe<M: MediaElement + ?Sized>(
        media: &M,
        snapshot: Option<&Snapshot>,
        stitched_ads: bool,
    ) -> Self {
        match snapshot {
            Some(snap) => RedispatchView {
                recycled: snapshot::is_recycled(media, snap),
                stitched_ads,
                source_pending: media.current_src() != snap.current_src,
                snapshot_ended: snap.ended,
            },
            None => RedispatchView {
                stitched_ads,
                ..RedispatchView::default()
            },
        }
    }
}

/// Apply the rules in priority order.
pub fn decide(event: EventType, state: AdState, view: &RedispatchView) -> Redispatch {
    use MediaEvent::{Ended, Playing};

    let Some(media) = event.as_media() else {
        return Redispatch::Pass;
    };

    match (state, media) {
        // The pre-ad play/pause cycle fires a native `playing`.
        (AdState::AwaitingPreroll | AdState::AwaitingAdsReady, Playing) => {
            Redispatch::Rename(Prefix::Ad)
        }
        // Already reported as `adplaying` before the break if the ad reuses the element.
        (AdState::AdPlayback, Playing) if view.recycled => Redispatch::Suppress,
        (AdState::AdPlayback, Playing) => Redispatch::Rename(Prefix::Ad),
        (AdState::AdPlayback, _) if view.recycled || view.stitched_ads => {
            Redispatch::Rename(Prefix::Ad)
        }
        (AdState::ContentPlayback, Ended) => Redispatch::Rename(Prefix::Content),
        (AdState::ContentResuming, _) => resuming(media, view),
        _ => Redispatch::Pass,
    }
}

fn resuming(media: MediaEvent, view: &RedispatchView) -> Redispatch {
    if view.source_pending {
        return match media {
            MediaEvent::LoadStart => Redispatch::Suppress,
            _ => Redispatch::Rename(Prefix::Content),
        };
    }
    if view.snapshot_ended {
        // Resuming after a postroll.
        return match media {
            MediaEvent::Pause | MediaEvent::Ended => Redispatch::Pass,
            _ => Redispatch::Rename(Prefix::Content),
        };
    }
    match media {
        MediaEvent::Playing => Redispatch::Pass,
        _ => Redispatch::Rename(Prefix::Content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Platform;
    use crate::event::AdsEvent;
    use crate::sim::SimulatedMedia;

    fn raw(m: MediaEvent) -> EventType {
        EventType::Media(m)
    }

    fn view(recycled: bool, stitched: bool) -> RedispatchView {
        RedispatchView {
            recycled,
            stitched_ads: stitched,
            ..RedispatchView::default()
        }
    }

    #[test]
    fn playing_during_ad_decision_becomes_adplaying() {
        let v = RedispatchView::default();
        for state in [AdState::AwaitingPreroll, AdState::AwaitingAdsReady] {
            assert_eq!(
                decide(raw(MediaEvent::Playing), state, &v),
                Redispatch::Rename(Prefix::Ad)
            );
            assert_eq!(decide(raw(MediaEvent::Pause), state, &v), Redispatch::Pass);
        }
    }

    #[test]
    fn playing_in_ad_playback_depends_on_recycling() {
        let state = AdState::AdPlayback;
        assert_eq!(
            decide(raw(MediaEvent::Playing), state, &view(false, false)),
            Redispatch::Rename(Prefix::Ad)
        );
        assert_eq!(
            decide(raw(MediaEvent::Playing), state, &view(true, false)),
            Redispatch::Suppress
        );
        // Stitched mode does not change the `playing` rules.
        assert_eq!(
            decide(raw(MediaEvent::Playing), state, &view(false, true)),
            Redispatch::Rename(Prefix::Ad)
        );
    }

    #[test]
    fn other_ad_playback_events_renamed_only_when_recycled_or_stitched() {
        let state = AdState::AdPlayback;
        let ended = raw(MediaEvent::Ended);
        assert_eq!(decide(ended, state, &view(false, false)), Redispatch::Pass);
        assert_eq!(
            decide(ended, state, &view(true, false)),
            Redispatch::Rename(Prefix::Ad)
        );
        assert_eq!(
            decide(raw(MediaEvent::TimeUpdate), state, &view(false, true)),
            Redispatch::Rename(Prefix::Ad)
        );
    }

    #[test]
    fn ended_during_content_becomes_contentended() {
        let v = RedispatchView::default();
        assert_eq!(
            decide(raw(MediaEvent::Ended), AdState::ContentPlayback, &v),
            Redispatch::Rename(Prefix::Content)
        );
        assert_eq!(
            decide(raw(MediaEvent::Playing), AdState::ContentPlayback, &v),
            Redispatch::Pass
        );
    }

    #[test]
    fn resuming_with_source_pending() {
        let v = RedispatchView {
            source_pending: true,
            ..RedispatchView::default()
        };
        let state = AdState::ContentResuming;
        assert_eq!(decide(raw(MediaEvent::LoadStart), state, &v), Redispatch::Suppress);
        assert_eq!(
            decide(raw(MediaEvent::Playing), state, &v),
            Redispatch::Rename(Prefix::Content)
        );
    }

    #[test]
    fn resuming_after_postroll_passes_pause_and_ended() {
        let v = RedispatchView {
            snapshot_ended: true,
            ..RedispatchView::default()
        };
        let state = AdState::ContentResuming;
        assert_eq!(decide(raw(MediaEvent::Ended), state, &v), Redispatch::Pass);
        assert_eq!(decide(raw(MediaEvent::Pause), state, &v), Redispatch::Pass);
        assert_eq!(
            decide(raw(MediaEvent::Playing), state, &v),
            Redispatch::Rename(Prefix::Content)
        );
    }

    #[test]
    fn resuming_mid_stream_passes_only_playing() {
        let v = RedispatchView::default();
        let state = AdState::ContentResuming;
        assert_eq!(decide(raw(MediaEvent::Playing), state, &v), Redispatch::Pass);
        assert_eq!(
            decide(raw(MediaEvent::Ended), state, &v),
            Redispatch::Rename(Prefix::Content)
        );
        assert_eq!(
            decide(raw(MediaEvent::CanPlay), state, &v),
            Redispatch::Rename(Prefix::Content)
        );
    }

    #[test]
    fn non_media_events_always_pass() {
        let v = view(true, true);
        for state in AdState::ALL {
            assert_eq!(
                decide(EventType::Ads(AdsEvent::AdEnd), state, &v),
                Redispatch::Pass
            );
            assert_eq!(decide(EventType::FullscreenChange, state, &v), Redispatch::Pass);
        }
    }

    #[test]
    fn quiet_states_pass_everything() {
        let v = view(true, true);
        for state in [AdState::ContentSet, AdState::AdsReady, AdState::AwaitingPostroll] {
            for m in MediaEvent::ALL {
                assert_eq!(decide(raw(m), state, &v), Redispatch::Pass);
            }
        }
    }

    #[test]
    fn observe_reads_snapshot_against_element() {
        let mut media = SimulatedMedia::new("a.mp4");
        let snap = snapshot::capture(&mut media, &Platform::desktop());
        media.swap_source("ad.mp4");
        let v = RedispatchView::observe(&media, Some(&snap), false);
        assert!(v.recycled);
        assert!(v.source_pending);
        assert!(!v.snapshot_ended);

        let none = RedispatchView::observe(&media, None, true);
        assert!(!none.recycled);
        assert!(none.stitched_ads);
    }
}
