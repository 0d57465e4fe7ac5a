//! Deferred native-play cancellation.
//!
//! A `play` that arrives before the ad decision is known is allowed to start
//! and is paused one tick later. The session resumes playback on entering
//! content playback if no ad ended up playing.

use crate::config::Platform;
use crate::event::{AdsEvent, EventType, MediaEvent, Prefix};
use crate::media::{MediaElement, PlayerClass};
use crate::session::{AdsContext, TimerAction};
use crate::timer::TimerQueue;
use tracing::debug;

/// Request a deferred pause. No-op while one is already pending.
pub fn request<M: MediaElement + ?Sized>(
    media: &mut M,
    platform: &Platform,
    ctx: &mut AdsContext,
    timers: &mut TimerQueue<TimerAction>,
) {
    if ctx.cancel_play_timer.is_some() {
        return;
    }

    // iPhone renders fullscreen natively unless inline playback is allowed;
    // cover the element so no content frame flashes.
    if platform.ios && platform.iphone && !media.plays_inline() {
        let (width, height) = media.dimensions();
        media.show_placeholder(width, height);
        ctx.placeholder_active = true;
    }

    ctx.cancel_play_timer = Some(timers.schedule(1, None, TimerAction::CancelContentPlay));
}

/// The deferred pause itself.
pub fn fire<M: MediaElement + ?Sized>(media: &mut M, ctx: &mut AdsContext) {
    ctx.cancel_play_timer = None;
    if !media.paused() {
        media.pause();
    }
    ctx.cancelled_play = true;
    debug!("content play cancelled pending ad decision");
}

/// Events that take the placeholder down.
pub fn removes_placeholder<M: MediaElement + ?Sized>(event: EventType, media: &M) -> bool {
    match event {
        EventType::Ads(
            AdsEvent::AdStart
            | AdsEvent::AdTimeout
            | AdsEvent::AdsError
            | AdsEvent::AdsCanceled
            | AdsEvent::AdSkip,
        ) => true,
        EventType::Prefixed(Prefix::Ad, MediaEvent::Playing) => true,
        EventType::Media(MediaEvent::Playing) => true,
        EventType::FullscreenChange => media.has_class(PlayerClass::Fullscreen),
        _ => false,
    }
}

pub fn observe<M: MediaElement + ?Sized>(media: &mut M, ctx: &mut AdsContext, event: EventType) {
    if ctx.placeholder_active && removes_placeholder(event, media) {
        media.remove_placeholder();
        ctx.placeholder_active = false;
    }
}
