//! The ad orchestration session.
//!
//! [`AdsSession`] owns the media element, the [`AdsContext`] and the timer
//! queue. Every event goes through one FIFO queue: the redispatcher looks at
//! it first, then the built-in listeners, then the state machine. Events
//! produced while an event is being handled are queued behind it.

use crate::cancel_play;
use crate::config::AdsConfig;
use crate::content_update;
use crate::error::{AdsError, AdsResult};
use crate::event::{AdsEvent, Event, EventType, MediaEvent, Prefix};
use crate::media::{self, MediaElement, PlayerClass};
use crate::redispatch::{self, Redispatch, RedispatchView};
use crate::snapshot::{self, AttemptOutcome, PendingRestore, Snapshot, RESTORE_POLL_INTERVAL_MS};
use crate::state::{self, AdState, Conditions, Effect};
use crate::timer::{TimerId, TimerQueue};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, info, trace, warn};

/// Fallback delay before synthesizing `ended` when resuming after the content ended.
pub const FIRE_ENDED_FALLBACK_MS: u64 = 1000;

/// Delay used for "next tick" deferrals.
const TICK_MS: u64 = 1;

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Deliver an event (`adtimeout`, `nopreroll`, `ended` ...).
    Emit(EventType),
    CancelContentPlay,
    ClearCancelPlayTimer,
    RestorePoll,
    /// No-postroll path: leave `postroll?` and deliver `ended`.
    ForceContentResuming,
    CheckContentSource,
}

/// Per-session record. Only the session mutates it.
#[derive(Debug, Clone)]
pub struct AdsContext {
    pub state: AdState,
    pub snapshot: Option<Snapshot>,
    /// Set the first time content ends; stays set if the viewer seeks back.
    pub content_has_ended: bool,
    pub nopreroll: bool,
    pub nopostroll: bool,
    pub disable_next_snapshot_restore: bool,
    pub stitched_ads: bool,
    /// The event behind the last transition.
    pub trigger_event: Option<EventType>,

    pub ad_timeout_timer: Option<TimerId>,
    pub cancel_play_timer: Option<TimerId>,
    pub fire_ended_timer: Option<TimerId>,
    pub resume_retry_timer: Option<TimerId>,

    /// Volume before muting for an ad played over live content.
    pub pre_ad_volume: Option<f64>,
    pub cancelled_play: bool,
    pub placeholder_active: bool,
    pub pending_restore: Option<PendingRestore>,
    /// The source the content watcher last saw.
    pub content_src: String,
}

impl Default for AdsContext {
    fn default() -> Self {
        AdsContext {
            state: AdState::ContentSet,
            snapshot: None,
            content_has_ended: false,
            nopreroll: false,
            nopostroll: false,
            disable_next_snapshot_restore: false,
            stitched_ads: false,
            trigger_event: None,
            ad_timeout_timer: None,
            cancel_play_timer: None,
            fire_ended_timer: None,
            resume_retry_timer: None,
            pre_ad_volume: None,
            cancelled_play: false,
            placeholder_active: false,
            pending_restore: None,
            content_src: String::new(),
        }
    }
}

/// One state change, as recorded for hosts and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub at_ms: u64,
    pub trigger: EventType,
    pub from: AdState,
    pub to: AdState,
}

pub struct AdsSession<M: MediaElement> {
    media: M,
    config: AdsConfig,
    ctx: AdsContext,
    timers: TimerQueue<TimerAction>,
    queue: VecDeque<Event>,
    draining: bool,
    delivered: Vec<Event>,
    transitions: Vec<Transition>,
    stale_timer_fires: usize,
}

impl<M: MediaElement> AdsSession<M> {
    /// Start a session over `media`.
    ///
    /// An element that is already playing (autoplay) is treated as if `play`
    /// had just been requested.
    pub fn new(media: M, config: AdsConfig) -> Self {
        let ctx = AdsContext {
            stitched_ads: config.stitched_ads,
            content_src: media.current_src(),
            ..AdsContext::default()
        };
        let mut session = AdsSession {
            media,
            config,
            ctx,
            timers: TimerQueue::new(),
            queue: VecDeque::new(),
            draining: false,
            delivered: Vec::new(),
            transitions: Vec::new(),
            stale_timer_fires: 0,
        };
        session
            .timers
            .schedule(TICK_MS, None, TimerAction::CheckContentSource);

        if !session.media.paused() {
            session.process_event(&Event::new(EventType::PLAY));
            session.drain();
        }
        session
    }

    // --- Driving the session ---

    /// Deliver an event from the element or the ad integration.
    pub fn trigger(&mut self, event: impl Into<Event>) {
        self.queue.push_back(event.into());
        self.drain();
    }

    /// Move the virtual clock forward, firing every timer that comes due.
    pub fn advance(&mut self, ms: u64) {
        let until = self.timers.now().saturating_add(ms);
        while let Some((id, owner, action)) = self.timers.pop_due(until) {
            if let Some(owner) = owner {
                if owner != self.ctx.state {
                    // Exits cancel owned timers, so this only happens on a bug.
                    warn!(?action, %owner, state = %self.ctx.state, "owned timer fired outside its state");
                    self.stale_timer_fires += 1;
                    continue;
                }
            }
            self.clear_handle(id);
            self.fire(action);
            self.drain();
        }
        self.timers.settle_at(until);
    }

    fn drain(&mut self) {
        if self.draining {
            return;
        }
        self.draining = true;
        while let Some(event) = self.queue.pop_front() {
            self.dispatch(event);
        }
        self.draining = false;
    }

    fn dispatch(&mut self, event: Event) {
        let view = RedispatchView::observe(
            &self.media,
            self.ctx.snapshot.as_ref(),
            self.ctx.stitched_ads,
        );
        match redispatch::decide(event.kind, self.ctx.state, &view) {
            Redispatch::Pass => {}
            Redispatch::Suppress => {
                debug!(event = %event.kind, state = %self.ctx.state, "event suppressed");
                // Hidden from integrators, but a new source must still be noticed.
                if event.kind.is_media(MediaEvent::LoadStart) {
                    self.check_content_source();
                }
                return;
            }
            Redispatch::Rename(prefix) => {
                let kind = event.kind;
                if let Some(renamed) = Event::redispatched(prefix, self.ctx.state, event) {
                    debug!(from = %kind, to = %renamed.kind, "event renamed");
                    // The renamed event takes the original's place in line.
                    self.queue.push_front(renamed);
                }
                return;
            }
        }

        trace!(event = %event.kind, state = %self.ctx.state, "delivering");
        self.delivered.push(event.clone());
        self.run_listeners(&event);
        self.process_event(&event);
    }

    // --- Built-in listeners ---

    fn run_listeners(&mut self, event: &Event) {
        use EventType::{Ads, Media, Prefixed};

        match event.kind {
            Media(MediaEvent::Ended) => {
                if !self.media.has_class(PlayerClass::HasStarted) {
                    self.media.add_class(PlayerClass::HasStarted);
                }
            }
            // The ad loaded in the content element: start it for the integration.
            Prefixed(Prefix::Ad, MediaEvent::DurationChange | MediaEvent::CanPlay) => {
                let reused = self
                    .ctx
                    .snapshot
                    .as_ref()
                    .is_some_and(|snap| self.media.current_src() != snap.current_src);
                if reused {
                    if let Err(e) = self.media.play() {
                        warn!("could not start ad in content element: {}", e);
                    }
                }
            }
            Ads(AdsEvent::NoPreroll) => self.ctx.nopreroll = true,
            Ads(AdsEvent::NoPostroll) => self.ctx.nopostroll = true,
            Ads(AdsEvent::AdsAdStarted) | Media(MediaEvent::Playing) => {
                self.media.remove_class(PlayerClass::AdLoading);
            }
            Ads(AdsEvent::ContentUpdate) => self.reset(),
            Prefixed(Prefix::Content, MediaEvent::CanPlay) => self.try_resume(),
            Prefixed(Prefix::Content, MediaEvent::LoadedMetadata) => {
                if let Some(pending) = self.ctx.pending_restore.as_mut() {
                    pending.restore_tracks_once(&mut self.media);
                }
            }
            Media(MediaEvent::LoadStart) => self.check_content_source(),
            _ => {}
        }

        cancel_play::observe(&mut self.media, &mut self.ctx, event.kind);
    }

    fn check_content_source(&mut self) {
        if let Some(update) = content_update::check(&self.media, &mut self.ctx) {
            self.queue.push_back(update);
        }
    }

    // --- State machine ---

    fn conditions(&self) -> Conditions {
        Conditions {
            paused: self.media.paused(),
            content_has_ended: self.ctx.content_has_ended,
            play_content_behind_ad: self.should_play_content_behind_ad(),
        }
    }

    /// Run the current state's handler for `event`, then exit and entry
    /// actions if the state changed.
    fn process_event(&mut self, event: &Event) {
        let current = self.ctx.state;
        let Some(decision) = state::decide(current, event.kind, &self.conditions()) else {
            return;
        };

        for effect in &decision.effects {
            self.apply(*effect, decision.next);
        }

        if let Some(next) = decision.next {
            if next != current {
                self.transition(next, event.kind);
            }
        }
    }

    fn apply(&mut self, effect: Effect, next: Option<AdState>) {
        match effect {
            Effect::CancelContentPlay => cancel_play::request(
                &mut self.media,
                &self.config.platform,
                &mut self.ctx,
                &mut self.timers,
            ),
            Effect::RemoveNativePoster => self.media.remove_poster(),
            Effect::EmitReadyForPreroll => self.emit(AdsEvent::ReadyForPreroll),
            Effect::TriggerAdEnd => self.emit(AdsEvent::AdEnd),
            Effect::DeferEnded => {
                self.timers
                    .schedule(TICK_MS, next, TimerAction::Emit(EventType::ENDED));
            }
            Effect::MarkContentEnded => self.ctx.content_has_ended = true,
        }
    }

    fn transition(&mut self, next: AdState, trigger: EventType) {
        let prev = self.ctx.state;
        self.ctx.trigger_event = Some(trigger);
        self.ctx.state = next;

        self.exit(prev);
        let dropped = self.timers.cancel_owned_by(prev);
        if dropped > 0 {
            trace!(state = %prev, dropped, "cancelled owned timers on exit");
        }
        self.enter(next);

        if self.config.debug {
            info!("{} triggered: {} -> {}", trigger, prev, next);
        } else {
            trace!("{} triggered: {} -> {}", trigger, prev, next);
        }
        self.transitions.push(Transition {
            at_ms: self.timers.now(),
            trigger,
            from: prev,
            to: next,
        });
    }

    fn enter(&mut self, state: AdState) {
        match state {
            AdState::AwaitingPreroll => {
                if self.ctx.nopreroll {
                    // Starts the ads manager in case there are later ads.
                    self.emit(AdsEvent::ReadyForPreroll);
                    self.timers.schedule(
                        TICK_MS,
                        Some(state),
                        TimerAction::Emit(EventType::Ads(AdsEvent::NoPreroll)),
                    );
                } else {
                    self.media.add_class(PlayerClass::AdLoading);
                    self.start_ad_timeout(state, self.config.preroll_timeout);
                    self.emit(AdsEvent::ReadyForPreroll);
                }
            }
            AdState::AwaitingAdsReady => {
                self.media.add_class(PlayerClass::AdLoading);
                self.start_ad_timeout(state, self.config.timeout);
            }
            AdState::AdPlayback => self.enter_ad_playback(),
            AdState::ContentResuming => {
                if self.ctx.content_has_ended {
                    self.cancel_handle(|ctx| &mut ctx.fire_ended_timer);
                    // Some ad implementations never deliver a terminal event
                    // on the content element.
                    self.ctx.fire_ended_timer = Some(self.timers.schedule(
                        FIRE_ENDED_FALLBACK_MS,
                        Some(state),
                        TimerAction::Emit(EventType::ENDED),
                    ));
                }
            }
            AdState::AwaitingPostroll => {
                self.ctx.snapshot = Some(snapshot::capture(
                    &mut self.media,
                    &self.config.platform,
                ));
                if self.ctx.nopostroll {
                    self.timers
                        .schedule(TICK_MS, Some(state), TimerAction::ForceContentResuming);
                } else {
                    self.media.add_class(PlayerClass::AdLoading);
                    self.start_ad_timeout(state, self.config.postroll_timeout);
                }
            }
            AdState::ContentPlayback => {
                self.cancel_handle(|ctx| &mut ctx.cancel_play_timer);
                self.queue
                    .push_back(Event::content_playback(self.ctx.trigger_event));
                if self.ctx.cancelled_play {
                    self.ctx.cancelled_play = false;
                    if self.media.paused() {
                        if let Err(e) = self.media.play() {
                            warn!("could not resume content: {}", e);
                        }
                    }
                }
            }
            AdState::ContentSet | AdState::AdsReady => {}
        }
    }

    fn enter_ad_playback(&mut self) {
        if self.should_play_content_behind_ad() {
            self.ctx.pre_ad_volume = Some(self.media.volume());
            self.media.set_volume(0.0);
        } else {
            self.ctx.snapshot = Some(snapshot::capture(
                &mut self.media,
                &self.config.platform,
            ));
        }

        self.media.add_class(PlayerClass::AdPlaying);
        if self.media.has_class(PlayerClass::Live) {
            self.media.remove_class(PlayerClass::Live);
        }
        self.media.remove_poster();

        if self.ctx.cancel_play_timer.is_some() {
            // Waiting a tick keeps the pending pause from being cancelled
            // before it lands.
            self.timers.schedule(
                TICK_MS,
                Some(AdState::AdPlayback),
                TimerAction::ClearCancelPlayTimer,
            );
        }
    }

    fn exit(&mut self, state: AdState) {
        match state {
            AdState::AwaitingPreroll => self.cancel_handle(|ctx| &mut ctx.ad_timeout_timer),
            AdState::AwaitingAdsReady | AdState::AwaitingPostroll => {
                self.cancel_handle(|ctx| &mut ctx.ad_timeout_timer);
                self.media.remove_class(PlayerClass::AdLoading);
            }
            AdState::AdPlayback => {
                self.media.remove_class(PlayerClass::AdPlaying);
                if self.is_live() {
                    self.media.add_class(PlayerClass::Live);
                }
                if let Some(volume) = self.ctx.pre_ad_volume.take() {
                    self.media.set_volume(volume);
                } else {
                    self.restore_snapshot();
                }
            }
            AdState::ContentResuming => self.cancel_handle(|ctx| &mut ctx.fire_ended_timer),
            AdState::ContentSet | AdState::AdsReady | AdState::ContentPlayback => {}
        }
    }

    fn start_ad_timeout(&mut self, owner: AdState, delay_ms: u64) {
        self.cancel_handle(|ctx| &mut ctx.ad_timeout_timer);
        self.ctx.ad_timeout_timer = Some(self.timers.schedule(
            delay_ms,
            Some(owner),
            TimerAction::Emit(EventType::Ads(AdsEvent::AdTimeout)),
        ));
    }

    // --- Snapshot restore ---

    fn restore_snapshot(&mut self) {
        if self.ctx.disable_next_snapshot_restore {
            self.ctx.disable_next_snapshot_restore = false;
            debug!("snapshot restore skipped once");
            return;
        }
        self.cancel_pending_restore();
        let Some(snap) = self.ctx.snapshot.as_ref() else {
            return;
        };
        let recycled = snapshot::is_recycled(&self.media, snap);
        if let Some(pending) = snapshot::begin_restore(&mut self.media, snap, recycled) {
            self.ctx.pending_restore = Some(pending);
            self.schedule_restore_poll();
        }
    }

    fn schedule_restore_poll(&mut self) {
        self.ctx.resume_retry_timer = Some(self.timers.schedule(
            RESTORE_POLL_INTERVAL_MS,
            None,
            TimerAction::RestorePoll,
        ));
    }

    /// One readiness check of a pending restore.
    fn try_resume(&mut self) {
        self.cancel_handle(|ctx| &mut ctx.resume_retry_timer);
        let Some(mut pending) = self.ctx.pending_restore.take() else {
            return;
        };
        match pending.attempt(&mut self.media, &self.config.platform) {
            AttemptOutcome::Retry => {
                trace!(attempts = pending.attempts_made(), "content not seekable yet");
                self.ctx.pending_restore = Some(pending);
                self.schedule_restore_poll();
            }
            AttemptOutcome::Resumed | AttemptOutcome::Exhausted => {
                debug!(attempts = pending.attempts_made(), "content restored");
            }
        }
    }

    fn cancel_pending_restore(&mut self) {
        self.cancel_handle(|ctx| &mut ctx.resume_retry_timer);
        self.ctx.pending_restore = None;
    }

    // --- Timers ---

    fn fire(&mut self, action: TimerAction) {
        trace!(?action, now = self.timers.now(), "timer fired");
        match action {
            TimerAction::Emit(kind) => self.queue.push_back(Event::new(kind)),
            TimerAction::CancelContentPlay => cancel_play::fire(&mut self.media, &mut self.ctx),
            TimerAction::ClearCancelPlayTimer => {
                self.cancel_handle(|ctx| &mut ctx.cancel_play_timer)
            }
            TimerAction::RestorePoll => self.try_resume(),
            TimerAction::ForceContentResuming => {
                self.transition(AdState::ContentResuming, EventType::Ads(AdsEvent::NoPostroll));
                self.queue.push_back(Event::new(EventType::ENDED));
            }
            TimerAction::CheckContentSource => self.check_content_source(),
        }
    }

    /// Forget a handle that just fired.
    fn clear_handle(&mut self, id: TimerId) {
        for handle in [
            &mut self.ctx.ad_timeout_timer,
            &mut self.ctx.cancel_play_timer,
            &mut self.ctx.fire_ended_timer,
            &mut self.ctx.resume_retry_timer,
        ] {
            if *handle == Some(id) {
                *handle = None;
            }
        }
    }

    fn cancel_handle(&mut self, handle: impl FnOnce(&mut AdsContext) -> &mut Option<TimerId>) {
        if let Some(id) = handle(&mut self.ctx).take() {
            self.timers.cancel(id);
        }
    }

    fn emit(&mut self, event: AdsEvent) {
        self.queue.push_back(Event::from(event));
    }

    // --- Public session API ---

    /// Signal that a linear ad is starting. Only meaningful while an ad
    /// break can begin.
    pub fn start_linear_ad_mode(&mut self) {
        if matches!(
            self.ctx.state,
            AdState::AwaitingPreroll | AdState::ContentPlayback | AdState::AwaitingPostroll
        ) {
            self.trigger(AdsEvent::AdStart);
        }
    }

    /// Signal that a linear ad pod finished.
    pub fn end_linear_ad_mode(&mut self) {
        if self.ctx.state == AdState::AdPlayback {
            self.trigger(AdsEvent::AdEnd);
            // An empty ad response never gets to remove it.
            self.media.remove_class(PlayerClass::AdLoading);
        }
    }

    /// Signal that no linear ad will play. Ignored during ad playback.
    pub fn skip_linear_ad_mode(&mut self) {
        if self.ctx.state != AdState::AdPlayback {
            self.trigger(AdsEvent::AdSkip);
        }
    }

    pub fn is_live(&self) -> bool {
        media::is_live(&self.media, &self.config.platform)
    }

    pub fn should_play_content_behind_ad(&self) -> bool {
        media::should_play_content_behind_ad(&self.media, &self.config.platform)
    }

    /// Whether the element was reused for the ad since the snapshot.
    ///
    /// Only meaningful while a snapshot is held.
    pub fn video_element_recycled(&self) -> AdsResult<bool> {
        let snap = self.ctx.snapshot.as_ref().ok_or(AdsError::NoSnapshot)?;
        Ok(snapshot::is_recycled(&self.media, snap))
    }

    /// Forget per-content state. Runs on every `contentupdate`.
    pub fn reset(&mut self) {
        self.ctx.disable_next_snapshot_restore = false;
        self.ctx.content_has_ended = false;
        self.ctx.snapshot = None;
        self.cancel_pending_restore();
    }

    pub fn stitched_ads(&self) -> bool {
        self.ctx.stitched_ads
    }

    pub fn set_stitched_ads(&mut self, stitched: bool) {
        self.ctx.stitched_ads = stitched;
    }

    /// Skip the next snapshot restore, for a new source that should not
    /// resume the old position.
    pub fn disable_next_snapshot_restore(&mut self) {
        self.ctx.disable_next_snapshot_restore = true;
    }

    /// Pre-set the watcher's remembered source so a source change does not
    /// restart the ad workflow.
    pub fn set_content_src(&mut self, src: &str) {
        self.ctx.content_src = src.to_string();
    }

    /// Drain the events delivered to integrators since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.delivered)
    }

    pub fn take_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.transitions)
    }

    pub fn state(&self) -> AdState {
        self.ctx.state
    }

    pub fn context(&self) -> &AdsContext {
        &self.ctx
    }

    pub fn config(&self) -> &AdsConfig {
        &self.config
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.timers.now()
    }

    pub fn timers(&self) -> &TimerQueue<TimerAction> {
        &self.timers
    }

    /// Owned timers that came due after their state was left. Always zero
    /// unless an exit path forgot to cancel.
    pub fn stale_timer_fires(&self) -> usize {
        self.stale_timer_fires
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Platform;
    use crate::event::EventPayload;
    use crate::media::{TextTrack, TrackMode};
    use crate::sim::SimulatedMedia;

    fn session() -> AdsSession<SimulatedMedia> {
        AdsSession::new(SimulatedMedia::new("a.mp4"), AdsConfig::default())
    }

    fn kinds(events: &[Event]) -> Vec<String> {
        events.iter().map(|e| e.kind.to_string()).collect()
    }

    fn to_preroll(s: &mut AdsSession<SimulatedMedia>) {
        s.trigger(AdsEvent::AdsReady);
        s.trigger(MediaEvent::Play);
        assert_eq!(s.state(), AdState::AwaitingPreroll);
    }

    #[test]
    fn starts_in_content_set() {
        let s = session();
        assert_eq!(s.state(), AdState::ContentSet);
        assert_eq!(s.context().content_src, "a.mp4");
    }

    #[test]
    fn autoplay_processes_synthetic_play() {
        let mut media = SimulatedMedia::new("a.mp4");
        media.paused = false;
        let mut s = AdsSession::new(media, AdsConfig::default());
        assert_eq!(s.state(), AdState::AwaitingAdsReady);
        assert!(s.media().has_class(PlayerClass::AdLoading));
        // The synthetic play is not delivered to integrators.
        assert!(s.take_events().is_empty());
    }

    #[test]
    fn play_then_tick_pauses_content() {
        let mut s = session();
        s.media_mut().poster = Some("p.jpg".into());
        s.media_mut().paused = false;
        s.trigger(MediaEvent::Play);
        assert_eq!(s.state(), AdState::AwaitingAdsReady);
        assert!(s.media().poster.is_none());
        assert!(s.context().cancel_play_timer.is_some());
        s.advance(1);
        assert!(s.media().paused);
        assert!(s.context().cancelled_play);
        assert!(s.context().cancel_play_timer.is_none());
    }

    #[test]
    fn preroll_entry_emits_readyforpreroll_and_times_out() {
        let mut s = session();
        to_preroll(&mut s);
        assert!(kinds(&s.take_events()).contains(&"readyforpreroll".to_string()));
        s.advance(99);
        assert_eq!(s.state(), AdState::AwaitingPreroll);
        s.advance(1);
        assert_eq!(s.state(), AdState::ContentPlayback);
        let events = kinds(&s.take_events());
        assert_eq!(events, vec!["adtimeout", "contentplayback"]);
    }

    #[test]
    fn nopreroll_skips_the_wait() {
        let mut s = session();
        s.trigger(AdsEvent::NoPreroll);
        to_preroll(&mut s);
        assert!(!s.media().has_class(PlayerClass::AdLoading));
        s.advance(1);
        assert_eq!(s.state(), AdState::ContentPlayback);
        assert_eq!(
            s.context().trigger_event,
            Some(EventType::Ads(AdsEvent::NoPreroll))
        );
    }

    #[test]
    fn content_playback_resumes_cancelled_play() {
        let mut s = session();
        s.trigger(AdsEvent::AdsReady);
        s.media_mut().paused = false;
        s.trigger(MediaEvent::Play);
        s.advance(1);
        assert!(s.media().paused);
        s.skip_linear_ad_mode();
        assert_eq!(s.state(), AdState::ContentPlayback);
        assert!(!s.media().paused);
        assert!(!s.context().cancelled_play);
    }

    #[test]
    fn contentplayback_carries_trigger_event() {
        let mut s = session();
        s.trigger(AdsEvent::AdsCanceled);
        let events = s.take_events();
        let last = events.last().unwrap();
        assert_eq!(
            last.payload,
            EventPayload::ContentPlayback {
                trigger_event: Some(EventType::Ads(AdsEvent::AdsCanceled))
            }
        );
    }

    #[test]
    fn ad_playback_captures_and_restores() {
        let mut s = session();
        to_preroll(&mut s);
        s.media_mut().current_time = 12.0;
        s.start_linear_ad_mode();
        assert_eq!(s.state(), AdState::AdPlayback);
        assert!(s.context().snapshot.is_some());
        assert!(s.media().has_class(PlayerClass::AdPlaying));
        assert!(!s.video_element_recycled().unwrap());

        s.end_linear_ad_mode();
        assert_eq!(s.state(), AdState::ContentResuming);
        assert!(!s.media().has_class(PlayerClass::AdPlaying));
        assert_eq!(s.media().seeks, Vec::<f64>::new());
        assert!(!s.media().paused);
    }

    #[test]
    fn recycled_element_restore_waits_for_contentcanplay() {
        let mut s = session();
        to_preroll(&mut s);
        s.media_mut().current_time = 30.0;
        s.start_linear_ad_mode();
        s.media_mut().swap_source("ad.mp4");
        assert!(s.video_element_recycled().unwrap());

        s.end_linear_ad_mode();
        assert_eq!(s.media().src, "a.mp4");
        assert!(s.context().pending_restore.is_some());

        s.media_mut().ready_state = 3;
        s.trigger(MediaEvent::CanPlay);
        assert!(s.context().pending_restore.is_none());
        assert!(s.context().resume_retry_timer.is_none());
        assert_eq!(s.media().seeks, vec![30.0]);
        let events = kinds(&s.take_events());
        assert!(events.contains(&"contentcanplay".to_string()));
    }

    #[test]
    fn reused_element_starts_the_ad_when_it_loads() {
        let mut s = session();
        to_preroll(&mut s);
        s.start_linear_ad_mode();
        let before = s.media().play_calls;

        // Same element, content source: not an ad load.
        s.trigger(MediaEvent::DurationChange);
        assert_eq!(s.media().play_calls, before);

        s.media_mut().swap_source("ad.mp4");
        s.trigger(MediaEvent::DurationChange);
        assert_eq!(s.media().play_calls, before + 1);
        s.trigger(MediaEvent::CanPlay);
        assert_eq!(s.media().play_calls, before + 2);
        let events = kinds(&s.take_events());
        assert!(events.contains(&"addurationchange".to_string()));
        assert!(events.contains(&"adcanplay".to_string()));
    }

    #[test]
    fn loadedmetadata_restores_tracks_once_before_resume() {
        let mut media = SimulatedMedia::new("a.mp4");
        media.current_time = 30.0;
        media
            .remote_tracks
            .push(TextTrack::new(1, "captions", TrackMode::Showing));
        let mut s = AdsSession::new(media, AdsConfig::default());
        to_preroll(&mut s);
        s.start_linear_ad_mode();
        s.media_mut().swap_source("ad.mp4");
        s.end_linear_ad_mode();
        assert_eq!(s.media().remote_tracks[0].mode, TrackMode::Disabled);

        s.trigger(MediaEvent::LoadedMetadata);
        assert_eq!(s.media().remote_tracks[0].mode, TrackMode::Showing);
        assert!(s.context().pending_restore.is_some());

        // A mode chosen after metadata must survive the resume.
        s.media_mut().remote_tracks[0].mode = TrackMode::Hidden;
        s.media_mut().ready_state = 4;
        s.trigger(MediaEvent::CanPlay);
        assert!(s.context().pending_restore.is_none());
        assert_eq!(s.media().seeks, vec![30.0]);
        assert_eq!(s.media().remote_tracks[0].mode, TrackMode::Hidden);
    }

    #[test]
    fn second_break_replaces_the_pending_restore() {
        let mut s = session();
        to_preroll(&mut s);
        s.media_mut().current_time = 30.0;
        s.start_linear_ad_mode();
        s.media_mut().swap_source("ad.mp4");
        s.end_linear_ad_mode();
        assert!(s.context().pending_restore.is_some());
        let first_poll = s.context().resume_retry_timer;

        s.trigger(AdsEvent::ContentResumed);
        assert_eq!(s.state(), AdState::ContentPlayback);
        s.start_linear_ad_mode();
        s.media_mut().swap_source("ad2.mp4");
        s.end_linear_ad_mode();

        let second_poll = s.context().resume_retry_timer;
        assert!(second_poll.is_some());
        assert_ne!(first_poll, second_poll);
        assert_eq!(s.media().sources_set.len(), 2);
        assert!(!s.timers().is_pending(first_poll.unwrap()));
    }

    #[test]
    fn adserror_during_ad_closes_with_adend() {
        let mut s = session();
        to_preroll(&mut s);
        s.start_linear_ad_mode();
        s.take_events();
        s.trigger(AdsEvent::AdsError);
        assert_eq!(s.state(), AdState::ContentResuming);
        assert_eq!(kinds(&s.take_events()), vec!["adserror", "adend"]);
    }

    #[test]
    fn no_snapshot_is_a_usage_error() {
        let s = session();
        assert!(matches!(
            s.video_element_recycled(),
            Err(AdsError::NoSnapshot)
        ));
    }

    #[test]
    fn linear_mode_calls_respect_state() {
        let mut s = session();
        s.start_linear_ad_mode();
        assert_eq!(s.state(), AdState::ContentSet);
        s.end_linear_ad_mode();
        assert!(s.take_events().is_empty());
        s.skip_linear_ad_mode();
        assert_eq!(s.state(), AdState::ContentPlayback);
    }

    #[test]
    fn source_change_emits_contentupdate_and_resets() {
        let mut s = session();
        s.trigger(AdsEvent::AdsCanceled);
        s.media_mut().swap_source("b.mp4");
        s.media_mut().paused = true;
        s.trigger(MediaEvent::LoadStart);
        assert_eq!(s.state(), AdState::ContentSet);
        let events = s.take_events();
        let update = events
            .iter()
            .find(|e| e.kind == EventType::Ads(AdsEvent::ContentUpdate))
            .unwrap();
        assert_eq!(
            update.payload,
            EventPayload::ContentUpdate {
                old_value: "a.mp4".into(),
                new_value: "b.mp4".into()
            }
        );
    }

    #[test]
    fn initial_source_check_runs_after_one_tick() {
        let mut s = session();
        s.media_mut().current_src = "b.mp4".into();
        s.advance(1);
        assert_eq!(s.context().content_src, "b.mp4");
    }

    #[test]
    fn preset_content_src_suppresses_contentupdate() {
        let mut s = session();
        s.trigger(AdsEvent::AdsCanceled);
        s.set_content_src("b.mp4");
        s.media_mut().swap_source("b.mp4");
        s.trigger(MediaEvent::LoadStart);
        assert_eq!(s.state(), AdState::ContentPlayback);
    }

    #[test]
    fn disabled_restore_is_one_shot() {
        let mut s = session();
        to_preroll(&mut s);
        s.start_linear_ad_mode();
        s.media_mut().swap_source("ad.mp4");
        s.disable_next_snapshot_restore();
        s.end_linear_ad_mode();
        assert_eq!(s.media().src, "ad.mp4");
        assert!(!s.context().disable_next_snapshot_restore);
    }

    #[test]
    fn live_content_plays_muted_behind_ad() {
        let mut media = SimulatedMedia::new("live.m3u8");
        media.duration = f64::INFINITY;
        media.volume = 0.8;
        media.add_class(PlayerClass::Live);
        let mut s = AdsSession::new(media, AdsConfig::default());
        s.trigger(AdsEvent::AdsCanceled);
        s.start_linear_ad_mode();
        assert_eq!(s.state(), AdState::AdPlayback);
        assert!(s.context().snapshot.is_none());
        assert_eq!(s.media().volume, 0.0);
        assert!(!s.media().has_class(PlayerClass::Live));

        s.end_linear_ad_mode();
        assert_eq!(s.media().volume, 0.8);
        assert!(s.media().has_class(PlayerClass::Live));
    }

    #[test]
    fn debug_config_still_transitions() {
        let config = AdsConfig {
            debug: true,
            platform: Platform::desktop(),
            ..AdsConfig::default()
        };
        let mut s = AdsSession::new(SimulatedMedia::new("a.mp4"), config);
        s.trigger(MediaEvent::Play);
        let transitions = s.take_transitions();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].from, AdState::ContentSet);
        assert_eq!(transitions[0].to, AdState::AwaitingAdsReady);
    }
}
