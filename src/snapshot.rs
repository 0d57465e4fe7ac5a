//! Snapshot Manager: save content playback state before a break and put it
//! back afterwards.
//!
//! When the ad played in the same element, restoring means reloading the
//! content source and waiting until the element can seek. That wait is a
//! [`PendingRestore`] advanced by the session, either on `contentcanplay` or
//! on a fixed 50 ms poll, for at most [`RESTORE_MAX_ATTEMPTS`] attempts.

use crate::config::Platform;
use crate::error::MediaError;
use crate::media::{self, MediaElement, MediaSource, TrackId, TrackList, TrackMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const RESTORE_POLL_INTERVAL_MS: u64 = 50;
pub const RESTORE_MAX_ATTEMPTS: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressedTrack {
    pub track: TrackId,
    pub mode: TrackMode,
}

/// Content playback state captured before an ad break.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub ended: bool,
    pub current_src: String,
    pub src: String,
    /// Seconds. Negative means "this far behind the live edge" (iOS live only).
    pub current_time: f64,
    pub media_type: String,
    pub native_poster: Option<String>,
    pub style: Option<String>,
    pub suppressed_remote_tracks: Vec<SuppressedTrack>,
    pub suppressed_tracks: Vec<SuppressedTrack>,
}

/// Capture the element's state and disable every text track.
pub fn capture<M: MediaElement + ?Sized>(media: &mut M, platform: &Platform) -> Snapshot {
    let current_time = if platform.ios && media::is_live(media, platform) {
        // Record how far behind live we are.
        match first_seekable_end(media) {
            Some(end) => media.current_time() - end,
            None => media.current_time(),
        }
    } else {
        media.current_time()
    };

    let suppressed_remote_tracks = suppress_tracks(media, TrackList::Remote);
    let suppressed_tracks = suppress_tracks(media, TrackList::All);

    Snapshot {
        ended: media.ended(),
        current_src: media.current_src(),
        src: media.src(),
        current_time,
        media_type: media.current_type(),
        native_poster: media.poster(),
        style: media.style(),
        suppressed_remote_tracks,
        suppressed_tracks,
    }
}

fn suppress_tracks<M: MediaElement + ?Sized>(media: &mut M, list: TrackList) -> Vec<SuppressedTrack> {
    let tracks = media.text_tracks(list);
    let mut suppressed = Vec::with_capacity(tracks.len());
    for track in tracks {
        suppressed.push(SuppressedTrack {
            track: track.id,
            mode: track.mode,
        });
        media.set_track_mode(list, track.id, TrackMode::Disabled);
    }
    suppressed
}

fn first_seekable_end<M: MediaElement + ?Sized>(media: &M) -> Option<f64> {
    media
        .seekable()
        .and_then(|ranges| ranges.first().map(|range| range.end))
}

/// Whether the element was reused for the ad: either its `src` attribute or
/// the source it renders moved away from the snapshot's.
pub fn is_recycled<M: MediaElement + ?Sized>(media: &M, snapshot: &Snapshot) -> bool {
    media.src() != snapshot.src || media.current_src() != snapshot.current_src
}

/// Put every suppressed track back to its saved mode.
///
/// The full list is restored before the remote list: a remote track appears
/// in both, and its remote entry holds the mode it had before capture.
pub fn restore_tracks<M: MediaElement + ?Sized>(media: &mut M, snapshot: &Snapshot) {
    for saved in &snapshot.suppressed_tracks {
        media.set_track_mode(TrackList::All, saved.track, saved.mode);
    }
    for saved in &snapshot.suppressed_remote_tracks {
        media.set_track_mode(TrackList::Remote, saved.track, saved.mode);
    }
}

/// Whether the element has loaded enough of the source to apply a seek.
pub fn ready_to_resume<M: MediaElement + ?Sized>(media: &M) -> bool {
    if media.ready_state() > 1 {
        return true;
    }
    match media.seekable() {
        None => true,
        Some(ranges) => !ranges.is_empty(),
    }
}

/// Start restoring `snapshot`.
///
/// Poster and inline style are reinstated first. If the element was
/// recycled, the content source is reloaded and a [`PendingRestore`] is
/// returned for the caller to drive; otherwise tracks are restored and
/// playback resumes immediately.
pub fn begin_restore<M: MediaElement + ?Sized>(
    media: &mut M,
    snapshot: &Snapshot,
    recycled: bool,
) -> Option<PendingRestore> {
    if let Some(poster) = &snapshot.native_poster {
        media.set_poster(poster);
    }
    media.set_style(snapshot.style.as_deref().unwrap_or(""));

    if recycled {
        debug!(src = %snapshot.current_src, "element recycled, reloading content");
        media.set_source(MediaSource {
            src: snapshot.current_src.clone(),
            media_type: snapshot.media_type.clone(),
        });
        media.load();
        return Some(PendingRestore::new(snapshot.clone()));
    }

    if !media.ended() || !snapshot.ended {
        restore_tracks(media, snapshot);
        if let Err(e) = media.play() {
            warn!("failed to resume content after an ad: {}", e);
        }
    }
    None
}

/// Seek back to the saved position and play unless the content had ended.
pub fn resume<M: MediaElement + ?Sized>(
    media: &mut M,
    snapshot: &Snapshot,
    platform: &Platform,
) -> Result<(), MediaError> {
    if platform.ios && media::is_live(media, platform) {
        if snapshot.current_time < 0.0 {
            // Playback was behind real time, so seek backwards to match.
            let target = match first_seekable_end(media) {
                Some(end) => end + snapshot.current_time,
                None => media.current_time(),
            };
            media.seek(target)?;
        }
    } else if snapshot.ended {
        let duration = media.duration();
        media.seek(duration)?;
    } else {
        media.seek(snapshot.current_time)?;
    }

    if !snapshot.ended {
        media.play()?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Resumed,
    Retry,
    /// Out of attempts; resumed anyway.
    Exhausted,
}

/// A restore waiting for a reloaded element to become seekable.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRestore {
    pub snapshot: Snapshot,
    pub attempts_left: u8,
    pub tracks_restored: bool,
}

impl PendingRestore {
    pub fn new(snapshot: Snapshot) -> Self {
        PendingRestore {
            snapshot,
            attempts_left: RESTORE_MAX_ATTEMPTS,
            tracks_restored: false,
        }
    }

    pub fn attempts_made(&self) -> u8 {
        RESTORE_MAX_ATTEMPTS - self.attempts_left
    }

    /// Restore track modes once metadata for the content is available.
    pub fn restore_tracks_once<M: MediaElement + ?Sized>(&mut self, media: &mut M) {
        if !self.tracks_restored {
            restore_tracks(media, &self.snapshot);
            self.tracks_restored = true;
        }
    }

    /// Check readiness once and resume if possible.
    pub fn attempt<M: MediaElement + ?Sized>(
        &mut self,
        media: &mut M,
        platform: &Platform,
    ) -> AttemptOutcome {
        self.attempts_left = self.attempts_left.saturating_sub(1);

        if ready_to_resume(media) {
            self.finish(media, platform);
            return AttemptOutcome::Resumed;
        }
        if self.attempts_left > 0 {
            return AttemptOutcome::Retry;
        }

        warn!(
            attempts = RESTORE_MAX_ATTEMPTS,
            "content never became seekable after an advertisement; resuming anyway"
        );
        self.finish(media, platform);
        AttemptOutcome::Exhausted
    }

    fn finish<M: MediaElement + ?Sized>(&mut self, media: &mut M, platform: &Platform) {
        self.restore_tracks_once(media);
        if let Err(e) = resume(media, &self.snapshot, platform) {
            warn!("failed to resume the content after an advertisement: {}", e);
        }
    }
}
