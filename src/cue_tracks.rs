//! Metadata text tracks carrying ad cues.
//!
//! Integrations implement [`CueTrackHandler`] to decide which cues are ads
//! and how they are identified; the defaults accept every cue and use its
//! own id.

use crate::media::{MediaElement, TextTrack, TrackList};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    #[serde(default)]
    pub id: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub text: String,
}

pub trait CueTrackHandler {
    /// Called for each metadata track before it is processed.
    fn set_metadata_track_mode<M: MediaElement + ?Sized>(&self, _media: &mut M, _track: &TextTrack) {}

    /// The ad data carried by `cue`, or `None` if it is not an ad cue.
    fn supported_ad_cue(&self, cue: &Cue) -> Option<Cue> {
        Some(cue.clone())
    }

    fn cue_id(&self, cue: &Cue) -> Option<String> {
        cue.id.clone()
    }
}

/// Handler with every default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCueHandler;

impl CueTrackHandler for DefaultCueHandler {}

/// Applies a callback to metadata tracks, now or as they are added.
pub struct MetadataTracks<H, F> {
    handler: H,
    process: F,
    waiting: bool,
}

impl<H, F> MetadataTracks<H, F>
where
    H: CueTrackHandler,
    F: FnMut(&TextTrack),
{
    /// Process every metadata track the element has. If it has no tracks
    /// at all, wait for [`MetadataTracks::track_added`].
    pub fn process<M: MediaElement + ?Sized>(handler: H, media: &mut M, process: F) -> Self {
        let mut this = MetadataTracks {
            handler,
            process,
            waiting: false,
        };
        let tracks = media.text_tracks(TrackList::All);
        if tracks.is_empty() {
            this.waiting = true;
        } else {
            for track in &tracks {
                this.set_mode_and_process(media, track);
            }
        }
        this
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// The element reported a new track.
    pub fn track_added<M: MediaElement + ?Sized>(&mut self, media: &mut M, track: &TextTrack) {
        if self.waiting {
            self.set_mode_and_process(media, track);
        }
    }

    fn set_mode_and_process<M: MediaElement + ?Sized>(&mut self, media: &mut M, track: &TextTrack) {
        if track.is_metadata() {
            self.handler.set_metadata_track_mode(media, track);
            (self.process)(track);
        }
    }
}

/// Run `process_cue(data, id, start_time)` for every supported, not yet
/// seen cue. Returns how many were processed.
///
/// Seen ids are tracked per call.
pub fn process_ad_track<H, P>(
    handler: &H,
    cues: &[Cue],
    mut process_cue: P,
    mut cancel_ads: Option<&mut dyn FnMut(&Cue)>,
) -> usize
where
    H: CueTrackHandler + ?Sized,
    P: FnMut(&Cue, Option<&str>, f64),
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut processed = 0;

    for cue in cues {
        let Some(data) = handler.supported_ad_cue(cue) else {
            warn!(start = cue.start_time, "Skipping as this is not a supported ad cue.");
            continue;
        };

        let id = handler.cue_id(cue);
        if let Some(id) = id.as_deref() {
            if seen.contains(id) {
                debug!("Skipping ad already seen with ID {}", id);
                continue;
            }
        }

        process_cue(&data, id.as_deref(), cue.start_time);
        processed += 1;

        if let Some(id) = id.filter(|id| !id.is_empty()) {
            seen.insert(id);
        }
        if let Some(cancel) = cancel_ads.as_mut() {
            cancel(&data);
        }
    }
    processed
}
