//! In-memory media element.
//!
//! Passive by construction: calling `play()` does not emit `playing`. The
//! host (a test, or the CLI replaying a trace) decides which events happen
//! and when, which keeps sessions fully deterministic.

use crate::error::MediaError;
use crate::media::{
    MediaElement, MediaSource, PlayerClass, TextTrack, TimeRange, TrackId, TrackList, TrackMode,
};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize)]
pub struct SimulatedMedia {
    pub paused: bool,
    pub ended: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub src: String,
    pub current_src: String,
    pub media_type: String,
    pub ready_state: u8,
    pub seekable: Option<Vec<TimeRange>>,
    pub remote_tracks: Vec<TextTrack>,
    /// In-band tracks; the `All` list is remote tracks followed by these.
    pub inband_tracks: Vec<TextTrack>,
    pub poster: Option<String>,
    pub style: Option<String>,
    pub classes: BTreeSet<PlayerClass>,
    pub plays_inline: bool,
    pub width: u32,
    pub height: u32,
    pub placeholder: Option<(u32, u32)>,
    /// When set, `play()` fails with this reason.
    pub reject_play: Option<String>,
    /// When set, `seek()` fails with `NotSeekable`.
    pub reject_seek: bool,

    // Call records.
    pub play_calls: usize,
    pub pause_calls: usize,
    pub load_calls: usize,
    pub seeks: Vec<f64>,
    pub sources_set: Vec<MediaSource>,
}

impl SimulatedMedia {
    /// A paused, fully loaded on-demand element at time zero.
    pub fn new(src: &str) -> Self {
        SimulatedMedia {
            paused: true,
            ended: false,
            current_time: 0.0,
            duration: 120.0,
            volume: 1.0,
            src: src.to_string(),
            current_src: src.to_string(),
            media_type: "video/mp4".to_string(),
            ready_state: 4,
            seekable: Some(vec![TimeRange {
                start: 0.0,
                end: 120.0,
            }]),
            remote_tracks: Vec::new(),
            inband_tracks: Vec::new(),
            poster: None,
            style: None,
            classes: BTreeSet::new(),
            plays_inline: false,
            width: 640,
            height: 360,
            placeholder: None,
            reject_play: None,
            reject_seek: false,
            play_calls: 0,
            pause_calls: 0,
            load_calls: 0,
            seeks: Vec::new(),
            sources_set: Vec::new(),
        }
    }

    /// Simulate an ad implementation swapping the element's source.
    pub fn swap_source(&mut self, src: &str) {
        self.src = src.to_string();
        self.current_src = src.to_string();
        self.current_time = 0.0;
    }

    fn track_mut(&mut self, list: TrackList, id: TrackId) -> Option<&mut TextTrack> {
        match list {
            TrackList::Remote => self.remote_tracks.iter_mut().find(|t| t.id == id),
            TrackList::All => self
                .remote_tracks
                .iter_mut()
                .chain(self.inband_tracks.iter_mut())
                .find(|t| t.id == id),
        }
    }
}

impl MediaElement for SimulatedMedia {
    fn paused(&self) -> bool {
        self.paused
    }

    fn ended(&self) -> bool {
        self.ended
    }

    fn play(&mut self) -> Result<(), MediaError> {
        self.play_calls += 1;
        if let Some(reason) = &self.reject_play {
            return Err(MediaError::PlayRejected(reason.clone()));
        }
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.pause_calls += 1;
        self.paused = true;
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }

    fn seek(&mut self, time: f64) -> Result<(), MediaError> {
        if self.reject_seek {
            return Err(MediaError::NotSeekable);
        }
        self.seeks.push(time);
        self.current_time = time;
        if time < self.duration {
            self.ended = false;
        }
        Ok(())
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    fn src(&self) -> String {
        self.src.clone()
    }

    fn current_src(&self) -> String {
        self.current_src.clone()
    }

    fn current_type(&self) -> String {
        self.media_type.clone()
    }

    fn set_source(&mut self, source: MediaSource) {
        self.src = source.src.clone();
        self.current_src = source.src.clone();
        self.media_type = source.media_type.clone();
        self.ready_state = 0;
        if let Some(ranges) = &mut self.seekable {
            ranges.clear();
        }
        self.sources_set.push(source);
    }

    fn load(&mut self) {
        self.load_calls += 1;
    }

    fn ready_state(&self) -> u8 {
        self.ready_state
    }

    fn seekable(&self) -> Option<Vec<TimeRange>> {
        self.seekable.clone()
    }

    fn text_tracks(&self, list: TrackList) -> Vec<TextTrack> {
        match list {
            TrackList::Remote => self.remote_tracks.clone(),
            TrackList::All => self
                .remote_tracks
                .iter()
                .chain(self.inband_tracks.iter())
                .cloned()
                .collect(),
        }
    }

    fn set_track_mode(&mut self, list: TrackList, id: TrackId, mode: TrackMode) {
        if let Some(track) = self.track_mut(list, id) {
            track.mode = mode;
        }
    }

    fn poster(&self) -> Option<String> {
        self.poster.clone()
    }

    fn set_poster(&mut self, poster: &str) {
        self.poster = Some(poster.to_string());
    }

    fn remove_poster(&mut self) {
        self.poster = None;
    }

    fn style(&self) -> Option<String> {
        self.style.clone()
    }

    fn set_style(&mut self, style: &str) {
        self.style = Some(style.to_string());
    }

    fn has_class(&self, class: PlayerClass) -> bool {
        self.classes.contains(&class)
    }

    fn add_class(&mut self, class: PlayerClass) {
        self.classes.insert(class);
    }

    fn remove_class(&mut self, class: PlayerClass) {
        self.classes.remove(&class);
    }

    fn plays_inline(&self) -> bool {
        self.plays_inline
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn show_placeholder(&mut self, width: u32, height: u32) {
        self.placeholder = Some((width, height));
    }

    fn remove_placeholder(&mut self) {
        self.placeholder = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_element_is_paused_and_ready() {
        let media = SimulatedMedia::new("a.mp4");
        assert!(media.paused());
        assert_eq!(media.current_src(), "a.mp4");
        assert!(media.ready_state() > 1);
    }

    #[test]
    fn set_source_resets_readiness() {
        let mut media = SimulatedMedia::new("a.mp4");
        media.set_source(MediaSource {
            src: "b.mp4".into(),
            media_type: "video/mp4".into(),
        });
        assert_eq!(media.src(), "b.mp4");
        assert_eq!(media.ready_state(), 0);
        assert_eq!(media.seekable(), Some(vec![]));
    }

    #[test]
    fn rejected_play_stays_paused() {
        let mut media = SimulatedMedia::new("a.mp4");
        media.reject_play = Some("autoplay blocked".into());
        assert!(media.play().is_err());
        assert!(media.paused());
        assert_eq!(media.play_calls, 1);
    }

    #[test]
    fn all_list_covers_remote_and_inband() {
        let mut media = SimulatedMedia::new("a.mp4");
        media.remote_tracks.push(TextTrack::new(1, "captions", TrackMode::Showing));
        media.inband_tracks.push(TextTrack::new(2, "metadata", TrackMode::Hidden));
        assert_eq!(media.text_tracks(TrackList::Remote).len(), 1);
        assert_eq!(media.text_tracks(TrackList::All).len(), 2);
        media.set_track_mode(TrackList::All, TrackId(2), TrackMode::Disabled);
        assert_eq!(media.inband_tracks[0].mode, TrackMode::Disabled);
    }
}
