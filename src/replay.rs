//! Replaying recorded event traces against [`SimulatedMedia`].
//!
//! A trace is JSON:
//!
//! ```json
//! { "src": "movie.mp4",
//!   "steps": [ {"event": "play"}, {"advance": 100},
//!              {"call": "startLinearAdMode"}, {"media": {"currentTime": 42.5}} ] }
//! ```

use crate::config::AdsConfig;
use crate::error::AdsResult;
use crate::event::EventType;
use crate::media::TimeRange;
use crate::session::{AdsSession, Transition};
use crate::sim::SimulatedMedia;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Trace {
    #[serde(default = "default_src")]
    pub src: String,
    pub steps: Vec<TraceStep>,
}

fn default_src() -> String {
    "content.mp4".to_string()
}

impl Trace {
    pub fn from_json(data: &str) -> AdsResult<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn load(path: &Path) -> AdsResult<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraceStep {
    Event(EventType),
    Advance(u64),
    Call(SessionCall),
    Media(MediaPatch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionCall {
    StartLinearAdMode,
    EndLinearAdMode,
    SkipLinearAdMode,
    Reset,
    DisableNextSnapshotRestore,
}

/// Changes to apply to the simulated element. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaPatch {
    pub paused: Option<bool>,
    pub ended: Option<bool>,
    pub current_time: Option<f64>,
    pub duration: Option<f64>,
    /// JSON has no infinity; `true` sets an infinite duration.
    pub live: Option<bool>,
    pub volume: Option<f64>,
    /// Swap the element's source, as an ad reusing the element would.
    pub src: Option<String>,
    pub current_src: Option<String>,
    pub ready_state: Option<u8>,
    pub seekable: Option<Vec<TimeRange>>,
    pub plays_inline: Option<bool>,
    pub reject_play: Option<String>,
}

impl MediaPatch {
    pub fn apply(&self, media: &mut SimulatedMedia) {
        if let Some(v) = self.paused {
            media.paused = v;
        }
        if let Some(v) = self.ended {
            media.ended = v;
        }
        if let Some(v) = self.current_time {
            media.current_time = v;
        }
        if let Some(v) = self.duration {
            media.duration = v;
        }
        if self.live == Some(true) {
            media.duration = f64::INFINITY;
        }
        if let Some(v) = self.volume {
            media.volume = v;
        }
        if let Some(src) = &self.src {
            media.swap_source(src);
        }
        if let Some(v) = &self.current_src {
            media.current_src = v.clone();
        }
        if let Some(v) = self.ready_state {
            media.ready_state = v;
        }
        if let Some(v) = &self.seekable {
            media.seekable = Some(v.clone());
        }
        if let Some(v) = self.plays_inline {
            media.plays_inline = v;
        }
        if let Some(reason) = &self.reject_play {
            media.reject_play = Some(reason.clone());
        }
    }
}

/// What one step did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub at_ms: u64,
    pub transitions: Vec<Transition>,
    pub events: Vec<String>,
}

/// Run `trace` from a fresh session and report every step.
pub fn run(trace: &Trace, config: AdsConfig) -> (AdsSession<SimulatedMedia>, Vec<StepReport>) {
    let mut session = AdsSession::new(SimulatedMedia::new(&trace.src), config);
    let mut reports = Vec::with_capacity(trace.steps.len() + 1);
    reports.push(report(&mut session, 0));

    for (i, step) in trace.steps.iter().enumerate() {
        debug!(step = i + 1, ?step, "replaying");
        match step {
            TraceStep::Event(kind) => session.trigger(*kind),
            TraceStep::Advance(ms) => session.advance(*ms),
            TraceStep::Call(call) => match call {
                SessionCall::StartLinearAdMode => session.start_linear_ad_mode(),
                SessionCall::EndLinearAdMode => session.end_linear_ad_mode(),
                SessionCall::SkipLinearAdMode => session.skip_linear_ad_mode(),
                SessionCall::Reset => session.reset(),
                SessionCall::DisableNextSnapshotRestore => session.disable_next_snapshot_restore(),
            },
            TraceStep::Media(patch) => patch.apply(session.media_mut()),
        }
        reports.push(report(&mut session, i + 1));
    }
    (session, reports)
}

fn report(session: &mut AdsSession<SimulatedMedia>, step: usize) -> StepReport {
    StepReport {
        step,
        at_ms: session.now(),
        transitions: session.take_transitions(),
        events: session
            .take_events()
            .iter()
            .map(|e| e.kind.to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AdState;

    const TRACE: &str = r#"{
        "src": "movie.mp4",
        "steps": [
            {"event": "adsready"},
            {"event": "play"},
            {"call": "startLinearAdMode"},
            {"media": {"src": "ad.mp4"}},
            {"event": "playing"},
            {"call": "endLinearAdMode"},
            {"media": {"readyState": 4}},
            {"advance": 50}
        ]
    }"#;

    #[test]
    fn parses_every_step_kind() {
        let trace = Trace::from_json(TRACE).unwrap();
        assert_eq!(trace.src, "movie.mp4");
        assert_eq!(trace.steps[0], TraceStep::Event("adsready".parse().unwrap()));
        assert_eq!(trace.steps[2], TraceStep::Call(SessionCall::StartLinearAdMode));
        assert_eq!(trace.steps[7], TraceStep::Advance(50));
        assert!(matches!(trace.steps[3], TraceStep::Media(_)));
    }

    #[test]
    fn unknown_event_name_is_rejected() {
        assert!(Trace::from_json(r#"{"steps": [{"event": "explode"}]}"#).is_err());
    }

    #[test]
    fn replay_reports_transitions_and_events() {
        let trace = Trace::from_json(TRACE).unwrap();
        let (session, reports) = run(&trace, AdsConfig::default());
        assert_eq!(reports.len(), trace.steps.len() + 1);

        let play = &reports[2];
        assert_eq!(play.transitions[0].to, AdState::AwaitingPreroll);
        assert!(play.events.contains(&"readyforpreroll".to_string()));

        // The ad reused the element, so its `playing` is swallowed.
        assert!(reports[5].events.is_empty());

        assert_eq!(session.state(), AdState::ContentResuming);
        assert_eq!(session.media().src, "movie.mp4");
        assert!(session.context().pending_restore.is_none());
    }

    #[test]
    fn live_patch_sets_infinite_duration() {
        let mut media = SimulatedMedia::new("a.mp4");
        MediaPatch {
            live: Some(true),
            ..MediaPatch::default()
        }
        .apply(&mut media);
        assert!(media.duration.is_infinite());
    }
}
