//! Ad-lifecycle orchestration for a media element.
//!
//! Sequences when ads may play around content, saves and restores content
//! playback across a break, and renames raw element events so integrators
//! see `ad*`/`content*` events. The host drives an [`session::AdsSession`]
//! with events and clock advances; the CLI replays recorded traces.

pub mod cancel_play;
pub mod config;
pub mod content_update;
pub mod cue_tracks;
pub mod error;
pub mod event;
pub mod macros;
pub mod media;
pub mod redispatch;
pub mod replay;
pub mod session;
pub mod sim;
pub mod snapshot;
pub mod state;
pub mod timer;
