//! Content-source watcher.
//!
//! Emits `contentupdate` when the element starts rendering a different
//! source outside an ad break. Checked on every delivered `loadstart` and
//! once shortly after the session starts.

use crate::event::Event;
use crate::media::MediaElement;
use crate::session::AdsContext;
use crate::state::AdState;
use tracing::debug;

/// Compare the element's source with the remembered one.
///
/// Returns the `contentupdate` event to deliver and remembers the new source.
pub fn check<M: MediaElement + ?Sized>(media: &M, ctx: &mut AdsContext) -> Option<Event> {
    if ctx.state == AdState::AdPlayback {
        return None;
    }
    let src = media.current_src();
    if src == ctx.content_src {
        return None;
    }
    let old = std::mem::replace(&mut ctx.content_src, src.clone());
    debug!(old = %old, new = %src, "content source changed");
    Some(Event::content_update(old, src))
}
