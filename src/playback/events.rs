//! Events pushed to observers

use super::state::PlaybackState;
use serde::Serialize;

/// Something an observer should render
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Phase, position or readiness changed
    StateChanged(PlaybackState),

    /// The engine moved on to characters `start..end` of `section`
    HighlightRangeChanged {
        section: usize,
        start: usize,
        end: usize,
    },

    /// The engine failed and playback stopped
    EngineError { message: String },
}

impl Event {
    /// Encode as one line of JSON for out-of-process observers
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
