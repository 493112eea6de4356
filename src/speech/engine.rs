//! Speech engine abstraction
//!
//! The player drives any engine through this trait and hears back from it
//! through an [`UtteranceListener`]. Engines report progress from their
//! own threads, at any time, including from inside `stop()`.

use crate::Result;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Identifies one dispatched utterance
///
/// The serial makes every dispatch unique, even when the same section is
/// spoken twice in a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UtteranceId {
    /// Section being spoken
    pub section: usize,
    /// Dispatch counter, never reused by one player
    pub serial: u64,
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "section_{}#{}", self.section, self.serial)
    }
}

/// A voice offered by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceDescriptor {
    /// Engine-specific identifier passed back to [`SpeechEngine::set_voice`]
    pub id: String,
    pub display_name: String,
    /// BCP 47 style tag such as "en-US"
    pub locale: String,
}

impl VoiceDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            locale: locale.into(),
        }
    }

    /// Primary language subtag ("en" for "en-US")
    pub fn language(&self) -> &str {
        self.locale.split(&['-', '_'][..]).next().unwrap_or("")
    }

    /// Region subtag ("US" for "en-US"), if present
    pub fn country(&self) -> Option<&str> {
        self.locale
            .split(&['-', '_'][..])
            .skip(1)
            .find(|part| part.len() == 2 || (part.len() == 3 && part.chars().all(|c| c.is_ascii_digit())))
    }

    /// Label for voice pickers: "Samantha (en-US)"
    pub fn label(&self) -> String {
        if self.locale.is_empty() {
            self.display_name.clone()
        } else {
            format!("{} ({})", self.display_name, self.locale)
        }
    }
}

/// Receives progress reports from a speech engine
///
/// Implementations must return quickly and must not call back into the
/// engine.
pub trait UtteranceListener: Send + Sync {
    fn on_utterance_start(&self, id: UtteranceId);

    /// The utterance finished playing naturally
    fn on_utterance_done(&self, id: UtteranceId);

    fn on_utterance_error(&self, id: UtteranceId);

    /// The engine is about to speak characters `start..end` of the text
    /// passed to the matching `speak` call
    fn on_range_progress(&self, id: UtteranceId, start: usize, end: usize);
}

/// Capability to speak text
pub trait SpeechEngine: Send {
    /// Register the listener that receives all progress callbacks
    fn set_listener(&mut self, listener: Arc<dyn UtteranceListener>) -> Result<()>;

    /// Speak `text`, replacing anything still queued
    fn speak(&mut self, text: &str, id: UtteranceId) -> Result<()>;

    /// Silence the active utterance
    fn stop(&mut self) -> Result<()>;

    /// Speech rate as a multiple of normal speed (0.5 to 2.0)
    fn set_rate(&mut self, rate: f32) -> Result<()>;

    /// Pitch as a multiple of normal pitch (0.5 to 2.0)
    fn set_pitch(&mut self, pitch: f32) -> Result<()>;

    fn set_voice(&mut self, voice_id: &str) -> Result<()>;

    /// Every voice the engine offers
    fn list_voices(&self) -> Result<Vec<VoiceDescriptor>>;
}
