//! Playback state shared with observers

use crate::speech::VoicePreferences;
use serde::Serialize;

/// Default rate and pitch control position, close to normal speed
pub const DEFAULT_PERCENT: u8 = 33;

/// Playback mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No document, or stopped
    Idle,
    Playing,
    Paused,
    /// The last section finished without a pause
    Finished,
}

/// Convert a 0-100 control position into a 0.5x-2.0x multiplier
pub fn percent_to_multiplier(percent: u8) -> f32 {
    0.5 + (f32::from(percent.min(100)) / 100.0) * 1.5
}

/// Speech settings as the reader sees them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpeechSettings {
    pub rate_percent: u8,
    pub pitch_percent: u8,
    /// Index into the voice catalog
    pub voice_index: usize,
}

impl SpeechSettings {
    pub fn rate_multiplier(&self) -> f32 {
        percent_to_multiplier(self.rate_percent)
    }

    pub fn pitch_multiplier(&self) -> f32 {
        percent_to_multiplier(self.pitch_percent)
    }
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            rate_percent: DEFAULT_PERCENT,
            pitch_percent: DEFAULT_PERCENT,
            voice_index: 0,
        }
    }
}

/// Snapshot of the player, published on every transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackState {
    pub phase: Phase,
    /// `None` when no sections are loaded
    pub current_index: Option<usize>,
    pub total_sections: usize,
    /// A speech engine is attached
    pub tts_ready: bool,
    pub settings: SpeechSettings,
}

impl PlaybackState {
    /// "3/10", or "0/0" with nothing loaded
    pub fn page_label(&self) -> String {
        match self.current_index {
            Some(index) => format!("{}/{}", index + 1, self.total_sections),
            None => "0/0".to_string(),
        }
    }

    pub fn can_prev(&self) -> bool {
        matches!(self.current_index, Some(index) if index > 0)
    }

    pub fn can_next(&self) -> bool {
        matches!(self.current_index, Some(index) if index + 1 < self.total_sections)
    }

    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Playing
    }
}

/// Characters of the current section being spoken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HighlightRange {
    pub start: usize,
    pub end: usize,
}

/// Startup settings for a player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackOptions {
    pub rate_percent: u8,
    pub pitch_percent: u8,
    /// Explicit voice choice; `None` takes the catalog's default
    pub voice_index: Option<usize>,
    pub voices: VoicePreferences,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            rate_percent: DEFAULT_PERCENT,
            pitch_percent: DEFAULT_PERCENT,
            voice_index: None,
            voices: VoicePreferences::default(),
        }
    }
}
