//! Error types for pdftalk

use std::io;
use thiserror::Error;

/// Main error type for pdftalk
#[derive(Error, Debug)]
pub enum TalkError {
    /// A playback command was issued while no sections are loaded
    #[error("No document loaded")]
    NoDocumentLoaded,

    #[error("Section index {index} out of range (have {len} sections)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The document could not be read; prior sections are left untouched
    #[error("Document load failed: {0}")]
    LoadFailed(String),

    /// A newer load was requested before this one finished
    #[error("Document load superseded by a newer load")]
    LoadSuperseded,

    #[error("Speech engine error: {0}")]
    Engine(String),

    #[error("Speech engine not ready")]
    EngineNotReady,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The playback event loop has shut down
    #[error("Playback loop disconnected")]
    Disconnected,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for pdftalk operations
pub type Result<T> = std::result::Result<T, TalkError>;

impl From<&str> for TalkError {
    fn from(s: &str) -> Self {
        TalkError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for TalkError {
    fn from(e: serde_json::Error) -> Self {
        TalkError::Other(format!("JSON error: {}", e))
    }
}
