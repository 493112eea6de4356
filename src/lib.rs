//! pdftalk - read paginated documents aloud
//!
//! Turns each page of a document into speech-friendly text and plays the
//! pages back in order through a speech engine, while any number of
//! detached observers follow the playback position and the character range
//! currently being spoken.

pub mod config;
pub mod document;
pub mod error;
pub mod playback;
pub mod speech;
pub mod text;

pub use error::{Result, TalkError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "pdftalk";
