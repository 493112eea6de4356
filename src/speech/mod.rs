//! Speech synthesis: engine abstraction, voices and backends

pub mod backends;
pub mod engine;
pub mod voices;

pub use engine::{SpeechEngine, UtteranceId, UtteranceListener, VoiceDescriptor};
pub use voices::{select_catalog, VoiceCatalog, VoicePreferences};

/// Create the platform's native speech engine
pub fn create_engine() -> crate::Result<Box<dyn SpeechEngine>> {
    let engine = backends::native::NativeEngine::new()?;
    log::info!("Native speech engine initialized");
    Ok(Box::new(engine))
}
