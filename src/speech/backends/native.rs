//! Native speech backend using the tts crate
//!
//! The `tts` crate provides a unified interface to:
//! - Speech Dispatcher on Linux
//! - AVFoundation on macOS/iOS
//! - WinRT/SAPI on Windows
//!
//! It reports when an utterance begins and ends, but not word ranges, so
//! highlighting stays at section granularity with this backend.

use crate::speech::{SpeechEngine, UtteranceId, UtteranceListener, VoiceDescriptor};
use crate::{Result, TalkError};
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tts::{Features, Tts as TtsCrate, UtteranceId as TtsUtteranceId, Voice};

/// What the platform reported for a handle we had not registered yet
#[derive(Debug, Clone, Copy, Default)]
struct EarlyReport {
    began: bool,
    ended: bool,
    stopped: bool,
}

struct TrackerState<K> {
    pending: HashMap<K, UtteranceId>,
    early: HashMap<K, EarlyReport>,
}

/// Maps platform utterance handles to our ids
///
/// Some platforms fire callbacks on the calling thread from inside
/// `speak()` or `stop()`, before the handle is known. The lock is only held
/// for map updates, never while calling the platform or the listener, and
/// reports for unknown handles are kept until the handle is registered.
struct UtteranceTracker<K> {
    state: Arc<Mutex<TrackerState<K>>>,
}

impl<K> Clone for UtteranceTracker<K> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<K: Hash + Eq> UtteranceTracker<K> {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState {
                pending: HashMap::new(),
                early: HashMap::new(),
            })),
        }
    }

    fn began(&self, handle: K, listener: &dyn UtteranceListener) {
        let id = {
            let mut state = self.state.lock();
            match state.pending.get(&handle).copied() {
                Some(id) => Some(id),
                None => {
                    state.early.entry(handle).or_default().began = true;
                    None
                }
            }
        };
        if let Some(id) = id {
            listener.on_utterance_start(id);
        }
    }

    fn ended(&self, handle: K, listener: &dyn UtteranceListener) {
        let id = {
            let mut state = self.state.lock();
            let id = state.pending.remove(&handle);
            if id.is_none() {
                state.early.entry(handle).or_default().ended = true;
            }
            id
        };
        if let Some(id) = id {
            listener.on_utterance_done(id);
        }
    }

    /// Stopped utterances never complete; forget them
    fn stopped(&self, handle: K) {
        let mut state = self.state.lock();
        match state.pending.remove(&handle) {
            Some(id) => debug!("Utterance {} stopped", id),
            None => state.early.entry(handle).or_default().stopped = true,
        }
    }

    /// Record that `handle` speaks `id`, then replay anything reported early
    fn register(&self, handle: K, id: UtteranceId, listener: Option<&dyn UtteranceListener>) {
        let early = {
            let mut state = self.state.lock();
            let early = state.early.remove(&handle).unwrap_or_default();
            if !early.ended && !early.stopped {
                state.pending.insert(handle, id);
            }
            early
        };

        let Some(listener) = listener else {
            return;
        };
        if early.began {
            listener.on_utterance_start(id);
        }
        if early.ended {
            listener.on_utterance_done(id);
        }
    }

    #[cfg(test)]
    fn is_tracking(&self, handle: K) -> bool {
        self.state.lock().pending.contains_key(&handle)
    }
}

/// Queue one utterance through `speak` and track the handle it returns
///
/// `speak` may report progress for its own handle before returning.
fn speak_tracked<K, F>(
    tracker: &UtteranceTracker<K>,
    listener: Option<&dyn UtteranceListener>,
    id: UtteranceId,
    speak: F,
) -> Result<()>
where
    K: Hash + Eq,
    F: FnOnce() -> Result<Option<K>>,
{
    if let Some(handle) = speak()? {
        tracker.register(handle, id, listener);
    }
    Ok(())
}

/// Native TTS backend using the tts crate
pub struct NativeEngine {
    /// The tts crate's TTS instance
    tts: TtsCrate,

    /// Features the platform backend supports
    features: Features,

    /// Voices queried once at startup
    voices: Vec<Voice>,

    tracker: UtteranceTracker<TtsUtteranceId>,

    listener: Option<Arc<dyn UtteranceListener>>,
}

impl NativeEngine {
    /// Create a new native speech engine
    ///
    /// Initializes the platform-appropriate TTS backend
    pub fn new() -> Result<Self> {
        debug!("Creating native TTS backend");

        let tts = TtsCrate::default()
            .map_err(|e| TalkError::Engine(format!("Failed to initialize TTS: {}", e)))?;
        let features = tts.supported_features();

        let voices = if features.voice {
            tts.voices().unwrap_or_else(|e| {
                warn!("Failed to list voices: {}", e);
                Vec::new()
            })
        } else {
            Vec::new()
        };

        if !features.utterance_callbacks {
            warn!("Utterance callbacks not supported on this platform; pages will not advance automatically");
        }

        debug!("Native TTS backend created with {} voices", voices.len());

        Ok(Self {
            tts,
            features,
            voices,
            tracker: UtteranceTracker::new(),
            listener: None,
        })
    }

    fn engine_err(what: &str, e: impl std::fmt::Display) -> TalkError {
        error!("Failed to {}: {}", what, e);
        TalkError::Engine(format!("Failed to {}: {}", what, e))
    }
}

/// Map a multiplier of normal (0.5 to 2.0) onto a platform range
///
/// Piecewise linear around the platform's normal value: 0.5 lands on
/// `min`, 1.0 on `normal` and 2.0 on `max`.
pub fn scale_to_platform(multiplier: f32, min: f32, normal: f32, max: f32) -> f32 {
    let m = multiplier.clamp(0.5, 2.0);
    let value = if m < 1.0 {
        normal - (1.0 - m) / 0.5 * (normal - min)
    } else {
        normal + (m - 1.0) * (max - normal)
    };
    value.clamp(min.min(max), max.max(min))
}

impl SpeechEngine for NativeEngine {
    fn set_listener(&mut self, listener: Arc<dyn UtteranceListener>) -> Result<()> {
        if !self.features.utterance_callbacks {
            return Ok(());
        }
        self.listener = Some(listener.clone());

        let tracker = self.tracker.clone();
        let on_begin = listener.clone();
        self.tts
            .on_utterance_begin(Some(Box::new(move |utterance| {
                tracker.began(utterance, on_begin.as_ref());
            })))
            .map_err(|e| Self::engine_err("register begin callback", e))?;

        let tracker = self.tracker.clone();
        let on_end = listener;
        self.tts
            .on_utterance_end(Some(Box::new(move |utterance| {
                tracker.ended(utterance, on_end.as_ref());
            })))
            .map_err(|e| Self::engine_err("register end callback", e))?;

        let tracker = self.tracker.clone();
        self.tts
            .on_utterance_stop(Some(Box::new(move |utterance| {
                tracker.stopped(utterance);
            })))
            .map_err(|e| Self::engine_err("register stop callback", e))?;

        Ok(())
    }

    fn speak(&mut self, text: &str, id: UtteranceId) -> Result<()> {
        debug!("Speaking {} ({} chars)", id, text.len());

        let tts = &mut self.tts;
        speak_tracked(&self.tracker, self.listener.as_deref(), id, || {
            tts.speak(text, true).map_err(|e| Self::engine_err("speak", e))
        })
    }

    fn stop(&mut self) -> Result<()> {
        debug!("Canceling speech");
        if !self.features.stop {
            warn!("Stop not supported on this platform");
            return Ok(());
        }

        self.tts.stop().map_err(|e| Self::engine_err("cancel speech", e))?;
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        if !self.features.rate {
            warn!("Rate control not supported on this platform");
            return Ok(());
        }

        let value = scale_to_platform(
            rate,
            self.tts.min_rate(),
            self.tts.normal_rate(),
            self.tts.max_rate(),
        );
        debug!("Setting rate {:.2}x -> {}", rate, value);
        self.tts
            .set_rate(value)
            .map_err(|e| Self::engine_err("set rate", e))?;

        Ok(())
    }

    fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        if !self.features.pitch {
            warn!("Pitch control not supported on this platform");
            return Ok(());
        }

        let value = scale_to_platform(
            pitch,
            self.tts.min_pitch(),
            self.tts.normal_pitch(),
            self.tts.max_pitch(),
        );
        debug!("Setting pitch {:.2}x -> {}", pitch, value);
        self.tts
            .set_pitch(value)
            .map_err(|e| Self::engine_err("set pitch", e))?;

        Ok(())
    }

    fn set_voice(&mut self, voice_id: &str) -> Result<()> {
        match self.voices.iter().find(|v| v.id() == voice_id) {
            Some(voice) => {
                debug!("Selecting voice: {}", voice.name());
                self.tts
                    .set_voice(voice)
                    .map_err(|e| Self::engine_err("set voice", e))?;
            }
            None => warn!("Voice {} not offered by this engine", voice_id),
        }

        Ok(())
    }

    fn list_voices(&self) -> Result<Vec<VoiceDescriptor>> {
        Ok(self
            .voices
            .iter()
            .map(|v| VoiceDescriptor::new(v.id(), v.name(), v.language().to_string()))
            .collect())
    }
}
