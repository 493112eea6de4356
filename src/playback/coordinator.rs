//! Playback state machine
//!
//! The coordinator owns the position, the phase and the speech settings,
//! drives the speech engine, and queues an event for every change. It is
//! not thread-safe on its own: the player runs it on a single loop thread,
//! which serializes commands and engine callbacks.
//!
//! Engine callbacks can arrive late, after a pause, skip or reload has
//! already moved on. Every dispatch gets a fresh [`UtteranceId`], and a
//! callback is only acted on when its id is the one in flight.

use super::events::Event;
use super::state::{HighlightRange, Phase, PlaybackOptions, PlaybackState, SpeechSettings};
use crate::document::{Section, SectionStore};
use crate::speech::{
    select_catalog, SpeechEngine, UtteranceId, UtteranceListener, VoiceCatalog, VoicePreferences,
};
use crate::{Result, TalkError};
use log::{debug, error, info, warn};
use std::sync::Arc;

/// Progress report from the speech engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCallback {
    Start(UtteranceId),
    Done(UtteranceId),
    Error(UtteranceId),
    Range {
        id: UtteranceId,
        start: usize,
        end: usize,
    },
}

/// The single source of truth for playback
pub struct Coordinator {
    store: SectionStore,
    phase: Phase,
    /// Meaningful only while the store is non-empty
    current_index: usize,
    settings: SpeechSettings,
    /// Voice picked by the reader rather than the catalog default
    voice_chosen: bool,
    voice_prefs: VoicePreferences,
    voices: VoiceCatalog,
    engine: Option<Box<dyn SpeechEngine>>,
    /// Utterance the engine is currently speaking for us
    in_flight: Option<UtteranceId>,
    highlight: Option<HighlightRange>,
    next_serial: u64,
    /// Events waiting to be published
    outbox: Vec<Event>,
}

impl Coordinator {
    pub fn new(options: PlaybackOptions) -> Self {
        Self {
            store: SectionStore::default(),
            phase: Phase::Idle,
            current_index: 0,
            settings: SpeechSettings {
                rate_percent: options.rate_percent.min(100),
                pitch_percent: options.pitch_percent.min(100),
                voice_index: options.voice_index.unwrap_or(0),
            },
            voice_chosen: options.voice_index.is_some(),
            voice_prefs: options.voices,
            voices: VoiceCatalog::default(),
            engine: None,
            in_flight: None,
            highlight: None,
            next_serial: 0,
            outbox: Vec::new(),
        }
    }

    // Queries

    pub fn snapshot(&self) -> PlaybackState {
        PlaybackState {
            phase: self.phase,
            current_index: if self.store.is_empty() {
                None
            } else {
                Some(self.current_index)
            },
            total_sections: self.store.len(),
            tts_ready: self.engine.is_some(),
            settings: self.settings,
        }
    }

    pub fn section(&self, index: usize) -> Result<Section> {
        self.store.get(index).cloned()
    }

    pub fn section_count(&self) -> usize {
        self.store.len()
    }

    pub fn voices(&self) -> &VoiceCatalog {
        &self.voices
    }

    pub fn highlight(&self) -> Option<HighlightRange> {
        self.highlight
    }

    pub fn in_flight(&self) -> Option<UtteranceId> {
        self.in_flight
    }

    /// Take every event queued since the last call
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    // Setup

    /// Start using `engine`; catalogs its voices and marks TTS ready
    pub fn attach_engine(
        &mut self,
        mut engine: Box<dyn SpeechEngine>,
        listener: Arc<dyn UtteranceListener>,
    ) -> Result<()> {
        engine.set_listener(listener)?;

        let available = engine.list_voices().unwrap_or_else(|e| {
            warn!("Failed to list voices: {}", e);
            Vec::new()
        });
        self.voices = select_catalog(&available, &self.voice_prefs);
        if !self.voice_chosen {
            self.settings.voice_index = self.voices.default_index();
        }

        let was_playing = self.phase == Phase::Playing;
        self.cancel_in_flight();
        self.engine = Some(engine);
        info!("Speech engine attached with {} voices", self.voices.len());

        self.apply_settings();
        self.publish_state();
        if was_playing {
            self.dispatch_current();
        }
        Ok(())
    }

    /// Replace the document; resets to the first section, idle
    pub fn install(&mut self, store: SectionStore) {
        self.cancel_in_flight();
        self.store = store;
        self.phase = Phase::Idle;
        self.current_index = 0;
        self.highlight = None;
        info!("Installed document with {} sections", self.store.len());
        self.publish_state();
    }

    // Commands

    /// Start or resume speech at the current section
    pub fn play(&mut self) -> Result<()> {
        if self.store.is_empty() {
            return Err(TalkError::NoDocumentLoaded);
        }
        if self.engine.is_none() {
            return Err(TalkError::EngineNotReady);
        }
        if self.phase == Phase::Playing {
            debug!("play: already playing");
            return Ok(());
        }

        debug!("play: {:?} -> Playing at section {}", self.phase, self.current_index);
        self.phase = Phase::Playing;
        self.apply_settings();
        self.publish_state();
        self.dispatch_current();
        Ok(())
    }

    /// Silence speech and remember the position
    pub fn pause(&mut self) -> Result<()> {
        if self.phase != Phase::Playing {
            debug!("pause: ignored in {:?}", self.phase);
            return Ok(());
        }

        debug!("pause at section {}", self.current_index);
        self.cancel_in_flight();
        self.phase = Phase::Paused;
        self.highlight = None;
        self.publish_state();
        Ok(())
    }

    pub fn toggle_play_pause(&mut self) -> Result<()> {
        if self.phase == Phase::Playing {
            self.pause()
        } else {
            self.play()
        }
    }

    pub fn next(&mut self) -> Result<()> {
        let target = self.current_index.saturating_add(1);
        self.seek(target)
    }

    pub fn prev(&mut self) -> Result<()> {
        let target = self.current_index.saturating_sub(1);
        self.seek(target)
    }

    /// Move to `index`, clamped to the document
    ///
    /// Speech continues at the new section if it was playing.
    pub fn seek(&mut self, index: usize) -> Result<()> {
        let last = self.store.last_index().ok_or(TalkError::NoDocumentLoaded)?;

        // Decide before stopping: stopping may report the old utterance done
        let was_playing = self.phase == Phase::Playing;
        self.cancel_in_flight();

        self.current_index = index.min(last);
        self.highlight = None;
        debug!("seek: section {} (playing: {})", self.current_index, was_playing);
        self.publish_state();

        if was_playing {
            self.dispatch_current();
        }
        Ok(())
    }

    /// Silence speech and go idle, keeping the position
    pub fn stop(&mut self) -> Result<()> {
        debug!("stop from {:?}", self.phase);
        self.cancel_in_flight();
        self.phase = Phase::Idle;
        self.highlight = None;
        self.publish_state();
        Ok(())
    }

    pub fn set_voice(&mut self, index: usize) -> Result<()> {
        if !self.voices.is_empty() && index >= self.voices.len() {
            warn!(
                "Voice index {} out of range (have {} voices)",
                index,
                self.voices.len()
            );
        }
        self.settings.voice_index = index;
        self.voice_chosen = true;
        self.reapply_if_playing();
        Ok(())
    }

    pub fn set_rate(&mut self, percent: u8) -> Result<()> {
        self.settings.rate_percent = percent.min(100);
        self.reapply_if_playing();
        Ok(())
    }

    pub fn set_pitch(&mut self, percent: u8) -> Result<()> {
        self.settings.pitch_percent = percent.min(100);
        self.reapply_if_playing();
        Ok(())
    }

    /// Silence the engine before the loop exits
    pub fn shutdown(&mut self) {
        self.cancel_in_flight();
    }

    // Engine callbacks

    pub fn handle_callback(&mut self, callback: EngineCallback) {
        match callback {
            EngineCallback::Start(id) => self.on_utterance_start(id),
            EngineCallback::Done(id) => self.on_utterance_done(id),
            EngineCallback::Error(id) => self.on_utterance_error(id),
            EngineCallback::Range { id, start, end } => self.on_range_progress(id, start, end),
        }
    }

    pub fn on_utterance_start(&mut self, id: UtteranceId) {
        if self.is_current(id) {
            debug!("Utterance {} started", id);
        }
    }

    /// The engine finished speaking `id`; move on to the next section
    pub fn on_utterance_done(&mut self, id: UtteranceId) {
        if !self.is_current(id) {
            debug!("Dropping stale completion for {} ({:?})", id, self.phase);
            return;
        }

        self.in_flight = None;
        self.highlight = None;
        if self.advance() {
            self.dispatch_current();
        }
    }

    pub fn on_utterance_error(&mut self, id: UtteranceId) {
        if !self.is_current(id) {
            debug!("Dropping stale error for {}", id);
            return;
        }
        self.fail(format!("speech engine failed on {}", id));
    }

    pub fn on_range_progress(&mut self, id: UtteranceId, start: usize, end: usize) {
        if !self.is_current(id) {
            debug!("Dropping stale range for {}", id);
            return;
        }

        let len = self
            .store
            .get(self.current_index)
            .map(Section::char_len)
            .unwrap_or(0);
        if start > end || end > len {
            debug!("Ignoring range {}..{} outside {} chars", start, end, len);
            return;
        }

        self.highlight = Some(HighlightRange { start, end });
        self.outbox.push(Event::HighlightRangeChanged {
            section: self.current_index,
            start,
            end,
        });
    }

    // Internals

    fn is_current(&self, id: UtteranceId) -> bool {
        self.phase == Phase::Playing && self.in_flight == Some(id)
    }

    fn publish_state(&mut self) {
        let state = self.snapshot();
        self.outbox.push(Event::StateChanged(state));
    }

    /// Step to the next section, or finish at the end
    ///
    /// Returns whether there is a section to speak.
    fn advance(&mut self) -> bool {
        match self.store.last_index() {
            Some(last) if self.current_index < last => {
                self.current_index += 1;
                self.publish_state();
                true
            }
            _ => {
                debug!("Reached the end of the document");
                self.phase = Phase::Finished;
                self.publish_state();
                false
            }
        }
    }

    fn current_is_blank(&self) -> bool {
        self.store
            .get(self.current_index)
            .map_or(true, |section| section.text.trim().is_empty())
    }

    /// Hand the current section to the engine, skipping blank ones
    fn dispatch_current(&mut self) {
        while self.current_is_blank() {
            debug!("Skipping blank section {}", self.current_index);
            if !self.advance() {
                return;
            }
        }

        self.cancel_in_flight();
        self.next_serial += 1;
        let id = UtteranceId {
            section: self.current_index,
            serial: self.next_serial,
        };

        let spoken = match (self.engine.as_mut(), self.store.get(self.current_index)) {
            (Some(engine), Ok(section)) => engine.speak(&section.text, id),
            (None, _) => Err(TalkError::EngineNotReady),
            (_, Err(e)) => Err(e),
        };

        match spoken {
            Ok(()) => {
                debug!("Dispatched {}", id);
                self.in_flight = Some(id);
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    /// Stop the engine if it is speaking for us
    fn cancel_in_flight(&mut self) {
        if let Some(id) = self.in_flight.take() {
            debug!("Cancelling {}", id);
            if let Some(engine) = self.engine.as_mut() {
                if let Err(e) = engine.stop() {
                    error!("Failed to stop speech: {}", e);
                }
            }
        }
    }

    fn apply_settings(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        if let Err(e) = engine.set_rate(self.settings.rate_multiplier()) {
            warn!("Failed to apply rate: {}", e);
        }
        if let Err(e) = engine.set_pitch(self.settings.pitch_multiplier()) {
            warn!("Failed to apply pitch: {}", e);
        }
        if let Some(voice) = self.voices.get(self.settings.voice_index) {
            if let Err(e) = engine.set_voice(&voice.id) {
                warn!("Failed to apply voice {}: {}", voice.id, e);
            }
        }
    }

    /// Settings reach the engine now but only affect the next utterance
    fn reapply_if_playing(&mut self) {
        if self.phase == Phase::Playing {
            self.apply_settings();
        }
    }

    /// Engine failure: stop and tell observers
    fn fail(&mut self, message: String) {
        error!("Playback stopped: {}", message);
        self.cancel_in_flight();
        self.phase = Phase::Idle;
        self.highlight = None;
        self.publish_state();
        self.outbox.push(Event::EngineError { message });
    }
}
