//! Shared fixtures for integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use pdftalk::playback::{Event, PlaybackOptions, Player, Subscription};
use pdftalk::speech::{SpeechEngine, UtteranceId, UtteranceListener, VoiceDescriptor};
use pdftalk::document::DocumentSource;
use pdftalk::{Result, TalkError};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

/// Something the engine was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Speak(String, UtteranceId),
    Stop,
    Rate(f32),
    Pitch(f32),
    Voice(String),
}

#[derive(Default)]
struct Recording {
    calls: Vec<Call>,
    listener: Option<Arc<dyn UtteranceListener>>,
    last_spoken: Option<UtteranceId>,
    /// Report the cancelled utterance as done from inside `stop()`
    done_on_stop: bool,
}

/// Speech engine that records calls and lets the test play the engine's
/// part by firing callbacks
#[derive(Clone, Default)]
pub struct RecordingEngine {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine that, like several platform engines, reports the
    /// interrupted utterance as finished when stopped
    pub fn done_on_stop() -> Self {
        let engine = Self::default();
        engine.inner.lock().done_on_stop = true;
        engine
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    pub fn spoken(&self) -> Vec<UtteranceId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Speak(_, id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn spoken_text(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Speak(text, _) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Whether a player still owns a clone of this engine
    pub fn is_attached(&self) -> bool {
        Arc::strong_count(&self.inner) > 1
    }

    pub fn stops(&self) -> usize {
        self.calls().iter().filter(|call| **call == Call::Stop).count()
    }

    pub fn last_spoken(&self) -> Option<UtteranceId> {
        self.inner.lock().last_spoken
    }

    fn listener(&self) -> Arc<dyn UtteranceListener> {
        self.inner
            .lock()
            .listener
            .clone()
            .expect("engine has no listener")
    }

    /// Report `id` as finished
    pub fn finish(&self, id: UtteranceId) {
        self.listener().on_utterance_done(id);
    }

    /// Report the most recent utterance as finished
    pub fn finish_last(&self) -> UtteranceId {
        let id = self.last_spoken().expect("nothing spoken yet");
        self.finish(id);
        id
    }

    pub fn fail(&self, id: UtteranceId) {
        self.listener().on_utterance_error(id);
    }

    pub fn progress(&self, id: UtteranceId, start: usize, end: usize) {
        self.listener().on_range_progress(id, start, end);
    }
}

impl SpeechEngine for RecordingEngine {
    fn set_listener(&mut self, listener: Arc<dyn UtteranceListener>) -> Result<()> {
        self.inner.lock().listener = Some(listener);
        Ok(())
    }

    fn speak(&mut self, text: &str, id: UtteranceId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Speak(text.to_string(), id));
        inner.last_spoken = Some(id);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let (listener, interrupted) = {
            let mut inner = self.inner.lock();
            inner.calls.push(Call::Stop);
            if inner.done_on_stop {
                (inner.listener.clone(), inner.last_spoken)
            } else {
                (None, None)
            }
        };
        if let (Some(listener), Some(id)) = (listener, interrupted) {
            listener.on_utterance_done(id);
        }
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        self.inner.lock().calls.push(Call::Rate(rate));
        Ok(())
    }

    fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        self.inner.lock().calls.push(Call::Pitch(pitch));
        Ok(())
    }

    fn set_voice(&mut self, voice_id: &str) -> Result<()> {
        self.inner.lock().calls.push(Call::Voice(voice_id.to_string()));
        Ok(())
    }

    fn list_voices(&self) -> Result<Vec<VoiceDescriptor>> {
        Ok(vec![
            VoiceDescriptor::new("karen", "Karen", "en-AU"),
            VoiceDescriptor::new("daniel", "Daniel", "en-GB"),
            VoiceDescriptor::new("samantha", "Samantha", "en-US"),
            VoiceDescriptor::new("thomas", "Thomas", "fr-FR"),
        ])
    }
}

/// Player with a recording engine attached
pub fn player_with_engine(engine: &RecordingEngine) -> Player {
    let player = Player::spawn(PlaybackOptions::default()).expect("spawn player");
    player
        .attach_engine(Box::new(engine.clone()))
        .expect("attach engine");
    player
}

/// Finish the utterance in flight and wait for the player to react
pub fn complete_current(player: &Player, engine: &RecordingEngine) -> UtteranceId {
    let id = engine.finish_last();
    player.snapshot().expect("snapshot");
    id
}

/// Every event published so far, engine callbacks included
///
/// Callbacks fired before this call are queued ahead of the snapshot, and
/// the loop publishes their events before replying.
pub fn settle(player: &Player, subscription: &Subscription) -> Vec<Event> {
    player.snapshot().expect("snapshot");
    subscription.drain()
}

/// Wait for the next event, failing the test after a while
pub fn next_event(subscription: &Subscription) -> Event {
    subscription
        .recv_timeout(Duration::from_secs(5))
        .expect("timed out waiting for an event")
}

pub fn is_disconnected(result: Result<()>) -> bool {
    matches!(result, Err(TalkError::Disconnected))
}

/// Document source that blocks in `read_pages` until released
pub struct GatedSource {
    gate: Receiver<()>,
    pages: Vec<String>,
}

impl GatedSource {
    pub fn new(pages: &[&str]) -> (Self, Sender<()>) {
        let (release, gate) = mpsc::channel();
        let source = Self {
            gate,
            pages: pages.iter().map(|p| p.to_string()).collect(),
        };
        (source, release)
    }
}

impl DocumentSource for GatedSource {
    fn describe(&self) -> String {
        "gated test document".to_string()
    }

    fn read_pages(&self) -> Result<Vec<Result<String>>> {
        self.gate.recv().map_err(|_| TalkError::LoadFailed("gate dropped".to_string()))?;
        Ok(self.pages.iter().cloned().map(Ok).collect())
    }
}
