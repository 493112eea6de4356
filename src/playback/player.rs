//! Thread-safe handle to the playback loop
//!
//! The [`Coordinator`] lives on one loop thread. Commands from any number
//! of handles and callbacks from the speech engine are queued to that
//! thread and run one at a time, so every read-modify-publish step is
//! atomic. Events are published after each step, outside the step itself,
//! through per-observer queues that never block, and before the caller of
//! a command gets its reply.

use super::channel::{EventChannel, Subscription};
use super::coordinator::{Coordinator, EngineCallback};
use super::state::{HighlightRange, PlaybackOptions, PlaybackState};
use crate::document::{read_document, DocumentSource, LoadTicket, LoadTracker, Section, SectionStore};
use crate::speech::{SpeechEngine, UtteranceId, UtteranceListener, VoiceDescriptor};
use crate::{Result, TalkError};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Sends a command's result back to its caller
type Reply = Box<dyn FnOnce() + Send>;

/// Work queued for the loop thread
type Job = Box<dyn FnOnce(&mut Coordinator) -> Reply + Send>;

enum Message {
    Run(Job),
    Engine(EngineCallback),
    Shutdown,
}

/// Forwards engine callbacks into the loop's queue
struct LoopListener {
    tx: Sender<Message>,
}

impl LoopListener {
    fn forward(&self, callback: EngineCallback) {
        // The loop is gone once the player shut down; nothing left to tell
        let _ = self.tx.send(Message::Engine(callback));
    }
}

impl UtteranceListener for LoopListener {
    fn on_utterance_start(&self, id: UtteranceId) {
        self.forward(EngineCallback::Start(id));
    }

    fn on_utterance_done(&self, id: UtteranceId) {
        self.forward(EngineCallback::Done(id));
    }

    fn on_utterance_error(&self, id: UtteranceId) {
        self.forward(EngineCallback::Error(id));
    }

    fn on_range_progress(&self, id: UtteranceId, start: usize, end: usize) {
        self.forward(EngineCallback::Range { id, start, end });
    }
}

/// State shared by every clone of a [`Player`]
///
/// The engine's listener holds a sender too, so the loop never sees its
/// queue disconnect. Dropping the last handle stops the loop instead.
struct Shared {
    tx: Sender<Message>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn stop(&self) -> Result<()> {
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return Ok(());
        };

        // Already gone if the loop exited on its own
        let _ = self.tx.send(Message::Shutdown);
        if worker.thread().id() == thread::current().id() {
            // Last handle dropped by an observer on the loop thread
            return Ok(());
        }
        worker
            .join()
            .map_err(|_| TalkError::from("playback loop panicked"))
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Stopping playback loop: {}", e);
        }
    }
}

/// Handle for issuing commands and queries; clones drive the same player
///
/// The loop stops once every clone has been dropped.
#[derive(Clone)]
pub struct Player {
    shared: Arc<Shared>,
    events: EventChannel,
    loads: LoadTracker,
}

impl Player {
    /// Start the playback loop; no engine and no document yet
    pub fn spawn(options: PlaybackOptions) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let events = EventChannel::new();
        let coordinator = Coordinator::new(options);

        let loop_events = events.clone();
        let worker = thread::Builder::new()
            .name("pdftalk-playback".to_string())
            .spawn(move || run(coordinator, rx, loop_events))?;

        Ok(Self {
            shared: Arc::new(Shared {
                tx,
                worker: Mutex::new(Some(worker)),
            }),
            events,
            loads: LoadTracker::new(),
        })
    }

    /// Run `f` on the loop thread and wait for its result
    ///
    /// The events `f` caused are published before this returns.
    fn call<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Coordinator) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel();
        let job: Job = Box::new(move |coordinator| {
            let result = f(coordinator);
            let reply: Reply = Box::new(move || {
                // The caller may have given up waiting
                let _ = reply_tx.send(result);
            });
            reply
        });

        self.shared
            .tx
            .send(Message::Run(job))
            .map_err(|_| TalkError::Disconnected)?;
        reply_rx.recv().map_err(|_| TalkError::Disconnected)?
    }

    // Events

    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    /// Attach an observer; pair with [`Player::snapshot`] to learn the
    /// state it missed
    pub fn subscribe(&self) -> Subscription {
        self.events.attach()
    }

    /// Listener that feeds engine callbacks into this player
    pub fn listener(&self) -> Arc<dyn UtteranceListener> {
        Arc::new(LoopListener {
            tx: self.shared.tx.clone(),
        })
    }

    // Setup

    pub fn attach_engine(&self, engine: Box<dyn SpeechEngine>) -> Result<()> {
        let listener = self.listener();
        self.call(move |c| c.attach_engine(engine, listener))
    }

    /// Segment `raw_texts` on the calling thread and install the result
    ///
    /// Returns the number of sections, or `LoadSuperseded` when a newer
    /// load was requested in the meantime.
    pub fn load_document<I, S>(&self, raw_texts: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ticket = self.loads.begin();
        let store = SectionStore::build(raw_texts);
        self.install(ticket, store)
    }

    /// Read and segment `source` on the calling thread, then install it
    pub fn load_from(&self, source: &dyn DocumentSource) -> Result<usize> {
        let ticket = self.loads.begin();
        let store = read_document(source)?;
        self.install(ticket, store)
    }

    /// Load `source` on a background thread
    ///
    /// The load supersedes any earlier one as soon as this returns.
    pub fn spawn_load(&self, source: Box<dyn DocumentSource>) -> Result<JoinHandle<Result<usize>>> {
        let ticket = self.loads.begin();
        let player = self.clone();

        let handle = thread::Builder::new()
            .name("pdftalk-loader".to_string())
            .spawn(move || {
                let store = read_document(source.as_ref())?;
                player.install(ticket, store)
            })?;
        Ok(handle)
    }

    fn install(&self, ticket: LoadTicket, store: SectionStore) -> Result<usize> {
        let loads = self.loads.clone();
        self.call(move |c| {
            if !loads.is_current(ticket) {
                debug!("Discarding load {}: superseded", ticket.generation());
                return Err(TalkError::LoadSuperseded);
            }
            let count = store.len();
            c.install(store);
            Ok(count)
        })
    }

    // Commands

    pub fn play(&self) -> Result<()> {
        self.call(|c| c.play())
    }

    pub fn pause(&self) -> Result<()> {
        self.call(|c| c.pause())
    }

    pub fn toggle_play_pause(&self) -> Result<()> {
        self.call(|c| c.toggle_play_pause())
    }

    pub fn next(&self) -> Result<()> {
        self.call(|c| c.next())
    }

    pub fn prev(&self) -> Result<()> {
        self.call(|c| c.prev())
    }

    pub fn seek(&self, index: usize) -> Result<()> {
        self.call(move |c| c.seek(index))
    }

    pub fn stop(&self) -> Result<()> {
        self.call(|c| c.stop())
    }

    pub fn set_voice(&self, index: usize) -> Result<()> {
        self.call(move |c| c.set_voice(index))
    }

    pub fn set_rate(&self, percent: u8) -> Result<()> {
        self.call(move |c| c.set_rate(percent))
    }

    pub fn set_pitch(&self, percent: u8) -> Result<()> {
        self.call(move |c| c.set_pitch(percent))
    }

    // Queries

    pub fn snapshot(&self) -> Result<PlaybackState> {
        self.call(|c| Ok(c.snapshot()))
    }

    pub fn section(&self, index: usize) -> Result<Section> {
        self.call(move |c| c.section(index))
    }

    pub fn section_count(&self) -> Result<usize> {
        self.call(|c| Ok(c.section_count()))
    }

    /// The voice catalog chosen when the engine was attached
    pub fn voices(&self) -> Result<Vec<VoiceDescriptor>> {
        self.call(|c| Ok(c.voices().voices().to_vec()))
    }

    pub fn highlight(&self) -> Result<Option<HighlightRange>> {
        self.call(|c| Ok(c.highlight()))
    }

    /// Stop speech and end the loop thread
    ///
    /// Every clone of this handle returns `Disconnected` afterwards.
    pub fn shutdown(&self) -> Result<()> {
        self.shared.stop()
    }
}

/// The playback loop: one message at a time, then publish
fn run(mut coordinator: Coordinator, rx: Receiver<Message>, events: EventChannel) {
    debug!("Playback loop started");

    while let Ok(message) = rx.recv() {
        let reply = match message {
            Message::Run(job) => Some(job(&mut coordinator)),
            Message::Engine(callback) => {
                coordinator.handle_callback(callback);
                None
            }
            Message::Shutdown => break,
        };

        for event in coordinator.drain_events() {
            events.publish(&event);
        }
        if let Some(reply) = reply {
            reply();
        }
    }

    coordinator.shutdown();
    for event in coordinator.drain_events() {
        events.publish(&event);
    }
    info!("Playback loop stopped");
}
