//! Fan-out of playback events to detached observers
//!
//! Every observer gets its own unbounded queue, so publishing never waits
//! on a slow reader. There is no replay: an observer that attaches late
//! should ask the player for a snapshot.

use super::events::Event;
use crate::Result;
use log::{debug, error};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Handle identifying one attached observer
pub type SubscriptionId = u64;

/// Something that reacts to events on its own thread
pub trait Observer: Send {
    fn on_event(&mut self, event: &Event);
}

impl<F> Observer for F
where
    F: FnMut(&Event) + Send,
{
    fn on_event(&mut self, event: &Event) {
        self(event)
    }
}

/// Receiving end of an attachment
///
/// Dropping it detaches the observer at the next publish.
pub struct Subscription {
    id: SubscriptionId,
    receiver: Receiver<Event>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event; `None` once the channel is gone
    pub fn recv(&self) -> Option<Event> {
        self.receiver.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<Event> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Everything queued right now
    pub fn drain(&self) -> Vec<Event> {
        self.receiver.try_iter().collect()
    }
}

struct Inner {
    subscribers: Mutex<Vec<(SubscriptionId, Sender<Event>)>>,
    next_id: AtomicU64,
}

/// Publish/subscribe hub; clones share the same observers
#[derive(Clone)]
pub struct EventChannel {
    inner: Arc<Inner>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Attach a new observer
    pub fn attach(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel();
        self.inner.subscribers.lock().push((id, sender));
        debug!("Observer {} attached", id);
        Subscription { id, receiver }
    }

    /// Run `observer` on its own thread for every event
    ///
    /// A panicking observer is detached; the publisher and other observers
    /// carry on.
    pub fn attach_observer<O>(&self, mut observer: O) -> Result<SubscriptionId>
    where
        O: Observer + 'static,
    {
        let subscription = self.attach();
        let id = subscription.id();

        thread::Builder::new()
            .name(format!("pdftalk-observer-{}", id))
            .spawn(move || {
                while let Some(event) = subscription.recv() {
                    let delivered = panic::catch_unwind(AssertUnwindSafe(|| observer.on_event(&event)));
                    if delivered.is_err() {
                        error!("Observer {} panicked; detaching it", id);
                        break;
                    }
                }
            })?;

        Ok(id)
    }

    /// Detach an observer; returns whether it was attached
    pub fn detach(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        let removed = subscribers.len() != before;
        if removed {
            debug!("Observer {} detached", id);
        }
        removed
    }

    /// Deliver `event` to every attached observer
    ///
    /// Observers whose receiving end is gone are dropped.
    pub fn publish(&self, event: &Event) {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|(id, sender)| {
            let alive = sender.send(event.clone()).is_ok();
            if !alive {
                debug!("Observer {} gone; detaching", id);
            }
            alive
        });
    }

    pub fn observer_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}
