//! Document loading and load supersession
//!
//! Loading reads and normalizes every page, which can take a while for a
//! long document, so it runs off the playback loop. Each load takes a
//! ticket when it is requested; only the newest ticket may install its
//! sections, so a slow load that finishes after a newer one is discarded.

use super::source::DocumentSource;
use super::store::SectionStore;
use crate::Result;
use log::{info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies one requested load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Hands out load tickets and remembers the newest one
#[derive(Debug, Clone, Default)]
pub struct LoadTracker {
    latest: Arc<AtomicU64>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load, superseding every earlier one
    pub fn begin(&self) -> LoadTicket {
        LoadTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Is `ticket` still the newest load?
    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

/// Read all pages from `source` and segment them
///
/// Unreadable pages are dropped with a warning; the load fails only when
/// the document itself cannot be read.
pub fn read_document(source: &dyn DocumentSource) -> Result<SectionStore> {
    let pages = source.read_pages()?;
    let total = pages.len();

    let texts: Vec<String> = pages
        .into_iter()
        .enumerate()
        .map(|(i, page)| {
            page.unwrap_or_else(|e| {
                warn!("Skipping unreadable page {}: {}", i + 1, e);
                String::new()
            })
        })
        .collect();

    let store = SectionStore::build(texts);
    info!(
        "Loaded {}: {} of {} pages speakable",
        source.describe(),
        store.len(),
        total
    );
    Ok(store)
}
