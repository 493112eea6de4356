//! Ordered sections of the loaded document

use crate::text::normalize;
use crate::{Result, TalkError};
use log::debug;
use serde::Serialize;

/// One playable unit: the speakable text of one surviving page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Position in the store, 0-based and contiguous
    pub index: usize,
    /// Normalized text handed to the speech engine
    pub text: String,
    /// Page number in the source document, 1-based, for display
    pub source_page: usize,
}

impl Section {
    /// Length in characters; highlight offsets index into this
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Immutable, ordered list of sections built from one document load
#[derive(Debug, Clone, Default)]
pub struct SectionStore {
    sections: Vec<Section>,
}

impl SectionStore {
    /// Normalize every page in order, dropping pages with nothing to speak
    ///
    /// Surviving sections are renumbered from 0 and keep their original
    /// page number.
    pub fn build<I, S>(raw_texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sections = Vec::new();

        for (page, raw) in raw_texts.into_iter().enumerate() {
            let text = normalize(raw.as_ref());
            if text.is_empty() {
                debug!("Dropping page {}: no speakable text", page + 1);
                continue;
            }
            sections.push(Section {
                index: sections.len(),
                text,
                source_page: page + 1,
            });
        }

        debug!("Built {} sections", sections.len());
        Self { sections }
    }

    /// Section at `index`
    pub fn get(&self, index: usize) -> Result<&Section> {
        self.sections.get(index).ok_or(TalkError::IndexOutOfRange {
            index,
            len: self.sections.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Index of the last section, if any
    pub fn last_index(&self) -> Option<usize> {
        self.sections.len().checked_sub(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Store with arbitrary sections, blank ones included
    #[cfg(test)]
    pub(crate) fn from_sections(sections: Vec<Section>) -> Self {
        Self { sections }
    }
}
