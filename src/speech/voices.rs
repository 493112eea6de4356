//! Voice catalog selection
//!
//! Engines often expose dozens of voices, many of them near duplicates.
//! The catalog keeps one voice per locale in the reader's language, sorted
//! by country, and picks a default. It is built once when the engine is
//! attached and then addressed by index.

use super::engine::VoiceDescriptor;
use log::{debug, warn};
use std::collections::HashSet;

/// Which voices the reader wants to choose from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePreferences {
    /// Primary language subtag, e.g. "en"; empty accepts every language
    pub language: String,
    /// Region of the default voice, e.g. "US"
    pub preferred_country: String,
    /// Name fragments that win when several voices share a locale
    pub preferred_names: Vec<String>,
}

impl Default for VoicePreferences {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            preferred_country: "US".to_string(),
            preferred_names: Vec::new(),
        }
    }
}

/// Index-addressable list of selectable voices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceCatalog {
    voices: Vec<VoiceDescriptor>,
    default_index: usize,
}

impl VoiceCatalog {
    pub fn get(&self, index: usize) -> Option<&VoiceDescriptor> {
        self.voices.get(index)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Index to use when the reader hasn't picked a voice
    pub fn default_index(&self) -> usize {
        self.default_index
    }

    pub fn voices(&self) -> &[VoiceDescriptor] {
        &self.voices
    }
}

/// Build the catalog from everything the engine offers
pub fn select_catalog(available: &[VoiceDescriptor], prefs: &VoicePreferences) -> VoiceCatalog {
    let matching: Vec<&VoiceDescriptor> = available
        .iter()
        .filter(|v| prefs.language.is_empty() || v.language().eq_ignore_ascii_case(&prefs.language))
        .collect();

    let pool = if matching.is_empty() {
        if !available.is_empty() {
            warn!(
                "No voices for language '{}', offering all {} voices",
                prefs.language,
                available.len()
            );
        }
        available.iter().collect()
    } else {
        matching
    };

    let mut seen_locales = HashSet::new();
    let mut selected = Vec::new();

    for fragment in &prefs.preferred_names {
        let fragment = fragment.to_lowercase();
        for voice in &pool {
            let name = voice.display_name.to_lowercase();
            if name.contains(&fragment) && seen_locales.insert(voice.locale.to_lowercase()) {
                selected.push((*voice).clone());
            }
        }
    }

    for voice in &pool {
        if seen_locales.insert(voice.locale.to_lowercase()) {
            selected.push((*voice).clone());
        }
    }

    selected.sort_by(|a, b| a.country().unwrap_or("").cmp(b.country().unwrap_or("")));

    let default_index = selected
        .iter()
        .position(|v| {
            v.country()
                .map_or(false, |c| c.eq_ignore_ascii_case(&prefs.preferred_country))
        })
        .unwrap_or(0);

    debug!(
        "Voice catalog: {} of {} voices, default {}",
        selected.len(),
        available.len(),
        default_index
    );

    VoiceCatalog {
        voices: selected,
        default_index,
    }
}
