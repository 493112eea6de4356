//! Configuration management

use crate::playback::{PlaybackOptions, DEFAULT_PERCENT};
use crate::speech::VoicePreferences;
use crate::{Result, TalkError};
use ini::Ini;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Reader configuration
///
/// Holds the speech settings used at startup and a few display options.
/// The file is only written when it does not exist yet.
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path (~/.pdftalk.cfg)
    path: PathBuf,
}

impl Config {
    /// Load configuration from `~/.pdftalk.cfg`, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from `path`, creating a default file if missing
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(&path)
                .map_err(|e| TalkError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(&path)
                .map_err(|e| TalkError::Config(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self { ini, path })
    }

    /// Get config file path (~/.pdftalk.cfg)
    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!(".{}.cfg", crate::APP_NAME))
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("speech"))
            .set("rate", DEFAULT_PERCENT.to_string())
            .set("pitch", DEFAULT_PERCENT.to_string())
            .set("language", "en")
            .set("preferred_country", "US")
            .set("preferred_voices", "");

        ini.with_section(Some("reader")).set("show_text", "true");

        ini
    }

    /// Get a boolean value from config
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .trim()
            .to_string()
    }

    /// Get an integer value from config
    pub fn get_int(&self, section: &str, key: &str, default: i32) -> i32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_percent(&self, key: &str) -> u8 {
        self.get_int("speech", key, i32::from(DEFAULT_PERCENT))
            .try_into()
            .ok()
            .filter(|&p: &u8| p <= 100)
            .unwrap_or(DEFAULT_PERCENT)
    }

    /// Speech rate (0-100)
    pub fn rate(&self) -> u8 {
        self.get_percent("rate")
    }

    /// Speech pitch (0-100)
    pub fn pitch(&self) -> u8 {
        self.get_percent("pitch")
    }

    /// Voice index into the catalog; `None` lets the catalog pick
    pub fn voice_idx(&self) -> Option<usize> {
        self.get_int("speech", "voice_idx", -1).try_into().ok()
    }

    /// Language subtag voices are filtered by
    pub fn language(&self) -> String {
        self.get_string("speech", "language", "en")
    }

    pub fn preferred_country(&self) -> String {
        self.get_string("speech", "preferred_country", "US")
    }

    /// Voice name fragments, comma separated in the file
    pub fn preferred_voices(&self) -> Vec<String> {
        self.get_string("speech", "preferred_voices", "")
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Print the section text when the page changes
    pub fn show_text(&self) -> bool {
        self.get_bool("reader", "show_text", true)
    }

    /// Startup options for the player
    pub fn playback_options(&self) -> PlaybackOptions {
        PlaybackOptions {
            rate_percent: self.rate(),
            pitch_percent: self.pitch(),
            voice_index: self.voice_idx(),
            voices: VoicePreferences {
                language: self.language(),
                preferred_country: self.preferred_country(),
                preferred_names: self.preferred_voices(),
            },
        }
    }
}
