//! Playback: state machine, events and the player loop

pub mod channel;
pub mod coordinator;
pub mod events;
pub mod player;
pub mod state;

pub use channel::{EventChannel, Observer, Subscription, SubscriptionId};
pub use coordinator::{Coordinator, EngineCallback};
pub use events::Event;
pub use player::Player;
pub use state::{
    percent_to_multiplier, HighlightRange, Phase, PlaybackOptions, PlaybackState, SpeechSettings,
    DEFAULT_PERCENT,
};
