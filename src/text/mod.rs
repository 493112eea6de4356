//! Text preparation for speech

pub mod normalize;
pub mod patterns;

pub use normalize::normalize;
pub use patterns::is_list_item;
