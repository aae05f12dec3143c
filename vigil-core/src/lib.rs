/// Immutable runtime configuration, built once at startup.
pub mod config;
/// Shared error type for the moderation core.
pub mod error;
/// Shared time helpers.
pub mod time;

pub use config::ModerationConfig;
pub use error::{Error, Result};
