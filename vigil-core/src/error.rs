/// Core error type for the moderation engine.
///
/// Adapter crates map their transport-specific failures into this type so the
/// core can keep one recovery policy per kind: configuration errors are fatal
/// at startup, storage errors are recovered locally (fail-closed decisions,
/// degraded reports), validation errors are rejected before any mutation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for failures of the durable store, as opposed to caller mistakes.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}
