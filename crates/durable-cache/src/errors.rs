use thiserror::Error;

use paneldeck_core_types::DeckError;

/// Failure reported by a single storage tier.
#[derive(Clone, Debug, Error)]
pub enum TierError {
    #[error("storage tier unavailable: {0}")]
    Unavailable(String),
    #[error("quota exceeded writing {key} ({bytes} bytes)")]
    QuotaExceeded { key: String, bytes: usize },
    #[error("io failure: {0}")]
    Io(String),
}

impl From<std::io::Error> for TierError {
    fn from(value: std::io::Error) -> Self {
        TierError::Io(value.to_string())
    }
}

impl From<TierError> for DeckError {
    fn from(value: TierError) -> Self {
        DeckError::new(value.to_string())
    }
}
