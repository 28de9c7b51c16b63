use thiserror::Error;

use paneldeck_core_types::DeckError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("filter preset not found: {0}")]
    NotFound(String),
    #[error("filter preset {id} is invalid: {reason}")]
    InvalidPreset { id: String, reason: String },
    #[error("filter set must be a JSON object")]
    NotAnObject,
}

impl From<FilterError> for DeckError {
    fn from(value: FilterError) -> Self {
        DeckError::new(value.to_string())
    }
}
