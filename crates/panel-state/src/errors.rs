use thiserror::Error;

use paneldeck_core_types::DeckError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PanelStateError {
    #[error("panel id must not be empty")]
    EmptyPanelId,
    #[error("panel state for {key} could not be stored in any tier")]
    NotPersisted { key: String },
}

impl From<PanelStateError> for DeckError {
    fn from(value: PanelStateError) -> Self {
        DeckError::new(value.to_string())
    }
}
