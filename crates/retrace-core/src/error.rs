#![forbid(unsafe_code)]

use thiserror::Error;

use crate::kind::UndoType;

pub type Result<T> = std::result::Result<T, HistoryError>;

/// Caller errors reported by [`UndoHistory`](crate::UndoHistory).
///
/// None of these leave the history in a changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("undo recording is frozen")]
    Frozen,

    #[error("group_end called with no open undo group")]
    GroupUnderflow,

    #[error("thaw called on an undo history that is not frozen")]
    ThawUnderflow,

    #[error("{0} is not an undo group type")]
    NotAGroupType(UndoType),
}

/// Errors loading a [`HistoryConfig`](crate::HistoryConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "history-config")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[cfg(feature = "history-config")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid history config: {message}")]
    Invalid { message: String },
}
