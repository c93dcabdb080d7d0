#![forbid(unsafe_code)]

use thiserror::Error;

use retrace_core::HistoryError;

use crate::item::{FilterId, ItemId, ItemKind};

pub type Result<T> = std::result::Result<T, ImageError>;

/// Errors from image edit commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("{0} is not part of this image")]
    ItemNotFound(ItemId),

    #[error("{0} is already part of this image")]
    ItemAlreadyAttached(ItemId),

    #[error("{id} is a {actual:?}, expected a {expected:?}")]
    WrongItemKind {
        id: ItemId,
        expected: ItemKind,
        actual: ItemKind,
    },

    #[error("{item} has no filter {filter:?}")]
    FilterNotFound { item: ItemId, filter: FilterId },

    #[error("{0} has no layer mask")]
    NoLayerMask(ItemId),

    #[error("{0} already has a layer mask")]
    LayerMaskExists(ItemId),

    #[error("image size must be non-zero, got {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error(transparent)]
    History(#[from] HistoryError),
}
