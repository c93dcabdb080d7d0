#![forbid(unsafe_code)]

//! Retrace Image
//!
//! A small layered image document that records every edit through
//! [`retrace_core`]. It exercises each part of the engine: typed payloads,
//! groups, weak-edit compression, dirty accounting and accumulator flags.
//!
//! # Key Components
//!
//! - [`Image`] - The document plus its history, with undoable edit commands
//! - [`ImageContent`] - The editable state; implements [`retrace_core::Document`]
//! - [`ItemHandle`] - Shared handle to a layer, channel or path
//! - [`ImageUndo`] - Payload enum; every variant swaps stored and live state
//!
//! # Example
//!
//! ```
//! use retrace_image::{Image, ItemHandle};
//!
//! let mut image = Image::new(640, 480)?;
//! let layer = ItemHandle::new_layer("Background", 640, 480);
//! image.add_layer(&layer, 0)?;
//! image.set_layer_opacity(&layer, 0.5)?;
//!
//! assert!(image.undo());
//! assert_eq!(layer.opacity(), Some(1.0));
//! # Ok::<(), retrace_image::ImageError>(())
//! ```

pub mod commands;
pub mod error;
pub mod image;
pub mod item;
pub mod push;
pub mod undo;

pub use error::{ImageError, Result};
pub use image::{ChangeCounts, Image, ImageContent};
pub use item::{
    ColorTag, Filter, FilterId, Geometry, ItemHandle, ItemId, ItemKind, ItemProps, LayerMask,
    LayerMode, LayerProps, LockKind,
};
pub use undo::ImageUndo;
