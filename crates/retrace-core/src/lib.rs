#![forbid(unsafe_code)]

//! Retrace Core
//!
//! Undo/redo transaction engine for document editors: grouped history,
//! compressible edits and dirty/clean accounting.
//!
//! # Key Components
//!
//! - [`UndoHistory`] - Per-document undo and redo stacks, grouping and freezing
//! - [`UndoItem`] - One reversible edit with a type tag, dirty mask and payload
//! - [`UndoGroup`] - Several items that undo and redo as one step
//! - [`UndoStack`] - Stack storage with incremental size accounting
//! - [`DirtyTracker`] - Save/export baselines and per-aspect dirty counters
//! - [`UndoType`] - The closed table of undo kinds, including weak kinds
//!
//! # How it fits together
//!
//! ```text
//!  edit command ──push──► UndoHistory ──mark_dirty──► Document::dirty_mut()
//!                             │
//!                 undo/redo   ▼
//!            ┌──────────── UndoEntry::apply(doc, mode, accum)
//!            ▼
//!   Document::changes_applied(mode, accum)
//! ```
//!
//! The engine never inspects the document beyond its [`Document`] trait.
//! Everything kind-specific lives in [`UndoPayload`] implementations written
//! by the host.

pub mod config;
pub mod dirty;
pub mod document;
pub mod error;
pub mod event;
pub mod group;
pub mod history;
pub mod item;
pub mod kind;
pub mod stack;

pub use config::HistoryConfig;
pub use dirty::{ASPECT_COUNT, DirtyMask, DirtyTracker, UNREACHABLE_CLEAN};
pub use document::{Document, DocumentId, UndoAccumulator};
pub use error::{ConfigError, HistoryError, Result};
pub use event::{EntrySummary, ObserverId, UndoEvent};
pub use group::UndoGroup;
pub use history::{PushOutcome, UndoHistory};
pub use item::{ApplyFn, FnPayload, UndoItem, UndoPayload};
pub use kind::{UndoMode, UndoType, is_weak};
pub use stack::{UndoEntry, UndoStack};
