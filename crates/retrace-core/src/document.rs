#![forbid(unsafe_code)]

//! The host document seen from the undo engine.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

use crate::dirty::DirtyTracker;
use crate::kind::UndoMode;

/// Identity of a document owning an undo history.
///
/// Undo items carry the id of the document they were recorded against
/// instead of a pointer to it, so the history never owns its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

impl DocumentId {
    /// Allocate a process-unique id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

bitflags! {
    /// Structural changes collected while one undo step is applied.
    ///
    /// Payloads set flags instead of notifying the document directly so that
    /// a group touching the image size ten times reports it once.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UndoAccumulator: u32 {
        const MODE_CHANGED       = 1 << 0;
        const PRECISION_CHANGED  = 1 << 1;
        const SIZE_CHANGED       = 1 << 2;
        const RESOLUTION_CHANGED = 1 << 3;
        const UNIT_CHANGED       = 1 << 4;
        const QUICK_MASK_CHANGED = 1 << 5;
        const STRUCTURE_CHANGED  = 1 << 6;
        const ALPHA_CHANGED      = 1 << 7;
    }
}

impl Default for UndoAccumulator {
    fn default() -> Self {
        Self::empty()
    }
}

/// A document whose edits are recorded by an [`UndoHistory`](crate::UndoHistory).
///
/// The history only needs the dirty counters; everything else about the
/// document is reached through undo payloads.
pub trait Document {
    /// Dirty counters of this document.
    fn dirty(&self) -> &DirtyTracker;

    /// Mutable dirty counters of this document.
    fn dirty_mut(&mut self) -> &mut DirtyTracker;

    /// Called once after an undo or redo step has been applied, with the
    /// changes its payloads reported.
    fn changes_applied(&mut self, _mode: UndoMode, _changes: UndoAccumulator) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_ids_unique() {
        let a = DocumentId::next();
        let b = DocumentId::next();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
        assert!(a.to_string().starts_with("doc#"));
    }

    #[test]
    fn test_accumulator_default_empty() {
        let accum = UndoAccumulator::default();
        assert!(accum.is_empty());
    }
}
