#![forbid(unsafe_code)]

//! Dirty/clean accounting.
//!
//! A document is *clean* when its edit count equals the count it had at the
//! last save. Every recorded edit bumps the count, every undo lowers it and
//! every redo raises it again, so undoing back to the save point makes the
//! document clean without comparing any content.
//!
//! ```text
//!   save        push A      push B      undo        undo        undo
//!   dirty=0 ──► dirty=1 ──► dirty=2 ──► dirty=1 ──► dirty=0 ──► dirty=-1
//!   clean       dirty       dirty       dirty       clean       dirty
//! ```
//!
//! A negative count means the clean state lies in the redo future. Once that
//! future is discarded the count jumps to [`UNREACHABLE_CLEAN`] and only a
//! new save can make the document clean again.

use bitflags::bitflags;
use web_time::SystemTime;

bitflags! {
    /// Aspects of a document touched by an edit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirtyMask: u32 {
        /// Pixel content somewhere in the image.
        const IMAGE           = 1 << 0;
        /// Canvas size.
        const IMAGE_SIZE      = 1 << 1;
        /// Image-level metadata (resolution, grid, parasites).
        const IMAGE_META      = 1 << 2;
        /// Item tree structure (add, remove, reorder).
        const IMAGE_STRUCTURE = 1 << 3;
        /// Item geometry or attachment.
        const ITEM            = 1 << 4;
        /// Item properties (name, visibility, locks, color tag).
        const ITEM_META       = 1 << 5;
        /// Drawable content.
        const DRAWABLE        = 1 << 6;
        /// Path data.
        const PATH            = 1 << 7;
        /// Selection mask.
        const SELECTION       = 1 << 8;
        /// The active drawable changed.
        const ACTIVE_DRAWABLE = 1 << 9;
        /// Every aspect.
        const ALL = Self::IMAGE.bits()
            | Self::IMAGE_SIZE.bits()
            | Self::IMAGE_META.bits()
            | Self::IMAGE_STRUCTURE.bits()
            | Self::ITEM.bits()
            | Self::ITEM_META.bits()
            | Self::DRAWABLE.bits()
            | Self::PATH.bits()
            | Self::SELECTION.bits()
            | Self::ACTIVE_DRAWABLE.bits();
    }
}

impl Default for DirtyMask {
    fn default() -> Self {
        Self::empty()
    }
}

/// Number of distinct aspects in [`DirtyMask`].
pub const ASPECT_COUNT: usize = 10;

/// Dirty count assigned when the clean state can no longer be reached by
/// undo or redo.
pub const UNREACHABLE_CLEAN: i32 = 100_000;

/// Per-document dirty counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyTracker {
    dirty: i32,
    export_dirty: i32,
    aspects: [i32; ASPECT_COUNT],
    dirty_since: Option<SystemTime>,
}

impl Default for DirtyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DirtyTracker {
    /// A clean tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dirty: 0,
            export_dirty: 0,
            aspects: [0; ASPECT_COUNT],
            dirty_since: None,
        }
    }

    /// Count one edit touching `mask`. Returns the new dirty count.
    pub fn mark_dirty(&mut self, mask: DirtyMask) -> i32 {
        self.dirty = self.dirty.saturating_add(1);
        self.export_dirty = self.export_dirty.saturating_add(1);
        for bit in aspect_indices(mask) {
            self.aspects[bit] = self.aspects[bit].saturating_add(1);
        }
        if self.dirty_since.is_none() {
            self.dirty_since = Some(SystemTime::now());
        }
        tracing::trace!(dirty = self.dirty, mask = ?mask, "document dirtied");
        self.dirty
    }

    /// Take back one edit touching `mask`. Returns the new dirty count.
    pub fn mark_clean(&mut self, mask: DirtyMask) -> i32 {
        self.dirty = self.dirty.saturating_sub(1);
        self.export_dirty = self.export_dirty.saturating_sub(1);
        for bit in aspect_indices(mask) {
            self.aspects[bit] = self.aspects[bit].saturating_sub(1);
        }
        if self.dirty == 0 {
            self.dirty_since = None;
        } else if self.dirty_since.is_none() {
            self.dirty_since = Some(SystemTime::now());
        }
        tracing::trace!(dirty = self.dirty, mask = ?mask, "document cleaned");
        self.dirty
    }

    /// Record the current state as saved.
    pub fn mark_saved(&mut self) {
        self.dirty = 0;
        self.aspects = [0; ASPECT_COUNT];
        self.dirty_since = None;
    }

    /// Record the current state as exported.
    pub fn mark_exported(&mut self) {
        self.export_dirty = 0;
    }

    /// Forget that the clean state is reachable by redoing.
    ///
    /// Must be called whenever redo history is discarded.
    pub fn invalidate_clean_future(&mut self) {
        if self.dirty < 0 {
            tracing::debug!(dirty = self.dirty, "clean state lost with redo history");
            self.dirty = UNREACHABLE_CLEAN;
        }
        if self.export_dirty < 0 {
            self.export_dirty = UNREACHABLE_CLEAN;
        }
    }

    /// Whether the document differs from its saved state.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty != 0
    }

    /// Whether the document differs from its exported state.
    #[must_use]
    pub const fn is_export_dirty(&self) -> bool {
        self.export_dirty != 0
    }

    /// Whether any aspect in `mask` differs from the saved state.
    #[must_use]
    pub fn is_aspect_dirty(&self, mask: DirtyMask) -> bool {
        aspect_indices(mask).any(|bit| self.aspects[bit] != 0)
    }

    /// Edits since the save baseline.
    #[must_use]
    pub const fn dirty_count(&self) -> i32 {
        self.dirty
    }

    /// Edits since the export baseline.
    #[must_use]
    pub const fn export_dirty_count(&self) -> i32 {
        self.export_dirty
    }

    /// Wall-clock time at which the document last became dirty.
    #[must_use]
    pub const fn dirty_since(&self) -> Option<SystemTime> {
        self.dirty_since
    }
}

fn aspect_indices(mask: DirtyMask) -> impl Iterator<Item = usize> {
    let bits = (mask & DirtyMask::ALL).bits();
    (0..ASPECT_COUNT).filter(move |bit| bits & (1 << bit) != 0)
}
