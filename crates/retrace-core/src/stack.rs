#![forbid(unsafe_code)]

//! Undo stack storage.
//!
//! Entries are kept in a `VecDeque` with the top of the stack at the back,
//! so push/pop/peek at the top and eviction at the bottom are all O(1).
//!
//! # Invariants
//!
//! 1. `total_size` always equals the sum of `byte_size()` over all entries
//!    (a group's size is the sum of its members').
//! 2. Only `pop_bottom` removes anything other than the top entry.

use std::collections::VecDeque;
use std::fmt;

use crate::dirty::DirtyMask;
use crate::document::{DocumentId, UndoAccumulator};
use crate::group::UndoGroup;
use crate::item::UndoItem;
use crate::kind::{UndoMode, UndoType};

/// One top-level stack entry: a single item or a whole group.
pub enum UndoEntry<D> {
    Item(UndoItem<D>),
    Group(UndoGroup<D>),
}

impl<D> fmt::Debug for UndoEntry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(item) => fmt::Debug::fmt(item, f),
            Self::Group(group) => fmt::Debug::fmt(group, f),
        }
    }
}

impl<D> From<UndoItem<D>> for UndoEntry<D> {
    fn from(item: UndoItem<D>) -> Self {
        Self::Item(item)
    }
}

impl<D> From<UndoGroup<D>> for UndoEntry<D> {
    fn from(group: UndoGroup<D>) -> Self {
        Self::Group(group)
    }
}

impl<D> UndoEntry<D> {
    /// Type tag: the item's kind or the group's kind.
    #[must_use]
    pub fn undo_type(&self) -> UndoType {
        match self {
            Self::Item(item) => item.undo_type(),
            Self::Group(group) => group.group_type(),
        }
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Item(item) => item.label(),
            Self::Group(group) => group.label(),
        }
    }

    /// Dirty mask; the member union for groups.
    #[must_use]
    pub fn dirty_mask(&self) -> DirtyMask {
        match self {
            Self::Item(item) => item.dirty_mask(),
            Self::Group(group) => group.dirty_mask(),
        }
    }

    /// Size in bytes; the member sum for groups.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Item(item) => item.byte_size(),
            Self::Group(group) => group.byte_size(),
        }
    }

    /// Number of recorded items (1 for a single item).
    #[must_use]
    pub fn member_count(&self) -> usize {
        match self {
            Self::Item(_) => 1,
            Self::Group(group) => group.len(),
        }
    }

    /// The single item, if this entry is one.
    #[must_use]
    pub fn as_item(&self) -> Option<&UndoItem<D>> {
        match self {
            Self::Item(item) => Some(item),
            Self::Group(_) => None,
        }
    }

    /// The group, if this entry is one.
    #[must_use]
    pub fn as_group(&self) -> Option<&UndoGroup<D>> {
        match self {
            Self::Item(_) => None,
            Self::Group(group) => Some(group),
        }
    }

    /// Downcast the payload of a single-item entry.
    #[must_use]
    pub fn payload<T: 'static>(&self) -> Option<&T>
    where
        D: 'static,
    {
        self.as_item().and_then(UndoItem::payload::<T>)
    }

    pub(crate) fn set_owner(&mut self, owner: DocumentId) {
        match self {
            Self::Item(item) => item.set_owner(owner),
            Self::Group(group) => {
                for item in group.members_mut() {
                    item.set_owner(owner);
                }
            }
        }
    }

    pub(crate) fn apply(&mut self, doc: &mut D, mode: UndoMode, accum: &mut UndoAccumulator) {
        match self {
            Self::Item(item) => item.apply(doc, mode, accum),
            Self::Group(group) => group.apply(doc, mode, accum),
        }
    }
}

/// An ordered stack of undo entries with incremental size accounting.
pub struct UndoStack<D> {
    /// Entries, oldest at the front, top of stack at the back.
    entries: VecDeque<UndoEntry<D>>,
    /// Sum of `byte_size()` over `entries`.
    total_size: usize,
}

impl<D> fmt::Debug for UndoStack<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoStack")
            .field("depth", &self.entries.len())
            .field("total_size", &self.total_size)
            .finish()
    }
}

impl<D> Default for UndoStack<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> UndoStack<D> {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            total_size: 0,
        }
    }

    /// Push an entry on top.
    pub fn push(&mut self, entry: impl Into<UndoEntry<D>>) {
        let entry = entry.into();
        self.total_size += entry.byte_size();
        self.entries.push_back(entry);
    }

    /// Remove and return the top entry.
    pub fn pop(&mut self) -> Option<UndoEntry<D>> {
        let entry = self.entries.pop_back()?;
        self.total_size -= entry.byte_size();
        Some(entry)
    }

    /// Remove and return the oldest entry.
    pub fn pop_bottom(&mut self) -> Option<UndoEntry<D>> {
        let entry = self.entries.pop_front()?;
        self.total_size -= entry.byte_size();
        Some(entry)
    }

    /// The top entry.
    #[must_use]
    pub fn peek(&self) -> Option<&UndoEntry<D>> {
        self.entries.back()
    }

    /// The top entry, mutably. Sizes are fixed, so this cannot break the total.
    pub fn peek_mut(&mut self) -> Option<&mut UndoEntry<D>> {
        self.entries.back_mut()
    }

    /// Number of top-level entries; a group counts once.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Whether the stack has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the entries' sizes.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_size = 0;
    }

    /// Remove every entry, top first.
    pub fn drain(&mut self) -> impl Iterator<Item = UndoEntry<D>> + '_ {
        self.total_size = 0;
        self.entries.drain(..).rev()
    }

    /// Iterate from the top of the stack down.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &UndoEntry<D>> + '_ {
        self.entries.iter().rev()
    }
}
