#![forbid(unsafe_code)]

//! Undo groups: several items that undo and redo as one step.

use std::fmt;

use web_time::Instant;

use crate::dirty::DirtyMask;
use crate::document::UndoAccumulator;
use crate::item::UndoItem;
use crate::kind::{UndoMode, UndoType};

/// A typed, labelled run of undo items recorded between
/// [`group_start`](crate::UndoHistory::group_start) and
/// [`group_end`](crate::UndoHistory::group_end).
///
/// Members are kept in the order they were recorded. The group's dirty mask
/// is the union of its members' masks and its size the sum of theirs.
pub struct UndoGroup<D> {
    group_type: UndoType,
    label: String,
    members: Vec<UndoItem<D>>,
    dirty_mask: DirtyMask,
    byte_size: usize,
    timestamp: Instant,
}

impl<D> fmt::Debug for UndoGroup<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoGroup")
            .field("group_type", &self.group_type)
            .field("label", &self.label)
            .field("members", &self.members.len())
            .field("dirty_mask", &self.dirty_mask)
            .field("byte_size", &self.byte_size)
            .finish()
    }
}

impl<D> UndoGroup<D> {
    /// Create an empty group.
    #[must_use]
    pub fn new(group_type: UndoType, label: impl Into<String>) -> Self {
        Self {
            group_type,
            label: label.into(),
            members: Vec::new(),
            dirty_mask: DirtyMask::empty(),
            byte_size: 0,
            timestamp: Instant::now(),
        }
    }

    /// Append a member.
    pub fn push(&mut self, item: UndoItem<D>) {
        self.dirty_mask |= item.dirty_mask();
        self.byte_size += item.byte_size();
        self.members.push(item);
    }

    /// Group type tag.
    #[must_use]
    pub fn group_type(&self) -> UndoType {
        self.group_type
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Members in recording order.
    #[must_use]
    pub fn members(&self) -> &[UndoItem<D>] {
        &self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Union of the members' dirty masks.
    #[must_use]
    pub fn dirty_mask(&self) -> DirtyMask {
        self.dirty_mask
    }

    /// Sum of the members' sizes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// When the group was opened.
    #[must_use]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub(crate) fn into_members(self) -> Vec<UndoItem<D>> {
        self.members
    }

    pub(crate) fn members_mut(&mut self) -> &mut [UndoItem<D>] {
        &mut self.members
    }

    /// Apply every member: newest first for undo, oldest first for redo.
    pub(crate) fn apply(&mut self, doc: &mut D, mode: UndoMode, accum: &mut UndoAccumulator) {
        match mode {
            UndoMode::Undo => {
                for item in self.members.iter_mut().rev() {
                    item.apply(doc, mode, accum);
                }
            }
            UndoMode::Redo => {
                for item in &mut self.members {
                    item.apply(doc, mode, accum);
                }
            }
        }
    }
}
