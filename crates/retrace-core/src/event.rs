#![forbid(unsafe_code)]

//! Undo events.
//!
//! Observers are told about every change to the stacks after it has
//! happened. Nothing in the engine depends on them; they exist for preview
//! generation, menu sensitivity and similar affordances.

use std::fmt;

use crate::kind::UndoType;
use crate::stack::UndoEntry;

/// A snapshot of an entry, detached from the entry itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub undo_type: UndoType,
    pub label: String,
    pub byte_size: usize,
    pub member_count: usize,
}

impl EntrySummary {
    /// Summarize an entry.
    #[must_use]
    pub fn of<D>(entry: &UndoEntry<D>) -> Self {
        Self {
            undo_type: entry.undo_type(),
            label: entry.label().to_string(),
            byte_size: entry.byte_size(),
            member_count: entry.member_count(),
        }
    }
}

/// Something that happened to an undo history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEvent {
    /// A new entry landed on the undo stack.
    UndoPushed(EntrySummary),
    /// The oldest undo entry was evicted.
    UndoExpired(EntrySummary),
    /// A redo entry was discarded by a new edit or by `clear_redo`.
    RedoExpired(EntrySummary),
    /// An entry was undone and moved to the redo stack.
    Undo(EntrySummary),
    /// An entry was redone and moved back to the undo stack.
    Redo(EntrySummary),
    /// Both stacks were emptied.
    UndoFree,
    /// Recording was disabled.
    UndoFreeze,
    /// Recording was re-enabled.
    UndoThaw,
}

impl UndoEvent {
    /// Stable name, for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::UndoPushed(_) => "undo-pushed",
            Self::UndoExpired(_) => "undo-expired",
            Self::RedoExpired(_) => "redo-expired",
            Self::Undo(_) => "undo",
            Self::Redo(_) => "redo",
            Self::UndoFree => "undo-free",
            Self::UndoFreeze => "undo-freeze",
            Self::UndoThaw => "undo-thaw",
        }
    }

    /// The entry the event is about, if any.
    #[must_use]
    pub const fn summary(&self) -> Option<&EntrySummary> {
        match self {
            Self::UndoPushed(s)
            | Self::UndoExpired(s)
            | Self::RedoExpired(s)
            | Self::Undo(s)
            | Self::Redo(s) => Some(s),
            Self::UndoFree | Self::UndoFreeze | Self::UndoThaw => None,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&UndoEvent) + Send>;

/// Registered observers, notified in subscription order.
#[derive(Default)]
pub(crate) struct Observers {
    next_id: u64,
    list: Vec<(ObserverId, Observer)>,
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.list.len())
            .finish()
    }
}

impl Observers {
    pub(crate) fn subscribe(&mut self, observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.list.push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.list.len();
        self.list.retain(|(existing, _)| *existing != id);
        self.list.len() != before
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub(crate) fn emit(&mut self, event: &UndoEvent) {
        for (_, observer) in &mut self.list {
            observer(event);
        }
    }
}
