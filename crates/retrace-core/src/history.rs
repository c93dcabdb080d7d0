#![forbid(unsafe_code)]

//! Per-document undo history.
//!
//! [`UndoHistory`] owns the undo and redo stacks of one document together
//! with the group and freeze counters. It drives the document's
//! [`DirtyTracker`](crate::DirtyTracker) on every transition, so undoing back
//! to the last save makes the document clean again.
//!
//! # Invariants
//!
//! 1. Recording a new top-level entry discards the whole redo stack. Moving
//!    entries between the stacks in `undo`/`redo` never does.
//! 2. `pending_group` is `Some` exactly while `group_depth > 0`; nested
//!    groups only bump the depth, members stay flat.
//! 3. While frozen nothing new is recorded; replay still works.
//! 4. The dirty count moves by one per recorded, undone or redone entry with
//!    a non-empty mask, and by nothing else besides saves.
//!
//! # Stack Model
//!
//! ```text
//! push(A) push(B)
//! ┌──────────────────────────────────────┐
//! │ Undo: [A, B]        Redo: []         │  dirty = 2
//! └──────────────────────────────────────┘
//!
//! undo()
//! ┌──────────────────────────────────────┐
//! │ Undo: [A]           Redo: [B]        │  dirty = 1
//! └──────────────────────────────────────┘
//!
//! group_start(G) push(C) push(D) group_end()
//! ┌──────────────────────────────────────┐
//! │ Undo: [A, G{C, D}]  Redo: []         │  dirty = 2
//! └──────────────────────────────────────┘
//! ```

use std::fmt;

use tracing::{debug, debug_span, trace, warn};

use crate::config::HistoryConfig;
use crate::document::{Document, DocumentId, UndoAccumulator};
use crate::error::{HistoryError, Result};
use crate::event::{EntrySummary, ObserverId, Observers, UndoEvent};
use crate::group::UndoGroup;
use crate::kind::{UndoMode, UndoType};
use crate::stack::{UndoEntry, UndoStack};

/// What [`UndoHistory::push`] did with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Recorded as a new top-level undo entry.
    Recorded,
    /// Appended to the open group.
    Grouped,
    /// Dropped because recording is frozen.
    Dropped,
}

/// Undo/redo history of one document.
pub struct UndoHistory<D> {
    document: DocumentId,
    undo_stack: UndoStack<D>,
    redo_stack: UndoStack<D>,
    group_depth: usize,
    freeze_count: usize,
    pending_group: Option<UndoGroup<D>>,
    config: HistoryConfig,
    observers: Observers,
}

impl<D> fmt::Debug for UndoHistory<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoHistory")
            .field("document", &self.document)
            .field("undo_depth", &self.undo_stack.depth())
            .field("redo_depth", &self.redo_stack.depth())
            .field("group_depth", &self.group_depth)
            .field("freeze_count", &self.freeze_count)
            .field("config", &self.config)
            .finish()
    }
}

impl<D: Document> Default for UndoHistory<D> {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl<D: Document> UndoHistory<D> {
    /// Create a history for a fresh document id.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self::for_document(DocumentId::next(), config)
    }

    /// Create a history for an existing document id.
    #[must_use]
    pub fn for_document(document: DocumentId, config: HistoryConfig) -> Self {
        Self {
            document,
            undo_stack: UndoStack::new(),
            redo_stack: UndoStack::new(),
            group_depth: 0,
            freeze_count: 0,
            pending_group: None,
            config,
            observers: Observers::default(),
        }
    }

    // ====================================================================
    // Recording
    // ====================================================================

    /// Record an item or a group.
    ///
    /// While frozen the entry is dropped. While a group is open it becomes a
    /// member of that group (a pushed group contributes its members). Otherwise
    /// the redo stack is discarded, the entry goes on top of the undo stack and
    /// the document is marked dirty with the entry's mask.
    pub fn push(&mut self, doc: &mut D, entry: impl Into<UndoEntry<D>>) -> PushOutcome {
        let mut entry = entry.into();
        if self.freeze_count > 0 {
            trace!(
                undo_type = entry.undo_type().name(),
                "undo recording frozen, entry dropped"
            );
            return PushOutcome::Dropped;
        }

        entry.set_owner(self.document);

        if let Some(group) = self.pending_group.as_mut() {
            trace!(
                undo_type = entry.undo_type().name(),
                group = group.group_type().name(),
                "entry added to open undo group"
            );
            match entry {
                UndoEntry::Item(item) => group.push(item),
                UndoEntry::Group(nested) => {
                    for item in nested.into_members() {
                        group.push(item);
                    }
                }
            }
            return PushOutcome::Grouped;
        }

        self.record(doc, entry);
        PushOutcome::Recorded
    }

    /// Open a group, or nest one more level into the open group.
    pub fn group_start(&mut self, group_type: UndoType, label: impl Into<String>) -> Result<()> {
        if self.freeze_count > 0 {
            return Err(HistoryError::Frozen);
        }
        if !group_type.is_group() {
            return Err(HistoryError::NotAGroupType(group_type));
        }

        if self.group_depth == 0 {
            let group = UndoGroup::new(group_type, label);
            debug!(
                document = %self.document,
                group = group_type.name(),
                label = group.label(),
                "undo group opened"
            );
            self.pending_group = Some(group);
        } else {
            trace!(
                group = group_type.name(),
                depth = self.group_depth + 1,
                "nested undo group start"
            );
        }
        self.group_depth += 1;
        Ok(())
    }

    /// Close one level of grouping. Closing the outermost level records the
    /// pending group, even when it has no members.
    pub fn group_end(&mut self, doc: &mut D) -> Result<()> {
        if self.freeze_count > 0 {
            return Err(HistoryError::Frozen);
        }
        if self.group_depth == 0 {
            warn!(document = %self.document, "group_end without an open undo group");
            return Err(HistoryError::GroupUnderflow);
        }

        self.group_depth -= 1;
        if self.group_depth == 0
            && let Some(group) = self.pending_group.take()
        {
            debug!(
                document = %self.document,
                group = group.group_type().name(),
                members = group.len(),
                "undo group closed"
            );
            self.record(doc, UndoEntry::Group(group));
        }
        Ok(())
    }

    /// Suspend recording. Calls nest.
    pub fn freeze(&mut self) {
        self.freeze_count += 1;
        debug!(document = %self.document, freeze_count = self.freeze_count, "undo frozen");
        if self.freeze_count == 1 {
            self.emit(|| UndoEvent::UndoFreeze);
        }
    }

    /// Undo one [`freeze`](Self::freeze).
    pub fn thaw(&mut self) -> Result<()> {
        if self.freeze_count == 0 {
            warn!(document = %self.document, "thaw without a matching freeze");
            return Err(HistoryError::ThawUnderflow);
        }
        self.freeze_count -= 1;
        debug!(document = %self.document, freeze_count = self.freeze_count, "undo thawed");
        if self.freeze_count == 0 {
            self.emit(|| UndoEvent::UndoThaw);
        }
        Ok(())
    }

    // ====================================================================
    // Replay
    // ====================================================================

    /// Revert the newest entry and move it to the redo stack.
    ///
    /// Returns `false` when there is nothing to undo, or when a group is
    /// open (popping mid-group would split it).
    pub fn undo(&mut self, doc: &mut D) -> bool {
        self.replay(doc, UndoMode::Undo)
    }

    /// Re-apply the newest undone entry and move it back to the undo stack.
    pub fn redo(&mut self, doc: &mut D) -> bool {
        self.replay(doc, UndoMode::Redo)
    }

    fn replay(&mut self, doc: &mut D, mode: UndoMode) -> bool {
        if self.group_depth > 0 {
            warn!(
                document = %self.document,
                mode = ?mode,
                "undo replay refused while an undo group is open"
            );
            return false;
        }

        let source = match mode {
            UndoMode::Undo => &mut self.undo_stack,
            UndoMode::Redo => &mut self.redo_stack,
        };
        let Some(mut entry) = source.pop() else {
            return false;
        };

        let span = match mode {
            UndoMode::Undo => debug_span!(
                "undo.undo",
                undo_type = entry.undo_type().name(),
                label = entry.label()
            ),
            UndoMode::Redo => debug_span!(
                "undo.redo",
                undo_type = entry.undo_type().name(),
                label = entry.label()
            ),
        };
        let _guard = span.entered();

        let mask = entry.dirty_mask();
        if !mask.is_empty() {
            match mode {
                UndoMode::Undo => doc.dirty_mut().mark_clean(mask),
                UndoMode::Redo => doc.dirty_mut().mark_dirty(mask),
            };
        }

        let mut changes = UndoAccumulator::empty();
        entry.apply(doc, mode, &mut changes);

        let event = (!self.observers.is_empty()).then(|| {
            let summary = EntrySummary::of(&entry);
            match mode {
                UndoMode::Undo => UndoEvent::Undo(summary),
                UndoMode::Redo => UndoEvent::Redo(summary),
            }
        });

        match mode {
            UndoMode::Undo => self.redo_stack.push(entry),
            UndoMode::Redo => self.undo_stack.push(entry),
        }
        doc.changes_applied(mode, changes);

        debug!(
            undo_depth = self.undo_stack.depth(),
            redo_depth = self.redo_stack.depth(),
            dirty = doc.dirty().dirty_count(),
            "undo step applied"
        );
        if let Some(event) = event {
            self.observers.emit(&event);
        }
        true
    }

    // ====================================================================
    // Compression
    // ====================================================================

    /// Find the entry a weak edit may be folded into.
    ///
    /// Succeeds only when the document is dirty, nothing is waiting to be
    /// redone, no group is open, the top entry has kind `kind`, and
    /// `predicate` accepts it. A match means the caller should skip recording
    /// and let the top entry keep the pre-edit state.
    pub fn find_compressible<F>(
        &self,
        doc: &D,
        kind: UndoType,
        predicate: F,
    ) -> Option<&UndoEntry<D>>
    where
        F: FnOnce(&UndoEntry<D>) -> bool,
    {
        if !doc.dirty().is_dirty() || !self.redo_stack.is_empty() || self.group_depth > 0 {
            return None;
        }
        let top = self.undo_stack.peek()?;
        if top.undo_type() == kind && predicate(top) {
            trace!(undo_type = kind.name(), "compressible undo entry found");
            Some(top)
        } else {
            None
        }
    }

    // ====================================================================
    // Clearing & limits
    // ====================================================================

    /// Drop both stacks.
    ///
    /// A clean state that was only reachable by redoing becomes unreachable.
    pub fn clear(&mut self, doc: &mut D) {
        debug!(
            document = %self.document,
            undo_depth = self.undo_stack.depth(),
            redo_depth = self.redo_stack.depth(),
            "undo history cleared"
        );
        self.undo_stack.clear();
        self.redo_stack.clear();
        doc.dirty_mut().invalidate_clean_future();
        self.emit(|| UndoEvent::UndoFree);
    }

    /// Drop the redo stack only.
    pub fn clear_redo(&mut self, doc: &mut D) {
        let expired: Vec<UndoEntry<D>> = self.redo_stack.drain().collect();
        for entry in &expired {
            trace!(undo_type = entry.undo_type().name(), "redo entry expired");
        }
        if !self.observers.is_empty() {
            for entry in &expired {
                self.observers
                    .emit(&UndoEvent::RedoExpired(EntrySummary::of(entry)));
            }
        }
        drop(expired);
        doc.dirty_mut().invalidate_clean_future();
    }

    /// Replace the limits; the undo stack is trimmed right away.
    pub fn set_config(&mut self, config: HistoryConfig) {
        self.config = config;
        self.enforce_limits();
    }

    fn record(&mut self, doc: &mut D, entry: UndoEntry<D>) {
        self.clear_redo(doc);

        let mask = entry.dirty_mask();
        if !mask.is_empty() {
            doc.dirty_mut().mark_dirty(mask);
        }

        debug!(
            document = %self.document,
            undo_type = entry.undo_type().name(),
            label = entry.label(),
            byte_size = entry.byte_size(),
            members = entry.member_count(),
            "undo entry recorded"
        );
        let event = (!self.observers.is_empty())
            .then(|| UndoEvent::UndoPushed(EntrySummary::of(&entry)));
        self.undo_stack.push(entry);
        if let Some(event) = event {
            self.observers.emit(&event);
        }

        self.enforce_limits();
    }

    /// Evict from the bottom while over budget. The newest entry always
    /// survives.
    fn enforce_limits(&mut self) {
        loop {
            let depth = self.undo_stack.depth();
            if depth <= 1 {
                break;
            }
            let over_levels = self.config.max_levels.is_some_and(|max| depth > max);
            let over_bytes = depth > self.config.min_levels
                && self.undo_stack.total_size() > self.config.max_bytes;
            if !over_levels && !over_bytes {
                break;
            }
            let Some(entry) = self.undo_stack.pop_bottom() else {
                break;
            };
            trace!(
                undo_type = entry.undo_type().name(),
                byte_size = entry.byte_size(),
                remaining = self.undo_stack.total_size(),
                "undo entry expired"
            );
            if !self.observers.is_empty() {
                self.observers
                    .emit(&UndoEvent::UndoExpired(EntrySummary::of(&entry)));
            }
        }
    }

    // ====================================================================
    // Observers
    // ====================================================================

    /// Register an observer, called synchronously after each change.
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&UndoEvent) + Send + 'static,
    {
        self.observers.subscribe(Box::new(observer))
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn emit(&mut self, event: impl FnOnce() -> UndoEvent) {
        if !self.observers.is_empty() {
            self.observers.emit(&event());
        }
    }
}

impl<D> UndoHistory<D> {
    // ====================================================================
    // Queries
    // ====================================================================

    /// Id stamped on every recorded item.
    #[must_use]
    pub fn document_id(&self) -> DocumentId {
        self.document
    }

    /// Current limits.
    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Whether [`undo`](UndoHistory::undo) would do something.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.group_depth == 0 && !self.undo_stack.is_empty()
    }

    /// Whether [`redo`](UndoHistory::redo) would do something.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.group_depth == 0 && !self.redo_stack.is_empty()
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.depth()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.depth()
    }

    /// Bytes held by both stacks and the open group.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.undo_stack.total_size()
            + self.redo_stack.total_size()
            + self.pending_group.as_ref().map_or(0, UndoGroup::byte_size)
    }

    #[must_use]
    pub fn undo_stack(&self) -> &UndoStack<D> {
        &self.undo_stack
    }

    #[must_use]
    pub fn redo_stack(&self) -> &UndoStack<D> {
        &self.redo_stack
    }

    /// Label of the entry the next undo would revert.
    #[must_use]
    pub fn next_undo_label(&self) -> Option<&str> {
        if self.group_depth > 0 {
            return None;
        }
        self.undo_stack.peek().map(UndoEntry::label)
    }

    /// Label of the entry the next redo would re-apply.
    #[must_use]
    pub fn next_redo_label(&self) -> Option<&str> {
        if self.group_depth > 0 {
            return None;
        }
        self.redo_stack.peek().map(UndoEntry::label)
    }

    /// Kind of the entry the next undo would revert.
    #[must_use]
    pub fn next_undo_type(&self) -> Option<UndoType> {
        if self.group_depth > 0 {
            return None;
        }
        self.undo_stack.peek().map(UndoEntry::undo_type)
    }

    /// Undo labels, newest first.
    #[must_use]
    pub fn undo_labels(&self, limit: usize) -> Vec<&str> {
        self.undo_stack.iter().take(limit).map(UndoEntry::label).collect()
    }

    /// Redo labels, newest first.
    #[must_use]
    pub fn redo_labels(&self, limit: usize) -> Vec<&str> {
        self.redo_stack.iter().take(limit).map(UndoEntry::label).collect()
    }

    /// Whether new edits are being recorded.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.freeze_count == 0
    }

    #[must_use]
    pub fn freeze_count(&self) -> usize {
        self.freeze_count
    }

    #[must_use]
    pub fn group_depth(&self) -> usize {
        self.group_depth
    }

    #[must_use]
    pub fn is_group_open(&self) -> bool {
        self.group_depth > 0
    }

    /// The group being assembled, if one is open.
    #[must_use]
    pub fn pending_group(&self) -> Option<&UndoGroup<D>> {
        self.pending_group.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirty::{DirtyMask, DirtyTracker, UNREACHABLE_CLEAN};
    use crate::item::{UndoItem, UndoPayload};
    use std::any::Any;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct TestDoc {
        dirty: DirtyTracker,
        values: [i32; 4],
        log: Vec<(u32, UndoMode)>,
        applied: Vec<(UndoMode, UndoAccumulator)>,
    }

    impl Document for TestDoc {
        fn dirty(&self) -> &DirtyTracker {
            &self.dirty
        }

        fn dirty_mut(&mut self) -> &mut DirtyTracker {
            &mut self.dirty
        }

        fn changes_applied(&mut self, mode: UndoMode, changes: UndoAccumulator) {
            self.applied.push((mode, changes));
        }
    }

    /// Swaps `values[slot]` with the stored value.
    struct SetValue {
        slot: usize,
        stored: i32,
    }

    impl UndoPayload<TestDoc> for SetValue {
        fn apply(&mut self, doc: &mut TestDoc, mode: UndoMode, accum: &mut UndoAccumulator) {
            std::mem::swap(&mut doc.values[self.slot], &mut self.stored);
            doc.log.push((self.slot as u32, mode));
            if self.slot == 3 {
                accum.insert(UndoAccumulator::SIZE_CHANGED);
            }
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    type History = UndoHistory<TestDoc>;

    fn history() -> History {
        UndoHistory::new(HistoryConfig::unlimited())
    }

    fn set_item(kind: UndoType, mask: DirtyMask, doc: &TestDoc, slot: usize) -> UndoItem<TestDoc> {
        UndoItem::new(
            kind,
            mask,
            SetValue {
                slot,
                stored: doc.values[slot],
            },
        )
    }

    /// Record the old value, then edit the document.
    fn set(h: &mut History, doc: &mut TestDoc, slot: usize, value: i32) -> PushOutcome {
        let item = set_item(UndoType::LayerOpacity, DirtyMask::ITEM_META, doc, slot);
        let outcome = h.push(doc, item);
        doc.values[slot] = value;
        outcome
    }

    fn slot_of(entry: &UndoEntry<TestDoc>) -> Option<usize> {
        entry.payload::<SetValue>().map(|p| p.slot)
    }

    #[test]
    fn test_new_history_empty() {
        let h = history();
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert_eq!(h.undo_depth(), 0);
        assert_eq!(h.memory_usage(), 0);
        assert!(h.is_enabled());
        assert!(h.next_undo_label().is_none());
    }

    #[test]
    fn test_undo_redo_empty_is_noop() {
        let mut h = history();
        let mut doc = TestDoc::default();
        assert!(!h.undo(&mut doc));
        assert!(!h.redo(&mut doc));
        assert!(!doc.dirty.is_dirty());
        assert!(doc.applied.is_empty());
    }

    #[test]
    fn test_push_records_and_dirties() {
        let mut h = history();
        let mut doc = TestDoc::default();
        assert_eq!(set(&mut h, &mut doc, 0, 5), PushOutcome::Recorded);
        assert_eq!(h.undo_depth(), 1);
        assert!(doc.dirty.is_dirty());
        assert!(doc.dirty.is_aspect_dirty(DirtyMask::ITEM_META));
        assert_eq!(h.next_undo_label(), Some("Set layer opacity"));
        assert_eq!(h.next_undo_type(), Some(UndoType::LayerOpacity));
    }

    #[test]
    fn test_push_stamps_owner() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        let owner = h.undo_stack().peek().and_then(UndoEntry::as_item).and_then(UndoItem::owner);
        assert_eq!(owner, Some(h.document_id()));
    }

    #[test]
    fn test_empty_mask_leaves_dirty_alone() {
        let mut h = history();
        let mut doc = TestDoc::default();
        let item = set_item(UndoType::Cant, DirtyMask::empty(), &doc, 0);
        h.push(&mut doc, item);
        assert!(!doc.dirty.is_dirty());
        assert!(h.undo(&mut doc));
        assert!(!doc.dirty.is_dirty());
    }

    // Property 1
    #[test]
    fn test_push_clears_redo() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        set(&mut h, &mut doc, 1, 2);
        h.undo(&mut doc);
        h.undo(&mut doc);
        assert_eq!(h.redo_depth(), 2);

        set(&mut h, &mut doc, 2, 3);
        assert_eq!(h.redo_depth(), 0);
        assert!(!h.can_redo());
    }

    // Property 2
    #[test]
    fn test_undo_redo_round_trip() {
        let mut h = history();
        let mut doc = TestDoc::default();
        let edits = [(0, 4), (1, -2), (0, 9), (2, 7), (3, 1)];
        for (slot, value) in edits {
            set(&mut h, &mut doc, slot, value);
        }
        let after = doc.values;

        for _ in 0..edits.len() {
            assert!(h.undo(&mut doc));
        }
        assert_eq!(doc.values, [0; 4]);
        assert!(!doc.dirty.is_dirty());
        assert_eq!(h.undo_depth(), 0);
        assert_eq!(h.redo_depth(), edits.len());

        for _ in 0..edits.len() {
            assert!(h.redo(&mut doc));
        }
        assert_eq!(doc.values, after);
        assert_eq!(h.undo_depth(), edits.len());
        assert_eq!(h.redo_depth(), 0);
        assert_eq!(doc.dirty.dirty_count(), edits.len() as i32);
    }

    // Property 3
    #[test]
    fn test_group_atomicity() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 3, 1);
        let before = h.undo_depth();

        h.group_start(UndoType::GroupItemProperties, "Props").unwrap();
        for slot in 0..3 {
            assert_eq!(set(&mut h, &mut doc, slot, 10), PushOutcome::Grouped);
        }
        assert_eq!(h.undo_depth(), before);
        h.group_end(&mut doc).unwrap();
        assert_eq!(h.undo_depth(), before + 1);
        assert_eq!(doc.dirty.dirty_count(), 2);

        doc.log.clear();
        assert!(h.undo(&mut doc));
        assert_eq!(doc.values, [0, 0, 0, 1]);
        assert_eq!(
            doc.log,
            vec![(2, UndoMode::Undo), (1, UndoMode::Undo), (0, UndoMode::Undo)]
        );
        assert_eq!(doc.dirty.dirty_count(), 1);

        doc.log.clear();
        assert!(h.redo(&mut doc));
        assert_eq!(doc.values, [10, 10, 10, 1]);
        assert_eq!(
            doc.log,
            vec![(0, UndoMode::Redo), (1, UndoMode::Redo), (2, UndoMode::Redo)]
        );
    }

    // Property 4
    #[test]
    fn test_size_accounting() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        h.group_start(UndoType::GroupMisc, "Batch").unwrap();
        set(&mut h, &mut doc, 1, 1);
        set(&mut h, &mut doc, 2, 1);
        h.group_end(&mut doc).unwrap();
        h.undo(&mut doc);

        for stack in [h.undo_stack(), h.redo_stack()] {
            let sum: usize = stack
                .iter()
                .map(|e| match e {
                    UndoEntry::Item(item) => item.byte_size(),
                    UndoEntry::Group(group) => group.members().iter().map(UndoItem::byte_size).sum(),
                })
                .sum();
            assert_eq!(stack.total_size(), sum);
        }
        assert_eq!(
            h.memory_usage(),
            h.undo_stack().total_size() + h.redo_stack().total_size()
        );
    }

    // Property 5
    #[test]
    fn test_freeze_suppresses_recording() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        let dirty = doc.dirty.dirty_count();

        h.freeze();
        assert!(!h.is_enabled());
        for value in 0..5 {
            assert_eq!(set(&mut h, &mut doc, 1, value), PushOutcome::Dropped);
        }
        h.thaw().unwrap();

        assert_eq!(h.undo_depth(), 1);
        assert_eq!(h.undo_stack().peek().and_then(slot_of), Some(0));
        assert_eq!(doc.dirty.dirty_count(), dirty);
    }

    #[test]
    fn test_freeze_nests() {
        let mut h = history();
        h.freeze();
        h.freeze();
        h.thaw().unwrap();
        assert!(!h.is_enabled());
        h.thaw().unwrap();
        assert!(h.is_enabled());
        assert_eq!(h.thaw(), Err(HistoryError::ThawUnderflow));
        assert_eq!(h.freeze_count(), 0);
    }

    #[test]
    fn test_undo_redo_permitted_while_frozen() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        h.freeze();
        assert!(h.undo(&mut doc));
        assert_eq!(doc.values[0], 0);
        assert!(h.redo(&mut doc));
        assert_eq!(doc.values[0], 1);
        h.thaw().unwrap();
    }

    #[test]
    fn test_group_calls_refused_while_frozen() {
        let mut h = history();
        let mut doc = TestDoc::default();
        h.freeze();
        assert_eq!(
            h.group_start(UndoType::GroupMisc, "x"),
            Err(HistoryError::Frozen)
        );
        assert_eq!(h.group_depth(), 0);
        h.thaw().unwrap();

        h.group_start(UndoType::GroupMisc, "x").unwrap();
        h.freeze();
        assert_eq!(h.group_end(&mut doc), Err(HistoryError::Frozen));
        assert_eq!(h.group_depth(), 1);
        h.thaw().unwrap();
        h.group_end(&mut doc).unwrap();
        assert_eq!(h.group_depth(), 0);
    }

    // Property 6
    #[test]
    fn test_find_compressible_matches_target() {
        let mut h = history();
        let mut doc = TestDoc::default();
        let item = set_item(UndoType::ItemVisibility, DirtyMask::ITEM_META, &doc, 1);
        h.push(&mut doc, item);

        let hit = h.find_compressible(&doc, UndoType::ItemVisibility, |e| slot_of(e) == Some(1));
        assert!(hit.is_some());
        assert!(std::ptr::eq(hit.unwrap(), h.undo_stack().peek().unwrap()));

        let miss = h.find_compressible(&doc, UndoType::ItemVisibility, |e| slot_of(e) == Some(2));
        assert!(miss.is_none());
        let wrong_kind = h.find_compressible(&doc, UndoType::LayerMode, |_| true);
        assert!(wrong_kind.is_none());
    }

    // Property 14
    #[test]
    fn test_find_compressible_fails_after_save_or_with_redo() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        doc.dirty.mark_saved();
        assert!(h
            .find_compressible(&doc, UndoType::LayerOpacity, |_| true)
            .is_none());

        set(&mut h, &mut doc, 0, 2);
        assert!(h
            .find_compressible(&doc, UndoType::LayerOpacity, |_| true)
            .is_some());

        set(&mut h, &mut doc, 1, 2);
        h.undo(&mut doc);
        assert!(doc.dirty.is_dirty());
        assert!(h
            .find_compressible(&doc, UndoType::LayerOpacity, |_| true)
            .is_none());
    }

    #[test]
    fn test_find_compressible_none_while_group_open() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        h.group_start(UndoType::GroupMisc, "x").unwrap();
        assert!(h
            .find_compressible(&doc, UndoType::LayerOpacity, |_| true)
            .is_none());
    }

    // Property 7
    #[test]
    fn test_empty_group_is_recorded() {
        let mut h = history();
        let mut doc = TestDoc::default();
        h.group_start(UndoType::GroupMisc, "Nothing").unwrap();
        h.group_end(&mut doc).unwrap();
        assert_eq!(h.undo_depth(), 1);
        assert_eq!(h.undo_stack().peek().map(UndoEntry::member_count), Some(0));
        assert!(!doc.dirty.is_dirty());

        assert!(h.undo(&mut doc));
        assert_eq!(h.undo_depth(), 0);
        assert_eq!(h.redo_depth(), 1);
        assert_eq!(doc.values, [0; 4]);
        assert!(!doc.dirty.is_dirty());
    }

    // Property 8
    #[test]
    fn test_nested_groups_flatten() {
        let mut h = history();
        let mut doc = TestDoc::default();
        h.group_start(UndoType::GroupImageScale, "Outer").unwrap();
        set(&mut h, &mut doc, 0, 1);
        h.group_start(UndoType::GroupItemScale, "Inner").unwrap();
        assert_eq!(h.group_depth(), 2);
        set(&mut h, &mut doc, 1, 1);
        h.group_end(&mut doc).unwrap();
        assert_eq!(h.undo_depth(), 0);
        set(&mut h, &mut doc, 2, 1);
        h.group_end(&mut doc).unwrap();

        assert_eq!(h.undo_depth(), 1);
        let group = h.undo_stack().peek().and_then(UndoEntry::as_group).unwrap();
        assert_eq!(group.group_type(), UndoType::GroupImageScale);
        assert_eq!(group.label(), "Outer");
        let slots: Vec<usize> = group
            .members()
            .iter()
            .filter_map(|m| m.payload::<SetValue>().map(|p| p.slot))
            .collect();
        assert_eq!(slots, vec![0, 1, 2]);
    }

    #[test]
    fn test_pushed_group_flattens_into_open_group() {
        let mut h = history();
        let mut doc = TestDoc::default();
        let mut inner = UndoGroup::new(UndoType::GroupItemDisplace, "Move");
        inner.push(set_item(UndoType::ItemDisplace, DirtyMask::ITEM, &doc, 0));
        inner.push(set_item(UndoType::ItemDisplace, DirtyMask::ITEM, &doc, 1));

        h.group_start(UndoType::GroupTransform, "Transform").unwrap();
        assert_eq!(h.push(&mut doc, inner), PushOutcome::Grouped);
        assert_eq!(h.pending_group().map(UndoGroup::len), Some(2));
        h.group_end(&mut doc).unwrap();
        assert_eq!(h.undo_stack().peek().map(UndoEntry::member_count), Some(2));
    }

    #[test]
    fn test_group_end_underflow() {
        let mut h = history();
        let mut doc = TestDoc::default();
        assert_eq!(h.group_end(&mut doc), Err(HistoryError::GroupUnderflow));
        assert_eq!(h.group_depth(), 0);
        assert_eq!(h.undo_depth(), 0);
    }

    #[test]
    fn test_group_start_rejects_single_kind() {
        let mut h = history();
        assert_eq!(
            h.group_start(UndoType::LayerMode, "x"),
            Err(HistoryError::NotAGroupType(UndoType::LayerMode))
        );
        assert!(!h.is_group_open());
    }

    #[test]
    fn test_undo_refused_while_group_open() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        h.group_start(UndoType::GroupMisc, "x").unwrap();
        assert!(!h.can_undo());
        assert!(!h.undo(&mut doc));
        assert_eq!(doc.values[0], 1);
        assert!(h.next_undo_label().is_none());
        h.group_end(&mut doc).unwrap();
        assert!(h.can_undo());
    }

    #[test]
    fn test_group_redo_cleared_at_group_end() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        h.undo(&mut doc);
        h.group_start(UndoType::GroupMisc, "x").unwrap();
        set(&mut h, &mut doc, 1, 1);
        assert_eq!(h.redo_depth(), 1);
        h.group_end(&mut doc).unwrap();
        assert_eq!(h.redo_depth(), 0);
    }

    #[test]
    fn test_concrete_scenario() {
        let mut h = history();
        let mut doc = TestDoc::default();
        let v1 = set_item(UndoType::ItemVisibility, DirtyMask::ITEM, &doc, 1);
        h.push(&mut doc, v1);
        assert_eq!(h.undo_depth(), 1);

        assert!(h.undo(&mut doc));
        assert_eq!((h.undo_depth(), h.redo_depth()), (0, 1));
        assert!(h.redo(&mut doc));
        assert_eq!((h.undo_depth(), h.redo_depth()), (1, 0));

        assert!(h.undo(&mut doc));
        let v2 = set_item(UndoType::ItemRename, DirtyMask::ITEM_META, &doc, 2);
        h.push(&mut doc, v2);
        assert_eq!(h.redo_depth(), 0);
    }

    // Property 9
    #[test]
    fn test_save_then_undo_is_dirty() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        doc.dirty.mark_saved();
        assert!(!doc.dirty.is_dirty());

        h.undo(&mut doc);
        assert!(doc.dirty.is_dirty());
        h.redo(&mut doc);
        assert!(!doc.dirty.is_dirty());
    }

    // Property 10
    #[test]
    fn test_clean_state_unreachable_after_new_branch() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        doc.dirty.mark_saved();
        h.undo(&mut doc);
        assert_eq!(doc.dirty.dirty_count(), -1);

        set(&mut h, &mut doc, 1, 1);
        assert_eq!(doc.dirty.dirty_count(), UNREACHABLE_CLEAN + 1);
        h.undo(&mut doc);
        assert!(doc.dirty.is_dirty());

        doc.dirty.mark_saved();
        assert!(!doc.dirty.is_dirty());
    }

    #[test]
    fn test_clear_drops_both_stacks() {
        let mut h = history();
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        doc.dirty.mark_saved();
        set(&mut h, &mut doc, 1, 1);
        h.undo(&mut doc);
        h.undo(&mut doc);
        assert_eq!(doc.dirty.dirty_count(), -1);

        h.clear(&mut doc);
        assert_eq!(h.undo_depth(), 0);
        assert_eq!(h.redo_depth(), 0);
        assert_eq!(h.memory_usage(), 0);
        assert_eq!(doc.dirty.dirty_count(), UNREACHABLE_CLEAN);
    }

    // Property 11
    #[test]
    fn test_eviction_keeps_min_levels() {
        let mut h: History = UndoHistory::new(HistoryConfig::new(3, 0));
        let mut doc = TestDoc::default();
        for i in 0..10 {
            set(&mut h, &mut doc, i % 4, i as i32);
        }
        assert_eq!(h.undo_depth(), 3);
        assert_eq!(doc.values, [8, 9, 6, 7]);
        // The newest edit is still on top.
        assert!(h.undo(&mut doc));
        assert_eq!(doc.values[1], 5);
    }

    #[test]
    fn test_eviction_respects_byte_budget() {
        let mut doc = TestDoc::default();
        let one = set_item(UndoType::LayerOpacity, DirtyMask::ITEM_META, &doc, 0).byte_size();
        let mut h: History = UndoHistory::new(HistoryConfig::new(1, one * 4));
        for i in 0..8 {
            set(&mut h, &mut doc, 0, i);
        }
        assert_eq!(h.undo_depth(), 4);
        assert!(h.undo_stack().total_size() <= one * 4);
    }

    #[test]
    fn test_max_levels_caps_depth() {
        let config = HistoryConfig::unlimited().with_max_levels(2);
        let mut h: History = UndoHistory::new(HistoryConfig {
            min_levels: 0,
            ..config
        });
        let mut doc = TestDoc::default();
        for i in 0..5 {
            set(&mut h, &mut doc, 0, i);
        }
        assert_eq!(h.undo_depth(), 2);
    }

    #[test]
    fn test_newest_entry_never_evicted() {
        let mut h: History = UndoHistory::new(HistoryConfig::new(0, 0));
        let mut doc = TestDoc::default();
        set(&mut h, &mut doc, 0, 1);
        set(&mut h, &mut doc, 1, 1);
        assert_eq!(h.undo_depth(), 1);
        assert_eq!(h.undo_stack().peek().and_then(slot_of), Some(1));
    }

    #[test]
    fn test_set_config_trims_immediately() {
        let mut h = history();
        let mut doc = TestDoc::default();
        for i in 0..6 {
            set(&mut h, &mut doc, 0, i);
        }
        h.set_config(HistoryConfig::new(2, 0));
        assert_eq!(h.undo_depth(), 2);
    }

    // Property 12
    #[test]
    fn test_events_in_order() {
        let mut h: History = UndoHistory::new(HistoryConfig::new(1, 0));
        let mut doc = TestDoc::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = h.subscribe(move |e| sink.lock().unwrap().push(e.name()));

        set(&mut h, &mut doc, 0, 1);
        set(&mut h, &mut doc, 1, 1);
        h.undo(&mut doc);
        h.redo(&mut doc);
        h.undo(&mut doc);
        set(&mut h, &mut doc, 2, 1);
        h.freeze();
        h.thaw().unwrap();
        h.clear(&mut doc);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "undo-pushed",
                "undo-pushed",
                "undo-expired",
                "undo",
                "redo",
                "undo",
                "redo-expired",
                "undo-pushed",
                "undo-freeze",
                "undo-thaw",
                "undo-free",
            ]
        );

        assert!(h.unsubscribe(id));
        set(&mut h, &mut doc, 0, 2);
        assert_eq!(seen.lock().unwrap().len(), 11);
    }

    #[test]
    fn test_event_summary_describes_group() {
        let mut h = history();
        let mut doc = TestDoc::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        h.subscribe(move |e| {
            if let Some(s) = e.summary() {
                sink.lock().unwrap().push(s.clone());
            }
        });

        h.group_start(UndoType::GroupLayerOpacity, "Set layers opacity").unwrap();
        set(&mut h, &mut doc, 0, 1);
        set(&mut h, &mut doc, 1, 1);
        h.group_end(&mut doc).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].undo_type, UndoType::GroupLayerOpacity);
        assert_eq!(seen[0].member_count, 2);
        assert_eq!(seen[0].byte_size, h.undo_stack().total_size());
    }

    #[test]
    fn test_changes_applied_once_per_step() {
        let mut h = history();
        let mut doc = TestDoc::default();
        h.group_start(UndoType::GroupImageResize, "Resize").unwrap();
        set(&mut h, &mut doc, 3, 1);
        set(&mut h, &mut doc, 3, 2);
        set(&mut h, &mut doc, 0, 2);
        h.group_end(&mut doc).unwrap();

        h.undo(&mut doc);
        h.redo(&mut doc);
        assert_eq!(
            doc.applied,
            vec![
                (UndoMode::Undo, UndoAccumulator::SIZE_CHANGED),
                (UndoMode::Redo, UndoAccumulator::SIZE_CHANGED),
            ]
        );
    }

    #[test]
    fn test_labels_newest_first() {
        let mut h = history();
        let mut doc = TestDoc::default();
        for (slot, label) in ["Rename A", "Rename B", "Rename C"].into_iter().enumerate() {
            let item = set_item(UndoType::ItemRename, DirtyMask::ITEM_META, &doc, slot);
            h.push(&mut doc, item.with_label(label));
        }
        assert_eq!(h.undo_labels(2), vec!["Rename C", "Rename B"]);
        h.undo(&mut doc);
        assert_eq!(h.next_redo_label(), Some("Rename C"));
        assert_eq!(h.redo_labels(10), vec!["Rename C"]);
    }

    #[test]
    fn test_debug_output() {
        let h = history();
        let dbg = format!("{h:?}");
        assert!(dbg.contains("UndoHistory"));
        assert!(dbg.contains("undo_depth"));
    }
}
