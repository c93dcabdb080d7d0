#![forbid(unsafe_code)]

//! Single reversible undo steps.
//!
//! An [`UndoItem`] pairs the bookkeeping the history needs (type, dirty mask,
//! size, label) with a payload that knows how to revert and re-apply one edit.
//!
//! # Invariants
//!
//! - An item never changes after construction, except for state its payload
//!   swaps while applying itself.
//! - `byte_size()` is fixed at construction; stacks rely on it for their
//!   incremental totals.
//! - Applying a payload with [`UndoMode::Undo`] and then [`UndoMode::Redo`]
//!   restores the post-edit document exactly, and can be repeated.

use std::any::Any;
use std::fmt;

use web_time::Instant;

use crate::dirty::DirtyMask;
use crate::document::{DocumentId, UndoAccumulator};
use crate::kind::{UndoMode, UndoType};

/// The kind-specific half of an undo step.
///
/// Payloads hold whatever pre-edit state is needed to revert the edit. The
/// usual shape is a target reference plus a stored value that `apply` swaps
/// with the live one, which makes undo and redo the same operation.
pub trait UndoPayload<D>: Send {
    /// Revert (`Undo`) or re-apply (`Redo`) the recorded edit on `doc`.
    fn apply(&mut self, doc: &mut D, mode: UndoMode, accum: &mut UndoAccumulator);

    /// Heap size of the payload in bytes, for memory accounting.
    fn size_bytes(&self) -> usize {
        0
    }

    /// Downcast support for compression predicates.
    fn as_any(&self) -> &dyn Any;

    /// Name used in debug output.
    fn debug_name(&self) -> &'static str {
        "UndoPayload"
    }
}

/// Callback type for closure-backed payloads.
pub type ApplyFn<D> = Box<dyn FnMut(&mut D, UndoMode, &mut UndoAccumulator) + Send>;

/// A payload backed by a closure.
///
/// Handy for one-off steps that do not deserve their own payload type.
pub struct FnPayload<D> {
    apply: ApplyFn<D>,
    target: Option<u64>,
    size_bytes: usize,
}

impl<D> fmt::Debug for FnPayload<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPayload")
            .field("target", &self.target)
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

impl<D> FnPayload<D> {
    /// Wrap a closure.
    pub fn with_apply<F>(f: F) -> Self
    where
        F: FnMut(&mut D, UndoMode, &mut UndoAccumulator) + Send + 'static,
    {
        Self {
            apply: Box::new(f),
            target: None,
            size_bytes: 0,
        }
    }

    /// Tag the payload with an opaque target id, for compression predicates.
    #[must_use]
    pub fn with_target(mut self, target: u64) -> Self {
        self.target = Some(target);
        self
    }

    /// Report an explicit heap size.
    #[must_use]
    pub fn with_size(mut self, size_bytes: usize) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    /// The opaque target id, if one was set.
    #[must_use]
    pub fn target(&self) -> Option<u64> {
        self.target
    }
}

impl<D: 'static> UndoPayload<D> for FnPayload<D> {
    fn apply(&mut self, doc: &mut D, mode: UndoMode, accum: &mut UndoAccumulator) {
        (self.apply)(doc, mode, accum);
    }

    fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn debug_name(&self) -> &'static str {
        "FnPayload"
    }
}

/// One recorded, reversible edit.
pub struct UndoItem<D> {
    undo_type: UndoType,
    label: String,
    dirty_mask: DirtyMask,
    timestamp: Instant,
    owner: Option<DocumentId>,
    byte_size: usize,
    payload: Box<dyn UndoPayload<D>>,
}

impl<D> fmt::Debug for UndoItem<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoItem")
            .field("undo_type", &self.undo_type)
            .field("label", &self.label)
            .field("dirty_mask", &self.dirty_mask)
            .field("owner", &self.owner)
            .field("byte_size", &self.byte_size)
            .field("payload", &self.payload.debug_name())
            .finish()
    }
}

impl<D: 'static> UndoItem<D> {
    /// Create an item labelled with the kind's default description.
    pub fn new<P>(undo_type: UndoType, dirty_mask: DirtyMask, payload: P) -> Self
    where
        P: UndoPayload<D> + 'static,
    {
        Self::from_boxed(undo_type, dirty_mask, Box::new(payload))
    }

    /// Create an item from an already boxed payload.
    pub fn from_boxed(
        undo_type: UndoType,
        dirty_mask: DirtyMask,
        payload: Box<dyn UndoPayload<D>>,
    ) -> Self {
        let mut item = Self {
            undo_type,
            label: undo_type.description().to_string(),
            dirty_mask,
            timestamp: Instant::now(),
            owner: None,
            byte_size: 0,
            payload,
        };
        item.byte_size = item.measure();
        item
    }

    /// Create an item whose payload is a closure.
    pub fn from_fn<F>(undo_type: UndoType, dirty_mask: DirtyMask, f: F) -> Self
    where
        F: FnMut(&mut D, UndoMode, &mut UndoAccumulator) + Send + 'static,
    {
        Self::new(undo_type, dirty_mask, FnPayload::with_apply(f))
    }

    /// Replace the default label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self.byte_size = self.measure();
        self
    }

    /// Borrow the payload as a concrete type.
    #[must_use]
    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref::<T>()
    }
}

impl<D> UndoItem<D> {
    fn measure(&self) -> usize {
        std::mem::size_of::<Self>() + self.label.len() + self.payload.size_bytes()
    }

    /// Type tag.
    #[must_use]
    pub fn undo_type(&self) -> UndoType {
        self.undo_type
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Document aspects this edit touches.
    #[must_use]
    pub fn dirty_mask(&self) -> DirtyMask {
        self.dirty_mask
    }

    /// When the item was created.
    #[must_use]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Document the item was recorded against, once pushed.
    #[must_use]
    pub fn owner(&self) -> Option<DocumentId> {
        self.owner
    }

    /// Size in bytes for memory accounting.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// The payload as a trait object.
    #[must_use]
    pub fn payload_dyn(&self) -> &dyn UndoPayload<D> {
        self.payload.as_ref()
    }

    pub(crate) fn set_owner(&mut self, owner: DocumentId) {
        self.owner = Some(owner);
    }

    pub(crate) fn apply(&mut self, doc: &mut D, mode: UndoMode, accum: &mut UndoAccumulator) {
        tracing::trace!(
            undo_type = self.undo_type.name(),
            mode = ?mode,
            "applying undo item"
        );
        self.payload.apply(doc, mode, accum);
    }
}
