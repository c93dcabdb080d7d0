#![forbid(unsafe_code)]

//! The image document and its undo history.

use std::collections::BTreeMap;

use tracing::debug;

use retrace_core::{
    DirtyTracker, Document, EntrySummary, HistoryConfig, ObserverId, UndoAccumulator, UndoEvent,
    UndoHistory, UndoMode, UndoType,
};

use crate::error::{ImageError, Result};
use crate::item::{ItemHandle, ItemId, ItemKind};

/// How often each kind of structural change was reported by undo/redo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub mode: u32,
    pub precision: u32,
    pub size: u32,
    pub resolution: u32,
    pub unit: u32,
    pub quick_mask: u32,
    pub structure: u32,
    pub alpha: u32,
}

impl ChangeCounts {
    fn record(&mut self, changes: UndoAccumulator) {
        let pairs = [
            (UndoAccumulator::MODE_CHANGED, &mut self.mode),
            (UndoAccumulator::PRECISION_CHANGED, &mut self.precision),
            (UndoAccumulator::SIZE_CHANGED, &mut self.size),
            (UndoAccumulator::RESOLUTION_CHANGED, &mut self.resolution),
            (UndoAccumulator::UNIT_CHANGED, &mut self.unit),
            (UndoAccumulator::QUICK_MASK_CHANGED, &mut self.quick_mask),
            (UndoAccumulator::STRUCTURE_CHANGED, &mut self.structure),
            (UndoAccumulator::ALPHA_CHANGED, &mut self.alpha),
        ];
        for (flag, counter) in pairs {
            if changes.contains(flag) {
                *counter += 1;
            }
        }
    }
}

/// Everything about an image that undo payloads act on.
#[derive(Debug)]
pub struct ImageContent {
    width: u32,
    height: u32,
    resolution: (f64, f64),
    layers: Vec<ItemHandle>,
    channels: Vec<ItemHandle>,
    paths: Vec<ItemHandle>,
    active_layer: Option<ItemId>,
    parasites: BTreeMap<String, String>,
    dirty: DirtyTracker,
    changes: ChangeCounts,
}

impl ImageContent {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            resolution: (72.0, 72.0),
            layers: Vec::new(),
            channels: Vec::new(),
            paths: Vec::new(),
            active_layer: None,
            parasites: BTreeMap::new(),
            dirty: DirtyTracker::new(),
            changes: ChangeCounts::default(),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resolution in pixels per inch.
    #[must_use]
    pub fn resolution(&self) -> (f64, f64) {
        self.resolution
    }

    /// Layers, top of the stack first.
    #[must_use]
    pub fn layers(&self) -> &[ItemHandle] {
        &self.layers
    }

    #[must_use]
    pub fn channels(&self) -> &[ItemHandle] {
        &self.channels
    }

    #[must_use]
    pub fn paths(&self) -> &[ItemHandle] {
        &self.paths
    }

    /// The list holding items of `kind`.
    #[must_use]
    pub fn items(&self, kind: ItemKind) -> &[ItemHandle] {
        match kind {
            ItemKind::Layer => &self.layers,
            ItemKind::Channel => &self.channels,
            ItemKind::Path => &self.paths,
        }
    }

    /// Position of `item` in its list, if attached.
    #[must_use]
    pub fn position(&self, item: &ItemHandle) -> Option<usize> {
        self.items(item.kind()).iter().position(|i| i == item)
    }

    /// Look up an attached item by id.
    #[must_use]
    pub fn find(&self, id: ItemId) -> Option<&ItemHandle> {
        self.layers
            .iter()
            .chain(&self.channels)
            .chain(&self.paths)
            .find(|item| item.id() == id)
    }

    #[must_use]
    pub fn active_layer(&self) -> Option<&ItemHandle> {
        let id = self.active_layer?;
        self.layers.iter().find(|layer| layer.id() == id)
    }

    #[must_use]
    pub fn parasite(&self, name: &str) -> Option<&str> {
        self.parasites.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn parasites(&self) -> &BTreeMap<String, String> {
        &self.parasites
    }

    /// Structural changes reported by undo and redo so far.
    #[must_use]
    pub fn changes(&self) -> ChangeCounts {
        self.changes
    }

    pub(crate) fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub(crate) fn set_resolution(&mut self, resolution: (f64, f64)) {
        self.resolution = resolution;
    }

    pub(crate) fn active_layer_slot(&mut self) -> &mut Option<ItemId> {
        &mut self.active_layer
    }

    pub(crate) fn parasites_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.parasites
    }

    pub(crate) fn items_mut(&mut self, kind: ItemKind) -> &mut Vec<ItemHandle> {
        match kind {
            ItemKind::Layer => &mut self.layers,
            ItemKind::Channel => &mut self.channels,
            ItemKind::Path => &mut self.paths,
        }
    }

    /// Insert `item` into its list, clamping `position` to the list length.
    pub(crate) fn attach(&mut self, item: ItemHandle, position: usize) {
        let list = self.items_mut(item.kind());
        let position = position.min(list.len());
        list.insert(position, item);
    }

    /// Remove `item` from its list, returning where it was.
    pub(crate) fn detach(&mut self, item: &ItemHandle) -> Option<usize> {
        let position = self.position(item)?;
        self.items_mut(item.kind()).remove(position);
        Some(position)
    }
}

impl Document for ImageContent {
    fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    fn dirty_mut(&mut self) -> &mut DirtyTracker {
        &mut self.dirty
    }

    fn changes_applied(&mut self, mode: UndoMode, changes: UndoAccumulator) {
        if !changes.is_empty() {
            debug!(mode = ?mode, changes = ?changes, "image changed by undo step");
        }
        self.changes.record(changes);
    }
}

/// A layered image with undo history.
#[derive(Debug)]
pub struct Image {
    pub(crate) content: ImageContent,
    pub(crate) history: UndoHistory<ImageContent>,
}

impl Image {
    /// An empty image with default history limits.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::with_config(width, height, HistoryConfig::default())
    }

    /// An empty image with custom history limits.
    pub fn with_config(width: u32, height: u32, config: HistoryConfig) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidSize { width, height });
        }
        Ok(Self {
            content: ImageContent::new(width, height),
            history: UndoHistory::new(config),
        })
    }

    #[must_use]
    pub fn content(&self) -> &ImageContent {
        &self.content
    }

    #[must_use]
    pub fn history(&self) -> &UndoHistory<ImageContent> {
        &self.history
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.content.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.content.height
    }

    #[must_use]
    pub fn layers(&self) -> &[ItemHandle] {
        &self.content.layers
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.content.dirty.is_dirty()
    }

    #[must_use]
    pub fn is_export_dirty(&self) -> bool {
        self.content.dirty.is_export_dirty()
    }

    /// Make the current state the clean baseline.
    pub fn save(&mut self) {
        debug!(document = %self.history.document_id(), "image saved");
        self.content.dirty.mark_saved();
    }

    /// Make the current state the export baseline.
    pub fn export(&mut self) {
        self.content.dirty.mark_exported();
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo(&mut self.content)
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo(&mut self.content)
    }

    pub fn freeze(&mut self) {
        self.history.freeze();
    }

    pub fn thaw(&mut self) -> Result<()> {
        Ok(self.history.thaw()?)
    }

    pub fn group_start(&mut self, group_type: UndoType, label: impl Into<String>) -> Result<()> {
        Ok(self.history.group_start(group_type, label)?)
    }

    pub fn group_end(&mut self) -> Result<()> {
        Ok(self.history.group_end(&mut self.content)?)
    }

    /// Forget all undo and redo steps.
    pub fn clear_history(&mut self) {
        self.history.clear(&mut self.content);
    }

    pub fn set_history_config(&mut self, config: HistoryConfig) {
        self.history.set_config(config);
    }

    /// Register an undo event observer.
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&UndoEvent) + Send + 'static,
    {
        self.history.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.history.unsubscribe(id)
    }

    /// Summary of the entry the next undo would revert.
    #[must_use]
    pub fn next_undo(&self) -> Option<EntrySummary> {
        if self.history.is_group_open() {
            return None;
        }
        self.history.undo_stack().peek().map(EntrySummary::of)
    }
}
