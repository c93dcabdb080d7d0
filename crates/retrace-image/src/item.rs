#![forbid(unsafe_code)]

//! Image items: layers, channels and paths.
//!
//! An [`ItemHandle`] is a shared reference to one item. The image's item
//! lists hold handles, and so do undo payloads, so an item removed from the
//! image stays alive for as long as an undo entry can put it back.
//!
//! Setters on the handle change the item without recording anything; the
//! undoable versions live on [`Image`](crate::Image).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_FILTER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    fn next() -> Self {
        Self(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Which item list an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Layer,
    Channel,
    Path,
}

/// Color label shown next to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorTag {
    #[default]
    None,
    Blue,
    Green,
    Yellow,
    Orange,
    Brown,
    Red,
    Violet,
    Gray,
}

/// Layer compositing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    Difference,
    Erase,
}

/// Item locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    Content,
    Position,
    Visibility,
}

/// Item bounds in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub offset_x: i32,
    pub offset_y: i32,
}

/// A layer mask. Pixel content is represented by a revision counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayerMask {
    pub content_rev: u64,
}

/// Identity of a drawable filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterId(u64);

/// A non-destructive filter attached to a drawable.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    id: FilterId,
    pub operation: String,
    pub opacity: f64,
    pub active: bool,
}

impl Filter {
    /// A new active filter at full opacity.
    #[must_use]
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            id: FilterId(NEXT_FILTER_ID.fetch_add(1, Ordering::Relaxed)),
            operation: operation.into(),
            opacity: 1.0,
            active: true,
        }
    }

    #[must_use]
    pub fn id(&self) -> FilterId {
        self.id
    }
}

/// Layer-only properties.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerProps {
    pub opacity: f64,
    pub mode: LayerMode,
    pub lock_alpha: bool,
    pub mask: Option<LayerMask>,
    pub apply_mask: bool,
    pub show_mask: bool,
}

impl Default for LayerProps {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            mode: LayerMode::Normal,
            lock_alpha: false,
            mask: None,
            apply_mask: true,
            show_mask: false,
        }
    }
}

/// Mutable state of an item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemProps {
    pub name: String,
    pub visible: bool,
    pub color_tag: ColorTag,
    pub lock_content: bool,
    pub lock_position: bool,
    pub lock_visibility: bool,
    pub geometry: Geometry,
    /// Bumped on every pixel edit.
    pub content_rev: u64,
    pub filters: Vec<Filter>,
    /// Set for layers only.
    pub layer: Option<LayerProps>,
    /// Channel display color (RGBA).
    pub color: [u8; 4],
    /// Path anchor points.
    pub points: Vec<(f64, f64)>,
}

impl ItemProps {
    fn new(kind: ItemKind, name: String, width: u32, height: u32) -> Self {
        Self {
            name,
            visible: true,
            color_tag: ColorTag::None,
            lock_content: false,
            lock_position: false,
            lock_visibility: false,
            geometry: Geometry {
                width,
                height,
                offset_x: 0,
                offset_y: 0,
            },
            content_rev: 0,
            filters: Vec::new(),
            layer: (kind == ItemKind::Layer).then(LayerProps::default),
            color: [0, 0, 0, 128],
            points: Vec::new(),
        }
    }
}

struct ItemInner {
    id: ItemId,
    kind: ItemKind,
    props: Mutex<ItemProps>,
}

/// Shared handle to an item.
#[derive(Clone)]
pub struct ItemHandle(Arc<ItemInner>);

impl fmt::Debug for ItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemHandle")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .field("name", &self.props().name)
            .finish()
    }
}

impl PartialEq for ItemHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ItemHandle {}

impl ItemHandle {
    fn with_kind(kind: ItemKind, name: impl Into<String>, width: u32, height: u32) -> Self {
        Self(Arc::new(ItemInner {
            id: ItemId::next(),
            kind,
            props: Mutex::new(ItemProps::new(kind, name.into(), width, height)),
        }))
    }

    /// A new, fully opaque layer.
    #[must_use]
    pub fn new_layer(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_kind(ItemKind::Layer, name, width, height)
    }

    /// A new channel.
    #[must_use]
    pub fn new_channel(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_kind(ItemKind::Channel, name, width, height)
    }

    /// A new, empty path.
    #[must_use]
    pub fn new_path(name: impl Into<String>) -> Self {
        Self::with_kind(ItemKind::Path, name, 0, 0)
    }

    #[must_use]
    pub fn id(&self) -> ItemId {
        self.0.id
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.0.kind
    }

    /// Number of live handles, including those held by undo entries.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Lock the item's properties.
    pub fn props(&self) -> MutexGuard<'_, ItemProps> {
        self.0.props.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current properties.
    #[must_use]
    pub fn snapshot(&self) -> ItemProps {
        self.props().clone()
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.props().name.clone()
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.props().visible
    }

    #[must_use]
    pub fn color_tag(&self) -> ColorTag {
        self.props().color_tag
    }

    #[must_use]
    pub fn is_locked(&self, lock: LockKind) -> bool {
        let props = self.props();
        match lock {
            LockKind::Content => props.lock_content,
            LockKind::Position => props.lock_position,
            LockKind::Visibility => props.lock_visibility,
        }
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.props().geometry
    }

    #[must_use]
    pub fn offset(&self) -> (i32, i32) {
        let g = self.props().geometry;
        (g.offset_x, g.offset_y)
    }

    #[must_use]
    pub fn content_rev(&self) -> u64 {
        self.props().content_rev
    }

    /// Layer opacity; `None` for channels and paths.
    #[must_use]
    pub fn opacity(&self) -> Option<f64> {
        self.props().layer.as_ref().map(|l| l.opacity)
    }

    #[must_use]
    pub fn mode(&self) -> Option<LayerMode> {
        self.props().layer.as_ref().map(|l| l.mode)
    }

    #[must_use]
    pub fn lock_alpha(&self) -> Option<bool> {
        self.props().layer.as_ref().map(|l| l.lock_alpha)
    }

    #[must_use]
    pub fn mask(&self) -> Option<LayerMask> {
        self.props().layer.as_ref().and_then(|l| l.mask)
    }

    #[must_use]
    pub fn apply_mask(&self) -> Option<bool> {
        self.props().layer.as_ref().map(|l| l.apply_mask)
    }

    #[must_use]
    pub fn show_mask(&self) -> Option<bool> {
        self.props().layer.as_ref().map(|l| l.show_mask)
    }

    #[must_use]
    pub fn filters(&self) -> Vec<Filter> {
        self.props().filters.clone()
    }

    #[must_use]
    pub fn filter(&self, id: FilterId) -> Option<Filter> {
        self.props().filters.iter().find(|f| f.id == id).cloned()
    }

    #[must_use]
    pub fn filter_index(&self, id: FilterId) -> Option<usize> {
        self.props().filters.iter().position(|f| f.id == id)
    }

    #[must_use]
    pub fn color(&self) -> [u8; 4] {
        self.props().color
    }

    #[must_use]
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.props().points.clone()
    }

    // ---- unrecorded setters -------------------------------------------------

    pub fn set_name(&self, name: impl Into<String>) {
        self.props().name = name.into();
    }

    pub fn set_visible(&self, visible: bool) {
        self.props().visible = visible;
    }

    pub fn set_color_tag(&self, tag: ColorTag) {
        self.props().color_tag = tag;
    }

    pub fn set_locked(&self, lock: LockKind, locked: bool) {
        let mut props = self.props();
        match lock {
            LockKind::Content => props.lock_content = locked,
            LockKind::Position => props.lock_position = locked,
            LockKind::Visibility => props.lock_visibility = locked,
        }
    }

    pub fn set_geometry(&self, geometry: Geometry) {
        self.props().geometry = geometry;
    }

    pub fn set_offset(&self, x: i32, y: i32) {
        let mut props = self.props();
        props.geometry.offset_x = x;
        props.geometry.offset_y = y;
    }

    pub fn set_content_rev(&self, rev: u64) {
        self.props().content_rev = rev;
    }

    /// Run `f` on the layer properties. No-op for channels and paths.
    pub fn update_layer(&self, f: impl FnOnce(&mut LayerProps)) {
        if let Some(layer) = self.props().layer.as_mut() {
            f(layer);
        }
    }

    pub fn set_color(&self, color: [u8; 4]) {
        self.props().color = color;
    }

    pub fn set_points(&self, points: Vec<(f64, f64)>) {
        self.props().points = points;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_has_layer_props() {
        let layer = ItemHandle::new_layer("Background", 64, 32);
        assert_eq!(layer.kind(), ItemKind::Layer);
        assert_eq!(layer.opacity(), Some(1.0));
        assert_eq!(layer.mode(), Some(LayerMode::Normal));
        assert_eq!(layer.geometry().width, 64);
        assert!(layer.is_visible());
    }

    #[test]
    fn test_channel_has_no_layer_props() {
        let channel = ItemHandle::new_channel("Alpha copy", 8, 8);
        assert_eq!(channel.opacity(), None);
        channel.update_layer(|l| l.opacity = 0.0);
        assert_eq!(channel.opacity(), None);
    }

    #[test]
    fn test_ids_unique_and_equality_by_identity() {
        let a = ItemHandle::new_path("a");
        let b = ItemHandle::new_path("a");
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_handle_count_tracks_clones() {
        let layer = ItemHandle::new_layer("L", 1, 1);
        assert_eq!(layer.handle_count(), 1);
        let other = layer.clone();
        assert_eq!(layer.handle_count(), 2);
        drop(other);
        assert_eq!(layer.handle_count(), 1);
    }

    #[test]
    fn test_setters() {
        let layer = ItemHandle::new_layer("L", 1, 1);
        layer.set_name("Renamed");
        layer.set_locked(LockKind::Position, true);
        layer.set_offset(3, -4);
        layer.update_layer(|l| l.mode = LayerMode::Screen);
        assert_eq!(layer.name(), "Renamed");
        assert!(layer.is_locked(LockKind::Position));
        assert!(!layer.is_locked(LockKind::Content));
        assert_eq!(layer.offset(), (3, -4));
        assert_eq!(layer.mode(), Some(LayerMode::Screen));
    }

    #[test]
    fn test_filter_lookup() {
        let layer = ItemHandle::new_layer("L", 1, 1);
        let blur = Filter::new("gaussian-blur");
        let id = blur.id();
        layer.props().filters.push(blur);
        assert_eq!(layer.filter_index(id), Some(0));
        assert_eq!(layer.filter(id).map(|f| f.operation), Some("gaussian-blur".into()));
    }
}
