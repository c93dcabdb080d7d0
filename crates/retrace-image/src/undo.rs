#![forbid(unsafe_code)]

//! Undo payloads for image edits.
//!
//! Every variant stores the state that is *not* live: before the first undo
//! that is the pre-edit value, after it the post-edit value. Applying a
//! variant swaps stored and live state, so undo and redo are the same
//! operation and can be repeated any number of times.

use std::any::Any;
use std::mem;

use retrace_core::{UndoAccumulator, UndoMode, UndoPayload};

use crate::image::ImageContent;
use crate::item::{
    ColorTag, Filter, FilterId, Geometry, ItemHandle, ItemId, ItemKind, LayerMask, LayerMode,
    LockKind,
};

/// One recorded image edit.
#[derive(Debug)]
pub enum ImageUndo {
    ImageSize {
        width: u32,
        height: u32,
    },
    ImageResolution {
        resolution: (f64, f64),
    },
    Parasite {
        name: String,
        value: Option<String>,
    },
    /// Item attached to or detached from the image. Covers add and remove of
    /// layers, channels and paths.
    ItemPresence {
        item: ItemHandle,
        position: usize,
        active_layer: Option<ItemId>,
    },
    ItemReorder {
        item: ItemHandle,
        position: usize,
    },
    ItemRename {
        item: ItemHandle,
        name: String,
    },
    ItemVisibility {
        item: ItemHandle,
        visible: bool,
    },
    ItemColorTag {
        item: ItemHandle,
        tag: ColorTag,
    },
    ItemLock {
        item: ItemHandle,
        lock: LockKind,
        locked: bool,
    },
    ItemDisplace {
        item: ItemHandle,
        offset: (i32, i32),
    },
    /// Geometry and pixels of a drawable.
    Drawable {
        item: ItemHandle,
        geometry: Geometry,
        content_rev: u64,
    },
    /// Pixels of a drawable.
    DrawableMod {
        item: ItemHandle,
        content_rev: u64,
    },
    LayerOpacity {
        item: ItemHandle,
        opacity: f64,
    },
    LayerMode {
        item: ItemHandle,
        mode: LayerMode,
    },
    LayerLockAlpha {
        item: ItemHandle,
        locked: bool,
    },
    /// Layer mask attached or detached.
    LayerMaskPresence {
        item: ItemHandle,
        mask: Option<LayerMask>,
    },
    LayerMaskApply {
        item: ItemHandle,
        apply: bool,
    },
    LayerMaskShow {
        item: ItemHandle,
        show: bool,
    },
    ChannelColor {
        item: ItemHandle,
        color: [u8; 4],
    },
    PathPoints {
        item: ItemHandle,
        points: Vec<(f64, f64)>,
    },
    /// Filter attached to or detached from a drawable.
    FilterPresence {
        item: ItemHandle,
        filter: Filter,
        index: usize,
    },
    FilterReorder {
        item: ItemHandle,
        filter: FilterId,
        index: usize,
    },
    FilterModified {
        item: ItemHandle,
        filter: Filter,
    },
}

impl ImageUndo {
    /// The item this edit targets, if any.
    #[must_use]
    pub fn item(&self) -> Option<&ItemHandle> {
        match self {
            Self::ImageSize { .. } | Self::ImageResolution { .. } | Self::Parasite { .. } => None,
            Self::ItemPresence { item, .. }
            | Self::ItemReorder { item, .. }
            | Self::ItemRename { item, .. }
            | Self::ItemVisibility { item, .. }
            | Self::ItemColorTag { item, .. }
            | Self::ItemLock { item, .. }
            | Self::ItemDisplace { item, .. }
            | Self::Drawable { item, .. }
            | Self::DrawableMod { item, .. }
            | Self::LayerOpacity { item, .. }
            | Self::LayerMode { item, .. }
            | Self::LayerLockAlpha { item, .. }
            | Self::LayerMaskPresence { item, .. }
            | Self::LayerMaskApply { item, .. }
            | Self::LayerMaskShow { item, .. }
            | Self::ChannelColor { item, .. }
            | Self::PathPoints { item, .. }
            | Self::FilterPresence { item, .. }
            | Self::FilterReorder { item, .. }
            | Self::FilterModified { item, .. } => Some(item),
        }
    }

    /// Whether this edit targets `item`.
    #[must_use]
    pub fn targets(&self, item: &ItemHandle) -> bool {
        self.item().is_some_and(|target| target == item)
    }
}

impl UndoPayload<ImageContent> for ImageUndo {
    fn apply(&mut self, image: &mut ImageContent, _mode: UndoMode, accum: &mut UndoAccumulator) {
        match self {
            Self::ImageSize { width, height } => {
                let (live_w, live_h) = (image.width(), image.height());
                image.set_size(*width, *height);
                *width = live_w;
                *height = live_h;
                accum.insert(UndoAccumulator::SIZE_CHANGED);
            }
            Self::ImageResolution { resolution } => {
                let live = image.resolution();
                image.set_resolution(*resolution);
                *resolution = live;
                accum.insert(UndoAccumulator::RESOLUTION_CHANGED);
            }
            Self::Parasite { name, value } => {
                let parasites = image.parasites_mut();
                let live = parasites.remove(name.as_str());
                if let Some(stored) = value.take() {
                    parasites.insert(name.clone(), stored);
                }
                *value = live;
            }
            Self::ItemPresence {
                item,
                position,
                active_layer,
            } => {
                match image.detach(item) {
                    Some(live_position) => *position = live_position,
                    None => image.attach(item.clone(), *position),
                }
                if item.kind() == ItemKind::Layer {
                    mem::swap(image.active_layer_slot(), active_layer);
                }
                accum.insert(UndoAccumulator::STRUCTURE_CHANGED);
            }
            Self::ItemReorder { item, position } => {
                if let Some(live_position) = image.detach(item) {
                    image.attach(item.clone(), *position);
                    *position = live_position;
                }
                accum.insert(UndoAccumulator::STRUCTURE_CHANGED);
            }
            Self::ItemRename { item, name } => mem::swap(&mut item.props().name, name),
            Self::ItemVisibility { item, visible } => {
                mem::swap(&mut item.props().visible, visible);
            }
            Self::ItemColorTag { item, tag } => mem::swap(&mut item.props().color_tag, tag),
            Self::ItemLock { item, lock, locked } => {
                let live = item.is_locked(*lock);
                item.set_locked(*lock, *locked);
                *locked = live;
            }
            Self::ItemDisplace { item, offset } => {
                let live = item.offset();
                item.set_offset(offset.0, offset.1);
                *offset = live;
            }
            Self::Drawable {
                item,
                geometry,
                content_rev,
            } => {
                let mut props = item.props();
                mem::swap(&mut props.geometry, geometry);
                mem::swap(&mut props.content_rev, content_rev);
            }
            Self::DrawableMod { item, content_rev } => {
                mem::swap(&mut item.props().content_rev, content_rev);
            }
            Self::LayerOpacity { item, opacity } => {
                item.update_layer(|layer| mem::swap(&mut layer.opacity, opacity));
            }
            Self::LayerMode { item, mode } => {
                item.update_layer(|layer| mem::swap(&mut layer.mode, mode));
            }
            Self::LayerLockAlpha { item, locked } => {
                item.update_layer(|layer| mem::swap(&mut layer.lock_alpha, locked));
                accum.insert(UndoAccumulator::ALPHA_CHANGED);
            }
            Self::LayerMaskPresence { item, mask } => {
                item.update_layer(|layer| mem::swap(&mut layer.mask, mask));
                accum.insert(UndoAccumulator::STRUCTURE_CHANGED);
            }
            Self::LayerMaskApply { item, apply } => {
                item.update_layer(|layer| mem::swap(&mut layer.apply_mask, apply));
            }
            Self::LayerMaskShow { item, show } => {
                item.update_layer(|layer| mem::swap(&mut layer.show_mask, show));
            }
            Self::ChannelColor { item, color } => mem::swap(&mut item.props().color, color),
            Self::PathPoints { item, points } => mem::swap(&mut item.props().points, points),
            Self::FilterPresence {
                item,
                filter,
                index,
            } => {
                let mut props = item.props();
                let filters = &mut props.filters;
                match filters.iter().position(|f| f.id() == filter.id()) {
                    Some(live_index) => {
                        *filter = filters.remove(live_index);
                        *index = live_index;
                    }
                    None => {
                        let at = (*index).min(filters.len());
                        filters.insert(at, filter.clone());
                    }
                }
            }
            Self::FilterReorder {
                item,
                filter,
                index,
            } => {
                let mut props = item.props();
                let filters = &mut props.filters;
                if let Some(live_index) = filters.iter().position(|f| f.id() == *filter) {
                    let moved = filters.remove(live_index);
                    let at = (*index).min(filters.len());
                    filters.insert(at, moved);
                    *index = live_index;
                }
            }
            Self::FilterModified { item, filter } => {
                let mut props = item.props();
                if let Some(live) = props.filters.iter_mut().find(|f| f.id() == filter.id()) {
                    mem::swap(live, filter);
                }
            }
        }
    }

    fn size_bytes(&self) -> usize {
        match self {
            Self::Parasite { name, value } => name.len() + value.as_ref().map_or(0, String::len),
            Self::ItemRename { name, .. } => name.len(),
            Self::PathPoints { points, .. } => points.len() * mem::size_of::<(f64, f64)>(),
            Self::FilterPresence { filter, .. } | Self::FilterModified { filter, .. } => {
                filter.operation.len()
            }
            // Pixel data is shared with the item; count a nominal tile per drawable.
            Self::Drawable { item, .. } | Self::DrawableMod { item, .. } => {
                let g = item.geometry();
                g.width as usize * g.height as usize
            }
            _ => 0,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn debug_name(&self) -> &'static str {
        "ImageUndo"
    }
}
