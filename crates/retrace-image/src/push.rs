#![forbid(unsafe_code)]

//! Typed undo push helpers.
//!
//! Each helper captures the pre-edit state of its target and records it.
//! Call the helper *before* changing the image.

use retrace_core::{DirtyMask, PushOutcome, UndoItem, UndoType};

use crate::error::{ImageError, Result};
use crate::image::Image;
use crate::item::{FilterId, ItemHandle, ItemKind, LockKind};
use crate::undo::ImageUndo;

impl Image {
    fn record(&mut self, kind: UndoType, mask: DirtyMask, payload: ImageUndo) -> PushOutcome {
        let item = UndoItem::new(kind, mask, payload);
        self.history.push(&mut self.content, item)
    }

    // ---- image ---------------------------------------------------------------

    pub fn push_image_size(&mut self) -> PushOutcome {
        let payload = ImageUndo::ImageSize {
            width: self.content.width(),
            height: self.content.height(),
        };
        self.record(
            UndoType::ImageSize,
            DirtyMask::IMAGE | DirtyMask::IMAGE_SIZE,
            payload,
        )
    }

    pub fn push_image_resolution(&mut self) -> PushOutcome {
        let payload = ImageUndo::ImageResolution {
            resolution: self.content.resolution(),
        };
        self.record(UndoType::ImageResolution, DirtyMask::IMAGE, payload)
    }

    pub fn push_parasite_attach(&mut self, name: &str) -> PushOutcome {
        self.push_parasite(UndoType::ParasiteAttach, name)
    }

    pub fn push_parasite_remove(&mut self, name: &str) -> PushOutcome {
        self.push_parasite(UndoType::ParasiteRemove, name)
    }

    fn push_parasite(&mut self, kind: UndoType, name: &str) -> PushOutcome {
        let payload = ImageUndo::Parasite {
            name: name.to_string(),
            value: self.content.parasite(name).map(str::to_string),
        };
        self.record(kind, DirtyMask::IMAGE_META, payload)
    }

    // ---- structure -------------------------------------------------------------

    /// Record that `layer` is about to be inserted at `position`.
    pub fn push_layer_add(&mut self, layer: &ItemHandle, position: usize) -> Result<PushOutcome> {
        self.push_item_add(UndoType::LayerAdd, ItemKind::Layer, layer, position)
    }

    /// Record that `layer` is about to be removed.
    pub fn push_layer_remove(&mut self, layer: &ItemHandle) -> Result<PushOutcome> {
        self.push_item_remove(UndoType::LayerRemove, ItemKind::Layer, layer)
    }

    pub fn push_channel_add(&mut self, channel: &ItemHandle, position: usize) -> Result<PushOutcome> {
        self.push_item_add(UndoType::ChannelAdd, ItemKind::Channel, channel, position)
    }

    pub fn push_channel_remove(&mut self, channel: &ItemHandle) -> Result<PushOutcome> {
        self.push_item_remove(UndoType::ChannelRemove, ItemKind::Channel, channel)
    }

    pub fn push_path_add(&mut self, path: &ItemHandle, position: usize) -> Result<PushOutcome> {
        self.push_item_add(UndoType::PathAdd, ItemKind::Path, path, position)
    }

    pub fn push_path_remove(&mut self, path: &ItemHandle) -> Result<PushOutcome> {
        self.push_item_remove(UndoType::PathRemove, ItemKind::Path, path)
    }

    fn push_item_add(
        &mut self,
        undo_type: UndoType,
        kind: ItemKind,
        item: &ItemHandle,
        position: usize,
    ) -> Result<PushOutcome> {
        expect_kind(item, kind)?;
        if self.content.position(item).is_some() {
            return Err(ImageError::ItemAlreadyAttached(item.id()));
        }
        let payload = ImageUndo::ItemPresence {
            item: item.clone(),
            position,
            active_layer: self.content.active_layer().map(ItemHandle::id),
        };
        Ok(self.record(undo_type, DirtyMask::IMAGE_STRUCTURE, payload))
    }

    fn push_item_remove(
        &mut self,
        undo_type: UndoType,
        kind: ItemKind,
        item: &ItemHandle,
    ) -> Result<PushOutcome> {
        expect_kind(item, kind)?;
        let position = self.attached_position(item)?;
        let payload = ImageUndo::ItemPresence {
            item: item.clone(),
            position,
            active_layer: self.content.active_layer().map(ItemHandle::id),
        };
        Ok(self.record(undo_type, DirtyMask::IMAGE_STRUCTURE, payload))
    }

    pub fn push_item_reorder(&mut self, item: &ItemHandle) -> Result<PushOutcome> {
        let position = self.attached_position(item)?;
        let payload = ImageUndo::ItemReorder {
            item: item.clone(),
            position,
        };
        Ok(self.record(UndoType::ItemReorder, DirtyMask::IMAGE_STRUCTURE, payload))
    }

    // ---- item properties -------------------------------------------------------

    pub fn push_item_rename(&mut self, item: &ItemHandle) -> PushOutcome {
        let payload = ImageUndo::ItemRename {
            item: item.clone(),
            name: item.name(),
        };
        self.record(UndoType::ItemRename, DirtyMask::ITEM_META, payload)
    }

    pub fn push_item_visibility(&mut self, item: &ItemHandle) -> PushOutcome {
        let payload = ImageUndo::ItemVisibility {
            item: item.clone(),
            visible: item.is_visible(),
        };
        self.record(UndoType::ItemVisibility, DirtyMask::ITEM_META, payload)
    }

    pub fn push_item_color_tag(&mut self, item: &ItemHandle) -> PushOutcome {
        let payload = ImageUndo::ItemColorTag {
            item: item.clone(),
            tag: item.color_tag(),
        };
        self.record(UndoType::ItemColorTag, DirtyMask::ITEM_META, payload)
    }

    pub fn push_item_lock(&mut self, item: &ItemHandle, lock: LockKind) -> PushOutcome {
        let kind = match lock {
            LockKind::Content => UndoType::ItemLockContent,
            LockKind::Position => UndoType::ItemLockPosition,
            LockKind::Visibility => UndoType::ItemLockVisibility,
        };
        let payload = ImageUndo::ItemLock {
            item: item.clone(),
            lock,
            locked: item.is_locked(lock),
        };
        self.record(kind, DirtyMask::ITEM_META, payload)
    }

    pub fn push_item_displace(&mut self, item: &ItemHandle) -> PushOutcome {
        let payload = ImageUndo::ItemDisplace {
            item: item.clone(),
            offset: item.offset(),
        };
        self.record(
            UndoType::ItemDisplace,
            DirtyMask::ITEM | DirtyMask::DRAWABLE,
            payload,
        )
    }

    // ---- drawables -------------------------------------------------------------

    /// Record geometry and pixels, for edits that resize or move a drawable.
    pub fn push_drawable(&mut self, item: &ItemHandle) -> PushOutcome {
        let props = item.snapshot();
        let payload = ImageUndo::Drawable {
            item: item.clone(),
            geometry: props.geometry,
            content_rev: props.content_rev,
        };
        self.record(
            UndoType::Drawable,
            DirtyMask::ITEM | DirtyMask::DRAWABLE,
            payload,
        )
    }

    /// Record pixels only.
    pub fn push_drawable_mod(&mut self, item: &ItemHandle) -> PushOutcome {
        let payload = ImageUndo::DrawableMod {
            item: item.clone(),
            content_rev: item.content_rev(),
        };
        self.record(
            UndoType::DrawableMod,
            DirtyMask::ITEM | DirtyMask::DRAWABLE,
            payload,
        )
    }

    pub fn push_channel_color(&mut self, channel: &ItemHandle) -> Result<PushOutcome> {
        expect_kind(channel, ItemKind::Channel)?;
        let payload = ImageUndo::ChannelColor {
            item: channel.clone(),
            color: channel.color(),
        };
        Ok(self.record(
            UndoType::ChannelColor,
            DirtyMask::ITEM | DirtyMask::DRAWABLE,
            payload,
        ))
    }

    pub fn push_path_mod(&mut self, path: &ItemHandle) -> Result<PushOutcome> {
        expect_kind(path, ItemKind::Path)?;
        let payload = ImageUndo::PathPoints {
            item: path.clone(),
            points: path.points(),
        };
        Ok(self.record(UndoType::PathMod, DirtyMask::ITEM | DirtyMask::PATH, payload))
    }

    // ---- layers ----------------------------------------------------------------

    pub fn push_layer_opacity(&mut self, layer: &ItemHandle) -> Result<PushOutcome> {
        let opacity = layer_value(layer, ItemHandle::opacity)?;
        let payload = ImageUndo::LayerOpacity {
            item: layer.clone(),
            opacity,
        };
        Ok(self.record(UndoType::LayerOpacity, DirtyMask::ITEM_META, payload))
    }

    pub fn push_layer_mode(&mut self, layer: &ItemHandle) -> Result<PushOutcome> {
        let mode = layer_value(layer, ItemHandle::mode)?;
        let payload = ImageUndo::LayerMode {
            item: layer.clone(),
            mode,
        };
        Ok(self.record(UndoType::LayerMode, DirtyMask::ITEM_META, payload))
    }

    pub fn push_layer_lock_alpha(&mut self, layer: &ItemHandle) -> Result<PushOutcome> {
        let locked = layer_value(layer, ItemHandle::lock_alpha)?;
        let payload = ImageUndo::LayerLockAlpha {
            item: layer.clone(),
            locked,
        };
        Ok(self.record(UndoType::LayerLockAlpha, DirtyMask::ITEM_META, payload))
    }

    pub fn push_layer_mask_add(&mut self, layer: &ItemHandle) -> Result<PushOutcome> {
        self.push_layer_mask(UndoType::LayerMaskAdd, layer)
    }

    pub fn push_layer_mask_remove(&mut self, layer: &ItemHandle) -> Result<PushOutcome> {
        self.push_layer_mask(UndoType::LayerMaskRemove, layer)
    }

    fn push_layer_mask(&mut self, kind: UndoType, layer: &ItemHandle) -> Result<PushOutcome> {
        expect_kind(layer, ItemKind::Layer)?;
        let payload = ImageUndo::LayerMaskPresence {
            item: layer.clone(),
            mask: layer.mask(),
        };
        Ok(self.record(kind, DirtyMask::IMAGE_STRUCTURE, payload))
    }

    pub fn push_layer_mask_apply(&mut self, layer: &ItemHandle) -> Result<PushOutcome> {
        let apply = layer_value(layer, ItemHandle::apply_mask)?;
        let payload = ImageUndo::LayerMaskApply {
            item: layer.clone(),
            apply,
        };
        Ok(self.record(UndoType::LayerMaskApply, DirtyMask::ITEM_META, payload))
    }

    pub fn push_layer_mask_show(&mut self, layer: &ItemHandle) -> Result<PushOutcome> {
        let show = layer_value(layer, ItemHandle::show_mask)?;
        let payload = ImageUndo::LayerMaskShow {
            item: layer.clone(),
            show,
        };
        Ok(self.record(UndoType::LayerMaskShow, DirtyMask::ITEM_META, payload))
    }

    // ---- filters ---------------------------------------------------------------

    /// Record that `filter` is about to be inserted at `index`.
    pub fn push_filter_add(
        &mut self,
        item: &ItemHandle,
        filter: &crate::item::Filter,
        index: usize,
    ) -> PushOutcome {
        let payload = ImageUndo::FilterPresence {
            item: item.clone(),
            filter: filter.clone(),
            index,
        };
        self.record(UndoType::FilterAdd, DirtyMask::DRAWABLE, payload)
    }

    pub fn push_filter_remove(&mut self, item: &ItemHandle, id: FilterId) -> Result<PushOutcome> {
        let (index, filter) = find_filter(item, id)?;
        let payload = ImageUndo::FilterPresence {
            item: item.clone(),
            filter,
            index,
        };
        Ok(self.record(UndoType::FilterRemove, DirtyMask::DRAWABLE, payload))
    }

    pub fn push_filter_reorder(&mut self, item: &ItemHandle, id: FilterId) -> Result<PushOutcome> {
        let (index, _) = find_filter(item, id)?;
        let payload = ImageUndo::FilterReorder {
            item: item.clone(),
            filter: id,
            index,
        };
        Ok(self.record(UndoType::FilterReorder, DirtyMask::DRAWABLE, payload))
    }

    pub fn push_filter_modified(&mut self, item: &ItemHandle, id: FilterId) -> Result<PushOutcome> {
        let (_, filter) = find_filter(item, id)?;
        let payload = ImageUndo::FilterModified {
            item: item.clone(),
            filter,
        };
        Ok(self.record(UndoType::FilterModified, DirtyMask::DRAWABLE, payload))
    }

    pub(crate) fn attached_position(&self, item: &ItemHandle) -> Result<usize> {
        self.content
            .position(item)
            .ok_or(ImageError::ItemNotFound(item.id()))
    }
}

pub(crate) fn expect_kind(item: &ItemHandle, expected: ItemKind) -> Result<()> {
    if item.kind() == expected {
        Ok(())
    } else {
        Err(ImageError::WrongItemKind {
            id: item.id(),
            expected,
            actual: item.kind(),
        })
    }
}

pub(crate) fn layer_value<T>(
    layer: &ItemHandle,
    get: impl FnOnce(&ItemHandle) -> Option<T>,
) -> Result<T> {
    get(layer).ok_or(ImageError::WrongItemKind {
        id: layer.id(),
        expected: ItemKind::Layer,
        actual: layer.kind(),
    })
}

fn find_filter(item: &ItemHandle, id: FilterId) -> Result<(usize, crate::item::Filter)> {
    let index = item.filter_index(id).ok_or(ImageError::FilterNotFound {
        item: item.id(),
        filter: id,
    })?;
    let filter = item.filter(id).ok_or(ImageError::FilterNotFound {
        item: item.id(),
        filter: id,
    })?;
    Ok((index, filter))
}
