#![forbid(unsafe_code)]

//! Undoable edit commands.
//!
//! A command records the pre-edit state through a `push_*` helper, then
//! changes the image. Repeated weak edits of the same target fold into the
//! entry already on top of the undo stack:
//!
//! ```text
//!   set_layer_opacity(L, 0.9)   undo: [.., LayerOpacity(L, was 1.0)]
//!   set_layer_opacity(L, 0.8)   undo: [.., LayerOpacity(L, was 1.0)]   (folded)
//!   undo()                      L.opacity == 1.0
//! ```

use tracing::debug;

use retrace_core::{UndoEntry, UndoType};

use crate::error::{ImageError, Result};
use crate::image::{Image, ImageContent};
use crate::item::{
    ColorTag, Filter, FilterId, ItemHandle, ItemKind, LayerMask, LayerMode, LockKind,
};
use crate::push::{expect_kind, layer_value};
use crate::undo::ImageUndo;

impl Image {
    /// Whether a `kind` edit of `item` can fold into the top undo entry.
    fn is_compressible(&self, kind: UndoType, item: &ItemHandle) -> bool {
        self.history
            .find_compressible(&self.content, kind, |entry| {
                entry
                    .payload::<ImageUndo>()
                    .is_some_and(|payload| payload.targets(item))
            })
            .is_some()
    }

    /// Run `edit` inside a `kind` group. While frozen no group is opened.
    fn grouped<T>(
        &mut self,
        kind: UndoType,
        edit: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if !self.history.is_enabled() {
            return edit(self);
        }
        self.history.group_start(kind, kind.description())?;
        let result = edit(self);
        self.history.group_end(&mut self.content)?;
        result
    }

    // ---- weak property edits -------------------------------------------------

    pub fn set_item_visible(&mut self, item: &ItemHandle, visible: bool) {
        if item.is_visible() == visible {
            return;
        }
        if !self.is_compressible(UndoType::ItemVisibility, item) {
            self.push_item_visibility(item);
        }
        item.set_visible(visible);
    }

    /// Set a layer's opacity, clamped to `0.0..=1.0`.
    pub fn set_layer_opacity(&mut self, layer: &ItemHandle, opacity: f64) -> Result<()> {
        let opacity = opacity.clamp(0.0, 1.0);
        if layer_value(layer, ItemHandle::opacity)? == opacity {
            return Ok(());
        }
        if !self.is_compressible(UndoType::LayerOpacity, layer) {
            self.push_layer_opacity(layer)?;
        }
        layer.update_layer(|props| props.opacity = opacity);
        Ok(())
    }

    pub fn set_layer_mode(&mut self, layer: &ItemHandle, mode: LayerMode) -> Result<()> {
        if layer_value(layer, ItemHandle::mode)? == mode {
            return Ok(());
        }
        if !self.is_compressible(UndoType::LayerMode, layer) {
            self.push_layer_mode(layer)?;
        }
        layer.update_layer(|props| props.mode = mode);
        Ok(())
    }

    pub fn set_layer_mask_show(&mut self, layer: &ItemHandle, show: bool) -> Result<()> {
        if layer.mask().is_none() {
            return Err(ImageError::NoLayerMask(layer.id()));
        }
        if layer_value(layer, ItemHandle::show_mask)? == show {
            return Ok(());
        }
        if !self.is_compressible(UndoType::LayerMaskShow, layer) {
            self.push_layer_mask_show(layer)?;
        }
        layer.update_layer(|props| props.show_mask = show);
        Ok(())
    }

    pub fn set_layer_mask_apply(&mut self, layer: &ItemHandle, apply: bool) -> Result<()> {
        if layer.mask().is_none() {
            return Err(ImageError::NoLayerMask(layer.id()));
        }
        if layer_value(layer, ItemHandle::apply_mask)? == apply {
            return Ok(());
        }
        if !self.is_compressible(UndoType::LayerMaskApply, layer) {
            self.push_layer_mask_apply(layer)?;
        }
        layer.update_layer(|props| props.apply_mask = apply);
        Ok(())
    }

    /// Set the opacity of several layers as one step.
    ///
    /// More than one layer records a `GroupLayerOpacity` group, which folds
    /// repeated edits of the same layer set like a single opacity edit does.
    pub fn set_layers_opacity(&mut self, layers: &[ItemHandle], opacity: f64) -> Result<()> {
        match layers {
            [] => return Ok(()),
            [layer] => return self.set_layer_opacity(layer, opacity),
            _ => {}
        }
        for layer in layers {
            expect_kind(layer, ItemKind::Layer)?;
        }
        let opacity = opacity.clamp(0.0, 1.0);

        let folded = self
            .history
            .find_compressible(&self.content, UndoType::GroupLayerOpacity, |entry| {
                group_targets(entry, layers)
            })
            .is_some();
        if !folded {
            self.grouped(UndoType::GroupLayerOpacity, |image| {
                for layer in layers {
                    image.push_layer_opacity(layer)?;
                }
                Ok(())
            })?;
        }
        for layer in layers {
            layer.update_layer(|props| props.opacity = opacity);
        }
        Ok(())
    }

    // ---- other item properties -----------------------------------------------

    pub fn set_item_name(&mut self, item: &ItemHandle, name: impl Into<String>) {
        let name = name.into();
        if item.name() == name {
            return;
        }
        self.push_item_rename(item);
        item.set_name(name);
    }

    pub fn set_item_color_tag(&mut self, item: &ItemHandle, tag: ColorTag) {
        if item.color_tag() == tag {
            return;
        }
        self.push_item_color_tag(item);
        item.set_color_tag(tag);
    }

    pub fn set_item_locked(&mut self, item: &ItemHandle, lock: LockKind, locked: bool) {
        if item.is_locked(lock) == locked {
            return;
        }
        self.push_item_lock(item, lock);
        item.set_locked(lock, locked);
    }

    /// Move an item to absolute offset `(x, y)`.
    pub fn set_item_offset(&mut self, item: &ItemHandle, x: i32, y: i32) {
        if item.offset() == (x, y) {
            return;
        }
        self.push_item_displace(item);
        item.set_offset(x, y);
    }

    /// Move an attached item to `position` in its list.
    pub fn reorder_item(&mut self, item: &ItemHandle, position: usize) -> Result<()> {
        let current = self.attached_position(item)?;
        let last = self.content.items(item.kind()).len() - 1;
        let position = position.min(last);
        if current == position {
            return Ok(());
        }
        self.push_item_reorder(item)?;
        self.content.detach(item);
        self.content.attach(item.clone(), position);
        Ok(())
    }

    // ---- structure -----------------------------------------------------------

    /// Insert `layer` at `position` (0 is the top) and make it active.
    pub fn add_layer(&mut self, layer: &ItemHandle, position: usize) -> Result<()> {
        self.push_layer_add(layer, position)?;
        self.content.attach(layer.clone(), position);
        *self.content.active_layer_slot() = Some(layer.id());
        debug!(layer = %layer.id(), position, "layer added");
        Ok(())
    }

    /// Remove `layer`. The image keeps no handle, but the undo entry does.
    pub fn remove_layer(&mut self, layer: &ItemHandle) -> Result<()> {
        self.push_layer_remove(layer)?;
        let was_active = self.content.active_layer().is_some_and(|active| active == layer);
        let Some(position) = self.content.detach(layer) else {
            return Err(ImageError::ItemNotFound(layer.id()));
        };
        if was_active {
            let layers = self.content.layers();
            let next = layers
                .get(position)
                .or_else(|| layers.last())
                .map(ItemHandle::id);
            *self.content.active_layer_slot() = next;
        }
        debug!(layer = %layer.id(), position, "layer removed");
        Ok(())
    }

    pub fn add_channel(&mut self, channel: &ItemHandle, position: usize) -> Result<()> {
        self.push_channel_add(channel, position)?;
        self.content.attach(channel.clone(), position);
        Ok(())
    }

    pub fn remove_channel(&mut self, channel: &ItemHandle) -> Result<()> {
        self.push_channel_remove(channel)?;
        self.content.detach(channel);
        Ok(())
    }

    pub fn add_path(&mut self, path: &ItemHandle, position: usize) -> Result<()> {
        self.push_path_add(path, position)?;
        self.content.attach(path.clone(), position);
        Ok(())
    }

    pub fn remove_path(&mut self, path: &ItemHandle) -> Result<()> {
        self.push_path_remove(path)?;
        self.content.detach(path);
        Ok(())
    }

    // ---- layer masks ---------------------------------------------------------

    /// Attach a new mask to `layer`. The mask starts applied and hidden.
    pub fn add_layer_mask(&mut self, layer: &ItemHandle) -> Result<()> {
        expect_kind(layer, ItemKind::Layer)?;
        if layer.mask().is_some() {
            return Err(ImageError::LayerMaskExists(layer.id()));
        }
        self.grouped(UndoType::GroupLayerAddMask, |image| {
            image.push_layer_mask_add(layer)?;
            layer.update_layer(|props| props.mask = Some(LayerMask::default()));
            if layer.apply_mask() == Some(false) {
                image.push_layer_mask_apply(layer)?;
                layer.update_layer(|props| props.apply_mask = true);
            }
            if layer.show_mask() == Some(true) {
                image.push_layer_mask_show(layer)?;
                layer.update_layer(|props| props.show_mask = false);
            }
            Ok(())
        })
    }

    pub fn remove_layer_mask(&mut self, layer: &ItemHandle) -> Result<()> {
        expect_kind(layer, ItemKind::Layer)?;
        if layer.mask().is_none() {
            return Err(ImageError::NoLayerMask(layer.id()));
        }
        self.push_layer_mask_remove(layer)?;
        layer.update_layer(|props| props.mask = None);
        Ok(())
    }

    /// Bake the mask into the layer's pixels and drop it.
    pub fn apply_layer_mask(&mut self, layer: &ItemHandle) -> Result<()> {
        expect_kind(layer, ItemKind::Layer)?;
        if layer.mask().is_none() {
            return Err(ImageError::NoLayerMask(layer.id()));
        }
        self.grouped(UndoType::GroupLayerApplyMask, |image| {
            image.push_drawable_mod(layer);
            layer.set_content_rev(layer.content_rev() + 1);
            image.push_layer_mask_remove(layer)?;
            layer.update_layer(|props| props.mask = None);
            Ok(())
        })
    }

    pub fn set_layer_lock_alpha(&mut self, layer: &ItemHandle, locked: bool) -> Result<()> {
        if layer_value(layer, ItemHandle::lock_alpha)? == locked {
            return Ok(());
        }
        self.push_layer_lock_alpha(layer)?;
        layer.update_layer(|props| props.lock_alpha = locked);
        Ok(())
    }

    // ---- image ---------------------------------------------------------------

    /// Scale the canvas and every drawable and path to `width` x `height`.
    pub fn scale_image(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidSize { width, height });
        }
        let (old_w, old_h) = (self.content.width(), self.content.height());
        if (old_w, old_h) == (width, height) {
            return Ok(());
        }
        let fx = f64::from(width) / f64::from(old_w);
        let fy = f64::from(height) / f64::from(old_h);

        self.grouped(UndoType::GroupImageScale, |image| {
            image.push_image_size();
            image.content.set_size(width, height);

            let drawables: Vec<ItemHandle> = image
                .content
                .layers()
                .iter()
                .chain(image.content.channels())
                .cloned()
                .collect();
            for drawable in &drawables {
                image.push_drawable(drawable);
                scale_drawable(drawable, fx, fy);
            }

            let paths = image.content.paths().to_vec();
            for path in &paths {
                image.push_path_mod(path)?;
                let scaled = path
                    .points()
                    .into_iter()
                    .map(|(x, y)| (x * fx, y * fy))
                    .collect();
                path.set_points(scaled);
            }
            Ok(())
        })?;
        debug!(old_w, old_h, width, height, "image scaled");
        Ok(())
    }

    pub fn set_resolution(&mut self, x: f64, y: f64) {
        if self.content.resolution() == (x, y) {
            return;
        }
        self.push_image_resolution();
        self.content.set_resolution((x, y));
    }

    /// Record a pixel edit of `drawable`.
    pub fn modify_drawable(&mut self, drawable: &ItemHandle) -> Result<()> {
        if drawable.kind() == ItemKind::Path {
            return Err(ImageError::WrongItemKind {
                id: drawable.id(),
                expected: ItemKind::Layer,
                actual: ItemKind::Path,
            });
        }
        self.push_drawable_mod(drawable);
        drawable.set_content_rev(drawable.content_rev() + 1);
        Ok(())
    }

    pub fn set_channel_color(&mut self, channel: &ItemHandle, color: [u8; 4]) -> Result<()> {
        expect_kind(channel, ItemKind::Channel)?;
        if channel.color() == color {
            return Ok(());
        }
        self.push_channel_color(channel)?;
        channel.set_color(color);
        Ok(())
    }

    pub fn set_path_points(&mut self, path: &ItemHandle, points: Vec<(f64, f64)>) -> Result<()> {
        self.push_path_mod(path)?;
        path.set_points(points);
        Ok(())
    }

    // ---- filters -------------------------------------------------------------

    /// Insert `filter` into `drawable`'s filter stack at `index` (clamped).
    pub fn add_filter(&mut self, drawable: &ItemHandle, filter: Filter, index: usize) {
        let index = index.min(drawable.filters().len());
        self.push_filter_add(drawable, &filter, index);
        drawable.props().filters.insert(index, filter);
    }

    pub fn remove_filter(&mut self, drawable: &ItemHandle, id: FilterId) -> Result<Filter> {
        self.push_filter_remove(drawable, id)?;
        let mut props = drawable.props();
        let index = props
            .filters
            .iter()
            .position(|f| f.id() == id)
            .ok_or(ImageError::FilterNotFound {
                item: drawable.id(),
                filter: id,
            })?;
        Ok(props.filters.remove(index))
    }

    pub fn reorder_filter(
        &mut self,
        drawable: &ItemHandle,
        id: FilterId,
        index: usize,
    ) -> Result<()> {
        let current = drawable.filter_index(id).ok_or(ImageError::FilterNotFound {
            item: drawable.id(),
            filter: id,
        })?;
        let index = index.min(drawable.filters().len() - 1);
        if index == current {
            return Ok(());
        }
        self.push_filter_reorder(drawable, id)?;
        let mut props = drawable.props();
        let moved = props.filters.remove(current);
        props.filters.insert(index, moved);
        Ok(())
    }

    /// Change a filter's settings through `edit`.
    pub fn modify_filter(
        &mut self,
        drawable: &ItemHandle,
        id: FilterId,
        edit: impl FnOnce(&mut Filter),
    ) -> Result<()> {
        self.push_filter_modified(drawable, id)?;
        let mut props = drawable.props();
        if let Some(filter) = props.filters.iter_mut().find(|f| f.id() == id) {
            edit(filter);
        }
        Ok(())
    }

    // ---- parasites -----------------------------------------------------------

    pub fn attach_parasite(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if self.content.parasite(name) == Some(value.as_str()) {
            return;
        }
        self.push_parasite_attach(name);
        self.content.parasites_mut().insert(name.to_string(), value);
    }

    /// Remove a parasite. Returns `false` when there was none.
    pub fn detach_parasite(&mut self, name: &str) -> bool {
        if self.content.parasite(name).is_none() {
            return false;
        }
        self.push_parasite_remove(name);
        self.content.parasites_mut().remove(name);
        true
    }
}

/// Whether `entry` is a group whose members target exactly `layers`, in order.
fn group_targets(entry: &UndoEntry<ImageContent>, layers: &[ItemHandle]) -> bool {
    let Some(group) = entry.as_group() else {
        return false;
    };
    group.len() == layers.len()
        && group.members().iter().zip(layers).all(|(member, layer)| {
            member
                .payload::<ImageUndo>()
                .is_some_and(|payload| payload.targets(layer))
        })
}

fn scale_drawable(drawable: &ItemHandle, fx: f64, fy: f64) {
    let mut props = drawable.props();
    let g = &mut props.geometry;
    g.width = scale_extent(g.width, fx);
    g.height = scale_extent(g.height, fy);
    g.offset_x = (f64::from(g.offset_x) * fx).round() as i32;
    g.offset_y = (f64::from(g.offset_y) * fy).round() as i32;
    props.content_rev += 1;
}

fn scale_extent(extent: u32, factor: f64) -> u32 {
    ((f64::from(extent) * factor).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::HistoryConfig;

    fn image_with_layers(names: &[&str]) -> (Image, Vec<ItemHandle>) {
        let mut image = Image::with_config(100, 80, HistoryConfig::unlimited()).unwrap();
        let layers: Vec<ItemHandle> = names
            .iter()
            .map(|name| ItemHandle::new_layer(*name, 100, 80))
            .collect();
        image.freeze();
        for (i, layer) in layers.iter().enumerate() {
            image.add_layer(layer, i).unwrap();
        }
        image.thaw().unwrap();
        (image, layers)
    }

    #[test]
    fn test_repeated_opacity_folds_into_one_entry() {
        let (mut image, layers) = image_with_layers(&["a"]);
        let layer = &layers[0];
        image.set_layer_opacity(layer, 0.9).unwrap();
        image.set_layer_opacity(layer, 0.5).unwrap();
        image.set_layer_opacity(layer, 0.2).unwrap();
        assert_eq!(image.history().undo_depth(), 1);

        assert!(image.undo());
        assert_eq!(layer.opacity(), Some(1.0));
        assert!(!image.is_dirty());
    }

    #[test]
    fn test_opacity_of_different_layers_not_folded() {
        let (mut image, layers) = image_with_layers(&["a", "b"]);
        image.set_layer_opacity(&layers[0], 0.5).unwrap();
        image.set_layer_opacity(&layers[1], 0.5).unwrap();
        assert_eq!(image.history().undo_depth(), 2);
    }

    #[test]
    fn test_no_fold_after_save() {
        let (mut image, layers) = image_with_layers(&["a"]);
        image.set_item_visible(&layers[0], false);
        image.save();
        image.set_item_visible(&layers[0], true);
        assert_eq!(image.history().undo_depth(), 2);
    }

    #[test]
    fn test_unchanged_value_records_nothing() {
        let (mut image, layers) = image_with_layers(&["a"]);
        image.set_item_visible(&layers[0], true);
        image.set_layer_mode(&layers[0], LayerMode::Normal).unwrap();
        image.set_item_name(&layers[0], "a");
        assert_eq!(image.history().undo_depth(), 0);
    }

    #[test]
    fn test_layers_opacity_groups_and_folds() {
        let (mut image, layers) = image_with_layers(&["a", "b", "c"]);
        image.set_layers_opacity(&layers, 0.5).unwrap();
        image.set_layers_opacity(&layers, 0.25).unwrap();
        assert_eq!(image.history().undo_depth(), 1);
        assert_eq!(
            image.history().next_undo_type(),
            Some(UndoType::GroupLayerOpacity)
        );

        // A different layer set does not fold.
        image.set_layers_opacity(&layers[..2], 0.1).unwrap();
        assert_eq!(image.history().undo_depth(), 2);

        assert!(image.undo());
        assert!(image.undo());
        assert!(layers.iter().all(|l| l.opacity() == Some(1.0)));
    }

    #[test]
    fn test_remove_layer_moves_active() {
        let (mut image, layers) = image_with_layers(&["a", "b"]);
        *image.content.active_layer_slot() = Some(layers[0].id());
        image.remove_layer(&layers[0]).unwrap();
        assert_eq!(image.content().active_layer(), Some(&layers[1]));

        assert!(image.undo());
        assert_eq!(image.content().active_layer(), Some(&layers[0]));
        assert_eq!(image.layers(), layers.as_slice());
    }

    #[test]
    fn test_layer_mask_lifecycle() {
        let (mut image, layers) = image_with_layers(&["a"]);
        let layer = &layers[0];
        assert_eq!(
            image.set_layer_mask_show(layer, true),
            Err(ImageError::NoLayerMask(layer.id()))
        );
        image.add_layer_mask(layer).unwrap();
        assert_eq!(
            image.add_layer_mask(layer),
            Err(ImageError::LayerMaskExists(layer.id()))
        );
        assert_eq!(
            image.history().next_undo_type(),
            Some(UndoType::GroupLayerAddMask)
        );

        image.apply_layer_mask(layer).unwrap();
        assert!(layer.mask().is_none());
        assert_eq!(layer.content_rev(), 1);

        assert!(image.undo());
        assert!(layer.mask().is_some());
        assert_eq!(layer.content_rev(), 0);
        assert!(image.undo());
        assert!(layer.mask().is_none());
    }

    #[test]
    fn test_reorder_item_round_trip() {
        let (mut image, layers) = image_with_layers(&["a", "b", "c"]);
        image.reorder_item(&layers[0], 9).unwrap();
        assert_eq!(image.content().position(&layers[0]), Some(2));
        assert!(image.undo());
        assert_eq!(image.layers(), layers.as_slice());
    }

    #[test]
    fn test_filters_round_trip() {
        let (mut image, layers) = image_with_layers(&["a"]);
        let layer = &layers[0];
        let blur = Filter::new("blur");
        let sharpen = Filter::new("sharpen");
        let (blur_id, sharpen_id) = (blur.id(), sharpen.id());

        image.add_filter(layer, blur, 0);
        image.add_filter(layer, sharpen, 5);
        image.reorder_filter(layer, sharpen_id, 0).unwrap();
        image
            .modify_filter(layer, blur_id, |f| f.opacity = 0.5)
            .unwrap();
        let removed = image.remove_filter(layer, sharpen_id).unwrap();
        assert_eq!(removed.id(), sharpen_id);
        assert_eq!(layer.filters().len(), 1);

        assert!(image.undo());
        assert_eq!(layer.filter_index(sharpen_id), Some(0));
        assert!(image.undo());
        assert_eq!(layer.filter(blur_id).map(|f| f.opacity), Some(1.0));
        assert!(image.undo());
        assert_eq!(layer.filter_index(sharpen_id), Some(1));
        assert!(image.undo());
        assert!(image.undo());
        assert!(layer.filters().is_empty());
    }

    #[test]
    fn test_parasites() {
        let mut image = Image::new(4, 4).unwrap();
        image.attach_parasite("gimp-comment", "hello");
        assert!(image.detach_parasite("gimp-comment"));
        assert!(!image.detach_parasite("gimp-comment"));
        assert!(image.undo());
        assert_eq!(image.content().parasite("gimp-comment"), Some("hello"));
        assert!(image.undo());
        assert_eq!(image.content().parasite("gimp-comment"), None);
    }

    #[test]
    fn test_frozen_group_command_still_edits() {
        let (mut image, layers) = image_with_layers(&["a", "b"]);
        image.freeze();
        image.set_layers_opacity(&layers, 0.3).unwrap();
        image.thaw().unwrap();
        assert_eq!(layers[0].opacity(), Some(0.3));
        assert_eq!(image.history().undo_depth(), 0);
    }
}
