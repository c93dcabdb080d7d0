#![forbid(unsafe_code)]

//! Undo type table.
//!
//! Every recorded step carries an [`UndoType`]. Group kinds tag an
//! [`UndoGroup`](crate::UndoGroup) and describe the command as a whole
//! ("Scale image"); single kinds tag one [`UndoItem`](crate::UndoItem)
//! ("Item visibility"). Members of a group keep their own single kind.
//!
//! A handful of kinds are *weak*: repeating the same edit on the same target
//! may be folded into the entry already on top of the undo stack instead of
//! recording a new one. See [`UndoHistory::find_compressible`](crate::UndoHistory::find_compressible).

use std::fmt;

macro_rules! undo_types {
    (
        groups { $($gvariant:ident => ($gname:literal, $gdesc:literal)),* $(,)? }
        singles { $($svariant:ident => ($sname:literal, $sdesc:literal)),* $(,)? }
    ) => {
        /// Type tag of a recorded undo step or undo group.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum UndoType {
            $(
                #[doc = $gdesc]
                $gvariant,
            )*
            $(
                #[doc = $sdesc]
                $svariant,
            )*
        }

        impl UndoType {
            /// Every undo type, group kinds first.
            pub const ALL: &'static [UndoType] = &[
                $(UndoType::$gvariant,)*
                $(UndoType::$svariant,)*
            ];

            /// Stable machine-readable name (e.g. `"item-visibility"`).
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$gvariant => $gname,)*
                    $(Self::$svariant => $sname,)*
                }
            }

            /// Default human-readable description, used when a step is
            /// recorded without an explicit label.
            #[must_use]
            pub const fn description(self) -> &'static str {
                match self {
                    $(Self::$gvariant => $gdesc,)*
                    $(Self::$svariant => $sdesc,)*
                }
            }

            /// Whether this kind tags an undo group rather than a single step.
            #[must_use]
            pub const fn is_group(self) -> bool {
                matches!(self, $(Self::$gvariant)|*)
            }
        }
    };
}

undo_types! {
    groups {
        GroupImageScale => ("group-image-scale", "Scale image"),
        GroupImageResize => ("group-image-resize", "Resize image"),
        GroupImageFlip => ("group-image-flip", "Flip image"),
        GroupImageRotate => ("group-image-rotate", "Rotate image"),
        GroupImageCrop => ("group-image-crop", "Crop image"),
        GroupImageConvert => ("group-image-convert", "Convert image"),
        GroupImageItemRemove => ("group-image-item-remove", "Remove item"),
        GroupImageLayersMerge => ("group-image-layers-merge", "Merge layers"),
        GroupImagePathsMerge => ("group-image-paths-merge", "Merge paths"),
        GroupImageQuickMask => ("group-image-quick-mask", "Quick Mask"),
        GroupImageGrid => ("group-image-grid", "Grid"),
        GroupGuide => ("group-guide", "Guide"),
        GroupDrawable => ("group-drawable", "Layer/Channel"),
        GroupDrawableMod => ("group-drawable-mod", "Layer/Channel modification"),
        GroupMask => ("group-mask", "Selection mask"),
        GroupItemVisibility => ("group-item-visibility", "Item visibility"),
        GroupItemProperties => ("group-item-properties", "Item properties"),
        GroupItemDisplace => ("group-item-displace", "Move item"),
        GroupItemScale => ("group-item-scale", "Scale item"),
        GroupItemResize => ("group-item-resize", "Resize item"),
        GroupLayerAdd => ("group-layer-add", "Add layer"),
        GroupLayerAddMask => ("group-layer-add-mask", "Add layer mask"),
        GroupLayerApplyMask => ("group-layer-apply-mask", "Apply layer mask"),
        GroupLayerOpacity => ("group-layer-opacity", "Set layers opacity"),
        GroupFsToLayer => ("group-fs-to-layer", "Floating selection to layer"),
        GroupEditPaste => ("group-edit-paste", "Paste"),
        GroupEditCut => ("group-edit-cut", "Cut"),
        GroupText => ("group-text", "Text"),
        GroupTransform => ("group-transform", "Transform"),
        GroupPaint => ("group-paint", "Paint"),
        GroupPathsImport => ("group-paths-import", "Import paths"),
        GroupFilter => ("group-filter", "Filter"),
        GroupMisc => ("group-misc", "Plug-In"),
    }
    singles {
        ImageType => ("image-type", "Image type"),
        ImagePrecision => ("image-precision", "Image precision"),
        ImageSize => ("image-size", "Image size"),
        ImageResolution => ("image-resolution", "Image resolution change"),
        ImageGrid => ("image-grid", "Grid"),
        ImageMetadata => ("image-metadata", "Change metadata"),
        ImageColormap => ("image-colormap", "Change indexed palette"),
        Guide => ("guide", "Guide"),
        Drawable => ("drawable", "Layer/Channel"),
        DrawableMod => ("drawable-mod", "Layer/Channel modification"),
        Mask => ("mask", "Selection mask"),
        ItemReorder => ("item-reorder", "Reorder item"),
        ItemRename => ("item-rename", "Rename item"),
        ItemDisplace => ("item-displace", "Move item"),
        ItemVisibility => ("item-visibility", "Item visibility"),
        ItemColorTag => ("item-color-tag", "Item color tag"),
        ItemLockContent => ("item-lock-content", "Lock/Unlock content"),
        ItemLockPosition => ("item-lock-position", "Lock/Unlock position"),
        ItemLockVisibility => ("item-lock-visibility", "Lock/Unlock visibility"),
        LayerAdd => ("layer-add", "New layer"),
        LayerRemove => ("layer-remove", "Delete layer"),
        LayerMode => ("layer-mode", "Set layer mode"),
        LayerOpacity => ("layer-opacity", "Set layer opacity"),
        LayerLockAlpha => ("layer-lock-alpha", "Lock/Unlock alpha channel"),
        LayerMaskAdd => ("layer-mask-add", "Add layer mask"),
        LayerMaskRemove => ("layer-mask-remove", "Delete layer mask"),
        LayerMaskApply => ("layer-mask-apply", "Apply layer mask"),
        LayerMaskShow => ("layer-mask-show", "Show layer mask"),
        ChannelAdd => ("channel-add", "New channel"),
        ChannelRemove => ("channel-remove", "Delete channel"),
        ChannelColor => ("channel-color", "Channel color"),
        PathAdd => ("path-add", "New path"),
        PathRemove => ("path-remove", "Delete path"),
        PathMod => ("path-mod", "Path modification"),
        FilterAdd => ("filter-add", "Add effect"),
        FilterRemove => ("filter-remove", "Remove effect"),
        FilterReorder => ("filter-reorder", "Reorder effect"),
        FilterModified => ("filter-modified", "Effect modification"),
        ParasiteAttach => ("parasite-attach", "Attach parasite"),
        ParasiteRemove => ("parasite-remove", "Remove parasite"),
        Cant => ("cant", "Not undoable"),
    }
}

impl UndoType {
    /// Whether edits of this kind may be compressed into the entry on top
    /// of the undo stack.
    #[must_use]
    pub const fn is_weak(self) -> bool {
        matches!(
            self,
            Self::ItemVisibility
                | Self::GroupItemVisibility
                | Self::GroupItemProperties
                | Self::GroupLayerApplyMask
                | Self::LayerMode
                | Self::LayerOpacity
                | Self::LayerMaskApply
                | Self::LayerMaskShow
        )
    }

    /// Look up an undo type by its machine name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for UndoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Free-function form of [`UndoType::is_weak`].
#[must_use]
pub const fn is_weak(kind: UndoType) -> bool {
    kind.is_weak()
}

/// Direction in which an undo step is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UndoMode {
    /// Revert the recorded edit.
    Undo,
    /// Re-apply a previously reverted edit.
    Redo,
}

impl UndoMode {
    /// The opposite direction.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Undo => Self::Redo,
            Self::Redo => Self::Undo,
        }
    }
}
