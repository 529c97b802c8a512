use crate::error::{EditError, Result};
use crate::volume::{Label, VoxelVolume, BACKGROUND};

use super::color_lut::{ColorLut, Rgb};
use super::representation::RepresentationId;

slotmap::new_key_type! {
    /// Unique identifier for a segmentation in the segmentation store.
    pub struct SegmentationKey;
}

/// A labelmap-backed segmentation: one voxel volume plus display metadata.
#[derive(Debug, Clone)]
pub struct Segmentation {
    id: String,
    label: Option<String>,
    active_segment_index: Label,
    color_lut: ColorLut,
    volume: VoxelVolume,
    pub(crate) representations: Vec<RepresentationId>,
}

impl Segmentation {
    pub(crate) fn new(id: String, volume: VoxelVolume) -> Self {
        Self {
            id,
            label: None,
            active_segment_index: 1,
            color_lut: ColorLut::default(),
            volume,
            representations: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name, if one was set.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    /// The class new brush strokes paint with.
    #[must_use]
    pub fn active_segment_index(&self) -> Label {
        self.active_segment_index
    }

    /// Sets the paint class.
    ///
    /// # Errors
    ///
    /// Returns `EditError::BackgroundTarget` for class 0.
    pub fn set_active_segment_index(&mut self, index: Label) -> Result<()> {
        if index == BACKGROUND {
            return Err(EditError::BackgroundTarget.into());
        }
        self.active_segment_index = index;
        Ok(())
    }

    #[must_use]
    pub fn color_lut(&self) -> &ColorLut {
        &self.color_lut
    }

    pub fn color_lut_mut(&mut self) -> &mut ColorLut {
        &mut self.color_lut
    }

    /// Display color of a class.
    #[must_use]
    pub fn segment_color(&self, class: Label) -> Option<Rgb> {
        self.color_lut.color(class)
    }

    #[must_use]
    pub fn volume(&self) -> &VoxelVolume {
        &self.volume
    }

    pub(crate) fn volume_mut(&mut self) -> &mut VoxelVolume {
        &mut self.volume
    }

    pub(crate) fn replace_volume(&mut self, volume: VoxelVolume) {
        self.volume = volume;
    }

    /// Representations attached to this segmentation.
    #[must_use]
    pub fn representations(&self) -> &[RepresentationId] {
        &self.representations
    }
}
