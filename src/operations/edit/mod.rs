mod brush;
mod class_swap;
mod remove_segment;

pub use brush::{BrushEdit, BrushShape, EditPolicy};
pub use class_swap::ClassSwap;
pub use remove_segment::RemoveSegment;

use std::collections::BTreeSet;

use crate::dirty::DirtyRegion;
use crate::error::Result;
use crate::math::IndexBox;
use crate::volume::{Label, VoxelVolume};

/// An atomic region write against a voxel volume.
///
/// Implementations compute their full write set before touching the
/// volume, so a failing edit leaves it unchanged and readers never observe
/// a half-applied edit.
pub trait VolumeEdit {
    /// Applies the edit and returns the region it wrote.
    ///
    /// # Errors
    ///
    /// Returns an error if the edit's inputs are invalid for `volume`.
    fn apply(&self, volume: &mut VoxelVolume) -> Result<DirtyRegion>;
}

/// Voxel writes planned by an edit, keyed by linear offset.
#[derive(Debug, Default)]
struct WriteSet {
    writes: Vec<(usize, Label)>,
}

impl WriteSet {
    fn push(&mut self, offset: usize, value: Label) {
        self.writes.push((offset, value));
    }

    /// Writes every planned voxel and returns the bounding region, with the
    /// prior and new classes of the written voxels as touched classes.
    fn commit(self, volume: &mut VoxelVolume) -> DirtyRegion {
        let Some(&(first, _)) = self.writes.first() else {
            return DirtyRegion::empty();
        };
        let geometry = volume.geometry().clone();
        let mut bounds = IndexBox::single(geometry.index_of(first));
        let mut classes = BTreeSet::new();

        let labels = volume.labels_mut();
        for (offset, value) in self.writes {
            bounds.include(geometry.index_of(offset));
            classes.insert(labels[offset]);
            classes.insert(value);
            labels[offset] = value;
        }
        DirtyRegion::new(bounds, classes)
    }
}
