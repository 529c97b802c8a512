mod axis;
mod geometry;

pub use axis::SliceAxis;
pub use geometry::VolumeGeometry;

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, VolumeError};
use crate::math::{IndexPoint, Point3};

/// Integer classification tag stored per voxel.
pub type Label = u16;

/// The class index reserved for "no label".
pub const BACKGROUND: Label = 0;

/// A dense 3D classification buffer with its spatial metadata.
///
/// This is a plain data container: writes do not notify anyone. Dirty
/// tracking is the caller's job.
#[derive(Debug, Clone)]
pub struct VoxelVolume {
    geometry: VolumeGeometry,
    labels: Vec<Label>,
}

impl VoxelVolume {
    /// Creates a volume with every voxel set to [`BACKGROUND`].
    #[must_use]
    pub fn new(geometry: VolumeGeometry) -> Self {
        let labels = vec![BACKGROUND; geometry.voxel_count()];
        Self { geometry, labels }
    }

    /// Wraps a decoded label buffer.
    ///
    /// # Errors
    ///
    /// Returns `VolumeError::BufferLength` if `labels` does not hold exactly
    /// one entry per voxel.
    pub fn from_labels(geometry: VolumeGeometry, labels: Vec<Label>) -> Result<Self> {
        let expected = geometry.voxel_count();
        if labels.len() != expected {
            return Err(VolumeError::BufferLength {
                expected,
                actual: labels.len(),
            }
            .into());
        }
        Ok(Self { geometry, labels })
    }

    #[must_use]
    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    #[must_use]
    pub fn dimensions(&self) -> [usize; 3] {
        self.geometry.dimensions()
    }

    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.labels.len()
    }

    /// The raw label buffer, x varying fastest.
    #[must_use]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub(crate) fn labels_mut(&mut self) -> &mut [Label] {
        &mut self.labels
    }

    /// Label at an in-bounds `[x, y, z]` index.
    ///
    /// # Panics
    ///
    /// Panics if `index` lies outside the volume. Use
    /// [`VoxelVolume::classification_at`] for unchecked input.
    #[must_use]
    pub fn label(&self, index: [usize; 3]) -> Label {
        self.labels[self.geometry.offset_of(index)]
    }

    /// Returns the class of the voxel at `index`.
    ///
    /// # Errors
    ///
    /// Returns `VolumeError::OutOfBounds` if `index` lies outside the volume.
    pub fn classification_at(&self, index: &IndexPoint) -> Result<Label> {
        let offset = self
            .geometry
            .linear_offset(index)
            .ok_or_else(|| self.geometry.out_of_bounds(index))?;
        Ok(self.labels[offset])
    }

    /// Writes one voxel.
    ///
    /// # Errors
    ///
    /// Returns `VolumeError::OutOfBounds` if `index` lies outside the volume.
    pub fn set_classification_at(&mut self, index: &IndexPoint, value: Label) -> Result<()> {
        let offset = self
            .geometry
            .linear_offset(index)
            .ok_or_else(|| self.geometry.out_of_bounds(index))?;
        self.labels[offset] = value;
        Ok(())
    }

    /// Nearest voxel index of a world point; may be out of bounds.
    #[must_use]
    pub fn world_to_index(&self, point: &Point3) -> IndexPoint {
        self.geometry.world_to_index(point)
    }

    /// Nearest voxel index of a world point, required to be in bounds.
    ///
    /// # Errors
    ///
    /// Returns `VolumeError::OutOfBounds` if the point maps outside the volume
    /// or has a non-finite coordinate.
    pub fn world_to_index_in_bounds(&self, point: &Point3) -> Result<IndexPoint> {
        let index = self.geometry.world_to_index(point);
        let finite = self
            .geometry
            .world_to_continuous_index(point)
            .iter()
            .all(|c| c.is_finite());
        if finite && self.geometry.contains(&index) {
            Ok(index)
        } else {
            Err(self.geometry.out_of_bounds(&index).into())
        }
    }

    /// World position of a voxel center.
    #[must_use]
    pub fn index_to_world(&self, index: &IndexPoint) -> Point3 {
        self.geometry.index_to_world(index)
    }

    /// Non-background classes present in the volume.
    #[must_use]
    pub fn present_classes(&self) -> BTreeSet<Label> {
        self.labels
            .iter()
            .copied()
            .filter(|&l| l != BACKGROUND)
            .collect()
    }

    /// Voxel count of every non-background class present.
    #[must_use]
    pub fn class_voxel_counts(&self) -> BTreeMap<Label, usize> {
        let mut counts = BTreeMap::new();
        for &label in &self.labels {
            if label != BACKGROUND {
                *counts.entry(label).or_insert(0) += 1;
            }
        }
        counts
    }
}
