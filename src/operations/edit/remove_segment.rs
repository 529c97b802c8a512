use crate::dirty::DirtyRegion;
use crate::error::{EditError, Result};
use crate::volume::{Label, VoxelVolume, BACKGROUND};

use super::{VolumeEdit, WriteSet};

/// Resets every voxel of one class to background.
pub struct RemoveSegment {
    class: Label,
}

impl RemoveSegment {
    /// Creates a new `RemoveSegment` operation.
    #[must_use]
    pub fn new(class: Label) -> Self {
        Self { class }
    }

    /// Executes the removal.
    ///
    /// # Errors
    ///
    /// Returns `EditError::BackgroundTarget` when asked to remove class 0.
    pub fn execute(&self, volume: &mut VoxelVolume) -> Result<DirtyRegion> {
        if self.class == BACKGROUND {
            return Err(EditError::BackgroundTarget.into());
        }
        let mut writes = WriteSet::default();
        for (offset, &label) in volume.labels().iter().enumerate() {
            if label == self.class {
                writes.push(offset, BACKGROUND);
            }
        }
        Ok(writes.commit(volume))
    }
}

impl VolumeEdit for RemoveSegment {
    fn apply(&self, volume: &mut VoxelVolume) -> Result<DirtyRegion> {
        self.execute(volume)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::{IndexBox, Point3, Vector3};
    use crate::volume::VolumeGeometry;

    #[test]
    fn removes_only_that_class() {
        let g = VolumeGeometry::axis_aligned([2, 2, 1], Vector3::new(1.0, 1.0, 1.0), Point3::origin())
            .unwrap();
        let mut v = VoxelVolume::from_labels(g, vec![3, 1, 3, 0]).unwrap();
        let region = RemoveSegment::new(3).execute(&mut v).unwrap();
        assert_eq!(v.labels(), &[0, 1, 0, 0]);
        assert_eq!(region.bounds().copied(), Some(IndexBox::new([0, 0, 0], [0, 1, 0])));
    }

    #[test]
    fn background_is_rejected() {
        let g = VolumeGeometry::axis_aligned([1, 1, 1], Vector3::new(1.0, 1.0, 1.0), Point3::origin())
            .unwrap();
        let mut v = VoxelVolume::new(g);
        assert!(RemoveSegment::new(0).execute(&mut v).is_err());
    }

    #[test]
    fn absent_class_is_empty() {
        let g = VolumeGeometry::axis_aligned([2, 1, 1], Vector3::new(1.0, 1.0, 1.0), Point3::origin())
            .unwrap();
        let mut v = VoxelVolume::from_labels(g, vec![1, 1]).unwrap();
        assert!(RemoveSegment::new(2).execute(&mut v).unwrap().is_empty());
    }
}
