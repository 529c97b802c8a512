use std::collections::BTreeSet;

use crate::math::IndexBox;
use crate::volume::{Label, VoxelVolume};

/// Computes the index-space bounding box of a set of classes.
pub struct ClassBounds {
    classes: BTreeSet<Label>,
}

impl ClassBounds {
    /// Creates a new `ClassBounds` query.
    #[must_use]
    pub fn new(classes: impl IntoIterator<Item = Label>) -> Self {
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    /// Executes the query, returning `None` when no voxel has one of the
    /// classes.
    #[must_use]
    pub fn execute(&self, volume: &VoxelVolume) -> Option<IndexBox> {
        let geometry = volume.geometry();
        let mut bounds: Option<IndexBox> = None;
        for (offset, label) in volume.labels().iter().enumerate() {
            if !self.classes.contains(label) {
                continue;
            }
            let index = geometry.index_of(offset);
            match bounds.as_mut() {
                Some(b) => b.include(index),
                None => bounds = Some(IndexBox::single(index)),
            }
        }
        bounds
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::{IndexPoint, Point3, Vector3};
    use crate::volume::VolumeGeometry;

    #[test]
    fn bounds_of_scattered_voxels() {
        let g = VolumeGeometry::axis_aligned([5, 5, 5], Vector3::new(1.0, 1.0, 1.0), Point3::origin())
            .unwrap();
        let mut v = VoxelVolume::new(g);
        v.set_classification_at(&IndexPoint::new(1, 4, 2), 2).unwrap();
        v.set_classification_at(&IndexPoint::new(3, 0, 2), 2).unwrap();
        v.set_classification_at(&IndexPoint::new(0, 0, 0), 9).unwrap();
        let b = ClassBounds::new([2]).execute(&v).unwrap();
        assert_eq!(b, IndexBox::new([1, 0, 2], [3, 4, 2]));
        assert!(ClassBounds::new([6]).execute(&v).is_none());
    }
}
