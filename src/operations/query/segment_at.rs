use crate::math::Point3;
use crate::volume::{Label, VoxelVolume};

/// Looks up the class under a world point.
pub struct SegmentAtPoint {
    point: Point3,
}

impl SegmentAtPoint {
    /// Creates a new `SegmentAtPoint` query.
    #[must_use]
    pub fn new(point: Point3) -> Self {
        Self { point }
    }

    /// Executes the query. Returns `None` when the point maps outside the
    /// volume; background is returned as class 0.
    #[must_use]
    pub fn execute(&self, volume: &VoxelVolume) -> Option<Label> {
        let index = volume.world_to_index_in_bounds(&self.point).ok()?;
        volume.classification_at(&index).ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::{IndexPoint, Vector3};
    use crate::volume::VolumeGeometry;

    #[test]
    fn finds_class_under_point() {
        let g = VolumeGeometry::axis_aligned(
            [3, 3, 3],
            Vector3::new(2.0, 2.0, 2.0),
            Point3::new(-2.0, -2.0, -2.0),
        )
        .unwrap();
        let mut v = VoxelVolume::new(g);
        v.set_classification_at(&IndexPoint::new(1, 1, 1), 8).unwrap();
        assert_eq!(SegmentAtPoint::new(Point3::new(0.4, -0.7, 0.9)).execute(&v), Some(8));
        assert_eq!(SegmentAtPoint::new(Point3::new(-2.0, -2.0, -2.0)).execute(&v), Some(0));
        assert_eq!(SegmentAtPoint::new(Point3::new(9.0, 0.0, 0.0)).execute(&v), None);
    }

    #[test]
    fn non_finite_point_is_outside() {
        let g = VolumeGeometry::axis_aligned([2, 2, 2], Vector3::new(1.0, 1.0, 1.0), Point3::origin())
            .unwrap();
        let mut v = VoxelVolume::new(g);
        v.set_classification_at(&IndexPoint::new(0, 0, 0), 4).unwrap();
        let nan = Point3::new(f64::NAN, f64::NAN, f64::NAN);
        assert_eq!(SegmentAtPoint::new(nan).execute(&v), None);
    }
}
