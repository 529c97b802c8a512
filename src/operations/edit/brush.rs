use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::dirty::DirtyRegion;
use crate::error::{EditError, Result, VolumeError};
use crate::math::{IndexBox, IndexOffset, IndexPoint, Point3, TOLERANCE};
use crate::volume::{Label, SliceAxis, VoxelVolume, BACKGROUND};

use super::{VolumeEdit, WriteSet};

/// Footprint of a brush around its center voxel.
#[derive(Debug, Clone, PartialEq)]
pub enum BrushShape {
    /// Every voxel within `radius` in all three axes.
    Sphere,
    /// Voxels within `radius` in the slice through the center, normal to
    /// `axis`.
    Circle { axis: SliceAxis },
    /// Explicit stencil of index offsets from the center voxel. The radius
    /// is ignored.
    Custom(Vec<IndexOffset>),
}

/// Which existing voxels a brush may overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditPolicy {
    #[default]
    OverwriteAny,
    /// Only voxels whose current class is in the set.
    OverwriteOnly(BTreeSet<Label>),
}

impl EditPolicy {
    /// Creates a policy allowing only the given classes to be overwritten.
    #[must_use]
    pub fn only(classes: impl IntoIterator<Item = Label>) -> Self {
        Self::OverwriteOnly(classes.into_iter().collect())
    }

    /// Returns `true` if a voxel of class `current` may be overwritten.
    #[must_use]
    pub fn allows(&self, current: Label) -> bool {
        match self {
            Self::OverwriteAny => true,
            Self::OverwriteOnly(allowed) => allowed.contains(&current),
        }
    }
}

/// Intensity window restricting a brush to voxels of the reference image
/// whose value lies inside the range.
#[derive(Debug, Clone)]
struct Threshold<'a> {
    range: RangeInclusive<f32>,
    intensities: &'a [f32],
}

/// Paints or erases the voxels under a brush footprint.
pub struct BrushEdit<'a> {
    center: Point3,
    shape: BrushShape,
    radius: f64,
    target: Label,
    policy: EditPolicy,
    erase: bool,
    threshold: Option<Threshold<'a>>,
}

impl<'a> BrushEdit<'a> {
    /// Creates a paint stroke setting voxels to `target`.
    ///
    /// `radius` is in world units; `center` is a world point.
    #[must_use]
    pub fn paint(
        center: Point3,
        shape: BrushShape,
        radius: f64,
        target: Label,
        policy: EditPolicy,
    ) -> Self {
        Self {
            center,
            shape,
            radius,
            target,
            policy,
            erase: false,
            threshold: None,
        }
    }

    /// Creates an erase stroke: paint with class 0 over anything.
    #[must_use]
    pub fn erase(center: Point3, shape: BrushShape, radius: f64) -> Self {
        Self {
            center,
            shape,
            radius,
            target: BACKGROUND,
            policy: EditPolicy::OverwriteAny,
            erase: true,
            threshold: None,
        }
    }

    /// Restricts the stroke to voxels whose reference intensity lies in
    /// `range`. `intensities` must be aligned with the labelmap.
    #[must_use]
    pub fn with_threshold(mut self, range: RangeInclusive<f32>, intensities: &'a [f32]) -> Self {
        self.threshold = Some(Threshold { range, intensities });
        self
    }

    /// Executes the stroke.
    ///
    /// A brush lying entirely outside the volume writes nothing and returns
    /// an empty region.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is invalid, a paint stroke targets
    /// class 0, or the threshold buffer does not match the volume. Nothing is
    /// written in that case.
    pub fn execute(&self, volume: &mut VoxelVolume) -> Result<DirtyRegion> {
        let writes = self.plan(volume)?;
        Ok(writes.commit(volume))
    }

    fn plan(&self, volume: &VoxelVolume) -> Result<WriteSet> {
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(EditError::InvalidInput(format!(
                "brush radius must be a non-negative number, got {}",
                self.radius
            ))
            .into());
        }
        if !self.center.iter().all(|c| c.is_finite()) {
            return Err(EditError::InvalidInput(format!(
                "brush center must be finite, got ({}, {}, {})",
                self.center.x, self.center.y, self.center.z
            ))
            .into());
        }
        if !self.erase && self.target == BACKGROUND {
            return Err(EditError::BackgroundTarget.into());
        }
        if let Some(threshold) = &self.threshold {
            if threshold.intensities.len() != volume.voxel_count() {
                return Err(VolumeError::BufferLength {
                    expected: volume.voxel_count(),
                    actual: threshold.intensities.len(),
                }
                .into());
            }
        }

        let geometry = volume.geometry();
        let center = geometry.world_to_index(&self.center);
        let mut writes = WriteSet::default();

        for offset in self.footprint(volume, &center) {
            let current = volume.labels()[offset];
            if !self.policy.allows(current) {
                continue;
            }
            if let Some(threshold) = &self.threshold {
                if !threshold.range.contains(&threshold.intensities[offset]) {
                    continue;
                }
            }
            writes.push(offset, self.target);
        }
        Ok(writes)
    }

    /// Linear offsets of the in-bounds voxels covered by the shape.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    fn footprint(&self, volume: &VoxelVolume, center: &IndexPoint) -> Vec<usize> {
        let geometry = volume.geometry();
        let dimensions = geometry.dimensions();

        if let BrushShape::Custom(offsets) = &self.shape {
            return offsets
                .iter()
                .filter_map(|o| {
                    let x = center.x.checked_add(o.x)?;
                    let y = center.y.checked_add(o.y)?;
                    let z = center.z.checked_add(o.z)?;
                    geometry.linear_offset(&IndexPoint::new(x, y, z))
                })
                .collect();
        }

        let spacing = geometry.spacing();
        let flat_axis = match self.shape {
            BrushShape::Circle { axis } => Some(axis.normal_axis()),
            _ => None,
        };

        let mut half = IndexOffset::zeros();
        for axis in 0..3 {
            if flat_axis != Some(axis) {
                half[axis] = (self.radius / spacing[axis] + TOLERANCE).floor() as i64;
            }
        }
        let (mut lo, mut hi) = (*center, *center);
        for axis in 0..3 {
            lo[axis] = center[axis].saturating_sub(half[axis]);
            hi[axis] = center[axis].saturating_add(half[axis]);
        }
        let Some(bounds) = IndexBox::clamped(lo, hi, dimensions) else {
            return Vec::new();
        };

        let limit = self.radius * self.radius + TOLERANCE;
        bounds
            .iter()
            .filter(|index| {
                let mut d2 = 0.0;
                for axis in 0..3 {
                    let delta = (index[axis] as f64 - center[axis] as f64) * spacing[axis];
                    d2 += delta * delta;
                }
                d2 <= limit
            })
            .map(|index| geometry.offset_of(index))
            .collect()
    }
}

impl VolumeEdit for BrushEdit<'_> {
    fn apply(&self, volume: &mut VoxelVolume) -> Result<DirtyRegion> {
        self.execute(volume)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::LabelmapError;
    use crate::math::Vector3;
    use crate::volume::VolumeGeometry;

    fn volume(dims: [usize; 3]) -> VoxelVolume {
        let g = VolumeGeometry::axis_aligned(dims, Vector3::new(1.0, 1.0, 1.0), Point3::origin())
            .unwrap();
        VoxelVolume::new(g)
    }

    fn at(v: &VoxelVolume, x: i64, y: i64, z: i64) -> Label {
        v.classification_at(&IndexPoint::new(x, y, z)).unwrap()
    }

    fn count(v: &VoxelVolume, class: Label) -> usize {
        v.labels().iter().filter(|&&l| l == class).count()
    }

    #[test]
    fn sphere_radius_one_paints_seven_voxels() {
        let mut v = volume([4, 4, 4]);
        let center = v.index_to_world(&IndexPoint::new(2, 2, 2));
        let region = BrushEdit::paint(center, BrushShape::Sphere, 1.0, 5, EditPolicy::OverwriteAny)
            .execute(&mut v)
            .unwrap();

        assert_eq!(count(&v, 5), 7);
        for (x, y, z) in [(2, 2, 2), (1, 2, 2), (3, 2, 2), (2, 1, 2), (2, 3, 2), (2, 2, 1), (2, 2, 3)] {
            assert_eq!(at(&v, x, y, z), 5);
        }
        assert_eq!(at(&v, 1, 1, 2), 0);
        assert_eq!(region.bounds().copied(), Some(IndexBox::new([1, 1, 1], [3, 3, 3])));
        assert_eq!(region.classes(), &BTreeSet::from([0, 5]));
    }

    #[test]
    fn sphere_covers_every_voxel_within_radius() {
        let mut v = volume([9, 9, 9]);
        let c = IndexPoint::new(4, 4, 4);
        let center = v.index_to_world(&c);
        BrushEdit::paint(center, BrushShape::Sphere, 2.5, 3, EditPolicy::OverwriteAny)
            .execute(&mut v)
            .unwrap();
        for index in IndexBox::new([0; 3], [8; 3]).iter() {
            let d = IndexPoint::new(index[0] as i64, index[1] as i64, index[2] as i64) - c;
            let inside = (d.x * d.x + d.y * d.y + d.z * d.z) as f64 <= 6.25;
            assert_eq!(v.label(index) == 3, inside, "voxel {index:?}");
        }
    }

    #[test]
    fn anisotropic_spacing_scales_footprint() {
        let g = VolumeGeometry::axis_aligned([9, 9, 9], Vector3::new(1.0, 1.0, 2.0), Point3::origin())
            .unwrap();
        let mut v = VoxelVolume::new(g);
        let center = v.index_to_world(&IndexPoint::new(4, 4, 4));
        let region = BrushEdit::paint(center, BrushShape::Sphere, 2.0, 1, EditPolicy::OverwriteAny)
            .execute(&mut v)
            .unwrap();
        let b = region.bounds().copied().unwrap();
        assert_eq!(b.min, [2, 2, 3]);
        assert_eq!(b.max, [6, 6, 5]);
    }

    #[test]
    fn circle_stays_in_slice() {
        let mut v = volume([5, 5, 5]);
        let center = v.index_to_world(&IndexPoint::new(2, 2, 2));
        let region = BrushEdit::paint(
            center,
            BrushShape::Circle {
                axis: SliceAxis::Axial,
            },
            1.0,
            2,
            EditPolicy::OverwriteAny,
        )
        .execute(&mut v)
        .unwrap();
        assert_eq!(count(&v, 2), 5);
        let b = region.bounds().copied().unwrap();
        assert_eq!(b.min[2], 2);
        assert_eq!(b.max[2], 2);
    }

    #[test]
    fn overwrite_only_protects_other_classes() {
        let mut v = volume([4, 4, 4]);
        v.set_classification_at(&IndexPoint::new(1, 2, 2), 9).unwrap();
        v.set_classification_at(&IndexPoint::new(3, 2, 2), 4).unwrap();
        let before = v.labels().to_vec();
        let center = v.index_to_world(&IndexPoint::new(2, 2, 2));

        BrushEdit::paint(center, BrushShape::Sphere, 1.0, 4, EditPolicy::only([0, 4]))
            .execute(&mut v)
            .unwrap();

        for (old, new) in before.iter().zip(v.labels()) {
            if ![0, 4].contains(old) {
                assert_eq!(old, new);
            }
        }
        assert_eq!(at(&v, 1, 2, 2), 9);
        assert_eq!(at(&v, 2, 2, 2), 4);
    }

    #[test]
    fn erase_resets_to_background() {
        let mut v = volume([4, 4, 4]);
        let center = v.index_to_world(&IndexPoint::new(2, 2, 2));
        BrushEdit::paint(center, BrushShape::Sphere, 1.0, 5, EditPolicy::OverwriteAny)
            .execute(&mut v)
            .unwrap();
        let region = BrushEdit::erase(center, BrushShape::Sphere, 1.0)
            .execute(&mut v)
            .unwrap();
        assert_eq!(count(&v, 5), 0);
        assert!(region.classes().contains(&5));
    }

    #[test]
    fn paint_background_is_rejected() {
        let mut v = volume([4, 4, 4]);
        let err = BrushEdit::paint(Point3::origin(), BrushShape::Sphere, 1.0, 0, EditPolicy::OverwriteAny)
            .execute(&mut v)
            .unwrap_err();
        assert!(matches!(err, LabelmapError::Edit(EditError::BackgroundTarget)));
    }

    #[test]
    fn negative_radius_is_rejected() {
        let mut v = volume([4, 4, 4]);
        let result = BrushEdit::paint(Point3::origin(), BrushShape::Sphere, -1.0, 1, EditPolicy::OverwriteAny)
            .execute(&mut v);
        assert!(result.is_err());
        assert_eq!(count(&v, 0), 64);
    }

    #[test]
    fn brush_outside_volume_is_a_no_op() {
        let mut v = volume([4, 4, 4]);
        let region = BrushEdit::paint(
            Point3::new(40.0, 40.0, 40.0),
            BrushShape::Sphere,
            2.0,
            1,
            EditPolicy::OverwriteAny,
        )
        .execute(&mut v)
        .unwrap();
        assert!(region.is_empty());
        assert_eq!(count(&v, 0), 64);
    }

    #[test]
    fn far_away_center_writes_nothing() {
        let mut v = volume([4, 4, 4]);
        for center in [Point3::new(1e19, 0.0, 0.0), Point3::new(-1e300, 2.0, 2.0)] {
            let region = BrushEdit::paint(center, BrushShape::Sphere, 1.0, 1, EditPolicy::OverwriteAny)
                .execute(&mut v)
                .unwrap();
            assert!(region.is_empty());
        }
        let stencil = vec![IndexOffset::new(i64::MAX, 0, 0), IndexOffset::new(0, 0, 0)];
        let region = BrushEdit::paint(
            Point3::new(1e19, 0.0, 0.0),
            BrushShape::Custom(stencil),
            0.0,
            1,
            EditPolicy::OverwriteAny,
        )
        .execute(&mut v)
        .unwrap();
        assert!(region.is_empty());
        assert_eq!(count(&v, 0), 64);
    }

    #[test]
    fn huge_radius_covers_whole_volume() {
        let mut v = volume([4, 4, 4]);
        let center = v.index_to_world(&IndexPoint::new(1, 1, 1));
        let region = BrushEdit::paint(center, BrushShape::Sphere, 1e30, 3, EditPolicy::OverwriteAny)
            .execute(&mut v)
            .unwrap();
        assert_eq!(count(&v, 3), 64);
        assert_eq!(region.voxel_count(), 64);

        // a center near the bottom of the index range still reaches the volume
        let far = Point3::new(-9.2e18, 1.0, 1.0);
        let region = BrushEdit::paint(far, BrushShape::Sphere, 1e30, 4, EditPolicy::OverwriteAny)
            .execute(&mut v)
            .unwrap();
        assert_eq!(region.voxel_count(), 64);
        assert_eq!(count(&v, 4), 64);
    }

    #[test]
    fn non_finite_center_is_rejected() {
        let mut v = volume([4, 4, 4]);
        for center in [
            Point3::new(f64::NAN, f64::NAN, f64::NAN),
            Point3::new(f64::INFINITY, 0.0, 0.0),
        ] {
            let err = BrushEdit::paint(center, BrushShape::Sphere, 1.0, 1, EditPolicy::OverwriteAny)
                .execute(&mut v)
                .unwrap_err();
            assert!(matches!(err, LabelmapError::Edit(EditError::InvalidInput(_))));
        }
        let err = BrushEdit::erase(Point3::new(0.0, f64::NAN, 0.0), BrushShape::Sphere, 1.0)
            .execute(&mut v)
            .unwrap_err();
        assert!(matches!(err, LabelmapError::Edit(EditError::InvalidInput(_))));
        assert!(v.present_classes().is_empty());
    }

    #[test]
    fn brush_clamps_at_edge() {
        let mut v = volume([4, 4, 4]);
        let region = BrushEdit::paint(Point3::origin(), BrushShape::Sphere, 1.0, 1, EditPolicy::OverwriteAny)
            .execute(&mut v)
            .unwrap();
        assert_eq!(count(&v, 1), 4);
        assert_eq!(region.bounds().copied(), Some(IndexBox::new([0, 0, 0], [1, 1, 1])));
    }

    #[test]
    fn threshold_limits_paint() {
        let mut v = volume([3, 1, 1]);
        let intensities = [10.0, 200.0, 50.0];
        let center = v.index_to_world(&IndexPoint::new(1, 0, 0));
        BrushEdit::paint(center, BrushShape::Sphere, 1.0, 2, EditPolicy::OverwriteAny)
            .with_threshold(0.0..=100.0, &intensities)
            .execute(&mut v)
            .unwrap();
        assert_eq!(v.labels(), &[2, 0, 2]);
    }

    #[test]
    fn threshold_length_mismatch_writes_nothing() {
        let mut v = volume([3, 1, 1]);
        let intensities = [10.0, 20.0];
        let result = BrushEdit::paint(Point3::origin(), BrushShape::Sphere, 5.0, 2, EditPolicy::OverwriteAny)
            .with_threshold(0.0..=100.0, &intensities)
            .execute(&mut v);
        assert!(result.is_err());
        assert_eq!(v.labels(), &[0, 0, 0]);
    }

    #[test]
    fn custom_stencil() {
        let mut v = volume([4, 4, 4]);
        let center = v.index_to_world(&IndexPoint::new(0, 0, 0));
        let stencil = vec![
            IndexOffset::new(0, 0, 0),
            IndexOffset::new(2, 0, 0),
            IndexOffset::new(-1, 0, 0),
        ];
        let region = BrushEdit::paint(center, BrushShape::Custom(stencil), 0.0, 6, EditPolicy::OverwriteAny)
            .execute(&mut v)
            .unwrap();
        assert_eq!(count(&v, 6), 2);
        assert_eq!(region.bounds().copied(), Some(IndexBox::new([0, 0, 0], [2, 0, 0])));
    }
}
