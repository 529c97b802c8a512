use crate::error::{Result, VolumeError};
use crate::math::{IndexPoint, Matrix3, Point3, Vector3, TOLERANCE};

/// Spatial metadata of a voxel grid: size, spacing, origin and orientation.
///
/// World coordinates relate to continuous index coordinates through
/// `world = origin + direction * diag(spacing) * index`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeGeometry {
    dimensions: [usize; 3],
    spacing: Vector3,
    origin: Point3,
    direction: Matrix3,
    frame_of_reference_id: Option<String>,
    index_to_world: Matrix3,
    world_to_index: Matrix3,
}

impl VolumeGeometry {
    /// Creates a geometry.
    ///
    /// `direction` holds the direction cosines of the `i`, `j` and `k` axes
    /// as its columns.
    ///
    /// # Errors
    ///
    /// Returns `VolumeError::InvalidGeometry` if a dimension is zero, a
    /// spacing is not a positive finite number, or `direction` is singular.
    pub fn new(
        dimensions: [usize; 3],
        spacing: Vector3,
        origin: Point3,
        direction: Matrix3,
    ) -> Result<Self> {
        if dimensions.contains(&0) {
            return Err(VolumeError::InvalidGeometry(format!(
                "dimensions must be non-zero, got {dimensions:?}"
            ))
            .into());
        }
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(VolumeError::InvalidGeometry(format!(
                "spacing must be positive, got ({}, {}, {})",
                spacing.x, spacing.y, spacing.z
            ))
            .into());
        }
        if direction.determinant().abs() < TOLERANCE {
            return Err(
                VolumeError::InvalidGeometry("direction matrix is singular".into()).into(),
            );
        }

        let index_to_world = direction * Matrix3::from_diagonal(&spacing);
        let world_to_index = index_to_world.try_inverse().ok_or_else(|| {
            VolumeError::InvalidGeometry("index transform is not invertible".into())
        })?;

        Ok(Self {
            dimensions,
            spacing,
            origin,
            direction,
            frame_of_reference_id: None,
            index_to_world,
            world_to_index,
        })
    }

    /// Creates a geometry whose index axes are aligned with the world axes.
    ///
    /// # Errors
    ///
    /// See [`VolumeGeometry::new`].
    pub fn axis_aligned(dimensions: [usize; 3], spacing: Vector3, origin: Point3) -> Result<Self> {
        Self::new(dimensions, spacing, origin, Matrix3::identity())
    }

    /// Tags the geometry with a frame of reference identifier.
    #[must_use]
    pub fn with_frame_of_reference(mut self, id: impl Into<String>) -> Self {
        self.frame_of_reference_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    #[must_use]
    pub fn spacing(&self) -> &Vector3 {
        &self.spacing
    }

    #[must_use]
    pub fn origin(&self) -> &Point3 {
        &self.origin
    }

    #[must_use]
    pub fn direction(&self) -> &Matrix3 {
        &self.direction
    }

    #[must_use]
    pub fn frame_of_reference_id(&self) -> Option<&str> {
        self.frame_of_reference_id.as_deref()
    }

    /// Number of voxels in the grid.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.dimensions.iter().product()
    }

    /// Returns `false` when the direction matrix flips handedness.
    #[must_use]
    pub fn is_right_handed(&self) -> bool {
        self.direction.determinant() > 0.0
    }

    /// Maps a continuous index coordinate to world space.
    #[must_use]
    pub fn continuous_index_to_world(&self, index: &Point3) -> Point3 {
        self.origin + self.index_to_world * index.coords
    }

    /// Maps a world point to a continuous index coordinate.
    #[must_use]
    pub fn world_to_continuous_index(&self, point: &Point3) -> Point3 {
        Point3::from(self.world_to_index * (point - self.origin))
    }

    /// Maps a voxel index to the world position of the voxel center.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn index_to_world(&self, index: &IndexPoint) -> Point3 {
        let continuous = Point3::new(index.x as f64, index.y as f64, index.z as f64);
        self.continuous_index_to_world(&continuous)
    }

    /// Maps a world point to the nearest voxel index, rounding half away
    /// from zero. The result is not clamped.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn world_to_index(&self, point: &Point3) -> IndexPoint {
        let c = self.world_to_continuous_index(point);
        IndexPoint::new(c.x.round() as i64, c.y.round() as i64, c.z.round() as i64)
    }

    /// Returns `true` if the index lies within `[0, dimensions)` on every axis.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn contains(&self, index: &IndexPoint) -> bool {
        (0..3).all(|axis| index[axis] >= 0 && (index[axis] as usize) < self.dimensions[axis])
    }

    /// Linear offset of an in-bounds index (`x + y*ix + z*ix*iy`).
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn linear_offset(&self, index: &IndexPoint) -> Option<usize> {
        if !self.contains(index) {
            return None;
        }
        Some(self.offset_of([index.x as usize, index.y as usize, index.z as usize]))
    }

    /// Linear offset of an index known to be in bounds.
    #[must_use]
    pub fn offset_of(&self, index: [usize; 3]) -> usize {
        let [ix, iy, _] = self.dimensions;
        index[0] + index[1] * ix + index[2] * ix * iy
    }

    /// Inverse of [`VolumeGeometry::offset_of`].
    #[must_use]
    pub fn index_of(&self, offset: usize) -> [usize; 3] {
        let [ix, iy, _] = self.dimensions;
        [offset % ix, (offset / ix) % iy, offset / (ix * iy)]
    }

    /// Returns an `OutOfBounds` error for `index`.
    pub(crate) fn out_of_bounds(&self, index: &IndexPoint) -> VolumeError {
        VolumeError::OutOfBounds {
            x: index.x,
            y: index.y,
            z: index.z,
            dimensions: self.dimensions,
        }
    }
}
