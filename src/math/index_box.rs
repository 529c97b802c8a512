use super::IndexPoint;

/// An inclusive, axis-aligned box of voxel indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBox {
    /// Minimum corner (inclusive).
    pub min: [usize; 3],
    /// Maximum corner (inclusive).
    pub max: [usize; 3],
}

impl IndexBox {
    /// Creates a box from two corners, ordering each axis.
    #[must_use]
    pub fn new(a: [usize; 3], b: [usize; 3]) -> Self {
        let mut min = [0; 3];
        let mut max = [0; 3];
        for axis in 0..3 {
            min[axis] = a[axis].min(b[axis]);
            max[axis] = a[axis].max(b[axis]);
        }
        Self { min, max }
    }

    /// Creates a box holding a single voxel.
    #[must_use]
    pub fn single(index: [usize; 3]) -> Self {
        Self {
            min: index,
            max: index,
        }
    }

    /// Clamps a signed index box to `[0, dimensions)`.
    ///
    /// Returns `None` when the box does not overlap the volume at all.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn clamped(min: IndexPoint, max: IndexPoint, dimensions: [usize; 3]) -> Option<Self> {
        let mut out = Self::single([0; 3]);
        for axis in 0..3 {
            if dimensions[axis] == 0 {
                return None;
            }
            let upper = dimensions[axis] as i64 - 1;
            let lo = min[axis].min(max[axis]).max(0);
            let hi = min[axis].max(max[axis]).min(upper);
            if lo > hi {
                return None;
            }
            out.min[axis] = lo as usize;
            out.max[axis] = hi as usize;
        }
        Some(out)
    }

    /// Returns the smallest box containing both boxes.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut out = *self;
        for axis in 0..3 {
            out.min[axis] = out.min[axis].min(other.min[axis]);
            out.max[axis] = out.max[axis].max(other.max[axis]);
        }
        out
    }

    /// Grows the box to include `index`.
    pub fn include(&mut self, index: [usize; 3]) {
        for (axis, &value) in index.iter().enumerate() {
            self.min[axis] = self.min[axis].min(value);
            self.max[axis] = self.max[axis].max(value);
        }
    }

    /// Returns `true` if `index` lies inside the box.
    #[must_use]
    pub fn contains(&self, index: [usize; 3]) -> bool {
        (0..3).all(|axis| self.min[axis] <= index[axis] && index[axis] <= self.max[axis])
    }

    /// Returns `true` if the two boxes share at least one voxel.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        (0..3).all(|axis| self.min[axis] <= other.max[axis] && other.min[axis] <= self.max[axis])
    }

    /// Number of voxels along each axis.
    #[must_use]
    pub fn extent(&self) -> [usize; 3] {
        [
            self.max[0] - self.min[0] + 1,
            self.max[1] - self.min[1] + 1,
            self.max[2] - self.min[2] + 1,
        ]
    }

    /// Total number of voxels covered by the box.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.extent().iter().product()
    }

    /// Iterates the voxels of the box with x varying fastest.
    pub fn iter(&self) -> impl Iterator<Item = [usize; 3]> {
        let (min, max) = (self.min, self.max);
        (min[2]..=max[2]).flat_map(move |z| {
            (min[1]..=max[1]).flat_map(move |y| (min[0]..=max[0]).map(move |x| [x, y, z]))
        })
    }
}
