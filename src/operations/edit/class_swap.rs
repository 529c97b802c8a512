use crate::dirty::DirtyRegion;
use crate::error::{Result, VolumeError};
use crate::volume::{Label, VoxelVolume, BACKGROUND};

use super::{VolumeEdit, WriteSet};

/// Merges an inference result into a labelmap.
///
/// Voxel `i` takes `response[i]` when the filter is 0 (accept all), or when
/// either its current class or the response class equals the filter. This
/// lets a single-class result land without clobbering other classes.
pub struct ClassSwap<'a> {
    response: &'a [Label],
    target_filter: Label,
}

impl<'a> ClassSwap<'a> {
    /// Creates a merge of `response`, which must be aligned 1:1 with the
    /// target volume's voxels.
    #[must_use]
    pub fn new(response: &'a [Label], target_filter: Label) -> Self {
        Self {
            response,
            target_filter,
        }
    }

    /// Executes the merge, returning the region of voxels that changed.
    ///
    /// # Errors
    ///
    /// Returns `VolumeError::BufferLength` if the response length differs from
    /// the voxel count; nothing is written in that case.
    pub fn execute(&self, volume: &mut VoxelVolume) -> Result<DirtyRegion> {
        if self.response.len() != volume.voxel_count() {
            return Err(VolumeError::BufferLength {
                expected: volume.voxel_count(),
                actual: self.response.len(),
            }
            .into());
        }

        let filter = self.target_filter;
        let mut writes = WriteSet::default();
        for (offset, (&old, &new)) in volume.labels().iter().zip(self.response).enumerate() {
            if old == new {
                continue;
            }
            if filter == BACKGROUND || old == filter || new == filter {
                writes.push(offset, new);
            }
        }
        Ok(writes.commit(volume))
    }
}

impl VolumeEdit for ClassSwap<'_> {
    fn apply(&self, volume: &mut VoxelVolume) -> Result<DirtyRegion> {
        self.execute(volume)
    }
}
