mod color_lut;
mod entry;
mod representation;

pub use color_lut::{ColorLut, Rgb};
pub use entry::{Segmentation, SegmentationKey};
pub use representation::{
    ClassSelection, LabelmapSummary, Representation, RepresentationData, RepresentationId,
    RepresentationKind,
};

use std::collections::{BTreeSet, HashMap};

use slotmap::SlotMap;
use tracing::debug;

use crate::dirty::DirtyRegion;
use crate::error::{Result, StoreError};
use crate::operations::edit::VolumeEdit;
use crate::volume::{VolumeGeometry, VoxelVolume};

/// Central arena that owns every segmentation and its representations.
///
/// Other components refer to entries by string id or by typed key and go
/// through the store to read or write; the store is the only owner of each
/// voxel volume.
#[derive(Debug, Default)]
pub struct SegmentationStore {
    segmentations: SlotMap<SegmentationKey, Segmentation>,
    by_id: HashMap<String, SegmentationKey>,
    representations: SlotMap<RepresentationId, Representation>,
}

impl SegmentationStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Segmentation operations ---

    /// Creates an empty (all background) segmentation over `geometry`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the id is in use.
    pub fn create_segmentation(
        &mut self,
        id: impl Into<String>,
        geometry: VolumeGeometry,
    ) -> Result<SegmentationKey> {
        self.create_segmentation_from_labels(id, VoxelVolume::new(geometry))
    }

    /// Creates a segmentation around an existing labelmap.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the id is in use.
    pub fn create_segmentation_from_labels(
        &mut self,
        id: impl Into<String>,
        volume: VoxelVolume,
    ) -> Result<SegmentationKey> {
        let id = id.into();
        if self.by_id.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id).into());
        }
        debug!(segmentation = %id, dimensions = ?volume.dimensions(), "creating segmentation");
        let key = self.segmentations.insert(Segmentation::new(id.clone(), volume));
        self.by_id.insert(id, key);
        Ok(key)
    }

    /// Removes a segmentation, detaching all of its representations and
    /// dropping its volume. Returns the detached representation ids.
    ///
    /// Removing an unknown id is a no-op.
    pub fn remove_segmentation(&mut self, id: &str) -> Vec<RepresentationId> {
        let Some(key) = self.by_id.remove(id) else {
            return Vec::new();
        };
        let Some(segmentation) = self.segmentations.remove(key) else {
            return Vec::new();
        };
        for &rep in &segmentation.representations {
            self.representations.remove(rep);
        }
        debug!(
            segmentation = %id,
            detached = segmentation.representations.len(),
            "removed segmentation"
        );
        segmentation.representations
    }

    /// Resolves a segmentation id to its key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown.
    pub fn key(&self, id: &str) -> Result<SegmentationKey> {
        self.by_id
            .get(id)
            .copied()
            .ok_or_else(|| StoreError::NotFound(id.into()).into())
    }

    /// Returns a segmentation by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown.
    pub fn segmentation(&self, id: &str) -> Result<&Segmentation> {
        let key = self.key(id)?;
        self.segmentation_by_key(key)
    }

    /// Returns a segmentation by key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the key is stale.
    pub fn segmentation_by_key(&self, key: SegmentationKey) -> Result<&Segmentation> {
        self.segmentations
            .get(key)
            .ok_or_else(|| StoreError::NotFound("segmentation".into()).into())
    }

    /// Mutable access to a segmentation's metadata. The volume stays
    /// read-only; use [`SegmentationStore::edit`] to change voxels.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown.
    pub fn segmentation_mut(&mut self, id: &str) -> Result<&mut Segmentation> {
        let key = self.key(id)?;
        self.segmentations
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(id.into()).into())
    }

    /// The labelmap of a segmentation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown.
    pub fn volume(&self, id: &str) -> Result<&VoxelVolume> {
        Ok(self.segmentation(id)?.volume())
    }

    /// Applies an edit to a segmentation's volume and returns its dirty
    /// region. Propagation is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown, or the edit's own
    /// error; a failed edit leaves the volume untouched.
    pub fn edit(&mut self, id: &str, edit: &impl VolumeEdit) -> Result<DirtyRegion> {
        let segmentation = self.segmentation_mut(id)?;
        edit.apply(segmentation.volume_mut())
    }

    /// Swaps in a new labelmap wholesale and marks every representation
    /// stale.
    ///
    /// Representations keep the dimensions they were created with, so a
    /// volume of a different size makes their next derivation fail with
    /// `IncompatibleGeometry`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown.
    pub fn replace_volume(&mut self, id: &str, volume: VoxelVolume) -> Result<()> {
        let key = self.key(id)?;
        let segmentation = self
            .segmentations
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(id.into()))?;
        segmentation.replace_volume(volume);
        for &rep in &segmentation.representations {
            if let Some(r) = self.representations.get_mut(rep) {
                r.mark_stale();
            }
        }
        Ok(())
    }

    /// Number of segmentations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segmentations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segmentations.is_empty()
    }

    /// Ids of all segmentations, sorted.
    #[must_use]
    pub fn segmentation_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_id.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    // --- Representation operations ---

    /// Attaches a representation of every class to a viewport group.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the segmentation is unknown.
    pub fn attach_representation(
        &mut self,
        id: &str,
        group_id: &str,
        kind: RepresentationKind,
    ) -> Result<RepresentationId> {
        self.attach_representation_for(id, group_id, kind, ClassSelection::All)
    }

    /// Attaches a representation of selected classes to a viewport group.
    ///
    /// Idempotent on `(segmentation, group, kind)`: attaching again returns
    /// the existing id unchanged.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the segmentation is unknown.
    pub fn attach_representation_for(
        &mut self,
        id: &str,
        group_id: &str,
        kind: RepresentationKind,
        classes: ClassSelection,
    ) -> Result<RepresentationId> {
        let key = self.key(id)?;
        let segmentation = self
            .segmentations
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(id.into()))?;

        let existing = segmentation.representations.iter().copied().find(|&rep| {
            self.representations
                .get(rep)
                .is_some_and(|r| r.group_id() == group_id && r.kind() == kind)
        });
        if let Some(rep) = existing {
            return Ok(rep);
        }

        let rep = self.representations.insert(Representation::new(
            key,
            group_id.to_owned(),
            kind,
            classes,
            segmentation.volume().dimensions(),
        ));
        segmentation.representations.push(rep);
        debug!(segmentation = %id, group = group_id, ?kind, "attached representation");
        Ok(rep)
    }

    /// Detaches one representation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::RepresentationNotFound` if the id is unknown.
    pub fn detach_representation(&mut self, rep: RepresentationId) -> Result<()> {
        let removed = self
            .representations
            .remove(rep)
            .ok_or(StoreError::RepresentationNotFound)?;
        if let Some(segmentation) = self.segmentations.get_mut(removed.segmentation()) {
            segmentation.representations.retain(|&r| r != rep);
        }
        Ok(())
    }

    /// Returns a representation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::RepresentationNotFound` if the id is unknown.
    pub fn representation(&self, rep: RepresentationId) -> Result<&Representation> {
        self.representations
            .get(rep)
            .ok_or_else(|| StoreError::RepresentationNotFound.into())
    }

    pub(crate) fn representation_mut(&mut self, rep: RepresentationId) -> Result<&mut Representation> {
        self.representations
            .get_mut(rep)
            .ok_or_else(|| StoreError::RepresentationNotFound.into())
    }

    /// Representations attached to a segmentation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown.
    pub fn representations_of(&self, id: &str) -> Result<&[RepresentationId]> {
        Ok(self.segmentation(id)?.representations())
    }

    /// Representations attached to a viewport group, across segmentations.
    #[must_use]
    pub fn representations_in_group(&self, group_id: &str) -> Vec<RepresentationId> {
        self.representations
            .iter()
            .filter(|(_, r)| r.group_id() == group_id)
            .map(|(id, _)| id)
            .collect()
    }

    /// Viewport groups a segmentation is shown in.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown.
    pub fn groups_of(&self, id: &str) -> Result<BTreeSet<String>> {
        let segmentation = self.segmentation(id)?;
        Ok(segmentation
            .representations()
            .iter()
            .filter_map(|&rep| self.representations.get(rep))
            .map(|r| r.group_id().to_owned())
            .collect())
    }

    /// Total number of representations.
    #[must_use]
    pub fn representation_count(&self) -> usize {
        self.representations.len()
    }

    /// Marks stale every representation of `id` whose classes intersect
    /// the region's touched classes. Returns how many became stale.
    ///
    /// This only flags; recomputation happens when the data is next read.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown.
    pub fn notify_volume_changed(&mut self, id: &str, region: &DirtyRegion) -> Result<usize> {
        let key = self.key(id)?;
        let segmentation = self
            .segmentations
            .get(key)
            .ok_or_else(|| StoreError::NotFound(id.into()))?;
        if region.is_empty() {
            return Ok(0);
        }

        let mut marked = 0;
        for &rep in &segmentation.representations {
            if let Some(r) = self.representations.get_mut(rep) {
                if r.source_classes().intersects(region.classes()) && r.mark_stale() {
                    marked += 1;
                }
            }
        }
        debug!(segmentation = %id, marked, "volume changed");
        Ok(marked)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::LabelmapError;
    use crate::math::{IndexBox, Point3, Vector3};

    fn geometry() -> VolumeGeometry {
        VolumeGeometry::axis_aligned([4, 4, 4], Vector3::new(1.0, 1.0, 1.0), Point3::origin())
            .unwrap()
    }

    fn region(classes: &[u16]) -> DirtyRegion {
        DirtyRegion::new(IndexBox::single([1, 1, 1]), classes.iter().copied().collect())
    }

    #[test]
    fn create_and_lookup() {
        let mut store = SegmentationStore::new();
        let key = store.create_segmentation("seg", geometry()).unwrap();
        assert_eq!(store.key("seg").unwrap(), key);
        let seg = store.segmentation("seg").unwrap();
        assert_eq!(seg.id(), "seg");
        assert_eq!(seg.active_segment_index(), 1);
        assert_eq!(seg.volume().dimensions(), [4, 4, 4]);
    }

    #[test]
    fn duplicate_id_fails() {
        let mut store = SegmentationStore::new();
        store.create_segmentation("seg", geometry()).unwrap();
        let err = store.create_segmentation("seg", geometry()).unwrap_err();
        assert!(matches!(err, LabelmapError::Store(StoreError::AlreadyExists(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = SegmentationStore::new();
        assert!(matches!(
            store.volume("missing"),
            Err(LabelmapError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn attach_is_idempotent() {
        let mut store = SegmentationStore::new();
        store.create_segmentation("seg", geometry()).unwrap();
        let a = store
            .attach_representation("seg", "group", RepresentationKind::Surface)
            .unwrap();
        let b = store
            .attach_representation("seg", "group", RepresentationKind::Surface)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(store.representation_count(), 1);

        let c = store
            .attach_representation("seg", "other", RepresentationKind::Surface)
            .unwrap();
        assert_ne!(a, c);
        assert_eq!(store.representation_count(), 2);
        assert_eq!(store.groups_of("seg").unwrap().len(), 2);
    }

    #[test]
    fn remove_detaches_everything() {
        let mut store = SegmentationStore::new();
        store.create_segmentation("seg", geometry()).unwrap();
        let rep = store
            .attach_representation("seg", "group", RepresentationKind::Contour)
            .unwrap();
        let detached = store.remove_segmentation("seg");
        assert_eq!(detached, vec![rep]);
        assert!(store.is_empty());
        assert_eq!(store.representation_count(), 0);
        assert!(store.representation(rep).is_err());
        // second removal is a no-op
        assert!(store.remove_segmentation("seg").is_empty());
    }

    #[test]
    fn remove_without_representations() {
        let mut store = SegmentationStore::new();
        store.create_segmentation("seg", geometry()).unwrap();
        assert!(store.remove_segmentation("seg").is_empty());
        assert!(store.key("seg").is_err());
        // id can be reused afterwards
        assert!(store.create_segmentation("seg", geometry()).is_ok());
    }

    #[test]
    fn notify_marks_only_intersecting() {
        let mut store = SegmentationStore::new();
        store.create_segmentation("seg", geometry()).unwrap();
        let liver = store
            .attach_representation_for(
                "seg",
                "g1",
                RepresentationKind::Surface,
                ClassSelection::only([1]),
            )
            .unwrap();
        let spleen = store
            .attach_representation_for(
                "seg",
                "g2",
                RepresentationKind::Surface,
                ClassSelection::only([2]),
            )
            .unwrap();
        store
            .representation_mut(liver)
            .unwrap()
            .store_data(RepresentationData::Labelmap(LabelmapSummary::default()));
        store
            .representation_mut(spleen)
            .unwrap()
            .store_data(RepresentationData::Labelmap(LabelmapSummary::default()));

        let marked = store.notify_volume_changed("seg", &region(&[0, 1])).unwrap();
        assert_eq!(marked, 1);
        assert!(store.representation(liver).unwrap().is_stale());
        assert!(!store.representation(spleen).unwrap().is_stale());
    }

    #[test]
    fn notify_empty_region_marks_nothing() {
        let mut store = SegmentationStore::new();
        store.create_segmentation("seg", geometry()).unwrap();
        let rep = store
            .attach_representation("seg", "g", RepresentationKind::Labelmap)
            .unwrap();
        store
            .representation_mut(rep)
            .unwrap()
            .store_data(RepresentationData::Labelmap(LabelmapSummary::default()));
        assert_eq!(store.notify_volume_changed("seg", &DirtyRegion::empty()).unwrap(), 0);
        assert!(!store.representation(rep).unwrap().is_stale());
    }

    #[test]
    fn detach_updates_segmentation() {
        let mut store = SegmentationStore::new();
        store.create_segmentation("seg", geometry()).unwrap();
        let rep = store
            .attach_representation("seg", "g", RepresentationKind::Contour)
            .unwrap();
        store.detach_representation(rep).unwrap();
        assert!(store.representations_of("seg").unwrap().is_empty());
        assert!(store.detach_representation(rep).is_err());
    }

    #[test]
    fn group_lookup_spans_segmentations() {
        let mut store = SegmentationStore::new();
        store.create_segmentation("a", geometry()).unwrap();
        store.create_segmentation("b", geometry()).unwrap();
        store
            .attach_representation("a", "axial", RepresentationKind::Labelmap)
            .unwrap();
        store
            .attach_representation("b", "axial", RepresentationKind::Labelmap)
            .unwrap();
        store
            .attach_representation("b", "3d", RepresentationKind::Surface)
            .unwrap();
        assert_eq!(store.representations_in_group("axial").len(), 2);
        assert_eq!(store.segmentation_ids(), vec!["a", "b"]);
    }

    #[test]
    fn background_cannot_be_active() {
        let mut store = SegmentationStore::new();
        store.create_segmentation("seg", geometry()).unwrap();
        let seg = store.segmentation_mut("seg").unwrap();
        assert!(seg.set_active_segment_index(0).is_err());
        seg.set_active_segment_index(4).unwrap();
        assert_eq!(seg.active_segment_index(), 4);
    }
}
