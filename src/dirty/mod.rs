use std::collections::BTreeSet;

use crate::math::{IndexBox, IndexPoint};
use crate::volume::Label;

/// The voxels changed since the last consumer read: one bounding box plus
/// the set of classes touched inside it.
///
/// Regions are always clamped to the volume. Merging two regions keeps the
/// union box rather than a list of boxes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyRegion {
    bounds: Option<IndexBox>,
    classes: BTreeSet<Label>,
}

impl DirtyRegion {
    /// A region that covers nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a region from an in-bounds box.
    #[must_use]
    pub fn new(bounds: IndexBox, classes: BTreeSet<Label>) -> Self {
        Self {
            bounds: Some(bounds),
            classes,
        }
    }

    /// Creates a region from a signed box, clamping it to `dimensions`.
    ///
    /// A box entirely outside the volume yields an empty region.
    #[must_use]
    pub fn clamped(
        min: IndexPoint,
        max: IndexPoint,
        dimensions: [usize; 3],
        classes: BTreeSet<Label>,
    ) -> Self {
        match IndexBox::clamped(min, max, dimensions) {
            Some(bounds) => Self::new(bounds, classes),
            None => Self::empty(),
        }
    }

    /// A region covering a whole volume.
    #[must_use]
    pub fn whole(dimensions: [usize; 3], classes: BTreeSet<Label>) -> Self {
        Self::new(
            IndexBox::new(
                [0; 3],
                [
                    dimensions[0].saturating_sub(1),
                    dimensions[1].saturating_sub(1),
                    dimensions[2].saturating_sub(1),
                ],
            ),
            classes,
        )
    }

    #[must_use]
    pub fn bounds(&self) -> Option<&IndexBox> {
        self.bounds.as_ref()
    }

    #[must_use]
    pub fn classes(&self) -> &BTreeSet<Label> {
        &self.classes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    /// Number of voxels inside the bounding box.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.bounds.map_or(0, |b| b.voxel_count())
    }

    /// Unions `other` into this region.
    pub fn merge(&mut self, other: &Self) {
        self.bounds = match (self.bounds, other.bounds) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, b) => a.or(b),
        };
        self.classes.extend(other.classes.iter().copied());
    }

    /// Returns `true` if any touched class is in `classes`.
    #[must_use]
    pub fn touches_any<'a>(&self, mut classes: impl Iterator<Item = &'a Label>) -> bool {
        classes.any(|c| self.classes.contains(c))
    }
}

/// Accumulates dirty regions of one volume between flushes.
///
/// Marking and draining both take `&mut self`, so the owner is the single
/// point of mutation and a mark can never be lost to a concurrent drain.
#[derive(Debug, Default)]
pub struct DirtyRegionTracker {
    pending: DirtyRegion,
}

impl DirtyRegionTracker {
    /// Creates a tracker with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Unions `region` into the pending region.
    pub fn mark_dirty(&mut self, region: &DirtyRegion) {
        self.pending.merge(region);
    }

    /// Returns the accumulated region and resets to empty.
    pub fn drain(&mut self) -> DirtyRegion {
        std::mem::take(&mut self.pending)
    }

    /// The region accumulated so far.
    #[must_use]
    pub fn peek(&self) -> &DirtyRegion {
        &self.pending
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(min: [usize; 3], max: [usize; 3], classes: &[Label]) -> DirtyRegion {
        DirtyRegion::new(IndexBox::new(min, max), classes.iter().copied().collect())
    }

    #[test]
    fn clamped_region_stays_in_volume() {
        let r = DirtyRegion::clamped(
            IndexPoint::new(-1, -1, 2),
            IndexPoint::new(1, 5, 2),
            [4, 4, 4],
            BTreeSet::from([3]),
        );
        let b = r.bounds().copied();
        assert_eq!(b, Some(IndexBox::new([0, 0, 2], [1, 3, 2])));
    }

    #[test]
    fn clamped_outside_is_empty() {
        let r = DirtyRegion::clamped(
            IndexPoint::new(8, 8, 8),
            IndexPoint::new(9, 9, 9),
            [4, 4, 4],
            BTreeSet::from([3]),
        );
        assert!(r.is_empty());
    }

    #[test]
    fn tracker_unions_boxes_and_classes() {
        let mut tracker = DirtyRegionTracker::new();
        tracker.mark_dirty(&region([0, 0, 0], [1, 1, 1], &[1]));
        tracker.mark_dirty(&region([3, 2, 0], [3, 3, 0], &[2, 0]));
        assert!(tracker.is_pending());

        let drained = tracker.drain();
        assert_eq!(drained.bounds().copied(), Some(IndexBox::new([0, 0, 0], [3, 3, 1])));
        assert_eq!(drained.classes().iter().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn drain_resets() {
        let mut tracker = DirtyRegionTracker::new();
        tracker.mark_dirty(&region([0, 0, 0], [0, 0, 0], &[4]));
        let _ = tracker.drain();
        assert!(!tracker.is_pending());
        assert!(tracker.drain().is_empty());
    }

    #[test]
    fn mark_after_drain_is_kept() {
        let mut tracker = DirtyRegionTracker::new();
        tracker.mark_dirty(&region([0, 0, 0], [0, 0, 0], &[4]));
        let first = tracker.drain();
        tracker.mark_dirty(&region([2, 2, 2], [2, 2, 2], &[5]));
        let second = tracker.drain();
        assert_eq!(first.classes().len(), 1);
        assert_eq!(second.bounds().copied(), Some(IndexBox::single([2, 2, 2])));
        assert!(second.classes().contains(&5));
    }

    #[test]
    fn merging_empty_keeps_box() {
        let mut r = region([1, 1, 1], [2, 2, 2], &[1]);
        r.merge(&DirtyRegion::empty());
        assert_eq!(r.voxel_count(), 8);
    }

    #[test]
    fn touches_any() {
        let r = region([0, 0, 0], [0, 0, 0], &[2, 5]);
        assert!(r.touches_any([1, 5].iter()));
        assert!(!r.touches_any([1, 3].iter()));
    }
}
