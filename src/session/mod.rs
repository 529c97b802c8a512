//! The explicit context object tying the store, dirty tracking, prompts and
//! derivation together for one interaction session.

mod render;

pub use render::{NullSink, RenderSink};

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::derive::{DeriveParams, RepresentationDeriver};
use crate::dirty::{DirtyRegion, DirtyRegionTracker};
use crate::error::Result;
use crate::math::Point3;
use crate::operations::edit::{BrushEdit, BrushShape, ClassSwap, EditPolicy, RemoveSegment, VolumeEdit};
use crate::operations::query::SegmentAtPoint;
use crate::prompts::{AnnotationPromptStore, InferencePrompts, RequestGenerations, RequestTicket};
use crate::segmentation::{
    ClassSelection, RepresentationData, RepresentationId, RepresentationKind, SegmentationKey,
    SegmentationStore,
};
use crate::volume::{Label, VolumeGeometry, VoxelVolume, BACKGROUND};

/// Session-wide settings.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Parameters for derived representations.
    pub derive: DeriveParams,
    /// Fraction of a volume above which a flush asks for a full redraw
    /// instead of a region update.
    pub full_redraw_fraction: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            derive: DeriveParams::default(),
            full_redraw_fraction: 0.5,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_derive(mut self, derive: DeriveParams) -> Self {
        self.derive = derive;
        self
    }

    #[must_use]
    pub fn with_full_redraw_fraction(mut self, fraction: f64) -> Self {
        self.full_redraw_fraction = fraction;
        self
    }
}

/// One interaction session: every edit goes through here so that dirty
/// tracking and staleness stay in step with the volumes.
#[derive(Debug, Default)]
pub struct Session {
    store: SegmentationStore,
    trackers: HashMap<String, DirtyRegionTracker>,
    prompts: AnnotationPromptStore,
    requests: RequestGenerations,
    deriver: RepresentationDeriver,
    config: SessionConfig,
}

impl Session {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            deriver: RepresentationDeriver::new(config.derive),
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Read access to the segmentation store.
    #[must_use]
    pub fn store(&self) -> &SegmentationStore {
        &self.store
    }

    #[must_use]
    pub fn prompts(&self) -> &AnnotationPromptStore {
        &self.prompts
    }

    pub fn prompts_mut(&mut self) -> &mut AnnotationPromptStore {
        &mut self.prompts
    }

    // --- Segmentations ---

    /// Creates an empty segmentation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the id is in use.
    pub fn create_segmentation(&mut self, id: &str, geometry: VolumeGeometry) -> Result<SegmentationKey> {
        let key = self.store.create_segmentation(id, geometry)?;
        self.trackers.insert(id.to_owned(), DirtyRegionTracker::new());
        Ok(key)
    }

    /// Creates a segmentation from a decoded labelmap.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the id is in use.
    pub fn create_segmentation_from_labels(
        &mut self,
        id: &str,
        volume: VoxelVolume,
    ) -> Result<SegmentationKey> {
        let key = self.store.create_segmentation_from_labels(id, volume)?;
        self.trackers.insert(id.to_owned(), DirtyRegionTracker::new());
        Ok(key)
    }

    /// Removes a segmentation and its pending dirty state. Unknown ids are
    /// a no-op.
    pub fn remove_segmentation(&mut self, id: &str) -> Vec<RepresentationId> {
        self.trackers.remove(id);
        self.store.remove_segmentation(id)
    }

    /// Swaps in a new labelmap and marks the whole volume dirty.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown.
    pub fn replace_volume(&mut self, id: &str, volume: VoxelVolume) -> Result<()> {
        let mut classes: BTreeSet<Label> = self.store.volume(id)?.present_classes();
        classes.extend(volume.present_classes());
        let region = DirtyRegion::whole(volume.dimensions(), classes);
        self.store.replace_volume(id, volume)?;
        self.tracker(id).mark_dirty(&region);
        Ok(())
    }

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
        self.store.attach_representation(id, group_id, kind)
    }

    /// Attaches a representation of selected classes to a viewport group.
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
        self.store.attach_representation_for(id, group_id, kind, classes)
    }

    /// Detaches a representation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::RepresentationNotFound` if the id is unknown.
    pub fn detach_representation(&mut self, rep: RepresentationId) -> Result<()> {
        self.store.detach_representation(rep)
    }

    /// Sets the active segment index of a segmentation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown id and
    /// `EditError::BackgroundTarget` for class 0.
    pub fn set_active_segment(&mut self, id: &str, class: Label) -> Result<()> {
        self.store.segmentation_mut(id)?.set_active_segment_index(class)
    }

    // --- Edits ---

    /// Applies an edit, records its region and marks affected
    /// representations stale.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown id, or the edit's own
    /// error. Nothing changes on error.
    pub fn apply_edit(&mut self, id: &str, edit: &impl VolumeEdit) -> Result<DirtyRegion> {
        let region = self.store.edit(id, edit)?;
        if !region.is_empty() {
            self.tracker(id).mark_dirty(&region);
            self.store.notify_volume_changed(id, &region)?;
        }
        Ok(region)
    }

    /// Paints the active segment with a brush centered on a world point.
    ///
    /// # Errors
    ///
    /// See [`Session::apply_edit`].
    pub fn paint(
        &mut self,
        id: &str,
        center: Point3,
        shape: BrushShape,
        radius: f64,
        policy: EditPolicy,
    ) -> Result<DirtyRegion> {
        let target = self.store.segmentation(id)?.active_segment_index();
        self.apply_edit(id, &BrushEdit::paint(center, shape, radius, target, policy))
    }

    /// Erases with a brush centered on a world point.
    ///
    /// # Errors
    ///
    /// See [`Session::apply_edit`].
    pub fn erase(&mut self, id: &str, center: Point3, shape: BrushShape, radius: f64) -> Result<DirtyRegion> {
        self.apply_edit(id, &BrushEdit::erase(center, shape, radius))
    }

    /// Resets every voxel of `class` to background.
    ///
    /// # Errors
    ///
    /// See [`Session::apply_edit`].
    pub fn remove_segment(&mut self, id: &str, class: Label) -> Result<DirtyRegion> {
        self.apply_edit(id, &RemoveSegment::new(class))
    }

    // --- Inference ---

    /// Starts an inference request for a prompt label.
    pub fn begin_inference(&mut self, label: &str) -> RequestTicket {
        self.requests.begin(label)
    }

    /// Index-space prompts for a request against segmentation `id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown.
    pub fn inference_prompts(&self, id: &str, label: &str, class: Label) -> Result<InferencePrompts> {
        let volume = self.store.volume(id)?;
        Ok(self.prompts.prompt_payload(volume, label, class))
    }

    /// Applies an inference response as one atomic class swap.
    ///
    /// A missing response (the request failed in transport) is skipped, and
    /// so is a response whose request was overtaken by a newer one that has
    /// already completed. Both return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `VolumeError::BufferLength` if the response does not match
    /// the volume, or `StoreError::NotFound` for an unknown id. The ticket
    /// stays open in that case.
    pub fn apply_inference_result(
        &mut self,
        ticket: &RequestTicket,
        id: &str,
        response: Option<&[Label]>,
        target_filter: Label,
    ) -> Result<Option<DirtyRegion>> {
        let Some(response) = response else {
            warn!(label = ticket.label(), generation = ticket.generation(), "inference returned no data");
            return Ok(None);
        };
        if !self.requests.accepts(ticket) {
            warn!(
                label = ticket.label(),
                generation = ticket.generation(),
                "discarding stale inference response"
            );
            return Ok(None);
        }
        let region = self.apply_edit(id, &ClassSwap::new(response, target_filter))?;
        self.requests.complete(ticket);
        debug!(label = ticket.label(), changed = region.voxel_count(), "inference applied");
        Ok(Some(region))
    }

    // --- Queries ---

    /// The class at a world point, `None` outside the volume.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown.
    pub fn segment_at_world(&self, id: &str, point: Point3) -> Result<Option<Label>> {
        Ok(SegmentAtPoint::new(point).execute(self.store.volume(id)?))
    }

    /// Makes the segment under a world point active. Background and points
    /// outside the volume leave the active segment unchanged.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is unknown.
    pub fn select_segment_at(&mut self, id: &str, point: Point3) -> Result<Option<Label>> {
        match self.segment_at_world(id, point)? {
            Some(class) if class != BACKGROUND => {
                self.store.segmentation_mut(id)?.set_active_segment_index(class)?;
                Ok(Some(class))
            }
            _ => Ok(None),
        }
    }

    /// Pulls a representation's data, recomputing it if stale.
    ///
    /// # Errors
    ///
    /// See [`RepresentationDeriver::get_or_compute`].
    pub fn representation(&mut self, rep: RepresentationId) -> Result<&RepresentationData> {
        self.deriver.get_or_compute(&mut self.store, rep)
    }

    /// Whether any segmentation has undelivered dirty regions.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        self.trackers.values().any(DirtyRegionTracker::is_pending)
    }

    // --- Rendering ---

    /// Drains every dirty tracker and tells `sink` which viewport groups
    /// need updating. Returns the number of notifications sent.
    pub fn flush(&mut self, sink: &mut impl RenderSink) -> usize {
        let mut ids: Vec<&String> = self.trackers.keys().collect();
        ids.sort_unstable();
        let ids: Vec<String> = ids.into_iter().cloned().collect();

        let mut sent = 0;
        for id in ids {
            let Some(tracker) = self.trackers.get_mut(&id) else {
                continue;
            };
            let region = tracker.drain();
            if region.is_empty() {
                continue;
            }
            let (Ok(volume), Ok(groups)) = (self.store.volume(&id), self.store.groups_of(&id)) else {
                continue;
            };

            #[allow(clippy::cast_precision_loss)]
            let fraction = region.voxel_count() as f64 / volume.voxel_count() as f64;
            let full = fraction > self.config.full_redraw_fraction;
            debug!(segmentation = %id, fraction, full, groups = groups.len(), "flushing dirty region");
            for group in &groups {
                if full {
                    sink.request_redraw(group);
                } else {
                    sink.notify_region_dirty(group, &region);
                }
                sent += 1;
            }
        }
        sent
    }

    fn tracker(&mut self, id: &str) -> &mut DirtyRegionTracker {
        self.trackers.entry(id.to_owned()).or_default()
    }
}
