use std::collections::{BTreeMap, BTreeSet};

use crate::derive::{ContourSet, SurfaceSet};
use crate::volume::{Label, VoxelVolume, BACKGROUND};

use super::SegmentationKey;

slotmap::new_key_type! {
    /// Unique identifier of a representation in the segmentation store.
    pub struct RepresentationId;
}

/// The form a segmentation is presented in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepresentationKind {
    /// The voxel volume itself.
    Labelmap,
    /// Closed polylines per class and slice.
    Contour,
    /// Triangle meshes per class or per merged class set.
    Surface,
}

/// The classes a representation reflects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClassSelection {
    /// Every non-background class present in the volume.
    #[default]
    All,
    /// A fixed set of classes.
    Only(BTreeSet<Label>),
}

impl ClassSelection {
    /// Creates a selection of the given classes.
    #[must_use]
    pub fn only(classes: impl IntoIterator<Item = Label>) -> Self {
        Self::Only(classes.into_iter().collect())
    }

    /// Returns `true` if a change touching `classes` affects this selection.
    #[must_use]
    pub fn intersects(&self, classes: &BTreeSet<Label>) -> bool {
        match self {
            Self::All => classes.iter().any(|&c| c != BACKGROUND),
            Self::Only(selected) => !selected.is_disjoint(classes),
        }
    }

    /// The concrete classes this selection covers in `volume`.
    #[must_use]
    pub fn resolve(&self, volume: &VoxelVolume) -> BTreeSet<Label> {
        match self {
            Self::All => volume.present_classes(),
            Self::Only(selected) => selected
                .iter()
                .copied()
                .filter(|&c| c != BACKGROUND)
                .collect(),
        }
    }
}

/// Per-class voxel statistics of a labelmap.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelmapSummary {
    /// Dimensions of the volume the summary was taken from.
    pub dimensions: [usize; 3],
    /// Voxel count of each selected class present in the volume.
    pub voxel_counts: BTreeMap<Label, usize>,
}

/// Derived, rendering-ready data of a representation.
#[derive(Debug, Clone)]
pub enum RepresentationData {
    Labelmap(LabelmapSummary),
    Contour(ContourSet),
    Surface(SurfaceSet),
}

impl RepresentationData {
    /// The kind tag of this data.
    #[must_use]
    pub fn kind(&self) -> RepresentationKind {
        match self {
            Self::Labelmap(_) => RepresentationKind::Labelmap,
            Self::Contour(_) => RepresentationKind::Contour,
            Self::Surface(_) => RepresentationKind::Surface,
        }
    }

    #[must_use]
    pub fn as_contour(&self) -> Option<&ContourSet> {
        match self {
            Self::Contour(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_surface(&self) -> Option<&SurfaceSet> {
        match self {
            Self::Surface(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_labelmap(&self) -> Option<&LabelmapSummary> {
        match self {
            Self::Labelmap(l) => Some(l),
            _ => None,
        }
    }
}

/// One representation of a segmentation, attached to a viewport group.
#[derive(Debug, Clone)]
pub struct Representation {
    segmentation: SegmentationKey,
    group_id: String,
    kind: RepresentationKind,
    source_classes: ClassSelection,
    stale: bool,
    recorded_dimensions: [usize; 3],
    data: Option<RepresentationData>,
}

impl Representation {
    pub(crate) fn new(
        segmentation: SegmentationKey,
        group_id: String,
        kind: RepresentationKind,
        source_classes: ClassSelection,
        recorded_dimensions: [usize; 3],
    ) -> Self {
        Self {
            segmentation,
            group_id,
            kind,
            source_classes,
            stale: true,
            recorded_dimensions,
            data: None,
        }
    }

    #[must_use]
    pub fn segmentation(&self) -> SegmentationKey {
        self.segmentation
    }

    #[must_use]
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    #[must_use]
    pub fn kind(&self) -> RepresentationKind {
        self.kind
    }

    #[must_use]
    pub fn source_classes(&self) -> &ClassSelection {
        &self.source_classes
    }

    /// `true` when the cached data no longer matches the volume.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Volume dimensions the representation was created against.
    #[must_use]
    pub fn recorded_dimensions(&self) -> [usize; 3] {
        self.recorded_dimensions
    }

    /// The last computed data, which may be stale.
    #[must_use]
    pub fn data(&self) -> Option<&RepresentationData> {
        self.data.as_ref()
    }

    /// Marks the representation stale; returns `true` if it was fresh.
    pub(crate) fn mark_stale(&mut self) -> bool {
        !std::mem::replace(&mut self.stale, true)
    }

    pub(crate) fn store_data(&mut self, data: RepresentationData) {
        self.data = Some(data);
        self.stale = false;
    }
}
