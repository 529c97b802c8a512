mod extract_contour;
mod extract_surface;
mod fill_contour;

pub use extract_contour::{ContourSet, ContourSlice, ExtractContours, SlicePlane};
pub use extract_surface::{ClassSurface, ExtractSurface, SurfaceSet};
pub use fill_contour::FillContour;

use tracing::{debug, warn};

use crate::error::{DeriveError, LabelmapError, Result};
use crate::math::{Point3, Vector3};
use crate::segmentation::{
    ClassSelection, LabelmapSummary, RepresentationData, RepresentationId, RepresentationKind,
    SegmentationStore,
};
use crate::volume::{SliceAxis, VoxelVolume};

/// How surface meshes group classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceMode {
    /// One mesh per class.
    #[default]
    PerClass,
    /// One mesh enclosing the union of all selected classes.
    Merged,
}

/// Parameters controlling representation derivation.
#[derive(Debug, Clone, Copy)]
pub struct DeriveParams {
    /// Axis contour slices are taken along.
    pub slice_axis: SliceAxis,
    /// Class grouping for surfaces.
    pub surface_mode: SurfaceMode,
    /// Merge collinear runs of contour points.
    pub simplify_contours: bool,
}

impl Default for DeriveParams {
    fn default() -> Self {
        Self {
            slice_axis: SliceAxis::Axial,
            surface_mode: SurfaceMode::PerClass,
            simplify_contours: true,
        }
    }
}

impl DeriveParams {
    #[must_use]
    pub fn with_slice_axis(mut self, axis: SliceAxis) -> Self {
        self.slice_axis = axis;
        self
    }

    #[must_use]
    pub fn with_surface_mode(mut self, mode: SurfaceMode) -> Self {
        self.surface_mode = mode;
        self
    }
}

/// A closed polyline: the last point connects back to the first.
#[derive(Debug, Clone, Default)]
pub struct Polyline {
    /// The ordered vertices of the polyline.
    pub points: Vec<Point3>,
}

/// A triangle mesh.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Vertex normals.
    pub normals: Vec<Vector3>,
    /// Triangle indices (each triple defines a triangle).
    pub indices: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Appends another mesh, offsetting its indices.
    #[allow(clippy::cast_possible_truncation)]
    pub fn merge(&mut self, other: &Self) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        self.indices
            .extend(other.indices.iter().map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Total surface area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.indices
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| self.vertices[i as usize]);
                (b - a).cross(&(c - a)).norm() * 0.5
            })
            .sum()
    }

    /// Signed enclosed volume; positive when triangles wind outward.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        self.indices
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| self.vertices[i as usize].coords);
                a.dot(&b.cross(&c)) / 6.0
            })
            .sum()
    }

    /// Recomputes area-weighted vertex normals from the triangles.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vector3::zeros(); self.vertices.len()];
        for t in &self.indices {
            let [a, b, c] = t.map(|i| self.vertices[i as usize]);
            let n = (b - a).cross(&(c - a));
            for &i in t {
                normals[i as usize] += n;
            }
        }
        for n in &mut normals {
            let len = n.norm();
            if len > 0.0 {
                *n /= len;
            }
        }
        self.normals = normals;
    }
}

/// Computes derived representations from labelmaps on demand.
///
/// Derivation is pull-based: edits only mark representations stale, and
/// the data is rebuilt the next time someone reads it.
#[derive(Debug, Clone, Default)]
pub struct RepresentationDeriver {
    params: DeriveParams,
}

impl RepresentationDeriver {
    /// Creates a deriver with the given parameters.
    #[must_use]
    pub fn new(params: DeriveParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> &DeriveParams {
        &self.params
    }

    /// Returns the representation's data, recomputing it first if it is
    /// stale or was never computed.
    ///
    /// # Errors
    ///
    /// Returns `DeriveError::IncompatibleGeometry` if the volume no longer
    /// has the dimensions the representation was created for. The last
    /// known data is kept and the representation stays stale.
    pub fn get_or_compute<'s>(
        &self,
        store: &'s mut SegmentationStore,
        rep: RepresentationId,
    ) -> Result<&'s RepresentationData> {
        let fresh = {
            let r = store.representation(rep)?;
            !r.is_stale() && r.data().is_some()
        };

        if !fresh {
            let data = {
                let r = store.representation(rep)?;
                let segmentation = store.segmentation_by_key(r.segmentation())?;
                let volume = segmentation.volume();
                if volume.dimensions() != r.recorded_dimensions() {
                    warn!(
                        segmentation = segmentation.id(),
                        expected = ?r.recorded_dimensions(),
                        actual = ?volume.dimensions(),
                        "representation no longer matches its volume"
                    );
                    return Err(DeriveError::IncompatibleGeometry {
                        expected: r.recorded_dimensions(),
                        actual: volume.dimensions(),
                    }
                    .into());
                }
                debug!(segmentation = segmentation.id(), kind = ?r.kind(), "recomputing representation");
                self.compute(r.kind(), r.source_classes(), volume)?
            };
            store.representation_mut(rep)?.store_data(data);
        }

        store
            .representation(rep)?
            .data()
            .ok_or_else(|| DeriveError::Failed("representation has no data".into()).into())
    }

    /// The last computed data, stale or not, without recomputing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::RepresentationNotFound` if the id is unknown.
    pub fn last_known<'s>(
        &self,
        store: &'s SegmentationStore,
        rep: RepresentationId,
    ) -> Result<Option<&'s RepresentationData>> {
        Ok(store.representation(rep)?.data())
    }

    /// Eagerly recomputes every stale representation shown in a viewport
    /// group. Failures are collected rather than aborting the refresh.
    pub fn refresh_group(
        &self,
        store: &mut SegmentationStore,
        group_id: &str,
    ) -> Vec<(RepresentationId, LabelmapError)> {
        let mut failures = Vec::new();
        for rep in store.representations_in_group(group_id) {
            let stale = store.representation(rep).is_ok_and(|r| r.is_stale());
            if !stale {
                continue;
            }
            if let Err(err) = self.get_or_compute(store, rep) {
                failures.push((rep, err));
            }
        }
        failures
    }

    /// Builds the data of one representation from the current volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the extraction fails.
    pub fn compute(
        &self,
        kind: RepresentationKind,
        classes: &ClassSelection,
        volume: &VoxelVolume,
    ) -> Result<RepresentationData> {
        let selected = classes.resolve(volume);
        match kind {
            RepresentationKind::Labelmap => {
                let voxel_counts = volume
                    .class_voxel_counts()
                    .into_iter()
                    .filter(|(class, _)| selected.contains(class))
                    .collect();
                Ok(RepresentationData::Labelmap(LabelmapSummary {
                    dimensions: volume.dimensions(),
                    voxel_counts,
                }))
            }
            RepresentationKind::Contour => {
                let contours = ExtractContours::new(selected, self.params.slice_axis)
                    .simplify(self.params.simplify_contours)
                    .execute(volume);
                Ok(RepresentationData::Contour(contours))
            }
            RepresentationKind::Surface => {
                let surfaces = ExtractSurface::new(selected, self.params.surface_mode).execute(volume)?;
                Ok(RepresentationData::Surface(surfaces))
            }
        }
    }
}
