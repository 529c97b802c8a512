use std::collections::{BTreeSet, HashMap};

use crate::error::{DeriveError, Result};
use crate::math::{IndexBox, Point3};
use crate::operations::query::ClassBounds;
use crate::volume::{Label, VoxelVolume, BACKGROUND};

use super::{SurfaceMode, TriangleMesh};

/// Surface mesh of one class, or of a merged set of classes.
#[derive(Debug, Clone)]
pub struct ClassSurface {
    /// Classes enclosed by the mesh.
    pub classes: BTreeSet<Label>,
    /// Closed, outward-wound mesh in world coordinates.
    pub mesh: TriangleMesh,
}

/// Surface representation.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSet {
    pub surfaces: Vec<ClassSurface>,
}

impl SurfaceSet {
    /// The surface enclosing `class`, if any.
    #[must_use]
    pub fn surface_for(&self, class: Label) -> Option<&ClassSurface> {
        self.surfaces.iter().find(|s| s.classes.contains(&class))
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.surfaces.iter().map(|s| s.mesh.triangle_count()).sum()
    }
}

/// Offsets of the eight corners of a cell, bit `k` selecting axis `k`.
const CORNERS: [[i64; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// Extracts closed surface meshes from a labelmap with binary surface nets.
///
/// Voxel centers are the samples. Every cell of eight samples that has
/// both inside and outside corners gets one vertex, and every sample edge
/// that crosses the boundary becomes a quad joining the four cells around
/// it. Anything outside the volume counts as outside, so meshes are always
/// closed.
pub struct ExtractSurface {
    classes: BTreeSet<Label>,
    mode: SurfaceMode,
}

impl ExtractSurface {
    /// Creates a new `ExtractSurface` operation. Background is ignored.
    #[must_use]
    pub fn new(classes: impl IntoIterator<Item = Label>, mode: SurfaceMode) -> Self {
        Self {
            classes: classes.into_iter().filter(|&c| c != BACKGROUND).collect(),
            mode,
        }
    }

    /// Executes the extraction. Classes with no voxels produce no surface.
    ///
    /// # Errors
    ///
    /// Returns `DeriveError::Failed` if a mesh needs more vertices than a
    /// `u32` index can address.
    pub fn execute(&self, volume: &VoxelVolume) -> Result<SurfaceSet> {
        let groups: Vec<BTreeSet<Label>> = match self.mode {
            SurfaceMode::PerClass => self.classes.iter().map(|&c| BTreeSet::from([c])).collect(),
            SurfaceMode::Merged => vec![self.classes.clone()],
        };

        let mut surfaces = Vec::new();
        for classes in groups {
            let Some(bounds) = ClassBounds::new(classes.iter().copied()).execute(volume) else {
                continue;
            };
            let mesh = surface_nets(volume, &classes, &bounds)?;
            if !mesh.is_empty() {
                surfaces.push(ClassSurface { classes, mesh });
            }
        }
        Ok(SurfaceSet { surfaces })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn is_inside(volume: &VoxelVolume, classes: &BTreeSet<Label>, p: [i64; 3]) -> bool {
    let dims = volume.dimensions();
    if (0..3).any(|k| p[k] < 0 || p[k] >= dims[k] as i64) {
        return false;
    }
    classes.contains(&volume.label([p[0] as usize, p[1] as usize, p[2] as usize]))
}

#[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
fn surface_nets(
    volume: &VoxelVolume,
    classes: &BTreeSet<Label>,
    bounds: &IndexBox,
) -> Result<TriangleMesh> {
    let min = bounds.min.map(|v| v as i64);
    let max = bounds.max.map(|v| v as i64);
    let inside = |p: [i64; 3]| is_inside(volume, classes, p);

    let mut mesh = TriangleMesh::default();
    let mut cell_vertices: HashMap<[i64; 3], u32> = HashMap::new();
    let mut vertex_of = |cell: [i64; 3], mesh: &mut TriangleMesh| -> Result<u32> {
        if let Some(&v) = cell_vertices.get(&cell) {
            return Ok(v);
        }
        let index = u32::try_from(mesh.vertices.len())
            .map_err(|_| DeriveError::Failed("surface has too many vertices".into()))?;
        let position = cell_vertex(cell, &inside);
        mesh.vertices
            .push(volume.geometry().continuous_index_to_world(&position));
        cell_vertices.insert(cell, index);
        Ok(index)
    };

    for a in 0..3 {
        let b = (a + 1) % 3;
        let c = (a + 2) % 3;
        for pa in (min[a] - 1)..=max[a] {
            for pb in min[b]..=max[b] {
                for pc in min[c]..=max[c] {
                    let mut p = [0; 3];
                    p[a] = pa;
                    p[b] = pb;
                    p[c] = pc;
                    let mut q = p;
                    q[a] += 1;

                    let s0 = inside(p);
                    if s0 == inside(q) {
                        continue;
                    }

                    let cell = |db: i64, dc: i64| {
                        let mut cell = p;
                        cell[b] += db;
                        cell[c] += dc;
                        cell
                    };
                    let v0 = vertex_of(cell(-1, -1), &mut mesh)?;
                    let v1 = vertex_of(cell(0, -1), &mut mesh)?;
                    let v2 = vertex_of(cell(0, 0), &mut mesh)?;
                    let v3 = vertex_of(cell(-1, 0), &mut mesh)?;

                    // (v0, v1, v2, v3) runs counter-clockwise seen from +a
                    if s0 {
                        mesh.indices.push([v0, v1, v2]);
                        mesh.indices.push([v0, v2, v3]);
                    } else {
                        mesh.indices.push([v0, v2, v1]);
                        mesh.indices.push([v0, v3, v2]);
                    }
                }
            }
        }
    }

    if !volume.geometry().is_right_handed() {
        for t in &mut mesh.indices {
            t.swap(1, 2);
        }
    }
    mesh.compute_normals();
    Ok(mesh)
}

/// Continuous-index position of a cell's vertex: the mean of the midpoints
/// of its boundary-crossing edges.
#[allow(clippy::cast_precision_loss)]
fn cell_vertex(cell: [i64; 3], inside: &impl Fn([i64; 3]) -> bool) -> Point3 {
    let corner = |i: usize| {
        let o = CORNERS[i];
        [cell[0] + o[0], cell[1] + o[1], cell[2] + o[2]]
    };
    let states: [bool; 8] = std::array::from_fn(|i| inside(corner(i)));

    let mut sum = Point3::origin().coords;
    let mut count = 0_u32;
    for i in 0..8 {
        for bit in [1, 2, 4] {
            if i & bit != 0 {
                continue;
            }
            let j = i | bit;
            if states[i] == states[j] {
                continue;
            }
            let (ci, cj) = (corner(i), corner(j));
            for k in 0..3 {
                sum[k] += (ci[k] + cj[k]) as f64 * 0.5;
            }
            count += 1;
        }
    }
    if count == 0 {
        let c = cell.map(|v| v as f64 + 0.5);
        return Point3::new(c[0], c[1], c[2]);
    }
    Point3::from(sum / f64::from(count))
}
