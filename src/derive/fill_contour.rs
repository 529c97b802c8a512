use std::collections::{HashMap, HashSet, VecDeque};

use spade::handles::{FixedFaceHandle, InnerTag};
use spade::{ConstrainedDelaunayTriangulation, InsertionError, Point2, Triangulation};

use crate::error::{DeriveError, Result};

use super::{ContourSlice, TriangleMesh};

type Cdt = ConstrainedDelaunayTriangulation<Point2<f64>>;

/// Triangulates the region enclosed by a contour slice's loops.
///
/// Holes are respected: a point is filled when it lies inside an odd
/// number of loops. The mesh lies in the slice plane and faces along the
/// plane normal.
pub struct FillContour<'a> {
    slice: &'a ContourSlice,
}

impl<'a> FillContour<'a> {
    /// Creates a new `FillContour` operation.
    #[must_use]
    pub fn new(slice: &'a ContourSlice) -> Self {
        Self { slice }
    }

    /// Executes the triangulation.
    ///
    /// # Errors
    ///
    /// Returns `DeriveError::Failed` if a loop has fewer than three points
    /// or a point cannot be inserted into the triangulation.
    #[allow(clippy::cast_possible_truncation)]
    pub fn execute(&self) -> Result<TriangleMesh> {
        let plane = &self.slice.plane;
        let mut cdt = Cdt::new();
        for polyline in &self.slice.loops {
            let points: Vec<Point2<f64>> = polyline
                .points
                .iter()
                .map(|p| {
                    let (u, v) = plane.project(p);
                    Point2::new(u, v)
                })
                .collect();
            insert_constraint_loop(&mut cdt, &points)?;
        }

        let interior = classify_interior_faces(&cdt);
        let normal = plane.normal();

        let mut mesh = TriangleMesh::default();
        let mut vertex_map: HashMap<usize, u32> = HashMap::new();
        for face in cdt.inner_faces() {
            if !interior.contains(&face.fix().index()) {
                continue;
            }
            let mut triangle = [0u32; 3];
            for (i, vh) in face.vertices().iter().enumerate() {
                let idx = vh.fix().index();
                triangle[i] = *vertex_map.entry(idx).or_insert_with(|| {
                    let pos = vh.position();
                    mesh.vertices.push(plane.lift(pos.x, pos.y));
                    mesh.normals.push(normal);
                    (mesh.vertices.len() - 1) as u32
                });
            }
            mesh.indices.push(triangle);
        }
        Ok(mesh)
    }
}

fn insert_constraint_loop(cdt: &mut Cdt, points: &[Point2<f64>]) -> Result<()> {
    if points.len() < 3 {
        return Err(DeriveError::Failed("contour loop needs at least 3 points".into()).into());
    }

    let mut handles = Vec::with_capacity(points.len());
    for &pt in points {
        let h = cdt
            .insert(pt)
            .map_err(|e: InsertionError| DeriveError::Failed(format!("CDT insert: {e}")))?;
        handles.push(h);
    }

    for i in 0..handles.len() {
        let from = handles[i];
        let to = handles[(i + 1) % handles.len()];
        if from != to {
            cdt.add_constraint(from, to);
        }
    }
    Ok(())
}

/// Flood-fills from the outer face, counting crossed constraint edges.
/// Faces at odd depth are inside.
fn classify_interior_faces(cdt: &Cdt) -> HashSet<usize> {
    let mut interior = HashSet::new();
    let mut depth_map: HashMap<usize, u32> = HashMap::new();
    let mut queue: VecDeque<(FixedFaceHandle<InnerTag>, u32)> = VecDeque::new();

    let outer = cdt.outer_face().fix();
    for edge in cdt.directed_edges() {
        if edge.face().fix() != outer {
            continue;
        }
        if let Some(inner) = edge.rev().face().as_inner() {
            let idx = inner.fix().index();
            if depth_map.contains_key(&idx) {
                continue;
            }
            let depth = u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
            depth_map.insert(idx, depth);
            if depth % 2 == 1 {
                interior.insert(idx);
            }
            queue.push_back((inner.fix(), depth));
        }
    }

    while let Some((face_fix, depth)) = queue.pop_front() {
        for edge in cdt.face(face_fix).adjacent_edges() {
            let Some(neighbor) = edge.rev().face().as_inner() else {
                continue;
            };
            let n_idx = neighbor.fix().index();
            if depth_map.contains_key(&n_idx) {
                continue;
            }
            let depth = depth + u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
            depth_map.insert(n_idx, depth);
            if depth % 2 == 1 {
                interior.insert(n_idx);
            }
            queue.push_back((neighbor.fix(), depth));
        }
    }

    interior
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::derive::{ExtractContours, Polyline};
    use crate::math::{IndexPoint, Point3, Vector3};
    use crate::volume::{SliceAxis, VolumeGeometry, VoxelVolume};

    fn slice_of(dims: [usize; 3], spacing: Vector3, pixels: &[(i64, i64)]) -> ContourSlice {
        let g = VolumeGeometry::axis_aligned(dims, spacing, Point3::origin()).unwrap();
        let mut v = VoxelVolume::new(g);
        for &(x, y) in pixels {
            v.set_classification_at(&IndexPoint::new(x, y, 0), 1).unwrap();
        }
        ExtractContours::new([1], SliceAxis::Axial)
            .execute(&v)
            .slices
            .remove(0)
    }

    #[test]
    fn fills_block() {
        let slice = slice_of(
            [4, 4, 1],
            Vector3::new(1.0, 1.0, 1.0),
            &[(1, 1), (2, 1), (1, 2), (2, 2)],
        );
        let mesh = FillContour::new(&slice).execute().unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_relative_eq!(mesh.area(), 4.0, epsilon = 1e-9);
        for n in &mesh.normals {
            assert_relative_eq!(n.z, 1.0);
        }
    }

    #[test]
    fn leaves_hole_open() {
        let mut pixels = Vec::new();
        for y in 1..4 {
            for x in 1..4 {
                if (x, y) != (2, 2) {
                    pixels.push((x, y));
                }
            }
        }
        let slice = slice_of([5, 5, 1], Vector3::new(1.0, 1.0, 1.0), &pixels);
        let mesh = FillContour::new(&slice).execute().unwrap();
        assert_relative_eq!(mesh.area(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn area_follows_spacing() {
        let slice = slice_of([3, 3, 1], Vector3::new(0.5, 2.0, 1.0), &[(1, 1)]);
        let mesh = FillContour::new(&slice).execute().unwrap();
        assert_relative_eq!(mesh.area(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_loop_is_rejected() {
        let mut slice = slice_of([3, 3, 1], Vector3::new(1.0, 1.0, 1.0), &[(1, 1)]);
        slice.loops.push(Polyline {
            points: vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
        });
        assert!(FillContour::new(&slice).execute().is_err());
    }
}
