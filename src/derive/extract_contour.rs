use std::collections::BTreeSet;

use crate::math::{Point3, Vector3};
use crate::volume::{Label, SliceAxis, VolumeGeometry, VoxelVolume, BACKGROUND};

use super::Polyline;

/// World-space plane of one contour slice.
///
/// `u_dir` and `v_dir` are unit vectors along the slice's in-plane index
/// axes; `origin` is the outer corner of pixel `(0, 0)`.
#[derive(Debug, Clone, Copy)]
pub struct SlicePlane {
    pub origin: Point3,
    pub u_dir: Vector3,
    pub v_dir: Vector3,
}

impl SlicePlane {
    /// Unit normal, `u × v`.
    #[must_use]
    pub fn normal(&self) -> Vector3 {
        self.u_dir.cross(&self.v_dir).normalize()
    }

    /// In-plane coordinates of a world point.
    #[must_use]
    pub fn project(&self, point: &Point3) -> (f64, f64) {
        let d = point - self.origin;
        (d.dot(&self.u_dir), d.dot(&self.v_dir))
    }

    /// World point of in-plane coordinates.
    #[must_use]
    pub fn lift(&self, u: f64, v: f64) -> Point3 {
        self.origin + self.u_dir * u + self.v_dir * v
    }
}

/// Boundary loops of one class on one slice.
///
/// Outer boundaries run counter-clockwise in the slice plane (seen from the
/// plane normal), hole boundaries clockwise.
#[derive(Debug, Clone)]
pub struct ContourSlice {
    /// Position of the slice along the slicing axis.
    pub slice_index: usize,
    /// Class whose boundary this is.
    pub class: Label,
    /// Plane the loops lie in.
    pub plane: SlicePlane,
    /// Closed loops in world coordinates.
    pub loops: Vec<Polyline>,
}

impl ContourSlice {
    /// Signed in-plane area of one loop (shoelace formula).
    ///
    /// Positive for outer boundaries, negative for holes.
    #[must_use]
    pub fn signed_area(&self, loop_index: usize) -> f64 {
        let Some(polyline) = self.loops.get(loop_index) else {
            return 0.0;
        };
        let pts: Vec<(f64, f64)> = polyline.points.iter().map(|p| self.plane.project(p)).collect();
        let n = pts.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            sum += pts[i].0 * pts[j].1 - pts[j].0 * pts[i].1;
        }
        sum * 0.5
    }
}

/// Contour representation: per-class boundary loops on every slice.
#[derive(Debug, Clone, Default)]
pub struct ContourSet {
    /// Axis the volume was sliced along.
    pub slice_axis: SliceAxis,
    /// Slices that contain at least one loop, ordered by slice then class.
    pub slices: Vec<ContourSlice>,
}

impl ContourSet {
    /// Total number of loops.
    #[must_use]
    pub fn loop_count(&self) -> usize {
        self.slices.iter().map(|s| s.loops.len()).sum()
    }

    /// Slices carrying loops of `class`.
    pub fn for_class(&self, class: Label) -> impl Iterator<Item = &ContourSlice> {
        self.slices.iter().filter(move |s| s.class == class)
    }

    /// Contours on slice `index`.
    pub fn at_slice(&self, index: usize) -> impl Iterator<Item = &ContourSlice> {
        self.slices.iter().filter(move |s| s.slice_index == index)
    }
}

/// Unit move on the pixel corner lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    East,
    North,
    West,
    South,
}

impl Step {
    fn delta(self) -> (i64, i64) {
        match self {
            Self::East => (1, 0),
            Self::North => (0, 1),
            Self::West => (-1, 0),
            Self::South => (0, -1),
        }
    }

    fn left(self) -> Self {
        match self {
            Self::East => Self::North,
            Self::North => Self::West,
            Self::West => Self::South,
            Self::South => Self::East,
        }
    }

    fn right(self) -> Self {
        match self {
            Self::East => Self::South,
            Self::North => Self::East,
            Self::West => Self::North,
            Self::South => Self::West,
        }
    }
}

/// Extracts closed boundary loops per class and slice by following the
/// edges between class and non-class pixels.
pub struct ExtractContours {
    classes: BTreeSet<Label>,
    axis: SliceAxis,
    simplify: bool,
}

impl ExtractContours {
    /// Creates a new `ExtractContours` operation. Background is ignored.
    #[must_use]
    pub fn new(classes: impl IntoIterator<Item = Label>, axis: SliceAxis) -> Self {
        Self {
            classes: classes.into_iter().filter(|&c| c != BACKGROUND).collect(),
            axis,
            simplify: true,
        }
    }

    /// Whether to drop points in the middle of straight runs.
    #[must_use]
    pub fn simplify(mut self, simplify: bool) -> Self {
        self.simplify = simplify;
        self
    }

    /// Executes the extraction.
    #[must_use]
    pub fn execute(&self, volume: &VoxelVolume) -> ContourSet {
        let dims = volume.dimensions();
        let n = self.axis.normal_axis();
        let (u, v) = self.axis.in_plane_axes();
        let (nu, nv) = (dims[u], dims[v]);

        let mut slices = Vec::new();
        let mut pixels = vec![BACKGROUND; nu * nv];
        for s in 0..dims[n] {
            for b in 0..nv {
                for a in 0..nu {
                    let mut index = [0; 3];
                    index[u] = a;
                    index[v] = b;
                    index[n] = s;
                    pixels[a + b * nu] = volume.label(index);
                }
            }

            let present: BTreeSet<Label> = pixels
                .iter()
                .copied()
                .filter(|l| self.classes.contains(l))
                .collect();
            if present.is_empty() {
                continue;
            }

            let plane = slice_plane(volume.geometry(), self.axis, s);
            for class in present {
                let mask: Vec<bool> = pixels.iter().map(|&l| l == class).collect();
                let loops = trace_loops(&mask, nu, nv, self.simplify)
                    .into_iter()
                    .map(|corners| Polyline {
                        points: corners
                            .into_iter()
                            .map(|(a, b)| corner_to_world(volume.geometry(), self.axis, s, a, b))
                            .collect(),
                    })
                    .collect();
                slices.push(ContourSlice {
                    slice_index: s,
                    class,
                    plane,
                    loops,
                });
            }
        }

        ContourSet {
            slice_axis: self.axis,
            slices,
        }
    }
}

/// World position of lattice corner `(a, b)` on slice `s`. Corner `(a, b)`
/// is the low corner of pixel `(a, b)`.
#[allow(clippy::cast_precision_loss)]
fn corner_to_world(geometry: &VolumeGeometry, axis: SliceAxis, s: usize, a: i64, b: i64) -> Point3 {
    let n = axis.normal_axis();
    let (u, v) = axis.in_plane_axes();
    let mut index = Point3::origin();
    index[u] = a as f64 - 0.5;
    index[v] = b as f64 - 0.5;
    index[n] = s as f64;
    geometry.continuous_index_to_world(&index)
}

fn slice_plane(geometry: &VolumeGeometry, axis: SliceAxis, s: usize) -> SlicePlane {
    let origin = corner_to_world(geometry, axis, s, 0, 0);
    let u_dir = (corner_to_world(geometry, axis, s, 1, 0) - origin).normalize();
    let v_dir = (corner_to_world(geometry, axis, s, 0, 1) - origin).normalize();
    SlicePlane {
        origin,
        u_dir,
        v_dir,
    }
}

/// Traces every boundary loop of a 2D mask on its corner lattice.
///
/// Each boundary edge keeps the mask on its left. At a saddle corner (two
/// diagonal pixels) the left turn is taken, so diagonal neighbors end up in
/// separate loops.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn trace_loops(mask: &[bool], nu: usize, nv: usize, simplify: bool) -> Vec<Vec<(i64, i64)>> {
    let width = nu + 1;
    let inside = |a: i64, b: i64| {
        a >= 0 && b >= 0 && (a as usize) < nu && (b as usize) < nv && mask[a as usize + b as usize * nu]
    };
    let corner_index = |(a, b): (i64, i64)| a as usize + b as usize * width;

    let mut outgoing: Vec<[Option<Step>; 2]> = vec![[None, None]; width * (nv + 1)];
    for b in 0..nv as i64 {
        for a in 0..nu as i64 {
            if !inside(a, b) {
                continue;
            }
            if !inside(a, b - 1) {
                push_step(&mut outgoing[corner_index((a, b))], Step::East);
            }
            if !inside(a + 1, b) {
                push_step(&mut outgoing[corner_index((a + 1, b))], Step::North);
            }
            if !inside(a, b + 1) {
                push_step(&mut outgoing[corner_index((a + 1, b + 1))], Step::West);
            }
            if !inside(a - 1, b) {
                push_step(&mut outgoing[corner_index((a, b + 1))], Step::South);
            }
        }
    }

    let mut loops = Vec::new();
    for start_index in 0..outgoing.len() {
        while let Some(first) = pop_step(&mut outgoing[start_index]) {
            let start = ((start_index % width) as i64, (start_index / width) as i64);
            let mut corners = vec![(start, first)];
            let mut pos = advance(start, first);
            let mut dir = first;

            loop {
                let slot = &mut outgoing[corner_index(pos)];
                let next = [dir.left(), dir, dir.right()]
                    .into_iter()
                    .find(|&c| (pos == start && c == first) || slot.contains(&Some(c)));
                match next {
                    Some(c) if pos == start && c == first => break,
                    Some(c) => {
                        take_step(slot, c);
                        corners.push((pos, c));
                        pos = advance(pos, c);
                        dir = c;
                    }
                    None => break,
                }
            }
            loops.push(finish_loop(&corners, simplify));
        }
    }
    loops
}

fn push_step(slot: &mut [Option<Step>; 2], step: Step) {
    if slot[0].is_none() {
        slot[0] = Some(step);
    } else {
        slot[1] = Some(step);
    }
}

fn pop_step(slot: &mut [Option<Step>; 2]) -> Option<Step> {
    slot[0].take().or_else(|| slot[1].take())
}

fn take_step(slot: &mut [Option<Step>; 2], step: Step) {
    for entry in slot.iter_mut() {
        if *entry == Some(step) {
            *entry = None;
            return;
        }
    }
}

fn advance((a, b): (i64, i64), step: Step) -> (i64, i64) {
    let (da, db) = step.delta();
    (a + da, b + db)
}

/// Drops corners where the path runs straight through when simplifying.
fn finish_loop(corners: &[((i64, i64), Step)], simplify: bool) -> Vec<(i64, i64)> {
    if !simplify {
        return corners.iter().map(|&(p, _)| p).collect();
    }
    let n = corners.len();
    (0..n)
        .filter(|&i| {
            let incoming = corners[(i + n - 1) % n].1;
            corners[i].1 != incoming
        })
        .map(|i| corners[i].0)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::math::IndexPoint;

    fn volume(dims: [usize; 3], painted: &[(i64, i64, i64, Label)]) -> VoxelVolume {
        let g = VolumeGeometry::axis_aligned(dims, Vector3::new(1.0, 1.0, 1.0), Point3::origin())
            .unwrap();
        let mut v = VoxelVolume::new(g);
        for &(x, y, z, l) in painted {
            v.set_classification_at(&IndexPoint::new(x, y, z), l).unwrap();
        }
        v
    }

    #[test]
    fn single_pixel_is_unit_square() {
        let v = volume([3, 3, 1], &[(1, 1, 0, 4)]);
        let set = ExtractContours::new([4], SliceAxis::Axial).execute(&v);
        assert_eq!(set.slices.len(), 1);
        let slice = &set.slices[0];
        assert_eq!(slice.class, 4);
        assert_eq!(slice.loops.len(), 1);
        assert_eq!(slice.loops[0].points.len(), 4);
        assert_relative_eq!(slice.signed_area(0), 1.0);
        // corners sit half a voxel around the center
        let p = slice.loops[0].points[0];
        assert_relative_eq!(p.x, 0.5);
        assert_relative_eq!(p.y, 0.5);
    }

    #[test]
    fn straight_runs_are_merged() {
        let painted: Vec<_> = [(1, 1), (2, 1), (1, 2), (2, 2)]
            .iter()
            .map(|&(x, y)| (x, y, 0, 1))
            .collect();
        let v = volume([4, 4, 1], &painted);
        let simplified = ExtractContours::new([1], SliceAxis::Axial).execute(&v);
        assert_eq!(simplified.slices[0].loops[0].points.len(), 4);
        assert_relative_eq!(simplified.slices[0].signed_area(0), 4.0);

        let raw = ExtractContours::new([1], SliceAxis::Axial)
            .simplify(false)
            .execute(&v);
        assert_eq!(raw.slices[0].loops[0].points.len(), 8);
    }

    #[test]
    fn ring_has_outer_and_hole() {
        let mut painted = Vec::new();
        for y in 1..4 {
            for x in 1..4 {
                if (x, y) != (2, 2) {
                    painted.push((x, y, 0, 2));
                }
            }
        }
        let v = volume([5, 5, 1], &painted);
        let set = ExtractContours::new([2], SliceAxis::Axial).execute(&v);
        let slice = &set.slices[0];
        assert_eq!(slice.loops.len(), 2);
        let mut areas: Vec<f64> = (0..2).map(|i| slice.signed_area(i)).collect();
        areas.sort_by(f64::total_cmp);
        assert_relative_eq!(areas[0], -1.0);
        assert_relative_eq!(areas[1], 9.0);
    }

    #[test]
    fn diagonal_pixels_stay_separate() {
        let v = volume([3, 3, 1], &[(0, 0, 0, 1), (1, 1, 0, 1)]);
        let set = ExtractContours::new([1], SliceAxis::Axial).execute(&v);
        let slice = &set.slices[0];
        assert_eq!(slice.loops.len(), 2);
        for i in 0..2 {
            assert_eq!(slice.loops[i].points.len(), 4);
            assert_relative_eq!(slice.signed_area(i), 1.0);
        }
    }

    #[test]
    fn classes_are_separated() {
        let v = volume([4, 1, 1], &[(0, 0, 0, 1), (1, 0, 0, 2), (2, 0, 0, 2)]);
        let set = ExtractContours::new([1, 2], SliceAxis::Axial).execute(&v);
        assert_eq!(set.slices.len(), 2);
        assert_relative_eq!(set.for_class(2).next().unwrap().signed_area(0), 2.0);
        assert_eq!(set.for_class(1).count(), 1);
    }

    #[test]
    fn sphere_slices_along_axis() {
        let painted = [
            (2, 2, 1, 5),
            (2, 2, 2, 5),
            (1, 2, 2, 5),
            (3, 2, 2, 5),
            (2, 1, 2, 5),
            (2, 3, 2, 5),
            (2, 2, 3, 5),
        ];
        let v = volume([5, 5, 5], &painted);
        let set = ExtractContours::new([5], SliceAxis::Axial).execute(&v);
        assert_eq!(set.slices.len(), 3);
        assert_eq!(set.loop_count(), 3);
        let middle = set.at_slice(2).next().unwrap();
        assert_eq!(middle.loops[0].points.len(), 12);
        assert_relative_eq!(middle.signed_area(0), 5.0);
        for p in &middle.loops[0].points {
            assert_relative_eq!(p.z, 2.0);
        }
    }

    #[test]
    fn sagittal_slices_hold_x_constant() {
        let v = volume([4, 4, 4], &[(1, 2, 3, 7)]);
        let set = ExtractContours::new([7], SliceAxis::Sagittal).execute(&v);
        assert_eq!(set.slices.len(), 1);
        let slice = &set.slices[0];
        assert_eq!(slice.slice_index, 1);
        for p in &slice.loops[0].points {
            assert_relative_eq!(p.x, 1.0);
        }
        assert_relative_eq!(slice.signed_area(0), 1.0);
    }

    #[test]
    fn background_is_never_traced() {
        let v = volume([2, 2, 1], &[]);
        let set = ExtractContours::new([0], SliceAxis::Axial).execute(&v);
        assert!(set.slices.is_empty());
    }
}
