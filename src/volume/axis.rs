/// Slicing axis of a volume, named after the medical viewing planes.
///
/// Index axes are `i` (0), `j` (1) and `k` (2). An axial slice has constant
/// `k`, a coronal slice constant `j`, a sagittal slice constant `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SliceAxis {
    #[default]
    Axial,
    Coronal,
    Sagittal,
}

impl SliceAxis {
    /// Index axis held constant within a slice.
    #[must_use]
    pub fn normal_axis(self) -> usize {
        match self {
            Self::Axial => 2,
            Self::Coronal => 1,
            Self::Sagittal => 0,
        }
    }

    /// The two in-plane index axes `(u, v)`.
    ///
    /// Ordered so that `u × v` points along the normal axis, which makes
    /// counter-clockwise in `(u, v)` mean counter-clockwise seen from the
    /// positive normal.
    #[must_use]
    pub fn in_plane_axes(self) -> (usize, usize) {
        match self {
            Self::Axial => (0, 1),
            Self::Coronal => (2, 0),
            Self::Sagittal => (1, 2),
        }
    }
}
