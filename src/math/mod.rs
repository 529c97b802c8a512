mod index_box;

pub use index_box::IndexBox;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// 3x3 matrix type (direction cosines, linear part of the index transform).
pub type Matrix3 = nalgebra::Matrix3<f64>;

/// Integer voxel index. Components may be negative or lie past the volume
/// edge; callers decide whether to clamp or reject.
pub type IndexPoint = nalgebra::Point3<i64>;

/// Offset between two voxel indices.
pub type IndexOffset = nalgebra::Vector3<i64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;
