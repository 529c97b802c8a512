use thiserror::Error;

/// Top-level error type for the labelmap engine.
#[derive(Debug, Error)]
pub enum LabelmapError {
    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Derive(#[from] DeriveError),

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// Errors raised by a voxel volume and its coordinate transforms.
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("index ({x}, {y}, {z}) is outside volume dimensions {dimensions:?}")]
    OutOfBounds {
        x: i64,
        y: i64,
        z: i64,
        dimensions: [usize; 3],
    },

    #[error("invalid volume geometry: {0}")]
    InvalidGeometry(String),

    #[error("voxel buffer has {actual} elements, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
}

/// Identity errors from the segmentation store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("segmentation already exists: {0}")]
    AlreadyExists(String),

    #[error("segmentation not found: {0}")]
    NotFound(String),

    #[error("representation not found")]
    RepresentationNotFound,
}

/// Errors raised while deriving a representation from a labelmap.
#[derive(Debug, Error)]
pub enum DeriveError {
    #[error(
        "representation was created for dimensions {expected:?} but the volume is now {actual:?}"
    )]
    IncompatibleGeometry {
        expected: [usize; 3],
        actual: [usize; 3],
    },

    #[error("derivation failed: {0}")]
    Failed(String),
}

/// Errors raised by edit operations before any voxel is written.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("invalid edit: {0}")]
    InvalidInput(String),

    #[error("class 0 is background and cannot be used as a paint target")]
    BackgroundTarget,
}

/// Convenience type alias for results using [`LabelmapError`].
pub type Result<T> = std::result::Result<T, LabelmapError>;
