pub mod derive;
pub mod dirty;
pub mod error;
pub mod math;
pub mod operations;
pub mod prompts;
pub mod segmentation;
pub mod session;
pub mod volume;

pub use error::{LabelmapError, Result};
