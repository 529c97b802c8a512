mod class_bounds;
mod segment_at;

pub use class_bounds::ClassBounds;
pub use segment_at::SegmentAtPoint;
