use crate::dirty::DirtyRegion;

/// The rendering layer, as seen from the engine.
///
/// The engine never draws. After edits it tells the sink which parts of
/// which viewport groups need redrawing; the sink pulls fresh
/// representation data when it gets to it.
pub trait RenderSink {
    /// Voxels inside `region` changed for representations shown in `group`.
    fn notify_region_dirty(&mut self, group: &str, region: &DirtyRegion);

    /// Redraw everything shown in `group`.
    fn request_redraw(&mut self, group: &str);
}

/// Sink that discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn notify_region_dirty(&mut self, _group: &str, _region: &DirtyRegion) {}

    fn request_redraw(&mut self, _group: &str) {}
}
