//! Renderer seam toward the host.

use crate::error::RenderError;
use crate::frame::Image;
use crate::ids::TargetId;

/// Presents a frame on a host-controlled surface.
///
/// An error means the host discarded the surface for that target; the
/// engine reacts by removing the target. Calls are serialized with all
/// other engine work, so implementations need no internal ordering.
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, target: TargetId, image: &Image) -> Result<(), RenderError>;
}
