//! Decoder seam toward the host.

use crate::frame::Frame;
use crate::ids::ResourceHandle;

/// Turns a stored animation resource into an ordered frame sequence.
///
/// Failure (missing resource, corrupt data, out of memory) is signalled
/// by returning an empty sequence; the engine treats that as "nothing
/// to animate" rather than a fatal condition. Implementations run on
/// the blocking pool, off the engine's critical section, and must not
/// assume an async context.
pub trait FrameDecoder: Send + Sync + 'static {
    fn decode(&self, resource: &ResourceHandle) -> Vec<Frame>;
}
