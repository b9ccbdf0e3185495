//! Decoded frame data.

use std::fmt;
use std::sync::Arc;

/// Opaque image payload produced by the decoder.
///
/// Cheap to clone; the bytes are shared, never copied, when a sync
/// group tick touches a member's frames. The payload is released when
/// the last clone drops, which happens when the owning target entry is
/// removed or its source replaced.
#[derive(Clone, PartialEq, Eq)]
pub struct Image(Arc<[u8]>);

impl Image {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({} bytes)", self.0.len())
    }
}

/// One (image, duration) unit of a decoded animation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub image: Image,
    /// Display duration in milliseconds. Decoders may report 0 (GIF
    /// zero-delay frames); the engine substitutes a fallback before
    /// installing, so installed frames always have `duration_ms >= 1`.
    pub duration_ms: u32,
}

impl Frame {
    pub fn new(image: Image, duration_ms: u32) -> Self {
        Self { image, duration_ms }
    }
}
