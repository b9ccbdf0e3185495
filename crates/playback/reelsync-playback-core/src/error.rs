//! Error taxonomy.
//!
//! Nothing here terminates the engine; every failure is scoped to the
//! single target or group it concerns. Unknown ids in commands are
//! logged no-ops rather than errors, per the command contract.

use thiserror::Error;

use crate::ids::ResourceHandle;

/// Command-level failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Decoding produced zero frames; the command performed no
    /// mutation. Retrying requires a fresh `ADD`/`UPDATE_SOURCE`.
    #[error("resource {} decoded to zero frames", .0.as_str())]
    DecodeFailed(ResourceHandle),
}

/// Returned by a [`Renderer`](crate::render::Renderer) when a frame
/// could not be presented.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The host discarded the presentation surface; the engine removes
    /// the target in response.
    #[error("render target gone: {0}")]
    TargetGone(String),
}

impl RenderError {
    pub fn target_gone(reason: impl Into<String>) -> Self {
        Self::TargetGone(reason.into())
    }
}
