//! Reelsync playback core (host-agnostic).
//!
//! Drives periodic, frame-based playback for a set of independently
//! addressable presentation targets, and merges arbitrary subsets of
//! them into sync groups that share a single advancing timeline. Hosts
//! supply the two boundary capabilities: a [`FrameDecoder`] that turns
//! a stored resource into (image, duration) frames, and a [`Renderer`]
//! that presents a frame on a target's surface. Persistence of
//! target → resource and target → group associations stays with the
//! host and enters the engine as command data.

pub mod commands;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod frame;
pub mod ids;
pub mod render;

mod registry;
mod scheduler;

// Re-exports for consumers (host adapters)
pub use commands::{Command, InitEntry};
pub use config::Config;
pub use decode::FrameDecoder;
pub use engine::PlaybackEngine;
pub use error::{PlaybackError, RenderError};
pub use frame::{Frame, Image};
pub use ids::{GroupId, ResourceHandle, TargetId};
pub use render::Renderer;
