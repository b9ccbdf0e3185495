//! Identifiers for engine entities.
//!
//! Targets and groups are addressed by host-assigned numeric ids;
//! resources by an opaque string handle. The engine allocates nothing
//! itself, so there is no id allocator here.

use serde::{Deserialize, Serialize};

/// Identifier of one presentation target (a host widget instance).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TargetId(pub u32);

/// Identifier of a sync group.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Opaque handle of a stored animation resource. The host owns the
/// storage; the engine only hands the handle to the decoder.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle(pub String);

impl ResourceHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
