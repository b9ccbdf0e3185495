//! Command protocol consumed by the engine.
//!
//! The host owns persistence of target → resource and target → group
//! associations; `Init` therefore carries the persisted snapshot as
//! data instead of the engine reading storage. Commands round-trip
//! through serde so hosts can queue or replay them.

use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, ResourceHandle, TargetId};

/// One persisted (target, resource, group) row replayed on [`Command::Init`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitEntry {
    pub target: TargetId,
    pub resource: ResourceHandle,
    #[serde(default)]
    pub group: Option<GroupId>,
}

/// Mutations accepted by the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Command {
    /// Re-adds every previously persisted target. Entries are
    /// independent: a decode failure skips that entry only.
    Init { entries: Vec<InitEntry> },
    /// Decode `resource` and start playback on `target`. A persisted
    /// group assignment may be supplied; otherwise the target plays
    /// independently.
    Add {
        target: TargetId,
        resource: ResourceHandle,
        #[serde(default)]
        group: Option<GroupId>,
    },
    /// Stop and forget `target`. Unknown ids are a no-op.
    Remove { target: TargetId },
    /// Swap the animation behind `target`, preserving its group
    /// membership.
    UpdateSource {
        target: TargetId,
        resource: ResourceHandle,
    },
    /// Merge `targets` into one shared timeline under `group`.
    Sync {
        group: GroupId,
        targets: Vec<TargetId>,
    },
}
