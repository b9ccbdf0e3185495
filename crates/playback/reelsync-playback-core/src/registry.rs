//! Mutable stores behind the engine mutex: targets, groups, tasks,
//! and the per-target command generations that fence off stale decode
//! results.

use hashbrown::{HashMap, HashSet};

use crate::frame::Frame;
use crate::ids::{GroupId, ResourceHandle, TargetId};
use crate::scheduler::TaskTable;

/// Animation state of one presentation target.
#[derive(Debug)]
pub(crate) struct TargetEntry {
    /// Decoded frames; non-empty by construction.
    pub frames: Vec<Frame>,
    /// Index of the next frame to render. Meaningful only while the
    /// target plays independently; a grouped member derives its frame
    /// index from the shared group cursor instead.
    pub cursor: usize,
    /// Resource the frames came from; used for the idempotent-add
    /// check.
    pub source: ResourceHandle,
    /// Set while the target is driven by a group's task instead of its
    /// own. A target is never driven by both.
    pub group: Option<GroupId>,
}

impl TargetEntry {
    pub fn new(frames: Vec<Frame>, source: ResourceHandle) -> Self {
        debug_assert!(!frames.is_empty());
        Self {
            frames,
            cursor: 0,
            source,
            group: None,
        }
    }

    /// Frame index this entry shows at a given shared group cursor.
    pub fn group_frame_index(&self, group_cursor: u64) -> usize {
        (group_cursor % self.frames.len() as u64) as usize
    }
}

/// A set of targets sharing one timeline.
#[derive(Debug, Default)]
pub(crate) struct SyncGroup {
    /// Member ids. May reference targets that are not registered yet;
    /// those stay dormant until an add arrives for them.
    pub members: HashSet<TargetId>,
    /// Shared timeline position; each member resolves it modulo its
    /// own frame count.
    pub cursor: u64,
}

/// Everything the engine mutates, owned by one mutex.
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub targets: HashMap<TargetId, TargetEntry>,
    pub groups: HashMap<GroupId, SyncGroup>,
    pub tasks: TaskTable,
    /// Per-target command generation. A decode result applies only if
    /// the generation it captured is still current; anything newer has
    /// superseded it and the decoded frames are dropped.
    generations: HashMap<TargetId, u64>,
}

impl EngineState {
    pub fn bump_generation(&mut self, id: TargetId) -> u64 {
        let gen = self.generations.entry(id).or_insert(0);
        *gen += 1;
        *gen
    }

    pub fn generation(&self, id: TargetId) -> u64 {
        self.generations.get(&id).copied().unwrap_or(0)
    }

    /// Group whose member set contains `id`, if any. Covers dormant
    /// memberships declared by a sync before the target was added.
    pub fn group_containing(&self, id: TargetId) -> Option<GroupId> {
        self.groups
            .iter()
            .find_map(|(gid, group)| group.members.contains(&id).then_some(*gid))
    }
}
