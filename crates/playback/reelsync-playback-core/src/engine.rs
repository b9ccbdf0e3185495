//! The playback engine: command handlers over serialized state.
//!
//! All command handling and all tick callbacks execute serialized
//! against one mutex-guarded state, so timer firings may be concurrent
//! events but are processed one at a time. Decoding is the only
//! long-running operation; it runs on the blocking pool off the
//! critical section, and its result is applied back under the lock
//! only after re-checking that the target's command generation is
//! still current.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, warn};

use crate::commands::{Command, InitEntry};
use crate::config::Config;
use crate::decode::FrameDecoder;
use crate::error::PlaybackError;
use crate::frame::Frame;
use crate::ids::{GroupId, ResourceHandle, TargetId};
use crate::registry::{EngineState, TargetEntry};
use crate::render::Renderer;
use crate::scheduler::{self, Unit};

/// Shared internals: configuration, the host seams, and the one mutex
/// owning all mutable state. Tick tasks hold this behind a `Weak`, so
/// dropping the engine stops everything.
pub(crate) struct EngineCore {
    pub(crate) config: Config,
    pub(crate) decoder: Arc<dyn FrameDecoder>,
    pub(crate) renderer: Arc<dyn Renderer>,
    state: Mutex<EngineState>,
}

impl EngineCore {
    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineState> {
        // A renderer panic mid-tick poisons the mutex; the state itself
        // stays consistent because ticks mutate it only after the
        // render call succeeds or fails cleanly.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn delay_for(&self, duration_ms: u32) -> Duration {
        Duration::from_millis(u64::from(duration_ms.max(self.config.min_frame_delay_ms)))
    }

    /// Removes `id` entirely: its own task, its group membership, and
    /// its frames. Idempotent. Also bumps the command generation so a
    /// decode still in flight for `id` discards its result.
    pub(crate) fn remove_locked(&self, state: &mut EngineState, id: TargetId) {
        state.bump_generation(id);
        state.tasks.cancel(Unit::Target(id));
        match state.targets.remove(&id) {
            Some(entry) => {
                if let Some(gid) = entry.group {
                    self.detach_member(state, gid, id);
                }
                debug!("removed target {id:?}, dropped {} frames", entry.frames.len());
            }
            None => {
                // The id may still hold a dormant membership declared
                // by a sync that preceded any add.
                if let Some(gid) = state.group_containing(id) {
                    self.detach_member(state, gid, id);
                }
            }
        }
    }

    /// Takes `id` out of `gid`'s member set. An emptied group is
    /// deleted immediately; otherwise its task and cursor stay
    /// untouched so the remaining members never stall.
    pub(crate) fn detach_member(&self, state: &mut EngineState, gid: GroupId, id: TargetId) {
        let Some(group) = state.groups.get_mut(&gid) else {
            return;
        };
        group.members.remove(&id);
        if group.members.is_empty() {
            state.groups.remove(&gid);
            state.tasks.cancel(Unit::Group(gid));
            debug!("group {gid:?} emptied; deleted");
        }
    }

    /// Drops a whole group regardless of remaining members (used when
    /// every renderable member has failed).
    pub(crate) fn delete_group_locked(&self, state: &mut EngineState, gid: GroupId) {
        state.tasks.cancel(Unit::Group(gid));
        if let Some(group) = state.groups.remove(&gid) {
            for id in group.members {
                if let Some(entry) = state.targets.get_mut(&id) {
                    entry.group = None;
                }
            }
            debug!("group {gid:?} deleted");
        }
    }
}

/// Drives frame-based playback for a set of presentation targets and
/// for sync groups that share one advancing timeline.
///
/// Commands and ticks require a running Tokio runtime; the engine
/// itself spawns one task per active unit and nothing else.
pub struct PlaybackEngine {
    core: Arc<EngineCore>,
}

impl PlaybackEngine {
    pub fn new(
        config: Config,
        decoder: Arc<dyn FrameDecoder>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            core: Arc::new(EngineCore {
                config,
                decoder,
                renderer,
                state: Mutex::new(EngineState::default()),
            }),
        }
    }

    /// Dispatches one protocol command.
    pub async fn apply(&self, command: Command) -> Result<(), PlaybackError> {
        match command {
            Command::Init { entries } => {
                self.init(entries).await;
                Ok(())
            }
            Command::Add {
                target,
                resource,
                group,
            } => self.add_with_group(target, resource, group).await,
            Command::Remove { target } => {
                self.remove(target);
                Ok(())
            }
            Command::UpdateSource { target, resource } => {
                self.update_source(target, resource).await
            }
            Command::Sync { group, targets } => {
                self.sync(group, &targets);
                Ok(())
            }
        }
    }

    /// Replays a persisted snapshot. Entries are independent; a decode
    /// failure skips that entry and keeps going.
    pub async fn init(&self, entries: Vec<InitEntry>) {
        for entry in entries {
            let target = entry.target;
            if let Err(err) = self
                .add_with_group(target, entry.resource, entry.group)
                .await
            {
                warn!("init: skipping target {target:?}: {err}");
            }
        }
    }

    /// Decodes `resource` and starts independent playback on `target`.
    pub async fn add(
        &self,
        target: TargetId,
        resource: ResourceHandle,
    ) -> Result<(), PlaybackError> {
        self.add_with_group(target, resource, None).await
    }

    /// Like [`add`](Self::add), but with a persisted group assignment.
    ///
    /// Idempotent: if `target` already plays `resource`, nothing
    /// changes (no decode, no task churn). Otherwise any prior
    /// incarnation is replaced; the replacement inherits no group from
    /// it, only from `group` or from a membership a sync declared
    /// ahead of this add.
    pub async fn add_with_group(
        &self,
        target: TargetId,
        resource: ResourceHandle,
        group: Option<GroupId>,
    ) -> Result<(), PlaybackError> {
        let generation = {
            let mut state = self.core.lock();
            if let Some(entry) = state.targets.get(&target) {
                if entry.source == resource {
                    debug!("add: target {target:?} already plays {}", resource.as_str());
                    return Ok(());
                }
            }
            state.bump_generation(target)
        };

        let decoder = Arc::clone(&self.core.decoder);
        let handle = resource.clone();
        let mut frames = tokio::task::spawn_blocking(move || decoder.decode(&handle))
            .await
            .unwrap_or_default();
        if frames.is_empty() {
            debug!(
                "add: {} decoded to zero frames; nothing to animate",
                resource.as_str()
            );
            return Err(PlaybackError::DecodeFailed(resource));
        }
        let fallback = self.core.config.fallback_frame_duration_ms.max(1);
        for frame in &mut frames {
            if frame.duration_ms == 0 {
                frame.duration_ms = fallback;
            }
        }

        let mut state = self.core.lock();
        if state.generation(target) != generation {
            // A remove/update raced the decode and wins; dropping the
            // frames here releases the freshly decoded payloads.
            debug!("add: target {target:?} changed during decode; discarding result");
            return Ok(());
        }
        self.install_locked(&mut state, target, frames, resource, group);
        Ok(())
    }

    fn install_locked(
        &self,
        state: &mut EngineState,
        target: TargetId,
        frames: Vec<Frame>,
        source: ResourceHandle,
        group: Option<GroupId>,
    ) {
        state.tasks.cancel(Unit::Target(target));
        if let Some(old) = state.targets.remove(&target) {
            // A replacement does not inherit the old incarnation's
            // group; detach before the membership lookup below.
            if let Some(gid) = old.group {
                self.core.detach_member(state, gid, target);
            }
        }
        let group = group.or_else(|| state.group_containing(target));
        let mut entry = TargetEntry::new(frames, source);
        entry.group = group;
        debug!(
            "installed target {target:?}: {} frames, group {group:?}",
            entry.frames.len()
        );
        state.targets.insert(target, entry);
        match group {
            Some(gid) => {
                state.groups.entry(gid).or_default().members.insert(target);
                // A dormant group starts ticking again; a running one
                // keeps its cursor and pacing.
                scheduler::arm_if_idle(&self.core, state, Unit::Group(gid));
            }
            None => scheduler::arm(&self.core, state, Unit::Target(target)),
        }
    }

    /// Stops and forgets `target`. Unknown ids are a no-op. A group the
    /// target belonged to keeps running for its remaining members, or
    /// is deleted if `target` was the last one.
    pub fn remove(&self, target: TargetId) {
        let mut state = self.core.lock();
        self.core.remove_locked(&mut state, target);
    }

    /// Swaps the animation behind `target` while preserving its group
    /// membership. On decode failure the target is left removed, same
    /// as an explicit remove.
    pub async fn update_source(
        &self,
        target: TargetId,
        resource: ResourceHandle,
    ) -> Result<(), PlaybackError> {
        let prior_group = {
            let mut state = self.core.lock();
            let prior = state
                .targets
                .get(&target)
                .and_then(|entry| entry.group)
                .or_else(|| state.group_containing(target));
            self.core.remove_locked(&mut state, target);
            prior
        };
        self.add_with_group(target, resource, prior_group).await
    }

    /// Merges `targets` into one shared timeline under `group`,
    /// detaching them from any other group first. The shared cursor
    /// resets to 0 and the group task restarts. Ids without a
    /// registered target are accepted as members and stay dormant
    /// until an add arrives for them. An empty set is an invalid
    /// command and a no-op.
    pub fn sync(&self, group: GroupId, targets: &[TargetId]) {
        if targets.is_empty() {
            warn!("sync: empty target set for {group:?} ignored");
            return;
        }
        let mut state = self.core.lock();
        for &id in targets {
            let current = state
                .targets
                .get(&id)
                .and_then(|entry| entry.group)
                .or_else(|| state.group_containing(id));
            if let Some(old) = current {
                if old != group {
                    self.core.detach_member(&mut state, old, id);
                }
            }
            if let Some(entry) = state.targets.get_mut(&id) {
                entry.group = Some(group);
            }
            // The group drives this target from now on.
            state.tasks.cancel(Unit::Target(id));
        }
        {
            let entry = state.groups.entry(group).or_default();
            entry.members.extend(targets.iter().copied());
            entry.cursor = 0;
            debug!("sync: group {group:?} now has {} members", entry.members.len());
        }
        scheduler::arm(&self.core, &mut state, Unit::Group(group));
    }

    /// Cancels every task and clears all registries.
    pub fn shutdown(&self) {
        let mut state = self.core.lock();
        state.tasks.cancel_all();
        state.targets.clear();
        state.groups.clear();
    }

    // --- Introspection (hosts and tests audit state through these) ---

    pub fn contains_target(&self, id: TargetId) -> bool {
        self.core.lock().targets.contains_key(&id)
    }

    pub fn target_count(&self) -> usize {
        self.core.lock().targets.len()
    }

    pub fn target_cursor(&self, id: TargetId) -> Option<usize> {
        self.core.lock().targets.get(&id).map(|entry| entry.cursor)
    }

    pub fn target_source(&self, id: TargetId) -> Option<ResourceHandle> {
        self.core
            .lock()
            .targets
            .get(&id)
            .map(|entry| entry.source.clone())
    }

    pub fn target_group(&self, id: TargetId) -> Option<GroupId> {
        self.core.lock().targets.get(&id).and_then(|entry| entry.group)
    }

    /// Member ids of `group`, sorted, including dormant ones.
    pub fn group_members(&self, group: GroupId) -> Option<Vec<TargetId>> {
        self.core.lock().groups.get(&group).map(|entry| {
            let mut members: Vec<TargetId> = entry.members.iter().copied().collect();
            members.sort_unstable_by_key(|t| t.0);
            members
        })
    }

    pub fn group_cursor(&self, group: GroupId) -> Option<u64> {
        self.core.lock().groups.get(&group).map(|entry| entry.cursor)
    }

    /// Live tick tasks; equals the number of non-idle schedulable
    /// units.
    pub fn active_tasks(&self) -> usize {
        self.core.lock().tasks.active()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
