//! Tick scheduling: one cancellable task per schedulable unit.
//!
//! A unit is either an ungrouped target or a whole sync group. Each
//! running unit owns exactly one Tokio task that renders, advances the
//! cursor, and re-arms itself after a delay derived from frame
//! durations. Arming always cancels the prior task first, so a unit
//! never ticks twice concurrently; a fire that was already in flight
//! when its unit was cancelled is fenced off by an epoch check.

use std::sync::{Arc, Weak};
use std::time::Duration;

use hashbrown::HashMap;
use log::{debug, trace};
use tokio::task::JoinHandle;

use crate::engine::EngineCore;
use crate::ids::{GroupId, TargetId};
use crate::registry::EngineState;

/// One schedulable unit: an ungrouped target or a sync group.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Unit {
    Target(TargetId),
    Group(GroupId),
}

/// Task table keyed by unit.
///
/// Cancellation is synchronous from the registries' point of view: the
/// handle is aborted and forgotten immediately, and the epoch bump
/// makes any still-in-flight fire a no-op when it reaches its liveness
/// check.
#[derive(Debug, Default)]
pub(crate) struct TaskTable {
    epochs: HashMap<Unit, u64>,
    tasks: HashMap<Unit, JoinHandle<()>>,
}

impl TaskTable {
    pub fn cancel(&mut self, unit: Unit) {
        *self.epochs.entry(unit).or_insert(0) += 1;
        if let Some(handle) = self.tasks.remove(&unit) {
            handle.abort();
            trace!("cancelled task for {unit:?}");
        }
    }

    pub fn cancel_all(&mut self) {
        let units: Vec<Unit> = self.tasks.keys().copied().collect();
        for unit in units {
            self.cancel(unit);
        }
    }

    pub fn epoch(&self, unit: Unit) -> u64 {
        self.epochs.get(&unit).copied().unwrap_or(0)
    }

    pub fn is_running(&self, unit: Unit) -> bool {
        self.tasks.contains_key(&unit)
    }

    /// Number of live tasks; equals the number of non-idle units.
    pub fn active(&self) -> usize {
        self.tasks.len()
    }

    fn install(&mut self, unit: Unit, handle: JoinHandle<()>) {
        debug_assert!(!self.tasks.contains_key(&unit));
        self.tasks.insert(unit, handle);
    }
}

/// (Re)arms `unit`: cancels any prior task and spawns a fresh tick
/// loop. Callers hold the state lock, which makes the epoch read and
/// the install atomic with respect to every other command and tick.
pub(crate) fn arm(core: &Arc<EngineCore>, state: &mut EngineState, unit: Unit) {
    state.tasks.cancel(unit);
    let epoch = state.tasks.epoch(unit);
    let handle = tokio::spawn(run(Arc::downgrade(core), unit, epoch));
    state.tasks.install(unit, handle);
    trace!("armed {unit:?} at epoch {epoch}");
}

/// Arms `unit` only if it has no live task. Used when a member joins a
/// group that may already be ticking: a running group keeps its pacing
/// and cursor untouched.
pub(crate) fn arm_if_idle(core: &Arc<EngineCore>, state: &mut EngineState, unit: Unit) {
    if !state.tasks.is_running(unit) {
        arm(core, state, unit);
    }
}

async fn run(core: Weak<EngineCore>, unit: Unit, epoch: u64) {
    // First render happens immediately on arming; the delay applies
    // between subsequent ticks.
    let mut delay = Duration::ZERO;
    loop {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let Some(core) = core.upgrade() else { return };
        match tick(&core, unit, epoch) {
            Some(next) => delay = next,
            None => return,
        }
    }
}

/// One serialized advance-and-render step. Returns the delay until the
/// next tick, or `None` when the unit stops.
fn tick(core: &EngineCore, unit: Unit, epoch: u64) -> Option<Duration> {
    let mut state = core.lock();
    if state.tasks.epoch(unit) != epoch {
        // Stale fire from a task cancelled while this tick was already
        // in flight.
        return None;
    }
    match unit {
        Unit::Target(id) => tick_target(core, &mut state, id),
        Unit::Group(id) => tick_group(core, &mut state, id),
    }
}

fn tick_target(core: &EngineCore, state: &mut EngineState, id: TargetId) -> Option<Duration> {
    let (image, shown_ms, len, cursor) = {
        let Some(entry) = state.targets.get(&id) else {
            state.tasks.cancel(Unit::Target(id));
            return None;
        };
        if entry.group.is_some() || entry.frames.is_empty() {
            state.tasks.cancel(Unit::Target(id));
            return None;
        }
        let frame = &entry.frames[entry.cursor];
        (
            frame.image.clone(),
            frame.duration_ms,
            entry.frames.len(),
            entry.cursor,
        )
    };
    if let Err(err) = core.renderer.render(id, &image) {
        debug!("target {id:?} unrenderable ({err}); removing");
        core.remove_locked(state, id);
        return None;
    }
    if let Some(entry) = state.targets.get_mut(&id) {
        entry.cursor = (cursor + 1) % len;
    }
    Some(core.delay_for(shown_ms))
}

fn tick_group(core: &EngineCore, state: &mut EngineState, gid: GroupId) -> Option<Duration> {
    let (cursor, members) = {
        let Some(group) = state.groups.get(&gid) else {
            state.tasks.cancel(Unit::Group(gid));
            return None;
        };
        let mut members: Vec<TargetId> = group.members.iter().copied().collect();
        // Deterministic render order across ticks.
        members.sort_unstable_by_key(|t| t.0);
        (group.cursor, members)
    };

    let mut attempted = 0usize;
    let mut min_ms: Option<u32> = None;
    let mut gone: Vec<TargetId> = Vec::new();
    for id in members {
        let Some((image, ms)) = state.targets.get(&id).map(|entry| {
            let idx = entry.group_frame_index(cursor);
            let frame = &entry.frames[idx];
            (frame.image.clone(), frame.duration_ms)
        }) else {
            // Dormant member: declared by sync but not added yet.
            continue;
        };
        attempted += 1;
        match core.renderer.render(id, &image) {
            Ok(()) => min_ms = Some(min_ms.map_or(ms, |m| m.min(ms))),
            Err(err) => {
                debug!("group {gid:?} member {id:?} unrenderable ({err})");
                gone.push(id);
            }
        }
    }
    for id in gone {
        // Member removal never stalls the remaining members.
        core.remove_locked(state, id);
    }

    if attempted == 0 {
        // Members exist but none has frames yet; park until an add
        // re-arms the group.
        state.tasks.cancel(Unit::Group(gid));
        return None;
    }
    let Some(ms) = min_ms else {
        // Every renderable member is gone; drop the whole group.
        core.delete_group_locked(state, gid);
        return None;
    };
    match state.groups.get_mut(&gid) {
        Some(group) => {
            group.cursor = cursor + 1;
            // The fastest member's current frame governs the cadence.
            Some(core.delay_for(ms))
        }
        None => {
            // The removals above emptied the group.
            state.tasks.cancel(Unit::Group(gid));
            None
        }
    }
}
