//! Sync groups: shared-cursor lockstep, membership churn, and member
//! failure isolation.

use std::sync::Arc;
use std::time::Duration;

use reelsync_playback_core::{Config, GroupId, PlaybackEngine, ResourceHandle, TargetId};
use reelsync_test_fixtures::{RecordingRenderer, ScriptedDecoder};

const T1: TargetId = TargetId(1);
const T2: TargetId = TargetId(2);
const T3: TargetId = TargetId(3);
const T9: TargetId = TargetId(9);
const G1: GroupId = GroupId(1);
const G2: GroupId = GroupId(2);

fn rh(handle: &str) -> ResourceHandle {
    ResourceHandle::new(handle)
}

fn engine_with(decoder: ScriptedDecoder) -> (PlaybackEngine, Arc<RecordingRenderer>) {
    let renderer = RecordingRenderer::new();
    let engine = PlaybackEngine::new(Config::default(), Arc::new(decoder), renderer.clone());
    (engine, renderer)
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

async fn run_for(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}

/// it should advance members of frame counts {3, 5} through
/// [0,1,2,0,1] and [0,1,2,3,4] over five shared ticks
#[tokio::test(start_paused = true)]
async fn group_cursor_advances_members_in_lockstep() {
    let decoder = ScriptedDecoder::new()
        .script("three", &[50, 50, 50])
        .script("five", &[50, 50, 50, 50, 50]);
    let (engine, renderer) = engine_with(decoder);
    engine.add(T1, rh("three")).await.unwrap();
    engine.add(T2, rh("five")).await.unwrap();
    settle().await;

    renderer.clear();
    engine.sync(G1, &[T1, T2]);
    settle().await;
    assert_eq!(renderer.frame_indices(T1), vec![0]);
    assert_eq!(renderer.frame_indices(T2), vec![0]);

    for _ in 0..4 {
        run_for(50).await;
    }
    assert_eq!(renderer.frame_indices(T1), vec![0, 1, 2, 0, 1]);
    assert_eq!(renderer.frame_indices(T2), vec![0, 1, 2, 3, 4]);
    assert_eq!(engine.group_cursor(G1), Some(5));
    assert_eq!(engine.active_tasks(), 1);
}

/// it should tick at the fastest member's current frame duration
#[tokio::test(start_paused = true)]
async fn fastest_member_governs_the_cadence() {
    let decoder = ScriptedDecoder::new()
        .script("slow", &[100, 100, 100, 100])
        .script("fast", &[50, 50]);
    let (engine, renderer) = engine_with(decoder);
    engine.add(T1, rh("slow")).await.unwrap();
    engine.add(T2, rh("fast")).await.unwrap();
    settle().await;

    renderer.clear();
    engine.sync(G1, &[T1, T2]);
    settle().await;

    // min(100, 50) = 50ms per shared tick; at group cursor 2 the slow
    // member shows 2 mod 4 and the fast one 2 mod 2.
    run_for(50).await;
    run_for(50).await;
    assert_eq!(renderer.frame_indices(T1), vec![0, 1, 2]);
    assert_eq!(renderer.frame_indices(T2), vec![0, 1, 0]);
}

#[tokio::test(start_paused = true)]
async fn member_removal_keeps_the_group_running() {
    let decoder = ScriptedDecoder::new()
        .script("a", &[50, 50, 50])
        .script("b", &[50, 50, 50]);
    let (engine, renderer) = engine_with(decoder);
    engine.add(T1, rh("a")).await.unwrap();
    engine.add(T2, rh("b")).await.unwrap();
    engine.sync(G1, &[T1, T2]);
    settle().await;
    assert_eq!(engine.group_cursor(G1), Some(1));

    engine.remove(T1);
    assert_eq!(engine.group_members(G1), Some(vec![T2]));
    assert_eq!(engine.group_cursor(G1), Some(1), "removal must not touch the cursor");

    renderer.clear();
    run_for(50).await;
    assert_eq!(
        renderer.frame_indices(T2),
        vec![1],
        "the next tick fires on schedule for the remaining member"
    );
    assert_eq!(engine.active_tasks(), 1);
}

/// it should accept members that have no target yet and pick them up
/// once added
#[tokio::test(start_paused = true)]
async fn sync_before_add_leaves_a_dormant_membership() {
    let (engine, renderer) = engine_with(ScriptedDecoder::new().script("a", &[50, 50]));
    engine.sync(G1, &[T1]);
    settle().await;
    assert_eq!(engine.group_members(G1), Some(vec![T1]));
    assert_eq!(engine.active_tasks(), 0, "nothing to render yet; the group parks");

    engine.add(T1, rh("a")).await.unwrap();
    settle().await;
    assert_eq!(engine.target_group(T1), Some(G1));
    assert_eq!(engine.active_tasks(), 1);
    assert_eq!(renderer.frame_indices(T1), vec![0]);
    run_for(50).await;
    assert_eq!(renderer.frame_indices(T1), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn moving_a_member_detaches_it_from_its_old_group() {
    let decoder = ScriptedDecoder::new()
        .script("a", &[50, 50, 50])
        .script("b", &[50, 50, 50])
        .script("c", &[50, 50, 50]);
    let (engine, renderer) = engine_with(decoder);
    engine.add(T1, rh("a")).await.unwrap();
    engine.add(T2, rh("b")).await.unwrap();
    engine.add(T3, rh("c")).await.unwrap();
    engine.sync(G1, &[T1, T2]);
    settle().await;
    let g1_cursor = engine.group_cursor(G1).unwrap();

    renderer.clear();
    engine.sync(G2, &[T2]);
    settle().await;
    assert_eq!(engine.group_members(G1), Some(vec![T1]));
    assert_eq!(engine.group_members(G2), Some(vec![T2]));
    assert_eq!(engine.target_group(T2), Some(G2));
    assert_eq!(
        engine.group_cursor(G1),
        Some(g1_cursor),
        "the old group keeps running unmodified"
    );
    assert_eq!(engine.group_cursor(G2), Some(1), "the new group started at 0");
    assert_eq!(engine.active_tasks(), 3, "G1, G2, and the ungrouped T3");

    run_for(50).await;
    assert!(!renderer.frame_indices(T1).is_empty());
    assert_eq!(renderer.frame_indices(T2), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn failing_member_is_removed_without_stalling_the_group() {
    let decoder = ScriptedDecoder::new()
        .script("a", &[50, 50])
        .script("b", &[50, 50]);
    let (engine, renderer) = engine_with(decoder);
    engine.add(T1, rh("a")).await.unwrap();
    engine.add(T2, rh("b")).await.unwrap();
    engine.sync(G1, &[T1, T2]);
    settle().await;

    renderer.kill(T1);
    renderer.clear();
    run_for(50).await;
    assert!(!engine.contains_target(T1));
    assert_eq!(engine.group_members(G1), Some(vec![T2]));
    assert_eq!(renderer.frame_indices(T2).len(), 1, "the healthy member rendered");
    assert_eq!(engine.active_tasks(), 1);

    run_for(50).await;
    assert_eq!(renderer.frame_indices(T2).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn group_is_deleted_when_every_member_fails() {
    let decoder = ScriptedDecoder::new()
        .script("a", &[50, 50])
        .script("b", &[50, 50]);
    let (engine, renderer) = engine_with(decoder);
    engine.add(T1, rh("a")).await.unwrap();
    engine.add(T2, rh("b")).await.unwrap();
    engine.sync(G1, &[T1, T2]);
    settle().await;

    renderer.kill(T1);
    renderer.kill(T2);
    run_for(50).await;
    assert_eq!(engine.group_cursor(G1), None, "group is gone");
    assert!(!engine.contains_target(T1));
    assert!(!engine.contains_target(T2));
    assert_eq!(engine.target_count(), 0);
    assert_eq!(engine.active_tasks(), 0);
}

#[tokio::test(start_paused = true)]
async fn re_syncing_a_group_resets_its_shared_cursor() {
    let decoder = ScriptedDecoder::new()
        .script("a", &[50, 50, 50])
        .script("b", &[50, 50, 50]);
    let (engine, renderer) = engine_with(decoder);
    engine.add(T1, rh("a")).await.unwrap();
    engine.add(T2, rh("b")).await.unwrap();
    engine.sync(G1, &[T1, T2]);
    settle().await;
    run_for(50).await;
    run_for(50).await;
    assert_eq!(engine.group_cursor(G1), Some(3));

    renderer.clear();
    engine.sync(G1, &[T1, T2]);
    settle().await;
    assert_eq!(engine.group_cursor(G1), Some(1), "restarted from 0 and ticked once");
    assert_eq!(renderer.frame_indices(T1), vec![0]);
    assert_eq!(renderer.frame_indices(T2), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn removing_a_dormant_member_shrinks_the_group() {
    let (engine, _renderer) = engine_with(ScriptedDecoder::new().script("a", &[50, 50]));
    engine.add(T1, rh("a")).await.unwrap();
    engine.sync(G1, &[T1, T9]);
    settle().await;
    assert_eq!(engine.group_members(G1), Some(vec![T1, T9]));

    engine.remove(T9);
    assert_eq!(engine.group_members(G1), Some(vec![T1]));

    engine.remove(T1);
    assert_eq!(engine.group_members(G1), None, "last member out deletes the group");
    assert_eq!(engine.active_tasks(), 0);
}
