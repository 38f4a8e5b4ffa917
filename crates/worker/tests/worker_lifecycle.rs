//! End-to-end tests of a single channel worker thread.
//!
//! Hold durations are kept ≥ 50ms and tolerances generous so the tests stay
//! stable on loaded CI machines.

use dynstune_core::{MonotonicClock, PolicyHook};
use dynstune_test_helpers::{assert_alternating, test_channel, RecordingHook};
use dynstune_types::{ChannelConfig, ChannelId, ClusterTopology, HoldPolicy, RevertMode};
use dynstune_worker::{ChannelWorker, WorkerHandle};
use rand::Rng;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const SLACK: Duration = Duration::from_millis(150);

fn spawn(config: ChannelConfig, hook: &RecordingHook) -> WorkerHandle {
    let hook: Arc<dyn PolicyHook> = Arc::new(hook.clone());
    ChannelWorker::spawn(
        config,
        hook,
        MonotonicClock::new(),
        &ClusterTopology::homogeneous(),
    )
    .unwrap()
}

fn wait_finished(handle: &WorkerHandle, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if handle.is_finished() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    handle.is_finished()
}

#[test]
fn test_single_trigger_applies_then_reverts() {
    let hook = RecordingHook::new();
    let worker = spawn(test_channel(ChannelId::Boost, 100), &hook);
    let trigger = worker.trigger();

    let start = Instant::now();
    assert!(trigger.fire(true));

    assert!(hook.wait_for_calls(2, Duration::from_millis(100) + SLACK));
    let calls = hook.calls();
    assert_alternating(&calls);
    assert_eq!(calls[0].group, "top-app");
    assert!(calls[1].at >= start + Duration::from_millis(100));
    assert!(calls[1].at < start + Duration::from_millis(100) + SLACK);

    // Exactly one revert, no trailing calls
    thread::sleep(Duration::from_millis(150));
    assert_eq!(hook.edges(), vec![true, false]);

    let stats = worker.state().stats();
    assert_eq!(stats.applies, 1);
    assert_eq!(stats.reverts, 1);
}

#[test]
fn test_retrigger_extends_hold() {
    let hook = RecordingHook::new();
    let worker = spawn(test_channel(ChannelId::Boost, 100), &hook);
    let trigger = worker.trigger();

    assert!(trigger.fire(true));
    assert!(hook.wait_for_calls(1, SLACK));

    thread::sleep(Duration::from_millis(60));
    let second = Instant::now();
    assert!(trigger.fire(true));

    assert!(hook.wait_for_calls(2, Duration::from_millis(100) + SLACK));
    let calls = hook.calls();
    assert_eq!(hook.edges(), vec![true, false]);
    assert!(
        calls[1].at >= second + Duration::from_millis(100),
        "reverted {:?} after the second trigger",
        calls[1].at - second
    );
    assert!(calls[1].at < second + Duration::from_millis(100) + SLACK);
}

#[test]
fn test_concurrent_burst_is_single_flight() {
    let hook = RecordingHook::new();
    // Clearance keeps the gate closed for 200ms after the first admission
    let config = test_channel(ChannelId::Crucial, 400).with_hold_policy(HoldPolicy::Clearance);
    let worker = spawn(config, &hook);
    let trigger = worker.trigger();

    assert!(trigger.fire(true));

    let barrier = Arc::new(Barrier::new(100));
    let producers: Vec<_> = (0..100)
        .map(|_| {
            let trigger = trigger.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                trigger.fire(true)
            })
        })
        .collect();
    let admitted = producers
        .into_iter()
        .map(|p| p.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(admitted, 0);
    assert!(hook.wait_for_calls(1, SLACK));
    assert_eq!(hook.applies(), 1);

    let stats = worker.state().stats();
    assert_eq!(stats.admitted, 1);
    assert_eq!(stats.coalesced, 100);
}

#[test]
fn test_repeated_triggers_apply_once_per_active_period() {
    let hook = RecordingHook::new();
    let worker = spawn(test_channel(ChannelId::Input, 80), &hook);
    let trigger = worker.trigger();

    for _ in 0..3 {
        for _ in 0..20 {
            trigger.fire(true);
            thread::sleep(Duration::from_millis(2));
        }
        // Let the hold lapse
        thread::sleep(Duration::from_millis(80) + SLACK);
    }

    let calls = hook.calls();
    assert_eq!(calls.len(), 6);
    assert_alternating(&calls);
}

#[test]
fn test_stop_is_observed_while_idle() {
    let hook = RecordingHook::new();
    let worker = spawn(test_channel(ChannelId::Framebuffer, 200), &hook);

    worker.stop();
    assert!(wait_finished(&worker, Duration::from_millis(200)));
    assert!(hook.is_empty());
}

#[test]
fn test_stop_while_holding_is_bounded_and_reverts() {
    let hook = RecordingHook::new();
    let mut worker = spawn(test_channel(ChannelId::Boost, 500), &hook);

    assert!(worker.trigger().fire(true));
    assert!(hook.wait_for_calls(1, SLACK));

    let stop_at = Instant::now();
    worker.shutdown();

    assert!(stop_at.elapsed() < Duration::from_millis(500));
    assert_eq!(hook.edges(), vec![true, false]);
}

#[test]
fn test_stop_without_revert_leaves_policy_applied() {
    let hook = RecordingHook::new();
    let config = test_channel(ChannelId::Boost, 500).with_revert_on_stop(false);
    let mut worker = spawn(config, &hook);

    assert!(worker.trigger().fire(true));
    assert!(hook.wait_for_calls(1, SLACK));
    worker.shutdown();

    assert_eq!(hook.edges(), vec![true]);
}

#[test]
fn test_stop_during_clearance_is_prompt() {
    let hook = RecordingHook::new();
    let config = test_channel(ChannelId::Crucial, 1000).with_hold_policy(HoldPolicy::Clearance);
    let mut worker = spawn(config, &hook);

    assert!(worker.trigger().fire(true));
    assert!(hook.wait_for_calls(1, SLACK));

    let stop_at = Instant::now();
    worker.shutdown();
    assert!(stop_at.elapsed() < Duration::from_millis(500));
}

#[test]
fn test_explicit_off_reverts_immediately() {
    let hook = RecordingHook::new();
    let worker = spawn(test_channel(ChannelId::TopAppCgroup, 1000), &hook);
    let trigger = worker.trigger();

    assert!(trigger.fire(true));
    assert!(hook.wait_for_calls(1, SLACK));

    // Wait for the gate to reopen, then request off
    let deadline = Instant::now() + SLACK;
    while !trigger.state().is_gate_free() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    let off_at = Instant::now();
    assert!(trigger.fire(false));

    assert!(hook.wait_for_calls(2, SLACK));
    assert!(hook.calls()[1].at < off_at + SLACK);
    assert!(!worker.state().is_active());
}

#[test]
fn test_deferred_mode_reverts_after_hold() {
    let hook = RecordingHook::new();
    let config = test_channel(ChannelId::Boost, 100).with_revert_mode(RevertMode::Deferred);
    let worker = spawn(config, &hook);
    let trigger = worker.trigger();

    let start = Instant::now();
    assert!(trigger.fire(true));
    assert!(hook.wait_for_calls(1, SLACK));
    assert!(worker.state().is_active());

    thread::sleep(Duration::from_millis(60));
    let second = Instant::now();
    assert!(trigger.fire(true));

    assert!(hook.wait_for_calls(2, Duration::from_millis(160) + SLACK));
    let calls = hook.calls();
    assert_alternating(&calls);
    assert!(calls[1].at >= second + Duration::from_millis(100));
    assert!(calls[1].at >= start + Duration::from_millis(160));

    thread::sleep(Duration::from_millis(150));
    assert_eq!(hook.len(), 2);
    assert!(!worker.state().is_active());
}

#[test]
fn test_stale_deferred_expiry_is_ignored() {
    let hook = RecordingHook::new();
    let config = test_channel(ChannelId::Boost, 200).with_revert_mode(RevertMode::Deferred);
    let worker = spawn(config, &hook);
    let trigger = worker.trigger();

    let first = Instant::now();
    assert!(trigger.fire(true));
    assert!(hook.wait_for_calls(1, SLACK));

    thread::sleep(Duration::from_millis(20));
    let second = Instant::now();
    assert!(trigger.fire(true));

    // The first deadline fires after the re-arm was admitted
    trigger.expire(first + Duration::from_millis(200));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(hook.edges(), vec![true]);
    assert!(worker.state().is_active());

    assert!(hook.wait_for_calls(2, Duration::from_millis(200) + SLACK));
    let calls = hook.calls();
    assert_alternating(&calls);
    assert!(calls[1].at >= second + Duration::from_millis(200));
}

#[test]
fn test_deferred_retrigger_near_deadline_never_reverts_early() {
    let hold = Duration::from_millis(50);
    let hook = RecordingHook::new();
    let config = test_channel(ChannelId::Framebuffer, 50).with_revert_mode(RevertMode::Deferred);
    let worker = spawn(config, &hook);
    let trigger = worker.trigger();
    let mut rng = rand::thread_rng();

    // Each trigger lands within a millisecond either side of the previous
    // deadline, racing the timer's expiry
    let mut early = Vec::new();
    for round in 0..60 {
        if !trigger.fire(true) {
            continue;
        }
        thread::sleep(hold / 2);
        if !worker.state().is_active() {
            early.push(round);
        }
        let jitter = Duration::from_micros(rng.gen_range(0..2000));
        thread::sleep(hold / 2 - Duration::from_millis(1) + jitter);
    }
    assert!(early.is_empty(), "reverted inside the hold in rounds {early:?}");

    thread::sleep(hold + SLACK);
    assert!(!worker.state().is_active());
    assert_alternating(&hook.calls());
    let stats = worker.state().stats();
    assert_eq!(stats.applies, stats.reverts);
}

#[test]
fn test_deferred_mode_shutdown_joins_timer() {
    let hook = RecordingHook::new();
    let config = test_channel(ChannelId::Crucial, 300)
        .with_revert_mode(RevertMode::Deferred)
        .with_revert_on_stop(false);
    let mut worker = spawn(config, &hook);

    assert!(worker.trigger().fire(true));
    assert!(hook.wait_for_calls(1, SLACK));
    worker.shutdown();

    // The cancelled deferred revert never fires
    thread::sleep(Duration::from_millis(400));
    assert_eq!(hook.edges(), vec![true]);
}
