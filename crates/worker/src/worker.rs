//! Dedicated channel worker thread.

use dynstune_core::{ChannelState, MonotonicClock, PolicyHook, Signal, SignalWaiter, WaitOutcome};
use dynstune_types::{ChannelConfig, ChannelId, ClusterTopology, RevertMode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info};

use crate::deferred::DeferredRevert;
use crate::machine::{Action, ChannelMachine, WorkerPhase};
use crate::sched::apply_sched_hint;
use crate::WorkerError;

/// Producer-side handle: the lock-free trigger path of one channel.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    id: ChannelId,
    state: Arc<ChannelState>,
    signal: Signal,
    clock: MonotonicClock,
}

impl TriggerHandle {
    /// Request `on`/`off`. Returns whether the request won the gate; losers
    /// are coalesced into the request already in flight.
    #[inline]
    pub fn fire(&self, on: bool) -> bool {
        if self.state.trigger(on, self.clock.now_nanos()) {
            self.signal.notify();
            true
        } else {
            false
        }
    }

    /// Report that the deferred revert armed for `deadline` fired. Does not
    /// go through the gate, so it is never coalesced away.
    pub fn expire(&self, deadline: Instant) {
        self.state.post_expiry(self.clock.nanos_at(deadline));
        self.signal.notify();
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn clock(&self) -> &MonotonicClock {
        &self.clock
    }
}

/// Owner-side handle to a running channel worker.
///
/// Dropping the handle stops and joins the worker.
pub struct WorkerHandle {
    trigger: TriggerHandle,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn id(&self) -> ChannelId {
        self.trigger.id
    }

    /// A cloneable producer handle for this channel.
    pub fn trigger(&self) -> TriggerHandle {
        self.trigger.clone()
    }

    pub fn state(&self) -> &ChannelState {
        &self.trigger.state
    }

    /// Ask the worker to stop. It observes the request at its next wake.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.trigger.signal.notify();
    }

    /// Wait for the worker thread to exit.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(channel = %self.trigger.id, "Channel worker panicked");
            }
        }
    }

    /// Stop and join.
    pub fn shutdown(&mut self) {
        self.stop();
        self.join();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The thread side of a channel: owns the state machine, the waiter and the
/// policy hook.
pub struct ChannelWorker {
    config: ChannelConfig,
    machine: ChannelMachine,
    state: Arc<ChannelState>,
    stop: Arc<AtomicBool>,
    waiter: SignalWaiter,
    hook: Arc<dyn PolicyHook>,
    clock: MonotonicClock,
    topology: ClusterTopology,
    deferred: Option<DeferredRevert>,
}

impl ChannelWorker {
    /// Start the worker thread (and its deferred revert thread when the
    /// channel uses [`RevertMode::Deferred`]).
    ///
    /// The worker starts parked in the idle phase.
    pub fn spawn(
        config: ChannelConfig,
        hook: Arc<dyn PolicyHook>,
        clock: MonotonicClock,
        topology: &ClusterTopology,
    ) -> Result<WorkerHandle, WorkerError> {
        let waiter = SignalWaiter::new();
        let state = Arc::new(ChannelState::new());
        let stop = Arc::new(AtomicBool::new(false));
        let trigger = TriggerHandle {
            id: config.id,
            state: state.clone(),
            signal: waiter.signal(),
            clock,
        };

        let deferred = match config.revert_mode {
            RevertMode::WorkerHold => None,
            RevertMode::Deferred => {
                let revert = trigger.clone();
                Some(DeferredRevert::spawn(
                    config.id.revert_thread_name(),
                    config.revert_hint,
                    topology.clone(),
                    clock,
                    move |deadline| revert.expire(deadline),
                )?)
            }
        };

        let name = config.id.worker_thread_name();
        let worker = ChannelWorker {
            machine: ChannelMachine::new(&config),
            config,
            state,
            stop: stop.clone(),
            waiter,
            hook,
            clock,
            topology: topology.clone(),
            deferred,
        };

        // On failure the closure (and the deferred timer inside it) is dropped
        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(stack_size) = worker.config.stack_size {
            builder = builder.stack_size(stack_size);
        }
        let thread = builder
            .spawn(move || worker.run())
            .map_err(|source| WorkerError::Spawn { name, source })?;

        Ok(WorkerHandle {
            trigger,
            stop,
            thread: Some(thread),
        })
    }

    fn run(mut self) {
        let id = self.config.id;
        let thread_name = id.worker_thread_name();
        apply_sched_hint(self.config.worker_hint, &self.topology, &thread_name);
        info!(
            channel = %id,
            group = %self.config.group,
            hold_ms = self.config.hold.as_millis() as u64,
            policy = ?self.config.hold_policy,
            mode = ?self.config.revert_mode,
            "Channel worker started"
        );

        while !self.machine.is_stopping() {
            let actions = match self.machine.phase() {
                WorkerPhase::Idle | WorkerPhase::ActiveHolding { deadline: None } => {
                    let (state, stop) = (&self.state, &self.stop);
                    self.waiter.wait(|| {
                        stop.load(Ordering::Acquire) || state.has_pending() || state.has_expiry()
                    });
                    self.next_input()
                }
                WorkerPhase::ActiveHolding {
                    deadline: Some(deadline),
                } => {
                    let (state, stop) = (&self.state, &self.stop);
                    let outcome = self.waiter.wait_until(deadline, || {
                        stop.load(Ordering::Acquire) || state.has_pending()
                    });
                    match outcome {
                        WaitOutcome::Ready => self.next_input(),
                        WaitOutcome::TimedOut => self.machine.on_hold_expired(Instant::now()),
                    }
                }
                WorkerPhase::Stopping => break,
            };
            self.execute(actions);
        }

        if let Some(mut deferred) = self.deferred.take() {
            deferred.shutdown();
        }
        info!(channel = %id, "Channel worker stopped");
    }

    /// Translate what woke us into a machine input. Stop wins over a pending
    /// request, which wins over a deferred expiry: a re-arm must be seen
    /// before the expiry it supersedes.
    fn next_input(&mut self) -> Vec<Action> {
        if self.stop.load(Ordering::Acquire) {
            return self.machine.on_stop();
        }
        match self.state.pending() {
            Some(true) => {
                let admitted_at = self.clock.instant_at(self.state.last_activity());
                self.machine.on_request(true, admitted_at)
            }
            Some(false) => self.machine.on_request(false, Instant::now()),
            None => match self.state.take_expiry() {
                Some(deadline) => self
                    .machine
                    .on_deferred_expired(self.clock.instant_at(deadline)),
                // Spurious wake
                None => Vec::new(),
            },
        }
    }

    fn execute(&mut self, actions: Vec<Action>) {
        let id = self.config.id;
        for action in actions {
            match action {
                Action::Apply => {
                    self.hook.apply_policy(&self.config.group, true);
                    self.state.record_apply();
                    self.state.set_active(true);
                    debug!(channel = %id, group = %self.config.group, "Policy applied");
                }
                Action::Revert => {
                    self.hook.apply_policy(&self.config.group, false);
                    self.state.record_revert();
                    self.state.set_active(false);
                    debug!(channel = %id, group = %self.config.group, "Policy reverted");
                }
                Action::ArmDeferred { deadline } => {
                    if let Some(deferred) = &self.deferred {
                        deferred.arm_at(deadline);
                    }
                }
                Action::CancelDeferred => {
                    if let Some(deferred) = &self.deferred {
                        deferred.cancel();
                    }
                }
                Action::Clearance { until } => {
                    let stop = &self.stop;
                    self.waiter
                        .wait_until(until, || stop.load(Ordering::Acquire));
                }
                Action::ReleaseGate => self.state.release(),
            }
        }
    }
}
