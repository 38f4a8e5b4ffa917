//! The channel set supervisor.

use dynstune_core::{ChannelStats, MonotonicClock, PolicyHook};
use dynstune_types::{validate_channels, ChannelConfig, ChannelId, ClusterTopology};
use dynstune_worker::{ChannelWorker, WorkerHandle};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{error, info, trace};

use crate::{EngineError, NotifyHandle};

/// Collects channel configs and hooks, then starts them all at once.
#[derive(Default)]
pub struct EngineBuilder {
    topology: ClusterTopology,
    channels: Vec<(ChannelConfig, Arc<dyn PolicyHook>)>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// CPU topology used to resolve scheduling hints.
    pub fn topology(mut self, topology: ClusterTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn channel<H: PolicyHook>(self, config: ChannelConfig, hook: H) -> Self {
        self.channel_shared(config, Arc::new(hook))
    }

    /// Add a channel whose hook is shared with other owners.
    pub fn channel_shared(mut self, config: ChannelConfig, hook: Arc<dyn PolicyHook>) -> Self {
        self.channels.push((config, hook));
        self
    }

    /// Validate the channel set and start every worker in insertion order.
    ///
    /// If any worker fails to start, the ones already running are stopped
    /// and joined before the error is returned.
    pub fn start(self) -> Result<Engine, EngineError> {
        let configs: Vec<ChannelConfig> = self.channels.iter().map(|(c, _)| c.clone()).collect();
        validate_channels(&configs)?;

        let clock = MonotonicClock::new();
        let mut workers: IndexMap<ChannelId, WorkerHandle> = IndexMap::new();
        for (config, hook) in self.channels {
            let channel = config.id;
            match ChannelWorker::spawn(config, hook, clock, &self.topology) {
                Ok(worker) => {
                    workers.insert(channel, worker);
                }
                Err(source) => {
                    error!(
                        channel = %channel,
                        error = %source,
                        started = workers.len(),
                        "Channel failed to start, stopping the others"
                    );
                    stop_all(&mut workers);
                    return Err(EngineError::Spawn { channel, source });
                }
            }
        }

        // Suppression targets are validated above, so every lookup resolves
        let mut handles = IndexMap::with_capacity(configs.len());
        for config in &configs {
            let Some(worker) = workers.get(&config.id) else {
                continue;
            };
            let suppression = config.suppression.and_then(|rule| {
                workers
                    .get(&rule.target())
                    .map(|target| (rule, target.trigger()))
            });
            handles.insert(config.id, NotifyHandle::new(worker.trigger(), suppression));
        }

        info!(
            channels = ?workers.keys().map(|c| c.as_str()).collect::<Vec<_>>(),
            heterogeneous = self.topology.is_heterogeneous(),
            "Engine started"
        );

        Ok(Engine {
            workers,
            handles,
            running: true,
        })
    }
}

/// A running set of debounced channels.
///
/// Dropping the engine shuts it down.
pub struct Engine {
    workers: IndexMap<ChannelId, WorkerHandle>,
    handles: IndexMap<ChannelId, NotifyHandle>,
    running: bool,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Notify a channel. Notifies for channels that are not configured (or
    /// after shutdown) are ignored.
    #[inline]
    pub fn notify(&self, channel: ChannelId) {
        match self.handles.get(&channel) {
            Some(handle) if self.running => handle.notify(),
            _ => trace!(channel = %channel, "Notify ignored"),
        }
    }

    /// A handle producers can keep instead of going through the engine.
    /// Notifies through a handle that outlives the engine are absorbed by
    /// the stopped channel's gate.
    pub fn handle(&self, channel: ChannelId) -> Option<NotifyHandle> {
        self.handles.get(&channel).cloned()
    }

    pub fn is_active(&self, channel: ChannelId) -> bool {
        self.handles
            .get(&channel)
            .is_some_and(NotifyHandle::is_active)
    }

    /// Counters of a channel. Still readable after shutdown.
    pub fn stats(&self, channel: ChannelId) -> Option<ChannelStats> {
        self.handles.get(&channel).map(NotifyHandle::stats)
    }

    /// Configured channels, in start order.
    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.handles.keys().copied()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop every channel and wait for its threads to exit. Channels active
    /// at this point revert unless configured otherwise. Idempotent.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        stop_all(&mut self.workers);
        info!("Engine stopped");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Signal every worker first so they wind down concurrently, then join.
fn stop_all(workers: &mut IndexMap<ChannelId, WorkerHandle>) {
    for worker in workers.values() {
        worker.stop();
    }
    for (_, mut worker) in workers.drain(..) {
        worker.join();
    }
}
