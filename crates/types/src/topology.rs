//! CPU cluster topology and thread scheduling hints.
//!
//! Hints are advisory: a platform without heterogeneous cores (or without
//! permission to raise priority) runs the thread with default scheduling.

/// Scheduling class requested for a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityClass {
    /// Highest real-time FIFO priority the platform offers.
    RealtimeMax,
    /// Default time-sharing priority.
    #[default]
    Normal,
}

/// Core cluster a thread prefers to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuCluster {
    /// Big cores.
    Performance,
    /// Little cores.
    LowPower,
    /// No affinity.
    #[default]
    Any,
}

/// Priority class plus preferred cluster, applied when a thread starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedHint {
    pub priority: PriorityClass,
    pub cluster: CpuCluster,
}

impl SchedHint {
    /// Latency-critical channel worker: max RT priority on the big cluster.
    pub const fn worker() -> Self {
        Self {
            priority: PriorityClass::RealtimeMax,
            cluster: CpuCluster::Performance,
        }
    }

    /// Deferred revert task: normal priority on the little cluster.
    pub const fn deferred() -> Self {
        Self {
            priority: PriorityClass::Normal,
            cluster: CpuCluster::LowPower,
        }
    }

    /// No priority change, no affinity.
    pub const fn unpinned() -> Self {
        Self {
            priority: PriorityClass::Normal,
            cluster: CpuCluster::Any,
        }
    }
}

/// Core ids belonging to each cluster.
///
/// Empty lists mean the cluster is unknown; threads hinted at it are left
/// unpinned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterTopology {
    pub performance: Vec<usize>,
    pub low_power: Vec<usize>,
}

impl ClusterTopology {
    pub fn new(performance: Vec<usize>, low_power: Vec<usize>) -> Self {
        Self {
            performance,
            low_power,
        }
    }

    /// Homogeneous platform: every hint resolves to no affinity.
    pub fn homogeneous() -> Self {
        Self::default()
    }

    /// All cores of a cluster.
    pub fn cores(&self, cluster: CpuCluster) -> &[usize] {
        match cluster {
            CpuCluster::Performance => &self.performance,
            CpuCluster::LowPower => &self.low_power,
            CpuCluster::Any => &[],
        }
    }

    /// Core a thread hinted at `cluster` is pinned to: the first core of that
    /// cluster, or `None` when the cluster is unknown.
    pub fn preferred_core(&self, cluster: CpuCluster) -> Option<usize> {
        self.cores(cluster).iter().copied().min()
    }

    /// Whether the platform reports distinct big and little clusters.
    pub fn is_heterogeneous(&self) -> bool {
        !self.performance.is_empty() && !self.low_power.is_empty()
    }
}
