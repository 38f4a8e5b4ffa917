//! Apply [`SchedHint`]s to the calling thread.
//!
//! Hints are advisory. Missing privileges (`EPERM` for `SCHED_FIFO` is the
//! common case) or an unknown cluster leave the thread on default
//! scheduling, with a warning.

use dynstune_types::{ClusterTopology, PriorityClass, SchedHint};
use tracing::{debug, warn};

/// What [`apply_sched_hint`] managed to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedOutcome {
    pub realtime: bool,
    pub pinned_core: Option<usize>,
}

/// Apply `hint` to the current thread.
pub fn apply_sched_hint(hint: SchedHint, topology: &ClusterTopology, thread: &str) -> SchedOutcome {
    let mut outcome = SchedOutcome::default();

    if hint.priority == PriorityClass::RealtimeMax {
        match platform::set_realtime_max() {
            Ok(priority) => {
                debug!(thread, priority, "Running at max real-time priority");
                outcome.realtime = true;
            }
            Err(e) => warn!(thread, error = %e, "Could not raise thread to real-time priority"),
        }
    }

    if let Some(core) = topology.preferred_core(hint.cluster) {
        match platform::pin_to_core(core) {
            Ok(()) => {
                debug!(thread, core, cluster = ?hint.cluster, "Pinned thread");
                outcome.pinned_core = Some(core);
            }
            Err(e) => warn!(thread, core, error = %e, "Could not pin thread"),
        }
    }

    outcome
}

#[cfg(target_os = "linux")]
mod platform {
    use std::io;

    /// Switch the calling thread to `SCHED_FIFO` at the highest priority.
    pub fn set_realtime_max() -> io::Result<i32> {
        // SAFETY: plain syscalls on the calling thread with a zero-initialized,
        // fully written `sched_param`.
        unsafe {
            let max = libc::sched_get_priority_max(libc::SCHED_FIFO);
            if max < 0 {
                return Err(io::Error::last_os_error());
            }
            let mut param: libc::sched_param = std::mem::zeroed();
            param.sched_priority = max;
            if libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(max)
        }
    }

    /// Restrict the calling thread to `core`.
    pub fn pin_to_core(core: usize) -> io::Result<()> {
        if core >= libc::CPU_SETSIZE as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("core {} out of range", core),
            ));
        }
        // SAFETY: `set` is a zeroed cpu_set_t and `core` is within CPU_SETSIZE.
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(core, &mut set);
            if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    use std::io;

    pub fn set_realtime_max() -> io::Result<i32> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "real-time priority not supported on this platform",
        ))
    }

    pub fn pin_to_core(_core: usize) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "core pinning not supported on this platform",
        ))
    }
}
