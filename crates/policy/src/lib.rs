//! Reference schedtune policies for dynstune channels.
//!
//! The debounce engine only knows [`PolicyHook`](dynstune_core::PolicyHook).
//! This crate provides hooks composed from per-group schedtune knobs:
//!
//! - [`BoostPolicy`]: boost + prefer-idle on the group, prefer-idle on
//!   "foreground"
//! - [`CrucialPolicy`]: crucial placement on the group
//! - [`GroupBoostPolicy`]: boost on the group only
//!
//! over a [`TuneBackend`]: [`StuneFsBackend`] (cgroup files),
//! [`InMemoryBackend`] (dry runs, tests) or [`TracingBackend`] (logs only).

mod backend;
mod hooks;

pub use backend::{GroupTune, InMemoryBackend, StuneFsBackend, TracingBackend, TuneBackend};
pub use hooks::{BoostPolicy, CrucialPolicy, GroupBoostPolicy};
