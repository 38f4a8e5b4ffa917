//! Channel workers for dynamic schedtune.
//!
//! Each channel is driven by one dedicated thread running a
//! [`ChannelMachine`]. The thread parks until its gate publishes a request or
//! a stop is requested, invokes the policy hook on idle→active and
//! active→idle edges, and supervises the hold window.
//!
//! # Revert modes
//!
//! - **Worker hold**: the worker parks with a timeout equal to the remaining
//!   hold and reverts itself when it elapses.
//! - **Deferred**: the worker arms a [`DeferredRevert`] on a separate,
//!   normal-priority thread that fires an "off" request through the gate.
//!
//! Both keep hook calls strictly alternating per channel.

mod deferred;
mod error;
mod machine;
mod sched;
mod worker;

pub use deferred::DeferredRevert;
pub use error::WorkerError;
pub use machine::{Action, ChannelMachine, WorkerPhase};
pub use sched::{apply_sched_hint, SchedOutcome};
pub use worker::{ChannelWorker, TriggerHandle, WorkerHandle};
