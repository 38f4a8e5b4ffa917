//! Core primitives for debounced schedtune channels.
//!
//! Everything a producer touches lives here and is lock free:
//!
//! - [`TriggerGate`]: single-flight admission word
//! - [`ChannelState`]: gate, desired bit, active phase, last activity
//! - [`Signal`] / [`SignalWaiter`]: park/wake between producers and a worker
//! - [`MonotonicClock`]: atomic-friendly timestamps
//! - [`PolicyHook`]: the capability a worker invokes on state edges

mod clock;
mod gate;
mod signal;
mod state;
mod traits;

pub use clock::MonotonicClock;
pub use gate::TriggerGate;
pub use signal::{Signal, SignalWaiter, WaitOutcome};
pub use state::{ChannelStats, ChannelState};
pub use traits::PolicyHook;
