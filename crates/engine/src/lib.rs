//! Engine for dynamic schedtune channels.
//!
//! An [`Engine`] owns a fixed set of channels, each with its own worker
//! thread and policy hook, and routes producer notifies to them. Producers
//! either call [`Engine::notify`] or keep a [`NotifyHandle`].
//!
//! ```no_run
//! use dynstune_engine::Engine;
//! use dynstune_types::{ChannelConfig, ChannelId};
//!
//! let engine = Engine::builder()
//!     .channel(ChannelConfig::new(ChannelId::Boost), |group: &str, enable: bool| {
//!         println!("{group}: {enable}");
//!     })
//!     .start()?;
//! engine.notify(ChannelId::Boost);
//! # Ok::<(), dynstune_engine::EngineError>(())
//! ```
//!
//! # Cross-channel suppression
//!
//! A channel may name one other channel whose state gates its notifies
//! (see [`Suppression`](dynstune_types::Suppression)). The check is a pair of
//! atomic loads on the notify path; suppressed notifies never reach the gate
//! and are counted in [`ChannelStats::suppressed`](dynstune_core::ChannelStats).

mod engine;
mod error;
mod handle;

pub use engine::{Engine, EngineBuilder};
pub use error::EngineError;
pub use handle::{NotifyHandle, NotifyOutcome};
