//! Engine wiring and the line-based trigger feed.

use dynstune_core::PolicyHook;
use dynstune_engine::{Engine, NotifyOutcome};
use dynstune_policy::{BoostPolicy, CrucialPolicy, GroupBoostPolicy, TuneBackend};
use dynstune_types::ChannelId;
use std::io::{self, BufRead};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{ChannelSection, DaemonConfig, DaemonError, FeedError};

/// Schedtune policy for a channel: boost gets boost + prefer-idle, crucial
/// gets the crucial flag, everything else a plain group boost.
pub fn policy_for(
    id: ChannelId,
    section: Option<&ChannelSection>,
    backend: Arc<dyn TuneBackend>,
) -> Arc<dyn PolicyHook> {
    match id {
        ChannelId::Boost => match section.and_then(|s| s.prefer_idle_groups.clone()) {
            Some(groups) => Arc::new(BoostPolicy::with_prefer_idle_groups(backend, groups)),
            None => Arc::new(BoostPolicy::new(backend)),
        },
        ChannelId::Crucial => Arc::new(CrucialPolicy::new(backend)),
        _ => Arc::new(GroupBoostPolicy::new(backend)),
    }
}

/// Resolve the config and start an engine writing through `backend`.
pub fn build_engine(
    config: &DaemonConfig,
    backend: Arc<dyn TuneBackend>,
) -> Result<Engine, DaemonError> {
    let mut builder = Engine::builder().topology(config.topology());
    for channel in config.channel_configs()? {
        let hook = policy_for(channel.id, config.section(channel.id), backend.clone());
        builder = builder.channel_shared(channel, hook);
    }
    Ok(builder.start()?)
}

/// One line of the trigger feed: `<channel>`, `<channel> on` or
/// `<channel> off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCommand {
    pub channel: ChannelId,
    pub on: bool,
}

/// Parse a feed line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> Option<Result<FeedCommand, FeedError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut words = line.split_whitespace();
    let name = words.next()?;
    let channel = match name.parse::<ChannelId>() {
        Ok(channel) => channel,
        Err(e) => return Some(Err(e.into())),
    };
    let on = match (words.next(), words.next()) {
        (None, _) | (Some("on"), None) => true,
        (Some("off"), None) => false,
        _ => return Some(Err(FeedError::Malformed(line.to_string()))),
    };
    Some(Ok(FeedCommand { channel, on }))
}

/// Counters of a finished feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub admitted: u64,
    pub coalesced: u64,
    pub suppressed: u64,
    /// Malformed lines and lines naming unconfigured channels.
    pub ignored: u64,
}

/// Feed every line of `input` into the engine until EOF.
pub fn run_feed<R: BufRead>(engine: &Engine, input: R) -> io::Result<FeedSummary> {
    let mut summary = FeedSummary::default();
    for line in input.lines() {
        let line = line?;
        let command = match parse_command(&line) {
            None => continue,
            Some(Ok(command)) => command,
            Some(Err(e)) => {
                warn!(line = %line, error = %e, "Ignoring malformed feed line");
                summary.ignored += 1;
                continue;
            }
        };

        let Some(handle) = engine.handle(command.channel) else {
            warn!(channel = %command.channel, "Ignoring trigger for unconfigured channel");
            summary.ignored += 1;
            continue;
        };
        let outcome = if command.on {
            handle.try_notify()
        } else {
            handle.notify_off()
        };
        debug!(channel = %command.channel, on = command.on, ?outcome, "Feed trigger");
        match outcome {
            NotifyOutcome::Admitted => summary.admitted += 1,
            NotifyOutcome::Coalesced => summary.coalesced += 1,
            NotifyOutcome::Suppressed => summary.suppressed += 1,
        }
    }

    info!(
        admitted = summary.admitted,
        coalesced = summary.coalesced,
        suppressed = summary.suppressed,
        ignored = summary.ignored,
        "Trigger feed closed"
    );
    Ok(summary)
}
