//! Policy hook invoked on channel state edges.

/// Applies or reverts a scheduling policy for a task group.
///
/// This is the capability injected into every channel at construction.
/// The worker calls it exactly once per idle→active edge with
/// `enable = true` and exactly once per active→idle edge with
/// `enable = false`, so calls for one channel always alternate.
///
/// # Guarantees expected from implementors
///
/// - **Synchronous and fast**: the call runs on a real-time worker thread
/// - **Total**: failures are handled inside the hook; nothing is reported back
///
/// # Example
///
/// ```ignore
/// let hook = |group: &str, enable: bool| {
///     tracing::info!(group, enable, "schedtune boost");
/// };
/// builder.channel(ChannelConfig::new(ChannelId::Boost), hook);
/// ```
pub trait PolicyHook: Send + Sync + 'static {
    /// Apply (`enable = true`) or revert (`enable = false`) the policy on
    /// `group`.
    fn apply_policy(&self, group: &str, enable: bool);
}

impl<F> PolicyHook for F
where
    F: Fn(&str, bool) + Send + Sync + 'static,
{
    fn apply_policy(&self, group: &str, enable: bool) {
        self(group, enable)
    }
}
