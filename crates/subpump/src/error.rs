/// Discovery gave up. Non-fatal: the interception features stay disabled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryFailure {
    /// Neither global slot appeared within the retry budget.
    #[error("unable to find pubsub after {attempts} retries")]
    GlobalsMissing { attempts: u32 },

    /// The legacy registry exists but no entry exposes a client.
    #[error("unable to find a pubsub instance among {entries} registry entries")]
    NoQualifyingInstance { entries: usize },
}

/// Returned by [`Subpump::inject`](crate::Subpump::inject) when no client
/// has been hooked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no pubsub instance available")]
pub struct NoInstanceError;
