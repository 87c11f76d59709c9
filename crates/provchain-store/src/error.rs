use provchain_resilience::Failure;
use provchain_types::Cid;

/// Errors from a storage backend.
///
/// These are raw transport-level outcomes; [`CasStore`](crate::CasStore)
/// classifies them into [`Failure`]s before they reach callers.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached at all.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend accepted the call but reported a storage-layer failure.
    #[error("storage rejected: {0}")]
    Rejected(String),

    /// The backend asked us to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The requested payload is not held by the backend.
    #[error("payload not found: {0}")]
    Missing(Cid),
}

impl BackendError {
    /// Classify this backend error, attributing the content identifier.
    pub fn classify(self, cid: Cid) -> Failure {
        let failure = match &self {
            Self::Unreachable(msg) => Failure::network(msg.clone()),
            Self::Rejected(msg) => Failure::storage(msg.clone()),
            Self::RateLimited(msg) => Failure::rate_limit(msg.clone()),
            Self::Missing(_) => Failure::storage(self.to_string()),
        };
        failure.with_cid(cid)
    }
}
