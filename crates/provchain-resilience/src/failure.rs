use std::fmt;

use serde::{Deserialize, Serialize};

use provchain_types::Cid;

/// Classification of a failure, determining how callers may react to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Bad input (e.g., a dangling edge reference). Surfaced immediately.
    Validation,
    /// Backend unreachable or timed out.
    Network,
    /// Backend accepted the call but reports a storage-layer failure.
    Storage,
    /// Proof mismatch or missing proof. Retrying won't fix tampered data.
    Verification,
    /// Backend asked us to slow down.
    RateLimit,
    /// A guarding resource rejected the call (circuit open).
    Resource,
    /// Anything unclassified.
    Internal,
}

impl FailureKind {
    /// Whether an operation failing with this kind may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Storage | Self::RateLimit)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Verification => "verification",
            Self::RateLimit => "rate-limit",
            Self::Resource => "resource",
            Self::Internal => "internal",
        };
        write!(f, "{name}")
    }
}

/// A classified, attributable failure.
///
/// Carries optional attribution (`cid`, `subject`) so that a verification
/// failure deep inside a provenance walk can still name the exact content
/// identifier and node/edge it concerns when it reaches the caller.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{kind} failure: {message}")]
pub struct Failure {
    /// The classification driving retry behavior.
    pub kind: FailureKind,
    /// Human-readable description.
    pub message: String,
    /// Content identifier involved, if any.
    pub cid: Option<Cid>,
    /// Graph subject (node/edge id) involved, if any.
    pub subject: Option<String>,
}

impl Failure {
    /// Create a failure of the given kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cid: None,
            subject: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Validation, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Storage, message)
    }

    pub fn verification(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Verification, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimit, message)
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Resource, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, message)
    }

    /// Attach the content identifier this failure concerns.
    pub fn with_cid(mut self, cid: Cid) -> Self {
        self.cid = Some(cid);
        self
    }

    /// Attach the graph subject (node/edge id) this failure concerns.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Whether the failed operation may be retried.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_per_kind() {
        assert!(FailureKind::Network.is_retryable());
        assert!(FailureKind::Storage.is_retryable());
        assert!(FailureKind::RateLimit.is_retryable());
        assert!(!FailureKind::Validation.is_retryable());
        assert!(!FailureKind::Verification.is_retryable());
        assert!(!FailureKind::Resource.is_retryable());
        assert!(!FailureKind::Internal.is_retryable());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let f = Failure::network("backend unreachable");
        assert_eq!(f.to_string(), "network failure: backend unreachable");
    }

    #[test]
    fn attribution_is_carried() {
        let cid = Cid::of(b"payload");
        let f = Failure::verification("content hash mismatch")
            .with_cid(cid)
            .with_subject("node:abcd1234");
        assert_eq!(f.cid, Some(cid));
        assert_eq!(f.subject.as_deref(), Some("node:abcd1234"));
        assert!(!f.is_retryable());
    }

    #[test]
    fn serde_roundtrip() {
        let f = Failure::storage("deal lost").with_cid(Cid::of(b"x"));
        let json = serde_json::to_string(&f).unwrap();
        let parsed: Failure = serde_json::from_str(&json).unwrap();
        assert_eq!(f, parsed);
    }
}
