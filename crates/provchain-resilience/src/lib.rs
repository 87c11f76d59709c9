//! Resilience primitives for ProvChain.
//!
//! Every storage and verification call in the system goes through this layer:
//! failures are classified into a retryability-aware taxonomy ([`Failure`]),
//! fallible operations run under [`RetryPolicy`] with exponential backoff and
//! an optional overall deadline, repeatedly failing dependencies are guarded
//! by a [`CircuitBreaker`], and bulk operations isolate per-item failures via
//! [`run_isolated`].
//!
//! Nothing here is process-global: breakers and policies are explicit values
//! owned by their callers, so they can be injected and tested in isolation.

pub mod breaker;
pub mod bulk;
pub mod failure;
pub mod retry;

pub use breaker::{BreakerState, CircuitBreaker};
pub use bulk::{run_isolated, BulkReport};
pub use failure::{Failure, FailureKind};
pub use retry::RetryPolicy;
