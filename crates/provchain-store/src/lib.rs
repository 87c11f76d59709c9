//! Content-addressed storage for ProvChain.
//!
//! [`CasStore`] maps payload bytes to deterministic content identifiers,
//! generates and verifies proofs of possession ([`PossessionProof`]), and
//! keeps a bounded warm cache of small payloads. The actual byte transport
//! lives behind the [`StorageBackend`] trait; an [`InMemoryBackend`] with
//! failure injection ships for tests and embedding.
//!
//! Every backend round-trip runs through `provchain-resilience`: retried
//! with backoff, guarded by a circuit breaker, and bounded by an overall
//! deadline.

pub mod backend;
pub mod cache;
pub mod error;
pub mod proof;
pub mod store;

pub use backend::{InMemoryBackend, StorageBackend};
pub use cache::{CacheEntry, PayloadMetadata, VerdictCache, WarmCache};
pub use error::BackendError;
pub use proof::{DealState, PossessionProof, StorageDeal};
pub use store::{CasStore, Retrieved, RetrievalSource, StorageStats, StoreConfig, StoreReceipt};
