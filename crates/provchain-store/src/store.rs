use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use provchain_crypto::ContentHasher;
use provchain_resilience::{BulkReport, CircuitBreaker, Failure, RetryPolicy};
use provchain_types::Cid;

use crate::backend::StorageBackend;
use crate::cache::{PayloadMetadata, VerdictCache, WarmCache};
use crate::error::BackendError;
use crate::proof::PossessionProof;

/// Configuration for a [`CasStore`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Chunk size for possession-proof Merkle trees.
    pub chunk_size: usize,
    /// Maximum number of warm-cache entries.
    pub warm_cache_max_entries: usize,
    /// Maximum payload size admitted to the warm cache.
    pub warm_object_max_bytes: usize,
    /// Concurrent operations per batch wave.
    pub batch_width: usize,
    /// How long a verification verdict stays cached.
    pub verdict_ttl: Duration,
    /// Overall deadline for one backend round-trip, including retries.
    pub operation_deadline: Duration,
    /// Retry policy for backend round-trips.
    pub retry: RetryPolicy,
    /// Consecutive backend failures before the circuit opens.
    pub breaker_threshold: u32,
    /// How long the circuit stays open before a trial call.
    pub breaker_cooldown: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256 * 1024,
            warm_cache_max_entries: 1024,
            warm_object_max_bytes: 1024 * 1024,
            batch_width: 8,
            verdict_ttl: Duration::from_secs(60),
            operation_deadline: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            breaker_threshold: 5,
            breaker_cooldown: Duration::from_secs(30),
        }
    }
}

/// Where a retrieved payload came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalSource {
    /// Served from the bounded in-memory warm cache.
    WarmCache,
    /// Fetched from the storage backend.
    Backend,
}

impl std::fmt::Display for RetrievalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WarmCache => write!(f, "warm_cache"),
            Self::Backend => write!(f, "backend"),
        }
    }
}

/// Result of a successful `store` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReceipt {
    /// Content identifier assigned to the payload.
    pub cid: Cid,
    /// The generated possession proof.
    pub proof: PossessionProof,
    /// Payload size in bytes.
    pub size: u64,
}

/// Result of a successful `retrieve` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Retrieved {
    /// The payload bytes.
    pub payload: Vec<u8>,
    /// Metadata recorded at store time.
    pub metadata: PayloadMetadata,
    /// Where the payload came from.
    pub source: RetrievalSource,
}

/// Aggregate counters for the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub objects_stored: u64,
    pub proofs_held: usize,
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub verifications: u64,
    pub total_bytes_stored: u64,
}

/// Content-addressed store with possession proofs and a warm cache.
///
/// State machine per CID: `Unstored → Stored → Cached (optional) →
/// Verified (repeatable)`. The store is the sole holder of proofs and
/// metadata; the backend only ever sees raw bytes. Every backend round-trip
/// is retried with backoff, guarded by a circuit breaker, and bounded by an
/// overall deadline, so a hung backend surfaces as a retryable
/// network-class failure instead of blocking callers.
pub struct CasStore {
    backend: Arc<dyn StorageBackend>,
    config: StoreConfig,
    proofs: RwLock<HashMap<Cid, PossessionProof>>,
    metadata: RwLock<HashMap<Cid, PayloadMetadata>>,
    cache: WarmCache,
    verdicts: VerdictCache,
    breaker: CircuitBreaker,
    objects_stored: AtomicU64,
    bytes_stored: AtomicU64,
    verifications: AtomicU64,
}

impl CasStore {
    /// Create a store over the given backend.
    pub fn new(backend: Arc<dyn StorageBackend>, config: StoreConfig) -> Self {
        let cache = WarmCache::new(config.warm_cache_max_entries, config.warm_object_max_bytes);
        let verdicts = VerdictCache::new(config.verdict_ttl);
        let breaker = CircuitBreaker::new(
            "storage-backend",
            config.breaker_threshold,
            config.breaker_cooldown,
        );
        Self {
            backend,
            config,
            proofs: RwLock::new(HashMap::new()),
            metadata: RwLock::new(HashMap::new()),
            cache,
            verdicts,
            breaker,
            objects_stored: AtomicU64::new(0),
            bytes_stored: AtomicU64::new(0),
            verifications: AtomicU64::new(0),
        }
    }

    /// The store's configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Store a payload and generate its possession proof.
    ///
    /// The CID is computed deterministically from the payload content, so
    /// storing identical bytes twice yields the same CID and is idempotent.
    pub async fn store(
        &self,
        payload: Vec<u8>,
        metadata: PayloadMetadata,
    ) -> Result<StoreReceipt, Failure> {
        let cid = Cid::of(&payload);
        let size = payload.len() as u64;

        let deals = self
            .round_trip(cid, || self.backend.upload(cid, &payload))
            .await?;

        let proof = PossessionProof::generate(cid, &payload, self.config.chunk_size, deals);
        let newly_stored = self
            .proofs
            .write()
            .expect("lock poisoned")
            .insert(cid, proof.clone())
            .is_none();
        if newly_stored {
            self.objects_stored.fetch_add(1, Ordering::Relaxed);
            self.bytes_stored.fetch_add(size, Ordering::Relaxed);
        }
        self.metadata
            .write()
            .expect("lock poisoned")
            .insert(cid, metadata.clone());

        if self.cache.admit(cid, payload, metadata) {
            self.cache.optimize();
        }

        debug!(cid = %cid.short_hex(), size, "payload stored");
        Ok(StoreReceipt { cid, proof, size })
    }

    /// Retrieve a payload, warm cache first.
    ///
    /// With `verify` set, a cache hit is re-verified against its proof; a
    /// corrupted entry is evicted and the payload is fetched from the
    /// backend instead of being returned.
    pub async fn retrieve(&self, cid: &Cid, verify: bool) -> Result<Retrieved, Failure> {
        if let Some((payload, metadata)) = self.cache.get(cid) {
            if !verify || self.verify_proof(cid, &payload).await? {
                return Ok(Retrieved {
                    payload,
                    metadata,
                    source: RetrievalSource::WarmCache,
                });
            }
            warn!(cid = %cid.short_hex(), "cached payload failed verification, evicting");
            self.cache.evict(cid);
        }

        let cid = *cid;
        let payload = self
            .round_trip(cid, || self.backend.fetch(&cid))
            .await?;

        if verify && !self.verify_proof(&cid, &payload).await? {
            return Err(Failure::verification(
                "retrieved payload does not match its possession proof",
            )
            .with_cid(cid));
        }

        let metadata = self
            .metadata
            .read()
            .expect("lock poisoned")
            .get(&cid)
            .cloned()
            .unwrap_or_default();

        if self.cache.admit(cid, payload.clone(), metadata.clone()) {
            self.cache.optimize();
        }

        Ok(Retrieved {
            payload,
            metadata,
            source: RetrievalSource::Backend,
        })
    }

    /// Verify a payload against the possession proof recorded for `cid`.
    ///
    /// Fails with a `Verification`-class failure if no proof was ever
    /// recorded. The verdict requires the content hash and chunk Merkle
    /// root to match *and* an active-deal quorum; it is cached for the
    /// configured TTL keyed by `(cid, payload hash)`.
    pub async fn verify_proof(&self, cid: &Cid, payload: &[u8]) -> Result<bool, Failure> {
        let payload_hash = ContentHasher::PROOF.hash(payload);
        if let Some(verdict) = self.verdicts.get(cid, &payload_hash) {
            return Ok(verdict);
        }

        let proof = self
            .proofs
            .read()
            .expect("lock poisoned")
            .get(cid)
            .cloned()
            .ok_or_else(|| {
                Failure::verification("no possession proof recorded").with_cid(*cid)
            })?;

        self.verifications.fetch_add(1, Ordering::Relaxed);
        let content_ok = proof.content_matches(payload);
        let quorum_ok = proof.has_active_quorum();
        let verdict = content_ok && quorum_ok;
        self.verdicts.put(*cid, payload_hash, verdict);

        debug!(
            cid = %cid.short_hex(),
            content_ok,
            quorum_ok,
            "possession proof checked"
        );
        Ok(verdict)
    }

    /// Pull the latest deal snapshot from the backend onto the recorded
    /// proof, invalidating cached verdicts for the CID.
    ///
    /// Returns the number of deals in the fresh snapshot.
    pub async fn refresh_deals(&self, cid: &Cid) -> Result<usize, Failure> {
        let cid = *cid;
        let deals = self
            .round_trip(cid, || self.backend.deal_status(&cid))
            .await?;

        let count = {
            let mut proofs = self.proofs.write().expect("lock poisoned");
            let proof = proofs.get_mut(&cid).ok_or_else(|| {
                Failure::verification("no possession proof recorded").with_cid(cid)
            })?;
            proof.refresh_deals(deals);
            proof.deals.len()
        };
        self.verdicts.invalidate(&cid);
        Ok(count)
    }

    /// Store a batch of payloads in fixed-width concurrent waves.
    ///
    /// One item's failure never aborts the batch; outcomes and aggregate
    /// counts are returned per item, in input order.
    pub async fn batch_store(
        &self,
        items: Vec<(Vec<u8>, PayloadMetadata)>,
    ) -> BulkReport<StoreReceipt> {
        let mut outcomes = Vec::with_capacity(items.len());
        let mut iter = items.into_iter();
        loop {
            let wave: Vec<_> = iter.by_ref().take(self.config.batch_width).collect();
            if wave.is_empty() {
                break;
            }
            let futures = wave
                .into_iter()
                .map(|(payload, metadata)| self.store(payload, metadata));
            outcomes.extend(futures::future::join_all(futures).await);
        }
        BulkReport::from_outcomes(outcomes)
    }

    /// Retrieve a batch of payloads in fixed-width concurrent waves.
    pub async fn batch_retrieve(&self, cids: &[Cid], verify: bool) -> BulkReport<Retrieved> {
        let mut outcomes = Vec::with_capacity(cids.len());
        for wave in cids.chunks(self.config.batch_width) {
            let futures = wave.iter().map(|cid| self.retrieve(cid, verify));
            outcomes.extend(futures::future::join_all(futures).await);
        }
        BulkReport::from_outcomes(outcomes)
    }

    /// Returns `true` if a possession proof is recorded for `cid`.
    pub fn has_proof(&self, cid: &Cid) -> bool {
        self.proofs
            .read()
            .expect("lock poisoned")
            .contains_key(cid)
    }

    /// The recorded possession proof for `cid`, if any.
    pub fn proof(&self, cid: &Cid) -> Option<PossessionProof> {
        self.proofs.read().expect("lock poisoned").get(cid).cloned()
    }

    /// Enforce the warm-cache entry bound, evicting least-accessed entries
    /// first. Returns the number of evicted entries.
    pub fn optimize_cache(&self) -> usize {
        self.cache.optimize()
    }

    /// Returns `true` if `cid` is currently warm.
    pub fn is_cached(&self, cid: &Cid) -> bool {
        self.cache.contains(cid)
    }

    /// Aggregate counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            objects_stored: self.objects_stored.load(Ordering::Relaxed),
            proofs_held: self.proofs.read().expect("lock poisoned").len(),
            cache_entries: self.cache.len(),
            cache_hits: self.cache.hit_count(),
            cache_misses: self.cache.miss_count(),
            verifications: self.verifications.load(Ordering::Relaxed),
            total_bytes_stored: self.bytes_stored.load(Ordering::Relaxed),
        }
    }

    /// One backend round-trip: breaker-guarded per attempt, retried with
    /// backoff, bounded by the overall operation deadline.
    async fn round_trip<T, F, Fut>(&self, cid: Cid, op: F) -> Result<T, Failure>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let op = &op;
        self.config
            .retry
            .run_with_deadline(self.config.operation_deadline, move || {
                self.breaker
                    .call(move || async move { op().await.map_err(|e| e.classify(cid)) })
            })
            .await
    }
}

impl std::fmt::Debug for CasStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CasStore")
            .field("proofs_held", &self.proofs.read().expect("lock poisoned").len())
            .field("cache", &self.cache)
            .finish()
    }
}
