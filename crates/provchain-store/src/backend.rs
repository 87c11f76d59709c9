use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use provchain_types::Cid;

use crate::error::BackendError;
use crate::proof::{DealState, StorageDeal};

/// Byte-level storage backend behind the content-addressed store.
///
/// Implementations map content identifiers to payload bytes and report deal
/// status from whatever ledger governs them. All methods are fallible and
/// assumed network-bound; [`CasStore`](crate::CasStore) wraps every call in
/// retry, circuit-breaking, and deadline handling, so implementations should
/// surface raw transport outcomes and not retry internally.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Upload a payload under its content identifier.
    ///
    /// Returns the initial storage-deal records for the replicas created.
    /// Uploading the same `(cid, payload)` twice is idempotent.
    async fn upload(&self, cid: Cid, payload: &[u8]) -> Result<Vec<StorageDeal>, BackendError>;

    /// Fetch the payload bytes for a content identifier.
    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>, BackendError>;

    /// Latest deal-status snapshot for a content identifier.
    async fn deal_status(&self, cid: &Cid) -> Result<Vec<StorageDeal>, BackendError>;
}

/// In-memory backend for tests and embedding.
///
/// Payloads live in a `RwLock`-guarded map; each upload simulates a set of
/// replicated storage deals in `Active` state. Failure injection hooks allow
/// resilience paths to be exercised deterministically: `fail_next_uploads`
/// fails the next N upload calls with a retryable error, and `poison` makes
/// every call touching one CID fail permanently.
pub struct InMemoryBackend {
    payloads: RwLock<HashMap<Cid, Vec<u8>>>,
    deals: RwLock<HashMap<Cid, Vec<StorageDeal>>>,
    replicas: usize,
    next_deal_id: AtomicU64,
    failing_uploads: AtomicU32,
    poisoned: RwLock<HashMap<Cid, String>>,
}

impl InMemoryBackend {
    /// Create a backend simulating `replicas` storage deals per payload.
    pub fn new(replicas: usize) -> Self {
        Self {
            payloads: RwLock::new(HashMap::new()),
            deals: RwLock::new(HashMap::new()),
            replicas: replicas.max(1),
            next_deal_id: AtomicU64::new(1),
            failing_uploads: AtomicU32::new(0),
            poisoned: RwLock::new(HashMap::new()),
        }
    }

    /// Number of payloads held.
    pub fn len(&self) -> usize {
        self.payloads.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the backend holds no payloads.
    pub fn is_empty(&self) -> bool {
        self.payloads.read().expect("lock poisoned").is_empty()
    }

    /// Fail the next `n` upload calls with a retryable transport error.
    pub fn fail_next_uploads(&self, n: u32) {
        self.failing_uploads.store(n, Ordering::SeqCst);
    }

    /// Make every call touching `cid` fail with the given message.
    pub fn poison(&self, cid: Cid, message: impl Into<String>) {
        self.poisoned
            .write()
            .expect("lock poisoned")
            .insert(cid, message.into());
    }

    /// Flip the deal states recorded for `cid` (e.g., to simulate providers
    /// losing data).
    pub fn set_deal_states(&self, cid: &Cid, state: DealState) {
        if let Some(deals) = self.deals.write().expect("lock poisoned").get_mut(cid) {
            for deal in deals {
                deal.state = state;
            }
        }
    }

    /// Overwrite the stored bytes for `cid` without changing deals.
    /// Simulates backend-side corruption for verification tests.
    pub fn corrupt(&self, cid: &Cid, bytes: Vec<u8>) {
        if let Some(slot) = self.payloads.write().expect("lock poisoned").get_mut(cid) {
            *slot = bytes;
        }
    }

    fn check_poison(&self, cid: &Cid) -> Result<(), BackendError> {
        if let Some(msg) = self.poisoned.read().expect("lock poisoned").get(cid) {
            return Err(BackendError::Rejected(msg.clone()));
        }
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn upload(&self, cid: Cid, payload: &[u8]) -> Result<Vec<StorageDeal>, BackendError> {
        self.check_poison(&cid)?;
        if self
            .failing_uploads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BackendError::Unreachable("injected upload failure".into()));
        }

        self.payloads
            .write()
            .expect("lock poisoned")
            .entry(cid)
            .or_insert_with(|| payload.to_vec());

        let mut deals = self.deals.write().expect("lock poisoned");
        let records = deals.entry(cid).or_insert_with(|| {
            (0..self.replicas)
                .map(|i| StorageDeal {
                    deal_id: self.next_deal_id.fetch_add(1, Ordering::SeqCst),
                    provider: format!("provider-{i}"),
                    state: DealState::Active,
                    size: payload.len() as u64,
                })
                .collect()
        });
        Ok(records.clone())
    }

    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>, BackendError> {
        self.check_poison(cid)?;
        self.payloads
            .read()
            .expect("lock poisoned")
            .get(cid)
            .cloned()
            .ok_or(BackendError::Missing(*cid))
    }

    async fn deal_status(&self, cid: &Cid) -> Result<Vec<StorageDeal>, BackendError> {
        self.check_poison(cid)?;
        self.deals
            .read()
            .expect("lock poisoned")
            .get(cid)
            .cloned()
            .ok_or(BackendError::Missing(*cid))
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("payload_count", &self.len())
            .field("replicas", &self.replicas)
            .finish()
    }
}
