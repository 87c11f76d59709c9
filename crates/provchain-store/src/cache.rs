use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use provchain_types::{Cid, Timestamp};

/// Caller-supplied metadata stored alongside a payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadMetadata {
    /// Human-readable name, if any.
    pub name: Option<String>,
    /// MIME-like content type hint, if any.
    pub content_type: Option<String>,
    /// Open extension fields.
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PayloadMetadata {
    /// Metadata carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// One warm-cache slot.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    /// The cached payload bytes.
    pub payload: Vec<u8>,
    /// Metadata recorded at store time.
    pub metadata: PayloadMetadata,
    /// When the entry was admitted.
    pub cached_at: Timestamp,
    /// How often the entry has been read.
    pub access_count: u64,
}

/// Bounded in-memory cache of small payloads, keyed by CID.
///
/// Admission is size-gated (`max_object_bytes`); capacity is enforced by
/// [`optimize`](WarmCache::optimize), which evicts the least-accessed
/// entries first, so frequently verified payloads stay warm over
/// recently-but-rarely touched ones. Entries are inserted atomically per
/// key; readers never observe a half-written slot.
pub struct WarmCache {
    entries: RwLock<HashMap<Cid, CacheEntry>>,
    max_entries: usize,
    max_object_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl WarmCache {
    /// Create a cache holding at most `max_entries` payloads of at most
    /// `max_object_bytes` each.
    pub fn new(max_entries: usize, max_object_bytes: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
            max_object_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Returns `true` if `cid` is cached.
    pub fn contains(&self, cid: &Cid) -> bool {
        self.entries.read().expect("lock poisoned").contains_key(cid)
    }

    /// Cache hits recorded so far.
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Cache misses recorded so far.
    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Look up a payload, bumping its access count.
    pub fn get(&self, cid: &Cid) -> Option<(Vec<u8>, PayloadMetadata)> {
        let mut entries = self.entries.write().expect("lock poisoned");
        match entries.get_mut(cid) {
            Some(entry) => {
                entry.access_count += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some((entry.payload.clone(), entry.metadata.clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Admit a payload if it fits the size gate.
    ///
    /// Returns `true` if the payload was cached. Re-admitting an existing
    /// CID refreshes the payload but keeps the access count.
    pub fn admit(&self, cid: Cid, payload: Vec<u8>, metadata: PayloadMetadata) -> bool {
        if payload.len() > self.max_object_bytes {
            return false;
        }
        let mut entries = self.entries.write().expect("lock poisoned");
        let access_count = entries.get(&cid).map(|e| e.access_count).unwrap_or(0);
        entries.insert(
            cid,
            CacheEntry {
                payload,
                metadata,
                cached_at: Timestamp::now(),
                access_count,
            },
        );
        true
    }

    /// Drop an entry (e.g., after it failed re-verification).
    pub fn evict(&self, cid: &Cid) -> bool {
        self.entries
            .write()
            .expect("lock poisoned")
            .remove(cid)
            .is_some()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }

    /// Enforce the entry-count bound, evicting least-accessed entries first.
    ///
    /// Returns the number of evicted entries.
    pub fn optimize(&self) -> usize {
        let mut entries = self.entries.write().expect("lock poisoned");
        if entries.len() <= self.max_entries {
            return 0;
        }

        let excess = entries.len() - self.max_entries;
        let mut ranked: Vec<(Cid, u64)> = entries
            .iter()
            .map(|(cid, entry)| (*cid, entry.access_count))
            .collect();
        // Least-accessed first; ties broken by CID for determinism.
        ranked.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));

        for (cid, _) in ranked.into_iter().take(excess) {
            entries.remove(&cid);
        }
        debug!(evicted = excess, remaining = entries.len(), "cache optimized");
        excess
    }
}

impl std::fmt::Debug for WarmCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmCache")
            .field("entries", &self.len())
            .field("max_entries", &self.max_entries)
            .field("max_object_bytes", &self.max_object_bytes)
            .finish()
    }
}

/// TTL-bounded cache of verification outcomes, keyed by `(cid, payload hash)`.
///
/// Avoids redundant proof recomputation when the same payload is verified
/// repeatedly in a short window. Both positive and negative verdicts are
/// cached; a tampered payload stays invalid for the TTL.
pub struct VerdictCache {
    entries: RwLock<HashMap<(Cid, Cid), (bool, Instant)>>,
    ttl: Duration,
}

impl VerdictCache {
    /// Create a verdict cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Look up a non-expired verdict.
    pub fn get(&self, cid: &Cid, payload_hash: &Cid) -> Option<bool> {
        let entries = self.entries.read().expect("lock poisoned");
        entries.get(&(*cid, *payload_hash)).and_then(|(verdict, at)| {
            (at.elapsed() < self.ttl).then_some(*verdict)
        })
    }

    /// Record a verdict.
    pub fn put(&self, cid: Cid, payload_hash: Cid, verdict: bool) {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert((cid, payload_hash), (verdict, Instant::now()));
    }

    /// Drop all recorded verdicts for a CID (e.g., after its deal snapshot
    /// changed).
    pub fn invalidate(&self, cid: &Cid) {
        self.entries
            .write()
            .expect("lock poisoned")
            .retain(|(c, _), _| c != cid);
    }

    /// Number of recorded verdicts, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no verdicts are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> WarmCache {
        WarmCache::new(3, 64)
    }

    #[test]
    fn admit_and_get() {
        let cache = cache();
        let cid = Cid::of(b"warm");
        assert!(cache.admit(cid, b"warm".to_vec(), PayloadMetadata::default()));
        let (payload, _) = cache.get(&cid).unwrap();
        assert_eq!(payload, b"warm");
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn oversized_payload_is_not_admitted() {
        let cache = cache();
        let big = vec![0u8; 65];
        assert!(!cache.admit(Cid::of(&big), big, PayloadMetadata::default()));
        assert!(cache.is_empty());
    }

    #[test]
    fn miss_is_counted() {
        let cache = cache();
        assert!(cache.get(&Cid::of(b"absent")).is_none());
        assert_eq!(cache.miss_count(), 1);
        assert_eq!(cache.hit_count(), 0);
    }

    #[test]
    fn evict_removes_entry() {
        let cache = cache();
        let cid = Cid::of(b"gone");
        cache.admit(cid, b"gone".to_vec(), PayloadMetadata::default());
        assert!(cache.evict(&cid));
        assert!(!cache.contains(&cid));
        assert!(!cache.evict(&cid));
    }

    #[test]
    fn optimize_evicts_least_accessed_first() {
        let cache = cache();
        let hot = Cid::of(b"hot");
        let warm = Cid::of(b"warm");
        let cold_a = Cid::of(b"cold-a");
        let cold_b = Cid::of(b"cold-b");
        for (cid, bytes) in [
            (hot, b"hot".to_vec()),
            (warm, b"warm".to_vec()),
            (cold_a, b"cold-a".to_vec()),
            (cold_b, b"cold-b".to_vec()),
        ] {
            cache.admit(cid, bytes, PayloadMetadata::default());
        }
        // Heat up two entries.
        for _ in 0..5 {
            cache.get(&hot);
        }
        cache.get(&warm);

        let evicted = cache.optimize();
        assert_eq!(evicted, 1);
        assert!(cache.contains(&hot));
        assert!(cache.contains(&warm));
        // One of the cold entries was evicted.
        assert_eq!(cache.contains(&cold_a) as u8 + cache.contains(&cold_b) as u8, 1);
    }

    #[test]
    fn optimize_is_noop_under_capacity() {
        let cache = cache();
        cache.admit(Cid::of(b"only"), b"only".to_vec(), PayloadMetadata::default());
        assert_eq!(cache.optimize(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn readmission_keeps_access_count_for_ranking() {
        let cache = WarmCache::new(1, 64);
        let cid = Cid::of(b"sticky");
        cache.admit(cid, b"v1".to_vec(), PayloadMetadata::default());
        cache.get(&cid);
        cache.get(&cid);
        cache.admit(cid, b"v2".to_vec(), PayloadMetadata::default());
        let (payload, _) = cache.get(&cid).unwrap();
        assert_eq!(payload, b"v2");
    }

    #[test]
    fn verdict_cache_hit_and_expiry() {
        let verdicts = VerdictCache::new(Duration::from_millis(20));
        let cid = Cid::of(b"v");
        let hash = Cid::of(b"h");
        assert!(verdicts.get(&cid, &hash).is_none());
        verdicts.put(cid, hash, true);
        assert_eq!(verdicts.get(&cid, &hash), Some(true));

        std::thread::sleep(Duration::from_millis(25));
        assert!(verdicts.get(&cid, &hash).is_none());
    }

    #[test]
    fn verdict_cache_keyed_by_payload_hash() {
        let verdicts = VerdictCache::new(Duration::from_secs(60));
        let cid = Cid::of(b"v");
        verdicts.put(cid, Cid::of(b"clean"), true);
        verdicts.put(cid, Cid::of(b"tampered"), false);
        assert_eq!(verdicts.get(&cid, &Cid::of(b"clean")), Some(true));
        assert_eq!(verdicts.get(&cid, &Cid::of(b"tampered")), Some(false));
    }

    #[test]
    fn verdict_invalidation_clears_cid() {
        let verdicts = VerdictCache::new(Duration::from_secs(60));
        let a = Cid::of(b"a");
        let b = Cid::of(b"b");
        verdicts.put(a, Cid::of(b"h1"), true);
        verdicts.put(b, Cid::of(b"h2"), true);
        verdicts.invalidate(&a);
        assert!(verdicts.get(&a, &Cid::of(b"h1")).is_none());
        assert_eq!(verdicts.get(&b, &Cid::of(b"h2")), Some(true));
    }
}
