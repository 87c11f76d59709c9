use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds per day, used for date-bucket indexing.
const MS_PER_DAY: u64 = 86_400_000;

/// Timestamp for ordering graph events.
///
/// Combines a physical wall-clock component with a logical counter so that
/// events created within the same millisecond can still be totally ordered
/// when the caller constructs them explicitly.
///
/// Ordering: `physical_ms` → `logical` (derived from field order).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Wall-clock milliseconds since UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for events at the same physical time.
    pub logical: u32,
}

impl Timestamp {
    /// Create a timestamp with explicit values.
    pub fn new(physical_ms: u64, logical: u32) -> Self {
        Self {
            physical_ms,
            logical,
        }
    }

    /// Create a timestamp for the current wall-clock time.
    pub fn now() -> Self {
        let physical_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            physical_ms,
            logical: 0,
        }
    }

    /// The zero timestamp (epoch).
    pub const fn zero() -> Self {
        Self {
            physical_ms: 0,
            logical: 0,
        }
    }

    /// The day bucket this timestamp falls into (whole days since epoch).
    ///
    /// Used as the key of the graph's by-creation-date index.
    pub fn day_bucket(&self) -> u64 {
        self.physical_ms / MS_PER_DAY
    }

    /// Returns `true` if this timestamp is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Returns `true` if this timestamp is strictly before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms+{})", self.physical_ms, self.logical)
    }
}
