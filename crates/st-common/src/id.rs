//! Record identity types.
//!
//! A telemetry record is keyed by a ULID: 48 bits of millisecond timestamp
//! followed by 80 bits of randomness, rendered as 26 Crockford base32
//! characters. Byte-wise ordering of the string equals numeric ordering of
//! the value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use ulid::{Generator, Ulid};

/// Unique, time-sortable identifier of a telemetry record.
///
/// Format: 26 chars of Crockford base32, e.g. `01HZX3V8Q5T2K9J4M6N7P8R0SA`.
/// An empty identifier marks a record that has not been saved yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Build an identifier from its timestamp and random components.
    pub fn from_parts(timestamp_ms: u64, random: u128) -> Self {
        RecordId::from(Ulid::from_parts(timestamp_ms, random))
    }

    /// Parse and validate an identifier string.
    pub fn parse(s: &str) -> Option<Self> {
        // Re-render so lowercase input is stored in canonical form.
        Ulid::from_string(s).ok().map(RecordId::from)
    }

    /// Millisecond timestamp embedded in the identifier.
    pub fn timestamp_ms(&self) -> Option<u64> {
        Ulid::from_string(&self.0).ok().map(|ulid| ulid.timestamp_ms())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Ulid> for RecordId {
    fn from(ulid: Ulid) -> Self {
        RecordId(ulid.to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic identifier generator.
///
/// Within one generator, every call returns an identifier strictly greater
/// than the previous one, even when several calls land in the same
/// millisecond or the wall clock steps backwards.
pub struct RecordIdGenerator {
    inner: Mutex<Generator>,
}

impl fmt::Debug for RecordIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordIdGenerator").finish_non_exhaustive()
    }
}

impl Default for RecordIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    /// Generate the next identifier using the current wall clock.
    pub fn next_id(&self) -> RecordId {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.next_id_at(now)
    }

    /// Generate the next identifier as if the clock read `now_ms`.
    pub fn next_id_at(&self, now_ms: u64) -> RecordId {
        let mut generator = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut ms = now_ms;
        loop {
            match generator.generate_from_datetime(at_millis(ms)) {
                Ok(ulid) => return RecordId::from(ulid),
                // Random space for this millisecond is spent; move to the next one.
                Err(_) => ms = ms.saturating_add(1),
            }
        }
    }
}

fn at_millis(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}
