//! The versioned authoritative-value cell.
//!
//! Remaining time has three writers: push events, poll responses, and
//! the local 1 Hz decrement. Serial delivery removes data races but not
//! ordering races — a poll response computed before a push event can be
//! delivered after it. The cell is the single place where that is
//! resolved: authoritative writes carry a monotonic version and a source
//! rank, and anything stale is dropped instead of applied.

use std::time::Instant;

use tracing::debug;

// ---------------------------------------------------------------------------
// SyncSource
// ---------------------------------------------------------------------------

/// Where an authoritative write came from. Determines precedence when
/// two writes carry the same version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
    /// Local tick decrement. Advisory only — never carries a version.
    Local,
    /// The coarse polling fallback.
    Poll,
    /// A push event. Lowest latency, highest precedence.
    Push,
}

impl SyncSource {
    /// Precedence rank: push > poll > local.
    fn rank(self) -> u8 {
        match self {
            Self::Local => 0,
            Self::Poll => 1,
            Self::Push => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// AuthoritativeCell
// ---------------------------------------------------------------------------

/// A value with a server-versioned write guard.
///
/// Two kinds of writes:
/// - [`sync`](Self::sync) — an authoritative write (push or poll). Applied
///   only if it is newer than the last applied sync: strictly greater
///   version, or equal version from a higher-ranked source. Rejected
///   writes are counted, not applied.
/// - [`mutate_local`](Self::mutate_local) — the advisory local mutation
///   (countdown decrement). Never touches the version, so the next
///   authoritative write always wins.
#[derive(Debug)]
pub struct AuthoritativeCell<T> {
    value: T,
    version: u64,
    source: SyncSource,
    last_synced_at: Option<Instant>,
    stale_drops: u64,
}

impl<T> AuthoritativeCell<T> {
    /// Creates a cell holding `initial` with no sync applied yet
    /// (version 0, local source) — any authoritative write with a
    /// version ≥ 1 will be accepted.
    pub fn new(initial: T) -> Self {
        Self {
            value: initial,
            version: 0,
            source: SyncSource::Local,
            last_synced_at: None,
            stale_drops: 0,
        }
    }

    /// Applies an authoritative write if it is not stale.
    ///
    /// Returns `true` if the write was applied. A dropped write leaves
    /// the cell untouched and increments the stale counter.
    pub fn sync(&mut self, value: T, version: u64, source: SyncSource) -> bool {
        let newer = version > self.version
            || (version == self.version && source.rank() > self.source.rank());
        if !newer {
            self.stale_drops += 1;
            debug!(
                incoming = version,
                applied = self.version,
                source = ?source,
                "dropping stale sync"
            );
            return false;
        }
        self.value = value;
        self.version = version;
        self.source = source;
        self.last_synced_at = Some(Instant::now());
        true
    }

    /// Mutates the value locally without claiming authority.
    pub fn mutate_local(&mut self, f: impl FnOnce(&mut T)) {
        f(&mut self.value);
    }

    /// The current value.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Version of the last applied sync (0 before any sync).
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Source of the last applied sync.
    pub fn source(&self) -> SyncSource {
        self.source
    }

    /// When the last authoritative sync was applied, if any.
    pub fn last_synced_at(&self) -> Option<Instant> {
        self.last_synced_at
    }

    /// How many stale writes have been dropped.
    pub fn stale_drops(&self) -> u64 {
        self.stale_drops
    }
}

// =========================================================================
// Tests
// =========================================================================
