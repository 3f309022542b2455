//! Punitive random payloads.
//!
//! Payload size grows with the offending address's accumulated score and is
//! clamped to a ceiling. The count is read under the ledger's shared lock and
//! the lock is released before any bytes are produced, so a concurrent
//! failure may change the size slightly. That staleness is acceptable.

use std::sync::Arc;

use rand::RngCore;
use tracing::debug;

use crate::ledger::AttemptLedger;

/// Chunk size used when streaming garbage.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Largest payload a single buffer can hold on this target.
pub const MAX_PAYLOAD_SIZE: u64 = isize::MAX as u64;

/// Produces cryptographically random payloads sized by offence history.
#[derive(Debug, Clone)]
pub struct GarbageGenerator {
    ledger: Arc<AttemptLedger>,
    base_size: u64,
    ceiling: u64,
}

impl GarbageGenerator {
    /// Create a generator reading counts from `ledger`.
    ///
    /// The ceiling is lowered to [`MAX_PAYLOAD_SIZE`] if it exceeds it.
    #[must_use]
    pub fn new(ledger: Arc<AttemptLedger>, base_size: u64, ceiling: u64) -> Self {
        Self {
            ledger,
            base_size,
            ceiling: ceiling.min(MAX_PAYLOAD_SIZE),
        }
    }

    /// Payload size for `count` accumulated failures.
    #[must_use]
    pub fn size_for_count(&self, count: u64) -> u64 {
        self.base_size.saturating_mul(count).min(self.ceiling)
    }

    /// Payload size for an address right now.
    #[must_use]
    pub fn payload_size(&self, address: &str) -> u64 {
        self.size_for_count(self.ledger.peek_count(address))
    }

    /// Generate the whole payload in one buffer.
    #[must_use]
    pub fn generate(&self, address: &str) -> Vec<u8> {
        let size = usize::try_from(self.payload_size(address)).unwrap_or(isize::MAX as usize);
        debug!(address = %address, size = size, "Generating garbage payload");

        let mut garbage = vec![0u8; size];
        rand::thread_rng().fill_bytes(&mut garbage);
        garbage
    }

    /// Generate the payload lazily as random chunks.
    #[must_use]
    pub fn chunks(&self, address: &str) -> GarbageChunks {
        let total = self.payload_size(address);
        debug!(address = %address, size = total, "Streaming garbage payload");
        GarbageChunks::new(total, DEFAULT_CHUNK_SIZE)
    }

    /// Bytes per accumulated failure.
    #[must_use]
    pub const fn base_size(&self) -> u64 {
        self.base_size
    }

    /// Maximum payload size.
    #[must_use]
    pub const fn ceiling(&self) -> u64 {
        self.ceiling
    }
}

/// Iterator yielding a fixed total of random bytes in chunks.
#[derive(Debug, Clone)]
pub struct GarbageChunks {
    remaining: u64,
    chunk_size: usize,
}

impl GarbageChunks {
    /// Yield `total` bytes in chunks of at most `chunk_size`.
    #[must_use]
    pub fn new(total: u64, chunk_size: usize) -> Self {
        Self {
            remaining: total,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Bytes not yet produced.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Iterator for GarbageChunks {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let len = usize::try_from(self.remaining).map_or(self.chunk_size, |r| r.min(self.chunk_size));
        let mut chunk = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut chunk);
        self.remaining -= len as u64;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let chunks = self.remaining.div_ceil(self.chunk_size as u64);
        let chunks = usize::try_from(chunks).unwrap_or(usize::MAX);
        (chunks, Some(chunks))
    }
}
