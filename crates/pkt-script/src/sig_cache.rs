//! Cache of verified signatures.
//!
//! Signatures are usually checked twice, once when a transaction enters the mempool and
//! once when the block containing it is connected. The cache remembers every
//! `(sighash, signature, pubkey)` triple that verified so the second check is a lookup.

use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    sig: Vec<u8>,
    pubkey: Vec<u8>,
}

/// Bounded, thread-safe set of verified signatures keyed by signature hash.
///
/// Once full, adding a new entry evicts an arbitrary existing one.
#[derive(Debug)]
pub struct SigCache {
    entries: RwLock<HashMap<[u8; 32], Entry>>,
    max_entries: usize,
}

impl SigCache {
    /// Creates a cache holding at most `max_entries` signatures, zero disables caching.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(max_entries.min(1024))),
            max_entries,
        }
    }

    /// Returns whether this exact signature and public key were verified for `sighash`.
    pub fn exists(&self, sighash: &[u8; 32], sig: &[u8], pubkey: &[u8]) -> bool {
        self.entries
            .read()
            .get(sighash)
            .is_some_and(|entry| entry.sig == sig && entry.pubkey == pubkey)
    }

    /// Records a verified signature.
    pub fn add(&self, sighash: [u8; 32], sig: Vec<u8>, pubkey: Vec<u8>) {
        if self.max_entries == 0 {
            return;
        }

        let mut entries = self.entries.write();

        if entries.len() >= self.max_entries && !entries.contains_key(&sighash) {
            // Iteration order of the std hasher is randomized per process.
            if let Some(evicted) = entries.keys().next().copied() {
                entries.remove(&evicted);
                tracing::trace!(evicted = %hex::encode(evicted), "Signature cache full, evicted entry");
            }
        }

        entries.insert(sighash, Entry { sig, pubkey });
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
