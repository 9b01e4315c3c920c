//! Fixed-capacity in-memory byte cache with frequency-weighted eviction
//!
//! Every lookup ages all entries by one tick, so an entry's rate
//! (`hits / lifetime`) decays unless it keeps being requested. New entries are
//! seeded with the cache-wide average hit rate, and an insert that needs room
//! evicts only entries rated below that average, least valuable first, until
//! just enough space is free.
//!
//! The cache does no locking of its own; [`ResourceLoader`](crate::ResourceLoader)
//! keeps it inside its critical section.

use crate::types::CacheStats;
use bytes::Bytes;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Stored payload plus its popularity bookkeeping
#[derive(Debug)]
struct CacheEntry {
    bytes: Bytes,
    /// Lookups (on any key) since this entry was stored, starting at 1
    lifetime: f64,
    /// Hits on this entry, seeded with the average rate at insert time
    hits: f64,
}

impl CacheEntry {
    fn new(bytes: Bytes, initial_hits: f64) -> Self {
        Self {
            bytes,
            lifetime: 1.0,
            hits: initial_hits,
        }
    }

    fn rate(&self) -> f64 {
        self.hits / self.lifetime
    }

    fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Key → bytes store bounded by total payload size
#[derive(Debug)]
pub struct EvictionCache<K> {
    capacity: usize,
    entries: HashMap<K, CacheEntry>,
    total_requests: f64,
    total_hits: f64,
}

impl<K: Eq + Hash + Clone> EvictionCache<K> {
    /// Create an empty cache holding at most `capacity` payload bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            total_requests: 1.0,
            total_hits: 0.1,
        }
    }

    /// Look up `key`, aging every entry by one tick
    ///
    /// The lookup counts towards the global request counter whether or not it
    /// hits.
    pub fn get<Q>(&mut self, key: &Q) -> Option<Bytes>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        for entry in self.entries.values_mut() {
            entry.lifetime += 1.0;
        }
        self.total_requests += 1.0;

        let entry = self.entries.get_mut(key)?;
        entry.hits += 1.0;
        self.total_hits += 1.0;
        Some(entry.bytes.clone())
    }

    /// Store `bytes` under `key`, evicting low-rated entries if needed
    ///
    /// Any previous entry for `key` is removed first, even if the new payload
    /// ends up rejected. Returns false when the payload is larger than the
    /// whole cache or when evicting every below-average entry still leaves
    /// too little room.
    pub fn set(&mut self, key: K, bytes: Bytes) -> bool {
        self.entries.remove(&key);

        let needed = bytes.len();
        if needed > self.capacity {
            return false;
        }

        let average_rate = self.total_hits / self.total_requests;
        let mut free = self.capacity - self.stored_bytes();

        if free < needed {
            let mut candidates: Vec<(K, f64, usize)> = self
                .entries
                .iter()
                .filter(|(_, entry)| entry.rate() < average_rate)
                .map(|(key, entry)| (key.clone(), entry.rate(), entry.size()))
                .collect();
            // Lowest rate first; on equal rates the bigger entry goes first
            candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.2.cmp(&a.2)));

            for (victim, _, _) in candidates {
                if free >= needed {
                    break;
                }
                if let Some(removed) = self.entries.remove(&victim) {
                    free += removed.size();
                }
            }
        }

        if free < needed {
            return false;
        }
        self.entries.insert(key, CacheEntry::new(bytes, average_rate));
        true
    }

    /// Drop the entry for `key`, returning its bytes
    pub fn remove<Q>(&mut self, key: &Q) -> Option<Bytes>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key).map(|entry| entry.bytes)
    }

    /// Remove all entries; hit statistics are kept
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    /// Whether `key` is stored, without counting as a lookup
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sum of stored payload sizes
    pub fn stored_bytes(&self) -> usize {
        self.entries.values().map(CacheEntry::size).sum()
    }

    /// Occupancy and hit statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            stored_bytes: self.stored_bytes(),
            capacity: self.capacity,
            total_requests: self.total_requests,
            total_hits: self.total_hits,
        }
    }
}
