// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Optional dataset cache.
//!
//! Nothing in the analysis path reads from a cache on its own; a host opts in
//! through [`crate::Dashboard::load_cached`] or by holding a [`DatasetCache`]
//! itself.

use crate::config::CacheConfig;
use crate::dataset::{ColumnValues, Dataset};
use crate::error::CacheError;
use blake3::Hasher as Blake3Hasher;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// blake3 digest of the dataset contents.
    Content([u8; 32]),
    Session(Uuid),
}
impl CacheKey {
    pub fn for_dataset(dataset: &Dataset) -> Self {
        CacheKey::Content(content_digest(dataset))
    }
    pub fn new_session() -> Self {
        CacheKey::Session(Uuid::new_v4())
    }
}
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Content(bytes) => write!(f, "content:{}", blake3::Hash::from(*bytes).to_hex()),
            CacheKey::Session(id) => write!(f, "session:{id}"),
        }
    }
}

/// Hashes names, types and every cell, so equal datasets share a key.
pub fn content_digest(dataset: &Dataset) -> [u8; 32] {
    let mut hasher = Blake3Hasher::new();
    hasher.update(&(dataset.row_count() as u64).to_le_bytes());
    for column in dataset.columns() {
        hasher.update(&(column.name().len() as u64).to_le_bytes());
        hasher.update(column.name().as_bytes());
        match column.values() {
            ColumnValues::Numeric(values) => {
                hasher.update(b"N");
                for v in values {
                    match v {
                        Some(x) => {
                            hasher.update(&[1]);
                            hasher.update(&x.to_le_bytes());
                        }
                        None => {
                            hasher.update(&[0]);
                        }
                    }
                }
            }
            ColumnValues::Categorical(values) | ColumnValues::Other(values) => {
                hasher.update(if matches!(column.values(), ColumnValues::Other(_)) {
                    b"O"
                } else {
                    b"C"
                });
                for v in values {
                    match v {
                        Some(s) => {
                            hasher.update(&[1]);
                            hasher.update(&(s.len() as u64).to_le_bytes());
                            hasher.update(s.as_bytes());
                        }
                        None => {
                            hasher.update(&[0]);
                        }
                    }
                }
            }
            ColumnValues::Datetime(values) => {
                hasher.update(b"D");
                for v in values {
                    match v {
                        Some(dt) => {
                            hasher.update(&[1]);
                            hasher.update(&dt.and_utc().timestamp().to_le_bytes());
                            hasher.update(&dt.and_utc().timestamp_subsec_nanos().to_le_bytes());
                        }
                        None => {
                            hasher.update(&[0]);
                        }
                    }
                }
            }
        }
    }
    *hasher.finalize().as_bytes()
}

pub trait DatasetCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<Dataset>>;
    fn insert(&self, key: CacheKey, dataset: Arc<Dataset>);
    /// Returns whether an entry was removed.
    fn invalidate(&self, key: &CacheKey) -> bool;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct CachedEntry {
    dataset: Arc<Dataset>,
    inserted_at: Instant,
    sequence: u64,
}

/// In-process cache with a time-to-live and a bound on the entry count.
/// When full, the oldest entry is evicted first.
#[derive(Debug)]
pub struct MemoryDatasetCache {
    entries: DashMap<CacheKey, CachedEntry>,
    ttl: Duration,
    capacity: usize,
    inserts: AtomicU64,
}
impl MemoryDatasetCache {
    pub fn new(ttl: Duration, capacity: usize) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        Ok(Self {
            entries: DashMap::with_capacity(capacity),
            ttl,
            capacity,
            inserts: AtomicU64::new(0),
        })
    }
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        Self::new(Duration::from_secs(config.ttl_seconds), config.capacity)
    }
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }
    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.sequence)
            .map(|entry| *entry.key());
        if let Some(key) = oldest {
            debug!("Evicting cached dataset {}", key);
            self.entries.remove(&key);
        }
    }
}

impl DatasetCache for MemoryDatasetCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<Dataset>> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(Arc::clone(&entry.dataset));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!("Cached dataset {} expired", key);
            self.entries.remove(key);
        }
        None
    }

    fn insert(&self, key: CacheKey, dataset: Arc<Dataset>) {
        self.purge_expired();
        while !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        let sequence = self.inserts.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key,
            CachedEntry {
                dataset,
                inserted_at: Instant::now(),
                sequence,
            },
        );
    }

    fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
