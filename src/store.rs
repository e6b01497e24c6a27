use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use bytes::Bytes;

/// One keyspace: a key -> entry map with per-key TTL. The server keeps one
/// instance per logical database index.
///
/// Every operation that can observe expiry takes the caller-supplied "now";
/// the store never reads a wall clock, so expiration is deterministic under
/// the simulated clock. An entry is expired only once `now` is strictly
/// after its `expire_at`, and any entry found expired during an operation is
/// removed before that operation completes.
pub struct Store {
    entries: RwLock<HashMap<Vec<u8>, Entry>>,
}

struct Entry {
    value: Bytes,
    // None means the key persists forever.
    expire_at: Option<SystemTime>,
}

impl Entry {
    fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.expire_at, Some(at) if now > at)
    }
}

/// Modifiers for `set_string_with_options`.
#[derive(Debug, Default)]
pub struct SetOptions {
    /// Only set if the key does not exist.
    pub nx: bool,
    /// Only set if the key exists.
    pub xx: bool,
    /// Retain the existing TTL, if any.
    pub keep_ttl: bool,
    /// Explicit expiry for the new value.
    pub expire_at: Option<SystemTime>,
}

/// Outcome of a conditional set. `previous` is captured before mutation so
/// `SET ... GET` can return the old value.
#[derive(Debug, PartialEq)]
pub struct SetResult {
    pub stored: bool,
    pub previous: Option<Bytes>,
}

/// Keyspace counters for INFO.
#[derive(Debug, PartialEq)]
pub struct Stats {
    /// Non-expired keys.
    pub keys: usize,
    /// Non-expired keys that have a TTL set.
    pub expires: usize,
    /// Average remaining TTL in milliseconds over keys with a TTL; 0 when
    /// none has one.
    pub avg_ttl_ms: i64,
}

impl Store {
    pub fn new() -> Store {
        Store {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Unconditional upsert, replacing both value and TTL.
    pub fn set_string(&self, key: &[u8], value: Bytes, expire_at: Option<SystemTime>) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(key.to_vec(), Entry { value, expire_at });
    }

    /// Conditional upsert honouring NX/XX/KEEPTTL and an optional expiry.
    ///
    /// A current entry already past its expiry is evicted before NX/XX are
    /// evaluated, so the conditions see the same keyspace a read would.
    /// On failure the keyspace is left unchanged.
    pub fn set_string_with_options(
        &self,
        now: SystemTime,
        key: &[u8],
        value: Bytes,
        opts: &SetOptions,
    ) -> SetResult {
        let mut entries = self.entries.write().unwrap();

        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }

        let previous = entries.get(key).map(|e| e.value.clone());
        let exists = previous.is_some();

        if (opts.nx && exists) || (opts.xx && !exists) {
            return SetResult {
                stored: false,
                previous,
            };
        }

        let mut expire_at = opts.expire_at;
        if opts.keep_ttl {
            if let Some(e) = entries.get(key) {
                expire_at = e.expire_at;
            }
        }

        entries.insert(key.to_vec(), Entry { value, expire_at });
        SetResult {
            stored: true,
            previous,
        }
    }

    /// Fetches the value if the key exists and is not expired; a key found
    /// expired is evicted.
    pub fn get_string(&self, now: SystemTime, key: &[u8]) -> Option<Bytes> {
        {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                None => return None,
                Some(e) if !e.is_expired(now) => return Some(e.value.clone()),
                Some(_) => {}
            }
        }
        // Found expired under the shared lock; re-check under the exclusive
        // lock before evicting, another writer may have replaced it.
        let mut entries = self.entries.write().unwrap();
        if let Some(e) = entries.get(key) {
            if !e.is_expired(now) {
                return Some(e.value.clone());
            }
            entries.remove(key);
        }
        None
    }

    /// Removes the given keys, returning how many were actually present.
    pub fn del(&self, keys: &[&[u8]]) -> usize {
        let mut entries = self.entries.write().unwrap();
        keys.iter()
            .filter(|k| entries.remove(**k).is_some())
            .count()
    }

    /// Counts keys that exist and are not expired at `now`, evicting any
    /// found expired along the way.
    pub fn exists(&self, now: SystemTime, keys: &[&[u8]]) -> usize {
        let mut entries = self.entries.write().unwrap();
        let mut n = 0;
        for k in keys {
            let expired = match entries.get(*k) {
                None => continue,
                Some(e) => e.is_expired(now),
            };
            if expired {
                entries.remove(*k);
            } else {
                n += 1;
            }
        }
        n
    }

    /// Sets a TTL in seconds on an existing key; `secs < 0` clears the TTL
    /// (persist). Returns false if the key is absent. A key found expired is
    /// evicted and counts as absent.
    pub fn expire(&self, now: SystemTime, key: &[u8], secs: i64) -> bool {
        let mut entries = self.entries.write().unwrap();
        let expired = match entries.get(key) {
            None => return false,
            Some(e) => e.is_expired(now),
        };
        if expired {
            entries.remove(key);
            return false;
        }
        if let Some(e) = entries.get_mut(key) {
            // A deadline past the end of SystemTime can never fire; store
            // it as no expiry instead of overflowing.
            e.expire_at = if secs < 0 {
                None
            } else {
                now.checked_add(Duration::from_secs(secs as u64))
            };
        }
        true
    }

    /// Remaining time-to-live in whole seconds.
    ///
    /// Redis semantics:
    ///   - -2: key does not exist
    ///   - -1: key exists but has no expiry
    pub fn ttl(&self, now: SystemTime, key: &[u8]) -> i64 {
        {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                None => return -2,
                Some(e) if !e.is_expired(now) => match e.expire_at {
                    None => return -1,
                    Some(at) => return remaining_secs(now, at),
                },
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write().unwrap();
        if let Some(e) = entries.get(key) {
            if !e.is_expired(now) {
                return match e.expire_at {
                    None => -1,
                    Some(at) => remaining_secs(now, at),
                };
            }
            entries.remove(key);
        }
        -2
    }

    /// Counters over non-expired keys at `now`. Expired leftovers are
    /// skipped, not evicted; the sweeper takes care of them.
    pub fn stats(&self, now: SystemTime) -> Stats {
        let entries = self.entries.read().unwrap();

        let mut stats = Stats {
            keys: 0,
            expires: 0,
            avg_ttl_ms: 0,
        };
        let mut ttl_sum = Duration::ZERO;
        let mut ttl_count = 0u32;

        for e in entries.values() {
            if e.is_expired(now) {
                continue;
            }
            stats.keys += 1;
            if let Some(at) = e.expire_at {
                stats.expires += 1;
                if let Ok(remaining) = at.duration_since(now) {
                    ttl_sum += remaining;
                    ttl_count += 1;
                }
            }
        }
        if ttl_count > 0 {
            stats.avg_ttl_ms = (ttl_sum.as_millis() / ttl_count as u128) as i64;
        }
        stats
    }

    /// Full scan evicting every entry whose expiry is not after `now`.
    /// O(n), meant for the periodic background sweep.
    pub fn clean_up_expired(&self, now: SystemTime) {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|_, e| !e.is_expired(now));
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn remaining_secs(now: SystemTime, expire_at: SystemTime) -> i64 {
    match expire_at.duration_since(now) {
        Ok(d) => d.as_secs() as i64,
        Err(_) => 0,
    }
}
