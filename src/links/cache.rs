//! Time-windowed dedup of (link, room) sightings.
//!
//! Entries are never refreshed: a link seen again inside its window is
//! suppressed, and the window still ends one TTL after the *first* sighting.
//! Expired entries are swept lazily from an expiry-ordered queue on every
//! access, so no timer task is spawned per entry. In-memory only; a restart
//! forgets everything.

use super::types::DedupKey;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);

#[derive(Default)]
struct CacheState {
    entries: HashMap<DedupKey, Instant>,
    /// (expires_at, key), oldest first.
    expiry: VecDeque<(Instant, DedupKey)>,
}

impl CacheState {
    fn sweep(&mut self, now: Instant) {
        while let Some((expires_at, _)) = self.expiry.front() {
            if *expires_at > now {
                break;
            }
            if let Some((expires_at, key)) = self.expiry.pop_front()
                && self.entries.get(&key) == Some(&expires_at)
            {
                self.entries.remove(&key);
            }
        }
    }

    fn is_live(&self, key: &DedupKey, now: Instant) -> bool {
        self.entries
            .get(key)
            .is_some_and(|expires_at| *expires_at > now)
    }
}

pub struct DedupCache {
    state: Mutex<CacheState>,
    window: Duration,
}

impl DedupCache {
    pub fn new(window: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.contains_at(key, Instant::now())
    }

    pub fn contains_at(&self, key: &DedupKey, now: Instant) -> bool {
        let mut state = self.lock();
        state.sweep(now);
        state.is_live(key, now)
    }

    /// Insert `key` unless it is already live. Returns `true` if inserted.
    pub fn insert(&self, key: DedupKey) -> bool {
        self.check_and_insert_at(key, Instant::now())
    }

    /// Atomic check-then-insert: `true` means the caller owns this sighting
    /// and should process it, `false` means it is a duplicate.
    pub fn check_and_insert(&self, key: DedupKey) -> bool {
        self.check_and_insert_at(key, Instant::now())
    }

    pub fn check_and_insert_at(&self, key: DedupKey, now: Instant) -> bool {
        let mut state = self.lock();
        state.sweep(now);
        if state.is_live(&key, now) {
            return false;
        }
        let expires_at = now + self.window;
        state.entries.insert(key.clone(), expires_at);
        state.expiry.push_back((expires_at, key));
        true
    }

    /// Number of live entries as of the last sweep.
    pub fn len(&self) -> usize {
        let mut state = self.lock();
        state.sweep(Instant::now());
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl std::fmt::Debug for DedupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupCache")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
