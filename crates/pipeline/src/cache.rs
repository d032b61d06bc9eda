//! Audio job cache
//!
//! Keeps recent generation results addressable by job id for download and
//! playback. Bounded two ways:
//! - entries older than the TTL are unreachable (removed on the next `put`,
//!   or on the `get` that finds them expired)
//! - after the sweep, the oldest-inserted entries are evicted until the cache
//!   is at capacity
//!
//! Reads never refresh an entry's age or eviction position. All state lives
//! behind one mutex, so no caller observes a half-swept cache.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use voicegate_core::{AudioJob, JobId};

/// Time source for expiry decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

struct Entry {
    job: Arc<AudioJob>,
    inserted_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<JobId, Entry>,
    /// Insertion order, oldest first; also age order
    order: VecDeque<JobId>,
}

impl Inner {
    fn remove(&mut self, id: &JobId) -> Option<Entry> {
        let entry = self.entries.remove(id)?;
        if let Some(pos) = self.order.iter().position(|o| o == id) {
            self.order.remove(pos);
        }
        Some(entry)
    }
}

/// TTL and capacity bounded store of generated audio
pub struct AudioJobCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl AudioJobCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self::with_clock(ttl, capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
            capacity: capacity.max(1),
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert or overwrite a job, then sweep expired and evict the oldest
    ///
    /// An overwritten id counts as newly inserted.
    pub fn put(&self, id: JobId, samples: Vec<f32>, sample_rate: u32) -> Arc<AudioJob> {
        let now = self.clock.now();
        let job = Arc::new(AudioJob::new(id, samples, sample_rate));

        let (expired, evicted, len) = {
            let mut inner = self.inner.lock();
            inner.remove(&id);

            let mut expired = 0usize;
            while let Some(oldest) = inner.order.front().copied() {
                let is_expired = inner
                    .entries
                    .get(&oldest)
                    .map_or(true, |e| now.saturating_duration_since(e.inserted_at) > self.ttl);
                if !is_expired {
                    break;
                }
                inner.order.pop_front();
                inner.entries.remove(&oldest);
                expired += 1;
            }

            inner.entries.insert(
                id,
                Entry {
                    job: Arc::clone(&job),
                    inserted_at: now,
                },
            );
            inner.order.push_back(id);

            let mut evicted = 0usize;
            while inner.entries.len() > self.capacity {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.entries.remove(&oldest);
                evicted += 1;
            }

            (expired, evicted, inner.entries.len())
        };

        if expired > 0 {
            metrics::counter!("voicegate_cache_evictions_total", "reason" => "ttl")
                .increment(expired as u64);
        }
        if evicted > 0 {
            metrics::counter!("voicegate_cache_evictions_total", "reason" => "capacity")
                .increment(evicted as u64);
        }
        metrics::gauge!("voicegate_cache_entries").set(len as f64);
        tracing::debug!(
            job_id = %id,
            entries = len,
            expired,
            evicted,
            "Cached audio job"
        );

        job
    }

    /// Look up a job; an expired entry is removed and reported missing
    pub fn get(&self, id: &JobId) -> Option<Arc<AudioJob>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let expired = {
            let entry = inner.entries.get(id)?;
            now.saturating_duration_since(entry.inserted_at) > self.ttl
        };
        if expired {
            inner.remove(id);
            tracing::debug!(job_id = %id, "Audio job expired on read");
            return None;
        }
        inner.entries.get(id).map(|e| Arc::clone(&e.job))
    }

    /// Explicitly delete a job; true if it was present
    pub fn remove(&self, id: &JobId) -> bool {
        self.inner.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
