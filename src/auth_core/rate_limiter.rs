//! Login rate limiting: the trait seam plus the sliding-window limiter.

use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use super::types::AuthError;

/// Trait for rate limiting by a given key (e.g. the presented username).
#[async_trait]
pub trait RateLimiter: Send + Sync + 'static {
    /// Attempts to record one attempt for the specified key.
    /// Returns Ok(true) if allowed, Ok(false) if rate-limited, or Err on
    /// internal error.
    async fn consume(&self, key: &str) -> Result<bool, AuthError>;
}

/// Attempt budget and window for [`SlidingWindowLimiter`].
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Total admitted attempts per window, including the first.
    pub attempts: u32,
    /// Inactivity span after which an identity's record is forgotten.
    pub window: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        LimiterConfig {
            attempts: 5,
            window: Duration::from_secs(69),
        }
    }
}

impl LimiterConfig {
    /// Overrides the attempt budget.
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Overrides the inactivity window.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

struct Record {
    count: u32,
    deadline: Instant,
    /// Sequence of the newest accepted challenge; queue items carrying an
    /// older sequence for this identity are stale.
    seq: u64,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Record>,
    /// Identities in activity order, oldest first. Refreshing an identity
    /// pushes a new (id, seq) pair instead of reordering in place.
    queue: VecDeque<(String, u64)>,
    next_seq: u64,
}

struct Shared {
    state: Mutex<State>,
    /// Capacity-1 wakeup for the empty-to-non-empty transition.
    wake: Notify,
    stop: Notify,
}

/// Per-identity sliding attempt counter guarding the password grant.
///
/// Each identity gets a fixed budget of admitted attempts within a rolling
/// inactivity window; every accepted challenge refreshes the window. A single
/// background reaper task reclaims expired records: it watches the
/// least-recently-active entry, sleeps on its deadline without holding the
/// lock, and drops the entry only if no newer challenge arrived meanwhile.
/// With an empty table the reaper parks on a notification, consuming no CPU.
pub struct SlidingWindowLimiter {
    shared: Arc<Shared>,
    config: LimiterConfig,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl SlidingWindowLimiter {
    /// Builds a limiter with the default budget and window and spawns its
    /// reaper task. Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::with_config(LimiterConfig::default())
    }

    pub fn with_config(config: LimiterConfig) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            wake: Notify::new(),
            stop: Notify::new(),
        });
        let reaper = tokio::spawn(reap(shared.clone()));
        SlidingWindowLimiter {
            shared,
            config,
            reaper: Mutex::new(Some(reaper)),
        }
    }

    /// Records one attempt for `id`. Returns true when the attempt is
    /// admitted, false when the identity's budget for the current window is
    /// exhausted. Refused attempts do not refresh the window. Never blocks
    /// beyond the internal mutex.
    pub fn challenge(&self, id: &str) -> bool {
        let was_empty;
        {
            let mut guard = self.shared.state.lock().unwrap();
            let state = &mut *guard;
            was_empty = state.entries.is_empty();
            let deadline = Instant::now() + self.config.window;
            let seq = state.next_seq;
            match state.entries.entry(id.to_owned()) {
                Entry::Occupied(mut occupied) => {
                    let record = occupied.get_mut();
                    if record.count >= self.config.attempts {
                        return false;
                    }
                    record.count += 1;
                    record.deadline = deadline;
                    record.seq = seq;
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(Record {
                        count: 1,
                        deadline,
                        seq,
                    });
                }
            }
            state.next_seq += 1;
            state.queue.push_back((id.to_owned(), seq));
        }
        if was_empty {
            self.shared.wake.notify_one();
        }
        true
    }

    /// Stops the reaper task and waits for it to finish. Must not race with
    /// further `challenge` calls.
    pub async fn end(&self) {
        self.shared.stop.notify_one();
        let handle = self.reaper.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SlidingWindowLimiter {
    fn drop(&mut self) {
        if let Some(handle) = self.reaper.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn consume(&self, key: &str) -> Result<bool, AuthError> {
        Ok(self.challenge(key))
    }
}

async fn reap(shared: Arc<Shared>) {
    loop {
        // Oldest live queue item, discarding stale pairs superseded by a
        // newer challenge for the same identity.
        let next = {
            let mut guard = shared.state.lock().unwrap();
            let state = &mut *guard;
            let mut next = None;
            while let Some((id, seq)) = state.queue.front().cloned() {
                let deadline = state
                    .entries
                    .get(&id)
                    .filter(|record| record.seq == seq)
                    .map(|record| record.deadline);
                match deadline {
                    Some(deadline) => {
                        next = Some((id, seq, deadline));
                        break;
                    }
                    None => {
                        state.queue.pop_front();
                    }
                }
            }
            next
        };
        match next {
            None => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = shared.stop.notified() => return,
                }
            }
            Some((id, seq, deadline)) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = shared.stop.notified() => return,
                }
                let mut guard = shared.state.lock().unwrap();
                let state = &mut *guard;
                if state.entries.get(&id).is_some_and(|r| r.seq == seq) {
                    // No challenge arrived while we slept; the window elapsed.
                    state.entries.remove(&id);
                    trace!(identity = %id, "login window elapsed, record dropped");
                }
                if state
                    .queue
                    .front()
                    .is_some_and(|(qid, qseq)| *qid == id && *qseq == seq)
                {
                    state.queue.pop_front();
                }
            }
        }
    }
}
