use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use super::auth::STATE_TTL_SECS;

/// Upper bound on outstanding authorization attempts kept in memory.
pub(crate) const MAX_PENDING_STATES: usize = 10_000;

/// Outstanding authorization states, oldest first.
///
/// `order` may still hold entries already consumed through [`take`](Self::take);
/// they are skipped when popped and compacted away once the queue grows past
/// twice the capacity.
#[derive(Debug)]
pub(crate) struct PendingStates {
    issued: HashMap<String, DateTime<Utc>>,
    order: VecDeque<(String, DateTime<Utc>)>,
    capacity: usize,
}

impl PendingStates {
    pub(crate) fn new(capacity: usize) -> Self {
        PendingStates {
            issued: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.issued.len()
    }

    /// Records `state`, dropping expired entries and, at capacity, the oldest.
    pub(crate) fn insert(&mut self, state: String, now: DateTime<Utc>) {
        self.prune(now);

        let mut evicted = 0;
        while self.issued.len() >= self.capacity && self.evict_oldest() {
            evicted += 1;
        }
        if evicted > 0 {
            tracing::warn!(dropped = evicted, "Pending authorization limit reached");
        }

        self.issued.insert(state.clone(), now);
        self.order.push_back((state, now));

        if self.order.len() > self.capacity.saturating_mul(2) {
            let issued = &self.issued;
            self.order
                .retain(|(state, created_at)| issued.get(state) == Some(created_at));
        }
    }

    /// Removes `state`, returning when it was issued.
    pub(crate) fn take(&mut self, state: &str) -> Option<DateTime<Utc>> {
        self.issued.remove(state)
    }

    pub(crate) fn prune(&mut self, now: DateTime<Utc>) {
        let ttl = Duration::seconds(STATE_TTL_SECS);
        while self
            .order
            .front()
            .is_some_and(|(_, created_at)| now - *created_at > ttl)
        {
            if let Some((state, created_at)) = self.order.pop_front() {
                self.forget(&state, created_at);
            }
        }
    }

    fn evict_oldest(&mut self) -> bool {
        while let Some((state, created_at)) = self.order.pop_front() {
            if self.forget(&state, created_at) {
                return true;
            }
        }
        false
    }

    /// Drops `state` only if it is still the entry issued at `created_at`.
    fn forget(&mut self, state: &str, created_at: DateTime<Utc>) -> bool {
        if self.issued.get(state) == Some(&created_at) {
            self.issued.remove(state);
            true
        } else {
            false
        }
    }
}
