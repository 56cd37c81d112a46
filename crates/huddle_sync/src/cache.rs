//! Pure in-memory cache keyed by [`QueryIdentity`].
//!
//! No network, no timers, no locks: callers pass the current instant in and
//! the surrounding engine serializes access. That keeps every state
//! transition independently testable.

use std::collections::HashMap;

use tokio::time::Instant;
use tracing::trace;

use huddle_common::{ChatMessage, DomainValue, QueryIdentity};

/// Fetch status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Created but never fetched.
    Idle,
    /// A fetch is in flight (possibly with stale data still served).
    Loading,
    /// Data present and current as of `last_fetched_at`.
    Ready,
    /// Last fetch failed; data from the previous ready state is retained.
    Error,
}

/// One cached view of remote data.
///
/// Invariants: `Ready` implies `data` and `last_fetched_at` are present;
/// `Error` retains the previous ready `data` (stale-while-error) alongside
/// the error string.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Option<DomainValue>,
    pub state: FetchState,
    pub last_fetched_at: Option<Instant>,
    pub error: Option<String>,
}

impl CacheEntry {
    fn idle() -> Self {
        Self { data: None, state: FetchState::Idle, last_fetched_at: None, error: None }
    }

    /// Whether the entry may be served without a refetch at `now`.
    pub fn is_fresh(&self, id: &QueryIdentity, now: Instant) -> bool {
        self.state == FetchState::Ready
            && self
                .last_fetched_at
                .is_some_and(|at| now.duration_since(at) < id.stale_ttl())
    }
}

/// Reference-counted store of cache entries.
///
/// Entries are owned by the scopes that reference them; when the last
/// reference is released the entry is evicted, so a fetch completing for an
/// unreferenced identity has nowhere to write and is simply dropped.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: HashMap<QueryIdentity, CacheEntry>,
    refs: HashMap<QueryIdentity, usize>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, id: &QueryIdentity) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    /// Whether any live scope references this identity.
    pub fn is_referenced(&self, id: &QueryIdentity) -> bool {
        self.refs.get(id).copied().unwrap_or(0) > 0
    }

    /// Add a scope reference, creating an idle entry on first use.
    pub fn retain(&mut self, id: &QueryIdentity) {
        *self.refs.entry(id.clone()).or_insert(0) += 1;
        self.entries.entry(id.clone()).or_insert_with(CacheEntry::idle);
    }

    /// Drop a scope reference, evicting the entry when none remain.
    pub fn release(&mut self, id: &QueryIdentity) {
        let remaining = match self.refs.get_mut(id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };
        if remaining == 0 {
            self.refs.remove(id);
            self.entries.remove(id);
            trace!("[huddle_sync] evicted cache entry {id}");
        }
    }

    /// Transition an entry to `Loading`, keeping whatever data it holds.
    pub fn mark_loading(&mut self, id: &QueryIdentity) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.state = FetchState::Loading;
        }
    }

    /// Record a successful fetch. Returns `false` when the identity is no
    /// longer referenced and the result was dropped instead of written.
    pub fn put_ready(&mut self, id: &QueryIdentity, data: DomainValue, now: Instant) -> bool {
        if !self.is_referenced(id) {
            trace!("[huddle_sync] dropping fetch result for unreferenced {id}");
            return false;
        }
        let entry = self.entries.entry(id.clone()).or_insert_with(CacheEntry::idle);
        entry.data = Some(data);
        entry.state = FetchState::Ready;
        entry.last_fetched_at = Some(now);
        entry.error = None;
        true
    }

    /// Record a failed fetch, retaining the previous ready data.
    pub fn put_error(&mut self, id: &QueryIdentity, error: String) -> bool {
        if !self.is_referenced(id) {
            return false;
        }
        let entry = self.entries.entry(id.clone()).or_insert_with(CacheEntry::idle);
        entry.state = FetchState::Error;
        entry.error = Some(error);
        true
    }

    /// Stale-while-revalidate invalidation: a `Ready` entry goes back to
    /// `Loading` with its last good data still readable.
    pub fn invalidate(&mut self, id: &QueryIdentity) {
        if let Some(entry) = self.entries.get_mut(id) {
            if entry.state == FetchState::Ready {
                entry.state = FetchState::Loading;
            }
        }
    }

    /// Remove an entry outright, regardless of reference count.
    pub fn evict(&mut self, id: &QueryIdentity) {
        self.refs.remove(id);
        self.entries.remove(id);
    }

    /// Append-in-place fast path for the chat log.
    ///
    /// Only applies when the entry is `Ready`; duplicate message ids are
    /// no-ops and ordering by `created_at` is preserved on insertion.
    /// Returns `true` when the message was appended.
    pub fn append_chat_message(&mut self, id: &QueryIdentity, message: ChatMessage) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        if entry.state != FetchState::Ready {
            return false;
        }
        let Some(DomainValue::Chat(messages)) = entry.data.as_mut() else {
            return false;
        };
        if messages.iter().any(|m| m.id == message.id) {
            trace!("[huddle_sync] duplicate chat message {} ignored", message.id);
            return false;
        }
        let pos = messages
            .iter()
            .position(|m| m.created_at > message.created_at)
            .unwrap_or(messages.len());
        messages.insert(pos, message);
        true
    }
}
