//! Session state storage for the gateway.
//!
//! Each session id maps to one [`SessionEntry`]: the session key plus the
//! last frame counter the gateway accepted. Keeping both in one entry means
//! a frame check, a rebind and a close on the same id are serialized against
//! each other. [`MemorySessionStore`] is the in-process default; anything
//! shared between gateway replicas (a cache service, a database) implements
//! the same trait.

use std::fmt;
use std::str::FromStr;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::kdf::SessionKey;

// ---------------------------------------------------------------------------
// Session identifier
// ---------------------------------------------------------------------------

/// Opaque session identifier (UUIDv4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// A fresh random (v4) identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an identifier received over the wire.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Everything the gateway keeps for one bound session.
#[derive(Clone)]
pub struct SessionEntry {
    pub key: SessionKey,
    /// Highest counter accepted so far. Only tracked under
    /// [`CounterPolicy::StrictlyIncreasing`](crate::config::CounterPolicy).
    pub last_ctr: Option<u64>,
}

impl SessionEntry {
    /// A freshly bound session with no counter history.
    pub fn new(key: SessionKey) -> Self {
        Self { key, last_ctr: None }
    }
}

impl fmt::Debug for SessionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEntry")
            .field("last_ctr", &self.last_ctr)
            .finish_non_exhaustive()
    }
}

/// Keyed storage for session state.
///
/// Implementations must be safe to call from many threads at once, and
/// every method must act on the whole entry atomically: an `update` that is
/// running when `put` or `delete` arrives for the same id either finishes
/// first or never sees the entry.
pub trait SessionStore: Send + Sync {
    /// Copy of the session key, if the id is bound.
    fn get(&self, id: &SessionId) -> Option<SessionKey>;

    /// Last accepted counter, if the id is bound and has one.
    fn last_counter(&self, id: &SessionId) -> Option<u64>;

    /// Bind `key` under `id`, replacing any existing entry and its counter.
    fn put(&self, id: SessionId, key: SessionKey);

    /// Returns whether an entry was present.
    fn delete(&self, id: &SessionId) -> bool;

    /// Run `f` on the entry for `id` while holding it exclusively.
    ///
    /// Returns `false` without calling `f` if the id is not bound.
    fn update(&self, id: &SessionId, f: &mut dyn FnMut(&mut SessionEntry)) -> bool;
}

/// In-memory store backed by a sharded [`DashMap`].
///
/// `update` holds the entry's shard lock while `f` runs, so a concurrent
/// `put` or `delete` on the same id waits for it.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: DashMap<SessionId, SessionEntry>,
}

impl MemorySessionStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound sessions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no session is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, id: &SessionId) -> Option<SessionKey> {
        self.entries.get(id).map(|entry| entry.key.clone())
    }

    fn last_counter(&self, id: &SessionId) -> Option<u64> {
        self.entries.get(id).and_then(|entry| entry.last_ctr)
    }

    fn put(&self, id: SessionId, key: SessionKey) {
        self.entries.insert(id, SessionEntry::new(key));
    }

    fn delete(&self, id: &SessionId) -> bool {
        self.entries.remove(id).is_some()
    }

    fn update(&self, id: &SessionId, f: &mut dyn FnMut(&mut SessionEntry)) -> bool {
        match self.entries.get_mut(id) {
            Some(mut entry) => {
                f(entry.value_mut());
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySessionStore")
            .field("sessions", &self.entries.len())
            .finish()
    }
}
