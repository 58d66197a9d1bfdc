//! Session-scoped serialization of assistant provisioning.
//!
//! Concurrent uploads from one session that both arrive without handles
//! would otherwise each create an assistant and a vector store. Callers
//! sharing a session key queue on one async mutex; whoever goes second
//! reuses the pair the first one produced.
//!
//! Entries are bounded: sessions idle past the ttl are dropped, and the
//! least recently touched idle session goes first once capacity is reached.
//! A slot some caller still holds is never evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use ragway_core::config::{DEFAULT_SESSION_CAPACITY, DEFAULT_SESSION_TTL};
use ragway_core::Result;

use super::ResourceManager;
use crate::types::{non_empty, AssistantResources};

type Slot = Arc<tokio::sync::Mutex<Option<AssistantResources>>>;

struct Entry {
    slot: Slot,
    touched: Instant,
}

impl Entry {
    fn idle(&self) -> bool {
        Arc::strong_count(&self.slot) == 1
    }
}

/// Resolved resources per session key.
pub struct SessionRegistry {
    slots: Mutex<HashMap<String, Entry>>,
    capacity: usize,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_limits(DEFAULT_SESSION_CAPACITY, DEFAULT_SESSION_TTL)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Slot for `session`, evicting stale entries first.
    fn checkout(&self, session: &str) -> Slot {
        let now = Instant::now();
        let mut slots = self.slots.lock();

        let before = slots.len();
        slots.retain(|key, entry| {
            key == session || !entry.idle() || now.duration_since(entry.touched) < self.ttl
        });

        while slots.len() >= self.capacity && !slots.contains_key(session) {
            let oldest = slots
                .iter()
                .filter(|(_, entry)| entry.idle())
                .min_by_key(|(_, entry)| entry.touched)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    slots.remove(&key);
                }
                None => break,
            }
        }
        if slots.len() < before {
            debug!(evicted = before - slots.len(), "Evicted idle sessions");
        }

        let entry = slots.entry(session.to_string()).or_insert_with(|| Entry {
            slot: Slot::default(),
            touched: now,
        });
        entry.touched = now;
        entry.slot.clone()
    }

    /// [`ResourceManager::ensure`], serialized per session.
    ///
    /// Handles passed by the caller win; without them the last pair resolved
    /// for this session is revalidated instead of creating a new one.
    pub async fn ensure(
        &self,
        session: &str,
        manager: &ResourceManager,
        assistant_id: Option<&str>,
        vector_store_id: Option<&str>,
    ) -> Result<AssistantResources> {
        let slot = self.checkout(session);
        let mut resolved = slot.lock().await;

        let (assistant_id, vector_store_id) = match (non_empty(assistant_id), resolved.as_ref()) {
            (Some(a), _) => (Some(a.to_string()), non_empty(vector_store_id).map(str::to_string)),
            (None, Some(cached)) => {
                debug!("Reusing resources resolved earlier in this session");
                (
                    Some(cached.assistant_id.clone()),
                    Some(cached.vector_store_id.clone()),
                )
            }
            (None, None) => (None, None),
        };

        let resources = manager
            .ensure(assistant_id.as_deref(), vector_store_id.as_deref())
            .await?;
        *resolved = Some(resources.clone());
        drop(resolved);
        if let Some(entry) = self.slots.lock().get_mut(session) {
            entry.touched = Instant::now();
        }
        Ok(resources)
    }

    /// Drop the remembered pair for a session.
    pub fn forget(&self, session: &str) {
        self.slots.lock().remove(session);
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

/// Derive a session key without keeping the raw credential around.
pub fn session_key(api_key: &str, session_id: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    if let Some(id) = non_empty(session_id) {
        hasher.update(b"\0");
        hasher.update(id.as_bytes());
    }
    hex::encode(hasher.finalize())
}
