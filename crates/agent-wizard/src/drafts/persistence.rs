//! Draft snapshots that survive a reload within the same session.
//!
//! Storage and parse failures never reach the user: a corrupt snapshot is
//! deleted and treated as absent, and failed writes are logged.

use std::fmt;
use std::sync::Arc;

use super::storage::DraftStorage;
use crate::error::StorageError;
use crate::model::AgentDraft;
use crate::store::DraftObserver;

const KEY_PREFIX: &str = "agent-draft";

/// Which draft a snapshot belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SnapshotKey {
    /// Unsaved edits to an existing agent.
    Agent(String),
    /// The single in-progress creation draft.
    Create,
}

impl SnapshotKey {
    pub fn storage_key(&self) -> String {
        match self {
            SnapshotKey::Agent(id) => format!("{KEY_PREFIX}:{id}"),
            SnapshotKey::Create => format!("{KEY_PREFIX}:create"),
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Key for an agent being edited, or the creation draft when `None`.
pub fn snapshot_key_for(agent_id: Option<&str>) -> SnapshotKey {
    match agent_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => SnapshotKey::Agent(id.to_string()),
        None => SnapshotKey::Create,
    }
}

#[derive(Clone)]
pub struct DraftPersistence {
    storage: Arc<dyn DraftStorage>,
}

impl fmt::Debug for DraftPersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DraftPersistence").finish_non_exhaustive()
    }
}

impl DraftPersistence {
    pub fn new(storage: Arc<dyn DraftStorage>) -> Self {
        Self { storage }
    }

    pub fn save(&self, key: &SnapshotKey, draft: &AgentDraft) -> Result<(), StorageError> {
        let json = serde_json::to_string(draft)?;
        self.storage.set(&key.storage_key(), &json)?;
        tracing::trace!("saved snapshot {} ({} bytes)", key, json.len());
        Ok(())
    }

    /// The stored draft, or `None` when absent, unreadable or corrupt.
    pub fn load(&self, key: &SnapshotKey) -> Option<AgentDraft> {
        let raw = match self.storage.get(&key.storage_key()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("failed to read snapshot {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str::<AgentDraft>(&raw) {
            Ok(draft) => {
                tracing::debug!("restored snapshot {}", key);
                Some(draft)
            }
            Err(e) => {
                tracing::warn!("discarding corrupt snapshot {}: {}", key, e);
                self.clear(key);
                None
            }
        }
    }

    /// Remove a snapshot; safe to call when none exists.
    pub fn clear(&self, key: &SnapshotKey) {
        if let Err(e) = self.storage.remove(&key.storage_key()) {
            tracing::warn!("failed to clear snapshot {}: {}", key, e);
        }
    }

    /// Snapshot to start a screen from. A fresh start clears any existing
    /// snapshot; otherwise a snapshot beats every other data source.
    pub fn mount(&self, key: &SnapshotKey, fresh: bool) -> Option<AgentDraft> {
        if fresh {
            tracing::debug!("fresh start requested; clearing {}", key);
            self.clear(key);
            return None;
        }
        self.load(key)
    }

    /// Store observer that saves every change under `key`.
    pub fn observer(&self, key: SnapshotKey) -> PersistOnChange {
        PersistOnChange {
            persistence: self.clone(),
            key,
        }
    }
}

/// Mirrors each store mutation into storage.
#[derive(Debug)]
pub struct PersistOnChange {
    persistence: DraftPersistence,
    key: SnapshotKey,
}

impl DraftObserver for PersistOnChange {
    fn on_change(&self, draft: &AgentDraft) {
        if let Err(e) = self.persistence.save(&self.key, draft) {
            tracing::warn!("failed to save snapshot {}: {}", self.key, e);
        }
    }
}
