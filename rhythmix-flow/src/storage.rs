use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{FlowError, Result};

/// Where a session stands relative to its workflow's steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Position {
    NotStarted,
    /// Paused right after `step` completed.
    AtInterrupt { step: String },
    Completed,
}

/// Persisted snapshot of a paused session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: String,
    pub workflow_id: String,
    pub position: Position,
    pub state: Value,
    /// Bumped on every write; the token for compare-and-delete/swap.
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

pub(crate) fn expiry_from(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| FlowError::StorageError(format!("checkpoint ttl out of range: {}", e)))?;
    Ok(now + ttl)
}

/// Durable key-value persistence for paused sessions.
///
/// Entries past `expires_at` must read as absent whether or not they have
/// been physically removed yet.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Write (or atomically overwrite) the checkpoint for `session_id`.
    async fn put(
        &self,
        session_id: &str,
        workflow_id: &str,
        position: Position,
        state: Value,
        ttl: Duration,
    ) -> Result<Checkpoint>;

    async fn get(&self, session_id: &str) -> Result<Option<Checkpoint>>;

    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Atomically remove and return the checkpoint if it is live and still at
    /// `revision`. A caller that loses a race gets `None`.
    async fn compare_and_delete(
        &self,
        session_id: &str,
        revision: i64,
    ) -> Result<Option<Checkpoint>>;

    /// Atomically replace a live checkpoint still at `revision`.
    async fn compare_and_swap(
        &self,
        session_id: &str,
        revision: i64,
        position: Position,
        state: Value,
        ttl: Duration,
    ) -> Result<Option<Checkpoint>>;

    /// Physically drop expired entries, returning how many went.
    async fn purge_expired(&self) -> Result<u64>;
}

/// In-memory implementation of CheckpointStore
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Arc<DashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            checkpoints: Arc::new(DashMap::new()),
        }
    }

    /// Number of physically present entries, expired ones included
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn put(
        &self,
        session_id: &str,
        workflow_id: &str,
        position: Position,
        state: Value,
        ttl: Duration,
    ) -> Result<Checkpoint> {
        let now = Utc::now();
        let mut checkpoint = Checkpoint {
            session_id: session_id.to_string(),
            workflow_id: workflow_id.to_string(),
            position,
            state,
            revision: 1,
            created_at: now,
            expires_at: expiry_from(now, ttl)?,
        };

        match self.checkpoints.entry(session_id.to_string()) {
            Entry::Occupied(mut existing) => {
                checkpoint.revision = existing.get().revision + 1;
                existing.insert(checkpoint.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(checkpoint.clone());
            }
        }
        Ok(checkpoint)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        let now = Utc::now();
        // Clone out first: removing while a shard guard is held would deadlock.
        let found = self.checkpoints.get(session_id).map(|entry| entry.clone());
        match found {
            Some(checkpoint) if checkpoint.is_expired_at(now) => {
                self.checkpoints
                    .remove_if(session_id, |_, stored| stored.is_expired_at(now));
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.checkpoints.remove(session_id);
        Ok(())
    }

    async fn compare_and_delete(
        &self,
        session_id: &str,
        revision: i64,
    ) -> Result<Option<Checkpoint>> {
        let now = Utc::now();
        Ok(self
            .checkpoints
            .remove_if(session_id, |_, stored| {
                stored.revision == revision && !stored.is_expired_at(now)
            })
            .map(|(_, checkpoint)| checkpoint))
    }

    async fn compare_and_swap(
        &self,
        session_id: &str,
        revision: i64,
        position: Position,
        state: Value,
        ttl: Duration,
    ) -> Result<Option<Checkpoint>> {
        let now = Utc::now();
        let expires_at = expiry_from(now, ttl)?;
        match self.checkpoints.get_mut(session_id) {
            Some(mut stored) if stored.revision == revision && !stored.is_expired_at(now) => {
                stored.position = position;
                stored.state = state;
                stored.revision += 1;
                stored.created_at = now;
                stored.expires_at = expires_at;
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut purged = 0;
        self.checkpoints.retain(|_, stored| {
            let keep = !stored.is_expired_at(now);
            if !keep {
                purged += 1;
            }
            keep
        });
        Ok(purged)
    }
}
