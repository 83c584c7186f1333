//! Session stores: where conversation state lives between turns.
//!
//! A store keeps one [`ConversationState`] per conversation id with
//! read-your-writes semantics. Completed and abandoned conversations are
//! archived rather than deleted, so they can still be loaded (and turns on
//! them rejected as already complete) after they leave the active set.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use vocaform_db::DbPool;
use vocaform_types::ConversationState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("state serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("form lookup failed: {0}")]
    Form(#[from] vocaform_forms::FormError),
    #[error("store task failed: {0}")]
    Task(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Why a conversation left the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveReason {
    Completed,
    Abandoned,
}

impl ArchiveReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    fn from_status(status: &str) -> Option<Self> {
        match status {
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a conversation, active or archived.
    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, StoreError>;

    /// Inserts or replaces the state. Archive status is left as it is.
    async fn save(&self, state: &ConversationState) -> Result<(), StoreError>;

    /// Moves an active conversation out of the active set. Returns `false`
    /// when it was unknown or already archived.
    async fn archive(
        &self,
        conversation_id: &str,
        reason: ArchiveReason,
    ) -> Result<bool, StoreError>;

    /// Why a conversation was archived, or `None` while it is active or
    /// unknown.
    async fn archive_reason(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ArchiveReason>, StoreError>;

    /// Active conversations whose last activity is strictly before `cutoff`.
    async fn list_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError>;
}

// ── in-memory ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Entry {
    state: ConversationState,
    archived: Option<ArchiveReason>,
}

/// Process-local store. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.entries
            .read()
            .map(|m| m.values().filter(|e| e.archived.is_none()).count())
            .unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("session map lock poisoned".to_string())
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, StoreError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(conversation_id).map(|e| e.state.clone()))
    }

    async fn save(&self, state: &ConversationState) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        match entries.get_mut(&state.conversation_id) {
            Some(entry) => entry.state = state.clone(),
            None => {
                entries.insert(
                    state.conversation_id.clone(),
                    Entry {
                        state: state.clone(),
                        archived: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn archive(
        &self,
        conversation_id: &str,
        reason: ArchiveReason,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        match entries.get_mut(conversation_id) {
            Some(entry) if entry.archived.is_none() => {
                entry.archived = Some(reason);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn archive_reason(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ArchiveReason>, StoreError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(conversation_id).and_then(|e| e.archived))
    }

    async fn list_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.read().map_err(poisoned)?;
        let mut ids: Vec<String> = entries
            .values()
            .filter(|e| e.archived.is_none() && e.state.last_activity < cutoff)
            .map(|e| e.state.conversation_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

// ── sqlite ───────────────────────────────────────────────────────────

/// Timestamps are stored as fixed-width UTC RFC 3339 so that string
/// comparison in SQL orders them correctly.
fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// SQLite-backed store over the `conversations` table.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: DbPool,
}

impl SqliteSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, StoreError> {
        let id = conversation_id.to_string();
        let json: Option<String> = self
            .blocking(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT state_json FROM conversations WHERE conversation_id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;
        json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
            .transpose()
    }

    async fn save(&self, state: &ConversationState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        let id = state.conversation_id.clone();
        let form_id = state.form_id.clone();
        let response_id = state.response_id.clone();
        let last_activity = timestamp(state.last_activity);
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO conversations
                     (conversation_id, form_id, response_id, state_json, last_activity)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(conversation_id) DO UPDATE SET
                     state_json = excluded.state_json,
                     last_activity = excluded.last_activity",
                params![id, form_id, response_id, json, last_activity],
            )?;
            Ok(())
        })
        .await
    }

    async fn archive(
        &self,
        conversation_id: &str,
        reason: ArchiveReason,
    ) -> Result<bool, StoreError> {
        let id = conversation_id.to_string();
        let archived_at = timestamp(Utc::now());
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE conversations SET status = ?1, archived_at = ?2
                 WHERE conversation_id = ?3 AND status = 'active'",
                params![reason.as_str(), archived_at, id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn archive_reason(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ArchiveReason>, StoreError> {
        let id = conversation_id.to_string();
        let status: Option<String> = self
            .blocking(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT status FROM conversations WHERE conversation_id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;
        Ok(status.as_deref().and_then(ArchiveReason::from_status))
    }

    async fn list_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let cutoff = timestamp(cutoff);
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT conversation_id FROM conversations
                 WHERE status = 'active' AND last_activity < ?1
                 ORDER BY conversation_id",
            )?;
            let ids = stmt
                .query_map(params![cutoff], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(ids)
        })
        .await
    }
}
