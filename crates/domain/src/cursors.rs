use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ports::cursors::ReadCursorRepository;
use crate::util::{format_ms_rfc3339, now_ms};
use crate::DomainResult;

/// One row per (user, conversation). Upserts replace rather than append.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadCursor {
    pub user_id: String,
    pub conversation_id: String,
    pub last_read_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Source of truth for read state. Writes are best-effort: a failed upsert is
/// logged and swallowed, never surfaced to the caller's UI path.
#[derive(Clone)]
pub struct ReadCursorStore {
    repository: Arc<dyn ReadCursorRepository>,
}

impl ReadCursorStore {
    pub fn new(repository: Arc<dyn ReadCursorRepository>) -> Self {
        Self { repository }
    }

    pub async fn get_cursor(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> DomainResult<Option<ReadCursor>> {
        self.repository.get(user_id, conversation_id).await
    }

    /// Batched lookup; one round-trip regardless of list size. Empty input
    /// returns an empty map without touching the repository.
    pub async fn get_cursors(
        &self,
        user_id: &str,
        conversation_ids: &[String],
    ) -> DomainResult<HashMap<String, ReadCursor>> {
        if conversation_ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.repository.get_many(user_id, conversation_ids).await
    }

    /// Upsert the cursor for (user, conversation). Last writer wins by write
    /// arrival, not by comparing timestamps: a later mark always replaces the
    /// stored value even when it carries an earlier `last_read_at_ms`.
    ///
    /// Returns whether the write was confirmed. Failures are logged at warn
    /// and reported as `false`; callers must not treat that as an error.
    pub async fn mark(&self, user_id: &str, conversation_id: &str, last_read_at_ms: i64) -> bool {
        let cursor = ReadCursor {
            user_id: user_id.to_string(),
            conversation_id: conversation_id.to_string(),
            last_read_at_ms,
            updated_at_ms: now_ms(),
        };
        match self.repository.upsert(&cursor).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    user_id = %user_id,
                    conversation_id = %conversation_id,
                    last_read_at = %format_ms_rfc3339(last_read_at_ms),
                    "read cursor upsert failed; mark-as-read is best-effort"
                );
                false
            }
        }
    }
}
