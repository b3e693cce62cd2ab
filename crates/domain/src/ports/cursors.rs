use std::collections::HashMap;

use crate::cursors::ReadCursor;
use crate::ports::BoxFuture;
use crate::DomainResult;

pub trait ReadCursorRepository: Send + Sync {
    fn get(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<ReadCursor>>>;

    /// Batched lookup, keyed by conversation id. Single round-trip regardless
    /// of list size.
    fn get_many(
        &self,
        user_id: &str,
        conversation_ids: &[String],
    ) -> BoxFuture<'_, DomainResult<HashMap<String, ReadCursor>>>;

    /// Conflict target (user_id, conversation_id); the incoming row replaces
    /// the stored one unconditionally.
    fn upsert(&self, cursor: &ReadCursor) -> BoxFuture<'_, DomainResult<ReadCursor>>;
}
