use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::DomainResult;

const MAX_BODY_LENGTH: usize = 2_000;

/// Channel tags assigned to dispute messages. A message carrying one of these
/// belongs to a private admin channel rather than the public dispute thread.
pub const MSG_TYPE_SELLER_TO_ADMIN: &str = "seller_to_admin";
pub const MSG_TYPE_ADMIN_TO_SELLER: &str = "admin_to_seller";
pub const MSG_TYPE_BUYER_TO_ADMIN: &str = "buyer_to_admin";
pub const MSG_TYPE_ADMIN_TO_BUYER: &str = "admin_to_buyer";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    System,
    ProposalUpdate,
}

/// One chat line. Immutable once created; `created_at_ms` is assigned by the
/// persistence layer and is the authoritative ordering key.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub message_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub body: String,
    pub kind: MessageKind,
    /// Explicit recipient marker used by the dispute privacy channels.
    pub recipient_id: Option<String>,
    /// Channel tag (`seller_to_admin`, `admin_to_buyer`, ...). Absent on
    /// public-thread and legacy messages.
    pub message_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at_ms: i64,
}

pub fn validate_message_body(body: &str) -> DomainResult<()> {
    if body.is_empty() {
        return Err(DomainError::Validation("body is required".into()));
    }
    if body.chars().count() > MAX_BODY_LENGTH {
        return Err(DomainError::Validation(format!(
            "body exceeds max length of {MAX_BODY_LENGTH}"
        )));
    }
    Ok(())
}
