use serde::{Deserialize, Serialize};

/// Dispute statuses after which no further unread accrual is expected.
pub const TERMINAL_DISPUTE_STATUSES: &[&str] = &["resolved", "resolved_refund", "resolved_release"];

/// Quotes in this status hand their notifications over to the transaction
/// created from them.
pub const QUOTE_STATUS_ACCEPTED: &str = "accepted";

pub const TAB_PENDING: &str = "pending";
pub const TAB_BLOCKED: &str = "blocked";
pub const TAB_DISPUTED: &str = "disputed";
pub const TAB_COMPLETED: &str = "completed";
pub const TRANSACTION_TABS: &[&str] = &[TAB_PENDING, TAB_BLOCKED, TAB_DISPUTED, TAB_COMPLETED];

pub const QUOTE_TAB_SENT: &str = "sent";
pub const QUOTE_TAB_RECEIVED: &str = "received";

/// Transaction projection the resolver consumes. `conversation_id` is absent
/// until the first message creates the thread.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionSummary {
    pub transaction_id: String,
    pub seller_id: String,
    pub buyer_id: Option<String>,
    pub status: String,
    pub conversation_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuoteSummary {
    pub quote_id: String,
    pub seller_id: String,
    pub client_id: String,
    pub status: String,
    pub conversation_id: Option<String>,
}

/// Dispute projection. Seller and buyer come from the disputed transaction;
/// the reporter may be either of them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisputeSummary {
    pub dispute_id: String,
    pub transaction_id: String,
    pub reporter_id: String,
    pub seller_id: String,
    pub buyer_id: String,
    pub status: String,
    pub conversation_id: String,
}

pub fn is_terminal_dispute_status(status: &str) -> bool {
    TERMINAL_DISPUTE_STATUSES.contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_cover_all_resolution_outcomes() {
        assert!(is_terminal_dispute_status("resolved"));
        assert!(is_terminal_dispute_status("resolved_refund"));
        assert!(is_terminal_dispute_status("resolved_release"));
        assert!(!is_terminal_dispute_status("open"));
        assert!(!is_terminal_dispute_status("under_review"));
    }
}
