//! Client-side mirror of the server's visibility rules: for a user and a
//! category of parent entities, the set of conversation ids the aggregator
//! should scan. Pure over entity projections; no I/O of its own.

use std::collections::HashSet;

use crate::conversation::{
    is_terminal_dispute_status, DisputeSummary, QuoteSummary, TransactionSummary, QUOTE_STATUS_ACCEPTED,
    QUOTE_TAB_RECEIVED, QUOTE_TAB_SENT, TAB_BLOCKED, TAB_COMPLETED, TAB_DISPUTED, TAB_PENDING,
};

const PENDING_STATUSES: &[&str] = &["pending"];
const BLOCKED_STATUSES: &[&str] = &["paid", "funds_held"];
const DISPUTED_STATUSES: &[&str] = &["disputed"];
const COMPLETED_STATUSES: &[&str] = &["completed", "validated"];

pub fn transaction_tab_for_status(status: &str) -> Option<&'static str> {
    if PENDING_STATUSES.contains(&status) {
        Some(TAB_PENDING)
    } else if BLOCKED_STATUSES.contains(&status) {
        Some(TAB_BLOCKED)
    } else if DISPUTED_STATUSES.contains(&status) {
        Some(TAB_DISPUTED)
    } else if COMPLETED_STATUSES.contains(&status) {
        Some(TAB_COMPLETED)
    } else {
        None
    }
}

fn user_in_transaction(user_id: &str, transaction: &TransactionSummary) -> bool {
    transaction.seller_id == user_id || transaction.buyer_id.as_deref() == Some(user_id)
}

/// One conversation per transaction where the user is seller or buyer.
/// Transactions without a conversation yet are skipped.
pub fn transaction_conversations(
    user_id: &str,
    transactions: &[TransactionSummary],
) -> Vec<String> {
    let mut out: HashSet<String> = HashSet::new();
    for transaction in transactions {
        if !user_in_transaction(user_id, transaction) {
            continue;
        }
        if let Some(conversation_id) = &transaction.conversation_id {
            out.insert(conversation_id.clone());
        }
    }
    out.into_iter().collect()
}

pub fn transaction_conversations_for_tab(
    user_id: &str,
    transactions: &[TransactionSummary],
    tab: &str,
) -> Vec<String> {
    let in_tab: Vec<TransactionSummary> = transactions
        .iter()
        .filter(|transaction| transaction_tab_for_status(&transaction.status) == Some(tab))
        .cloned()
        .collect();
    transaction_conversations(user_id, &in_tab)
}

/// One conversation per quote where the user is seller or client. Accepted
/// quotes are excluded: their notifications are superseded by the resulting
/// transaction's conversation.
pub fn quote_conversations(user_id: &str, quotes: &[QuoteSummary]) -> Vec<String> {
    let mut out: HashSet<String> = HashSet::new();
    for quote in quotes {
        if quote.seller_id != user_id && quote.client_id != user_id {
            continue;
        }
        if quote.status == QUOTE_STATUS_ACCEPTED {
            continue;
        }
        if let Some(conversation_id) = &quote.conversation_id {
            out.insert(conversation_id.clone());
        }
    }
    out.into_iter().collect()
}

/// Sent = the user authored the quote (seller); received = the user is the
/// quoted client.
pub fn quote_conversations_for_tab(
    user_id: &str,
    quotes: &[QuoteSummary],
    tab: &str,
) -> Vec<String> {
    let in_tab: Vec<QuoteSummary> = quotes
        .iter()
        .filter(|quote| match tab {
            QUOTE_TAB_SENT => quote.seller_id == user_id,
            QUOTE_TAB_RECEIVED => quote.client_id == user_id,
            _ => false,
        })
        .cloned()
        .collect();
    quote_conversations(user_id, &in_tab)
}

fn user_in_dispute(user_id: &str, dispute: &DisputeSummary) -> bool {
    dispute.reporter_id == user_id || dispute.seller_id == user_id || dispute.buyer_id == user_id
}

/// Public dispute threads: disputes not in a terminal resolved state, where
/// the user is the reporter, the transaction's seller, or its buyer.
pub fn dispute_conversations(user_id: &str, disputes: &[DisputeSummary]) -> Vec<String> {
    let mut out: HashSet<String> = HashSet::new();
    for dispute in disputes {
        if is_terminal_dispute_status(&dispute.status) {
            continue;
        }
        if !user_in_dispute(user_id, dispute) {
            continue;
        }
        out.insert(dispute.conversation_id.clone());
    }
    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str, seller: &str, buyer: Option<&str>, status: &str, conv: Option<&str>) -> TransactionSummary {
        TransactionSummary {
            transaction_id: id.to_string(),
            seller_id: seller.to_string(),
            buyer_id: buyer.map(str::to_string),
            status: status.to_string(),
            conversation_id: conv.map(str::to_string),
        }
    }

    fn quote(id: &str, seller: &str, client: &str, status: &str, conv: Option<&str>) -> QuoteSummary {
        QuoteSummary {
            quote_id: id.to_string(),
            seller_id: seller.to_string(),
            client_id: client.to_string(),
            status: status.to_string(),
            conversation_id: conv.map(str::to_string),
        }
    }

    fn dispute(id: &str, reporter: &str, seller: &str, buyer: &str, status: &str) -> DisputeSummary {
        DisputeSummary {
            dispute_id: id.to_string(),
            transaction_id: format!("tx-{id}"),
            reporter_id: reporter.to_string(),
            seller_id: seller.to_string(),
            buyer_id: buyer.to_string(),
            status: status.to_string(),
            conversation_id: format!("conv-{id}"),
        }
    }

    #[test]
    fn empty_entity_list_yields_empty_output() {
        assert!(transaction_conversations("u-1", &[]).is_empty());
        assert!(quote_conversations("u-1", &[]).is_empty());
        assert!(dispute_conversations("u-1", &[]).is_empty());
    }

    #[test]
    fn transactions_without_conversation_are_skipped() {
        let txs = vec![
            tx("t-1", "u-1", Some("u-2"), "pending", Some("c-1")),
            tx("t-2", "u-1", Some("u-2"), "pending", None),
        ];
        let out = transaction_conversations("u-1", &txs);
        assert_eq!(out, vec!["c-1".to_string()]);
    }

    #[test]
    fn transactions_require_participation() {
        let txs = vec![tx("t-1", "u-9", Some("u-8"), "pending", Some("c-1"))];
        assert!(transaction_conversations("u-1", &txs).is_empty());
        assert_eq!(transaction_conversations("u-8", &txs).len(), 1);
    }

    #[test]
    fn transaction_tabs_partition_by_status() {
        let txs = vec![
            tx("t-1", "u-1", Some("u-2"), "pending", Some("c-1")),
            tx("t-2", "u-1", Some("u-2"), "paid", Some("c-2")),
            tx("t-3", "u-1", Some("u-2"), "disputed", Some("c-3")),
            tx("t-4", "u-1", Some("u-2"), "completed", Some("c-4")),
        ];
        assert_eq!(
            transaction_conversations_for_tab("u-1", &txs, TAB_PENDING),
            vec!["c-1".to_string()]
        );
        assert_eq!(
            transaction_conversations_for_tab("u-1", &txs, TAB_BLOCKED),
            vec!["c-2".to_string()]
        );
        assert_eq!(
            transaction_conversations_for_tab("u-1", &txs, TAB_DISPUTED),
            vec!["c-3".to_string()]
        );
        assert_eq!(
            transaction_conversations_for_tab("u-1", &txs, TAB_COMPLETED),
            vec!["c-4".to_string()]
        );
    }

    #[test]
    fn accepted_quotes_are_excluded() {
        let quotes = vec![
            quote("q-1", "u-1", "u-2", "sent", Some("c-1")),
            quote("q-2", "u-1", "u-2", "accepted", Some("c-2")),
        ];
        let out = quote_conversations("u-1", &quotes);
        assert_eq!(out, vec!["c-1".to_string()]);
    }

    #[test]
    fn quote_tabs_split_by_role() {
        let quotes = vec![
            quote("q-1", "u-1", "u-2", "sent", Some("c-1")),
            quote("q-2", "u-3", "u-1", "sent", Some("c-2")),
        ];
        assert_eq!(
            quote_conversations_for_tab("u-1", &quotes, QUOTE_TAB_SENT),
            vec!["c-1".to_string()]
        );
        assert_eq!(
            quote_conversations_for_tab("u-1", &quotes, QUOTE_TAB_RECEIVED),
            vec!["c-2".to_string()]
        );
    }

    #[test]
    fn terminal_disputes_are_excluded() {
        let disputes = vec![
            dispute("d-1", "u-1", "u-1", "u-2", "open"),
            dispute("d-2", "u-1", "u-1", "u-2", "resolved"),
            dispute("d-3", "u-1", "u-1", "u-2", "resolved_refund"),
            dispute("d-4", "u-1", "u-1", "u-2", "resolved_release"),
        ];
        let out = dispute_conversations("u-1", &disputes);
        assert_eq!(out, vec!["conv-d-1".to_string()]);
    }

    #[test]
    fn dispute_membership_covers_reporter_seller_buyer() {
        let disputes = vec![dispute("d-1", "u-3", "u-1", "u-2", "open")];
        assert_eq!(dispute_conversations("u-1", &disputes).len(), 1);
        assert_eq!(dispute_conversations("u-2", &disputes).len(), 1);
        assert_eq!(dispute_conversations("u-3", &disputes).len(), 1);
        assert!(dispute_conversations("u-4", &disputes).is_empty());
    }

    #[test]
    fn duplicate_conversations_are_deduplicated() {
        let txs = vec![
            tx("t-1", "u-1", Some("u-2"), "pending", Some("c-1")),
            tx("t-2", "u-1", Some("u-2"), "pending", Some("c-1")),
        ];
        assert_eq!(transaction_conversations("u-1", &txs).len(), 1);
    }
}
