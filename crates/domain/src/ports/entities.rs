use crate::conversation::{DisputeSummary, QuoteSummary, TransactionSummary};
use crate::ports::BoxFuture;
use crate::DomainResult;

/// Parent-entity projections for the category wrappers. Visibility filtering
/// beyond "the user participates" belongs to the persistence layer; the
/// resolver re-applies the client-side mirror of those rules.
pub trait EntityRepository: Send + Sync {
    fn list_transactions_for_user(
        &self,
        user_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<TransactionSummary>>>;

    fn list_quotes_for_user(&self, user_id: &str)
        -> BoxFuture<'_, DomainResult<Vec<QuoteSummary>>>;

    fn list_disputes_for_user(
        &self,
        user_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<DisputeSummary>>>;
}
