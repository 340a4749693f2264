//! Human review of detected candidates, and the atomic commit that turns
//! accepted candidates into subscriptions with linked transactions.

use std::collections::BTreeSet;

use anyhow::{Result, bail};

use crate::candidate::DetectedSubscriptionCandidate;
use crate::store::TransactionStore;
use crate::subscription::{Subscription, SubscriptionDraft};

/// Where a review session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    /// Candidates shown, all pre-selected, nothing touched yet.
    Presented,
    /// The user has toggled at least one selection.
    Selecting,
    /// The user asked to commit; selection is frozen.
    Confirming,
    Committed,
    Cancelled,
}

/// What a commit produced.
#[derive(Debug)]
pub enum CommitOutcome {
    /// Empty selection: nothing was written, the store was never touched.
    Nothing,
    Committed(Vec<Subscription>),
}

/// Bounded review session over a fixed candidate list.
///
/// The candidate list is immutable for the session's lifetime; toggling only
/// changes membership of the selection set. Commit inserts one subscription
/// per selected candidate and links its supporting transactions in a single
/// atomic store batch.
pub struct CandidateReview {
    candidates: Vec<DetectedSubscriptionCandidate>,
    selected: BTreeSet<usize>,
    state: ReviewState,
}

impl CandidateReview {
    /// Start a session with every candidate pre-selected.
    pub fn new(candidates: Vec<DetectedSubscriptionCandidate>) -> Self {
        let selected = (0..candidates.len()).collect();
        CandidateReview {
            candidates,
            selected,
            state: ReviewState::Presented,
        }
    }

    pub fn candidates(&self) -> &[DetectedSubscriptionCandidate] {
        &self.candidates
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Toggle one candidate's membership in the selection set.
    pub fn toggle(&mut self, index: usize) -> Result<()> {
        match self.state {
            ReviewState::Presented | ReviewState::Selecting => {}
            other => bail!("cannot change the selection in the {other:?} state"),
        }
        if index >= self.candidates.len() {
            bail!(
                "candidate index {index} out of range (have {})",
                self.candidates.len()
            );
        }
        if !self.selected.remove(&index) {
            self.selected.insert(index);
        }
        self.state = ReviewState::Selecting;
        Ok(())
    }

    /// Freeze the selection ahead of commit.
    pub fn begin_confirm(&mut self) -> Result<()> {
        match self.state {
            ReviewState::Presented | ReviewState::Selecting => {
                self.state = ReviewState::Confirming;
                Ok(())
            }
            other => bail!("cannot confirm from the {other:?} state"),
        }
    }

    /// Abandon the session. Valid from any non-terminal state.
    pub fn cancel(&mut self) -> Result<()> {
        match self.state {
            ReviewState::Committed | ReviewState::Cancelled => {
                bail!("review already finished")
            }
            _ => {
                self.state = ReviewState::Cancelled;
                Ok(())
            }
        }
    }

    /// Persist the selected candidates as one atomic batch.
    ///
    /// An empty selection is a no-op success that never touches the store.
    /// On a store failure the session stays in `Confirming` so the caller
    /// can retry or cancel; nothing partial is ever observable.
    pub async fn commit<S: TransactionStore>(&mut self, store: &S) -> Result<CommitOutcome> {
        if self.state != ReviewState::Confirming {
            bail!("commit requires the Confirming state, session is {:?}", self.state);
        }
        if self.selected.is_empty() {
            self.state = ReviewState::Committed;
            return Ok(CommitOutcome::Nothing);
        }

        let drafts: Vec<SubscriptionDraft> = self
            .selected
            .iter()
            .map(|&index| SubscriptionDraft::from_candidate(&self.candidates[index]))
            .collect();
        let created = store.commit_candidates(&drafts).await?;
        self.state = ReviewState::Committed;
        Ok(CommitOutcome::Committed(created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::subscription::BillingCycle;
    use crate::transaction::{CreditDebitIndicator, Transaction, TransactionSubtype};
    use chrono::NaiveDate;

    fn transaction(id: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            statement_type: "booked".to_string(),
            account_iban: "CH9300762011623852957".to_string(),
            currency: "CHF".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            transaction_subtype: TransactionSubtype::DebitCard,
            transaction_additional_details: "SPOTIFY".to_string(),
            amount: 999,
            credit_debit_indicator: CreditDebitIndicator::Debit,
            signed_amount: -999,
            category: None,
            display_name: None,
            domain: None,
            subscription_id: None,
        }
    }

    fn candidate(name: &str, ids: &[&str]) -> DetectedSubscriptionCandidate {
        DetectedSubscriptionCandidate {
            name: name.to_string(),
            subscribed_at: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            price: 999,
            domain: None,
            billing_cycle: BillingCycle::Monthly,
            confidence: 0.9,
            reasoning: None,
            transaction_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_all_candidates_preselected() {
        let review = CandidateReview::new(vec![candidate("A", &["1"]), candidate("B", &["2"])]);
        assert_eq!(review.state(), ReviewState::Presented);
        assert_eq!(review.selected_count(), 2);
        assert!(review.is_selected(0));
        assert!(review.is_selected(1));
    }

    #[test]
    fn test_toggle_changes_selection_not_candidates() {
        let mut review = CandidateReview::new(vec![candidate("A", &["1"]), candidate("B", &["2"])]);
        review.toggle(0).unwrap();
        assert_eq!(review.state(), ReviewState::Selecting);
        assert!(!review.is_selected(0));
        assert!(review.is_selected(1));
        assert_eq!(review.candidates().len(), 2);

        review.toggle(0).unwrap();
        assert!(review.is_selected(0));
    }

    #[test]
    fn test_toggle_out_of_range() {
        let mut review = CandidateReview::new(vec![candidate("A", &["1"])]);
        assert!(review.toggle(5).is_err());
        assert_eq!(review.state(), ReviewState::Presented);
    }

    #[test]
    fn test_no_toggle_after_confirm_or_cancel() {
        let mut review = CandidateReview::new(vec![candidate("A", &["1"])]);
        review.begin_confirm().unwrap();
        assert!(review.toggle(0).is_err());

        let mut review = CandidateReview::new(vec![candidate("A", &["1"])]);
        review.cancel().unwrap();
        assert!(review.toggle(0).is_err());
        assert!(review.begin_confirm().is_err());
    }

    #[tokio::test]
    async fn test_commit_requires_confirming() {
        let store = MemoryStore::new();
        let mut review = CandidateReview::new(vec![candidate("A", &["1"])]);
        assert!(review.commit(&store).await.is_err());

        review.cancel().unwrap();
        assert!(review.commit(&store).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_selection_commit_is_noop_success() {
        let store = MemoryStore::new();
        store
            .insert_ignoring_conflicts(&[transaction("1")])
            .await
            .unwrap();

        let mut review = CandidateReview::new(vec![candidate("A", &["1"])]);
        review.toggle(0).unwrap();
        review.begin_confirm().unwrap();
        let outcome = review.commit(&store).await.unwrap();
        assert!(matches!(outcome, CommitOutcome::Nothing));
        assert_eq!(review.state(), ReviewState::Committed);
        assert!(store.subscriptions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_links_selected_candidates() {
        let store = MemoryStore::new();
        store
            .insert_ignoring_conflicts(&[transaction("1"), transaction("2"), transaction("3")])
            .await
            .unwrap();

        let mut review = CandidateReview::new(vec![
            candidate("Spotify", &["1", "2"]),
            candidate("Gym", &["3"]),
        ]);
        // Deselect the gym candidate; only Spotify should be committed.
        review.toggle(1).unwrap();
        review.begin_confirm().unwrap();

        let outcome = review.commit(&store).await.unwrap();
        let created = match outcome {
            CommitOutcome::Committed(subscriptions) => subscriptions,
            CommitOutcome::Nothing => panic!("expected a commit"),
        };
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "Spotify");

        let transactions = store.transactions().await.unwrap();
        let linked: Vec<_> = transactions.iter().filter(|t| t.is_linked()).collect();
        assert_eq!(linked.len(), 2);
        assert!(linked.iter().all(|t| t.subscription_id == Some(created[0].id)));
        assert!(
            transactions.iter().find(|t| t.id == "3").unwrap().subscription_id.is_none()
        );
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_store_untouched_and_session_retryable() {
        let store = MemoryStore::new();
        store
            .insert_ignoring_conflicts(&[transaction("1")])
            .await
            .unwrap();

        let mut review = CandidateReview::new(vec![
            candidate("Spotify", &["1"]),
            candidate("Ghost", &["missing"]),
        ]);
        review.begin_confirm().unwrap();

        assert!(review.commit(&store).await.is_err());
        assert_eq!(review.state(), ReviewState::Confirming);
        assert!(store.subscriptions().await.unwrap().is_empty());
        assert!(
            store.transactions().await.unwrap()[0].subscription_id.is_none()
        );
    }
}
