//! Subscription detection over unlinked transactions.

use anyhow::{Result, anyhow};
use tracing::debug;

use abacus_core::{DetectedSubscriptionCandidate, TransactionStore};

use crate::backend::InferenceBackend;
use crate::client::EnrichmentClient;

/// The two empty outcomes are distinct on purpose: "there was nothing to
/// look at" versus "we looked and found nothing".
#[derive(Debug, PartialEq)]
pub enum DetectionOutcome {
    NothingToAnalyze,
    NoCandidates,
    Candidates(Vec<DetectedSubscriptionCandidate>),
}

pub struct SubscriptionDetector<'a, S, B> {
    store: &'a S,
    client: &'a EnrichmentClient<B>,
}

impl<'a, S: TransactionStore, B: InferenceBackend> SubscriptionDetector<'a, S, B> {
    pub fn new(store: &'a S, client: &'a EnrichmentClient<B>) -> Self {
        SubscriptionDetector { store, client }
    }

    /// Propose subscription candidates from transactions that have no link
    /// yet. Candidates keep the service's order; merging near-duplicates is
    /// the review step's concern, via user selection.
    pub async fn detect(&self) -> Result<DetectionOutcome> {
        let unlinked = self.store.unlinked_transactions().await?;
        if unlinked.is_empty() {
            return Ok(DetectionOutcome::NothingToAnalyze);
        }
        debug!(count = unlinked.len(), "analyzing unlinked transactions");

        let candidates = self.client.detect(&unlinked).await.map_err(|error| {
            anyhow!("subscription detection failed [{}]: {error}", error.code())
        })?;
        if candidates.is_empty() {
            return Ok(DetectionOutcome::NoCandidates);
        }
        Ok(DetectionOutcome::Candidates(candidates))
    }
}
