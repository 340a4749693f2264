//! abacus-core: domain types and the store contract for the abacus pipeline.

pub mod candidate;
pub mod review;
pub mod store;
pub mod subscription;
pub mod transaction;

pub use candidate::{ConfidenceBand, DetectedSubscriptionCandidate};
pub use review::{CandidateReview, CommitOutcome, ReviewState};
pub use store::{EnrichmentPatch, MemoryStore, TransactionStore, check_commit_batch};
pub use subscription::{BillingCycle, Subscription, SubscriptionDraft, SubscriptionSummary};
pub use transaction::{Category, CreditDebitIndicator, Transaction, TransactionSubtype};
