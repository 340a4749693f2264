//! The durable keyed-record store contract and an in-memory reference
//! implementation.
//!
//! The pipeline consumes storage through [`TransactionStore`]; it never
//! reaches into engine internals. Implementations serialize writes (one
//! in-flight write at a time) and own the atomicity of
//! [`TransactionStore::commit_candidates`], the only multi-statement
//! operation in the system.

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{Result, bail};

use crate::subscription::{Subscription, SubscriptionDraft};
use crate::transaction::{Category, Transaction};

/// Enrichment output applied to one stored transaction.
///
/// `category`, `display_name` and `domain` always overwrite the stored
/// values; `subscription_id` is applied only when present, so re-enrichment
/// never severs an existing link.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentPatch {
    pub category: Category,
    pub display_name: String,
    pub domain: Option<String>,
    pub subscription_id: Option<i64>,
}

#[allow(async_fn_in_trait)]
pub trait TransactionStore {
    /// Bulk-insert rows, ignoring any whose `id` already exists. Returns
    /// exactly the rows that were newly inserted, so re-importing the same
    /// statement yields an empty result rather than duplicates or an error.
    async fn insert_ignoring_conflicts(&self, rows: &[Transaction]) -> Result<Vec<Transaction>>;

    /// Apply an enrichment patch to the transaction with the given id.
    async fn apply_enrichment(&self, id: &str, patch: &EnrichmentPatch) -> Result<()>;

    async fn transactions(&self) -> Result<Vec<Transaction>>;

    /// Transactions with no subscription link yet.
    async fn unlinked_transactions(&self) -> Result<Vec<Transaction>>;

    async fn subscriptions(&self) -> Result<Vec<Subscription>>;

    /// Insert one subscription per draft and link every transaction named in
    /// its `transaction_ids` to the generated id, all as a single atomic
    /// batch: either every draft is persisted and linked, or none are.
    /// Returns the created subscriptions in draft order.
    async fn commit_candidates(&self, drafts: &[SubscriptionDraft]) -> Result<Vec<Subscription>>;

    /// Delete a subscription. Referencing transactions get their
    /// `subscription_id` cleared rather than left dangling.
    async fn remove_subscription(&self, id: i64) -> Result<()>;
}

/// Validate a commit batch against the current transaction set before any
/// mutation. Shared by store implementations so the all-or-nothing contract
/// holds identically everywhere.
pub fn check_commit_batch(drafts: &[SubscriptionDraft], transactions: &[Transaction]) -> Result<()> {
    let known: HashSet<&str> = transactions.iter().map(|t| t.id.as_str()).collect();
    for draft in drafts {
        if draft.name.trim().is_empty() {
            bail!("subscription name must not be empty");
        }
        if draft.price <= 0 {
            bail!("subscription price must be positive, got {}", draft.price);
        }
        for id in &draft.transaction_ids {
            if !known.contains(id.as_str()) {
                bail!("cannot link unknown transaction {id}");
            }
        }
    }
    Ok(())
}

/// Mutex-guarded in-memory store, the reference implementation used by
/// tests across the workspace.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

struct MemoryInner {
    transactions: Vec<Transaction>,
    subscriptions: Vec<Subscription>,
    next_subscription_id: i64,
}

impl Default for MemoryInner {
    fn default() -> Self {
        MemoryInner {
            transactions: Vec::new(),
            subscriptions: Vec::new(),
            next_subscription_id: 1,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl TransactionStore for MemoryStore {
    async fn insert_ignoring_conflicts(&self, rows: &[Transaction]) -> Result<Vec<Transaction>> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let mut present: HashSet<String> =
            inner.transactions.iter().map(|t| t.id.clone()).collect();
        let mut inserted = Vec::new();
        for row in rows {
            if present.insert(row.id.clone()) {
                inner.transactions.push(row.clone());
                inserted.push(row.clone());
            }
        }
        Ok(inserted)
    }

    async fn apply_enrichment(&self, id: &str, patch: &EnrichmentPatch) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let Some(transaction) = inner.transactions.iter_mut().find(|t| t.id == id) else {
            bail!("no transaction with id {id}");
        };
        transaction.category = Some(patch.category);
        transaction.display_name = Some(patch.display_name.clone());
        transaction.domain = patch.domain.clone();
        if let Some(subscription_id) = patch.subscription_id {
            transaction.subscription_id = Some(subscription_id);
        }
        Ok(())
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.transactions.clone())
    }

    async fn unlinked_transactions(&self) -> Result<Vec<Transaction>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .transactions
            .iter()
            .filter(|t| t.subscription_id.is_none())
            .cloned()
            .collect())
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.subscriptions.clone())
    }

    async fn commit_candidates(&self, drafts: &[SubscriptionDraft]) -> Result<Vec<Subscription>> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        // Validate the whole batch before touching anything; a failure here
        // leaves the store byte-for-byte unchanged.
        check_commit_batch(drafts, &inner.transactions)?;

        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = inner.next_subscription_id;
            inner.next_subscription_id += 1;
            let subscription = Subscription {
                id,
                name: draft.name.clone(),
                price: draft.price,
                billing_cycle: draft.billing_cycle,
                subscribed_at: draft.subscribed_at,
                domain: draft.domain.clone(),
            };
            for transaction in inner
                .transactions
                .iter_mut()
                .filter(|t| draft.transaction_ids.iter().any(|id| *id == t.id))
            {
                transaction.subscription_id = Some(id);
            }
            inner.subscriptions.push(subscription.clone());
            created.push(subscription);
        }
        Ok(created)
    }

    async fn remove_subscription(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let before = inner.subscriptions.len();
        inner.subscriptions.retain(|s| s.id != id);
        if inner.subscriptions.len() == before {
            bail!("no subscription with id {id}");
        }
        for transaction in &mut inner.transactions {
            if transaction.subscription_id == Some(id) {
                transaction.subscription_id = None;
            }
        }
        Ok(())
    }
}
