//! JSON-file implementation of the transaction store.
//!
//! The whole document is loaded, mutated in memory, and written back through
//! a temp-file + rename. A batch that fails validation never reaches the
//! file, which is what makes `commit_candidates` all-or-nothing here.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use abacus_core::{
    EnrichmentPatch, Subscription, SubscriptionDraft, Transaction, TransactionStore,
    check_commit_batch,
};

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    transactions: Vec<Transaction>,
    subscriptions: Vec<Subscription>,
    next_subscription_id: i64,
}

impl Default for StoreDocument {
    fn default() -> Self {
        StoreDocument {
            transactions: Vec::new(),
            subscriptions: Vec::new(),
            next_subscription_id: 1,
        }
    }
}

pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// The file is created lazily on the first write.
    pub fn open(path: PathBuf) -> Self {
        JsonStore { path }
    }

    fn load(&self) -> Result<StoreDocument> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", self.path.display()))
    }

    fn save(&self, document: &StoreDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }
}

impl TransactionStore for JsonStore {
    async fn insert_ignoring_conflicts(&self, rows: &[Transaction]) -> Result<Vec<Transaction>> {
        let mut document = self.load()?;
        let mut present: HashSet<String> =
            document.transactions.iter().map(|t| t.id.clone()).collect();
        let mut inserted = Vec::new();
        for row in rows {
            if present.insert(row.id.clone()) {
                document.transactions.push(row.clone());
                inserted.push(row.clone());
            }
        }
        if !inserted.is_empty() {
            self.save(&document)?;
        }
        Ok(inserted)
    }

    async fn apply_enrichment(&self, id: &str, patch: &EnrichmentPatch) -> Result<()> {
        let mut document = self.load()?;
        let Some(transaction) = document.transactions.iter_mut().find(|t| t.id == id) else {
            bail!("no transaction with id {id}");
        };
        transaction.category = Some(patch.category);
        transaction.display_name = Some(patch.display_name.clone());
        transaction.domain = patch.domain.clone();
        if let Some(subscription_id) = patch.subscription_id {
            transaction.subscription_id = Some(subscription_id);
        }
        self.save(&document)
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.load()?.transactions)
    }

    async fn unlinked_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self
            .load()?
            .transactions
            .into_iter()
            .filter(|t| t.subscription_id.is_none())
            .collect())
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        Ok(self.load()?.subscriptions)
    }

    async fn commit_candidates(&self, drafts: &[SubscriptionDraft]) -> Result<Vec<Subscription>> {
        let mut document = self.load()?;
        check_commit_batch(drafts, &document.transactions)?;

        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = document.next_subscription_id;
            document.next_subscription_id += 1;
            let subscription = Subscription {
                id,
                name: draft.name.clone(),
                price: draft.price,
                billing_cycle: draft.billing_cycle,
                subscribed_at: draft.subscribed_at,
                domain: draft.domain.clone(),
            };
            for transaction in document
                .transactions
                .iter_mut()
                .filter(|t| draft.transaction_ids.iter().any(|id| *id == t.id))
            {
                transaction.subscription_id = Some(id);
            }
            document.subscriptions.push(subscription.clone());
            created.push(subscription);
        }
        self.save(&document)?;
        Ok(created)
    }

    async fn remove_subscription(&self, id: i64) -> Result<()> {
        let mut document = self.load()?;
        let before = document.subscriptions.len();
        document.subscriptions.retain(|s| s.id != id);
        if document.subscriptions.len() == before {
            bail!("no subscription with id {id}");
        }
        for transaction in &mut document.transactions {
            if transaction.subscription_id == Some(id) {
                transaction.subscription_id = None;
            }
        }
        self.save(&document)
    }
}
