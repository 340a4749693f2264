//! The import pipeline: parse → dedup insert → enrich → apply.
//!
//! Stages run strictly in order. Enrichment patches are applied only after
//! every new transaction is durably inserted, so an abort between stages
//! leaves a valid, merely un-enriched store. Enrichment itself is
//! best-effort: any failure there is logged and swallowed, never an import
//! failure.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use abacus_core::{EnrichmentPatch, Transaction, TransactionStore};
use abacus_ingest::parse_macc_statement;

use crate::backend::InferenceBackend;
use crate::client::{EnrichedTransactionResult, EnrichmentClient};

/// Progress stages a caller may render. Delivered in order:
/// `Fetching` → `Enriching` → `Done` (the enriching step is skipped when
/// there is nothing new to enrich).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Fetching,
    Enriching,
    Done,
}

/// Progress callback, invoked once per phase transition.
pub type ProgressCallback = Box<dyn Fn(ImportPhase) + Send + Sync>;

/// What an import run produced. The two empty outcomes are distinct:
/// a statement with no importable rows at all versus a statement whose rows
/// were all previously imported.
#[derive(Debug, PartialEq, Eq)]
pub enum ImportOutcome {
    NoTransactionsInFile,
    NoNewTransactions,
    Imported {
        inserted: usize,
        skipped: usize,
        enriched: bool,
    },
}

pub struct ImportPipeline<'a, S, B> {
    store: &'a S,
    client: &'a EnrichmentClient<B>,
    progress: Option<ProgressCallback>,
}

impl<'a, S: TransactionStore, B: InferenceBackend> ImportPipeline<'a, S, B> {
    pub fn new(store: &'a S, client: &'a EnrichmentClient<B>) -> Self {
        ImportPipeline {
            store,
            client,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn report(&self, phase: ImportPhase) {
        if let Some(callback) = &self.progress {
            callback(phase);
        }
    }

    /// Run one full import of a statement file's contents.
    pub async fn run(&self, xml: &str) -> Result<ImportOutcome> {
        self.report(ImportPhase::Fetching);
        let parsed = parse_macc_statement(xml).context("failed to parse statement file")?;
        if parsed.is_empty() {
            self.report(ImportPhase::Done);
            return Ok(ImportOutcome::NoTransactionsInFile);
        }
        debug!(
            parsed = parsed.transactions.len(),
            skipped = parsed.skipped,
            "statement parsed"
        );

        let inserted = self
            .store
            .insert_ignoring_conflicts(&parsed.transactions)
            .await?;
        if inserted.is_empty() {
            self.report(ImportPhase::Done);
            return Ok(ImportOutcome::NoNewTransactions);
        }

        self.report(ImportPhase::Enriching);
        let subscriptions = self.store.subscriptions().await?;
        let enriched = match self.client.enrich(&inserted, &subscriptions).await {
            Ok(results) => {
                self.apply_results(&inserted, results).await?;
                true
            }
            Err(error) => {
                warn!(
                    code = error.code(),
                    "enrichment failed, keeping transactions un-enriched: {error}"
                );
                false
            }
        };

        self.report(ImportPhase::Done);
        Ok(ImportOutcome::Imported {
            inserted: inserted.len(),
            skipped: parsed.skipped,
            enriched,
        })
    }

    async fn apply_results(
        &self,
        inserted: &[Transaction],
        results: Vec<EnrichedTransactionResult>,
    ) -> Result<()> {
        let details_by_id: HashMap<&str, &str> = inserted
            .iter()
            .map(|t| (t.id.as_str(), t.transaction_additional_details.as_str()))
            .collect();
        for result in results {
            let details = details_by_id.get(result.id.as_str()).copied().unwrap_or("");
            let domain = result
                .domain
                .clone()
                .or_else(|| payment_rail_fallback(details).map(str::to_string));
            let patch = EnrichmentPatch {
                category: result.category,
                display_name: result.display_name.clone(),
                domain,
                subscription_id: result.subscription_id,
            };
            self.store.apply_enrichment(&result.id, &patch).await?;
        }
        Ok(())
    }
}

/// TWINT rows usually carry no merchant host; when the service returns no
/// domain for one, the rail's own domain stands in.
fn payment_rail_fallback(details: &str) -> Option<&'static str> {
    if details.to_uppercase().contains("TWINT") {
        Some("twint.ch")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use abacus_core::MemoryStore;

    use crate::client::EnrichmentClient;
    use crate::error::EnrichError;

    struct Scripted {
        reply: String,
    }

    impl InferenceBackend for Scripted {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, EnrichError> {
            Ok(self.reply.clone())
        }
    }

    struct Offline;

    impl InferenceBackend for Offline {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, EnrichError> {
            Err(EnrichError::MissingCredential)
        }
    }

    fn entry(id: &str, details: &str) -> String {
        format!(
            "<transaction>\
             <transactionIdentification>{id}</transactionIdentification>\
             <statementType>booked</statementType>\
             <valueDate>2026-07-01</valueDate>\
             <accountIdentification>CH9300762011623852957</accountIdentification>\
             <amountInMaccCurrency>12.90</amountInMaccCurrency>\
             <maccCurrency>CHF</maccCurrency>\
             <creditDebitIndicator>debit</creditDebitIndicator>\
             <transactionAdditionalDetails>{details}</transactionAdditionalDetails>\
             <transactionSubtype>DEBIT_CARD</transactionSubtype>\
             <transactionType>cash</transactionType>\
             <bookingType>cash</bookingType>\
             </transaction>"
        )
    }

    fn statement(entries: &[String]) -> String {
        format!(
            "<statementDocument><transactionList>{}</transactionList></statementDocument>",
            entries.concat()
        )
    }

    fn enrich_reply(entries: &[(&str, Option<&str>)]) -> String {
        let results: Vec<String> = entries
            .iter()
            .map(|(id, domain)| {
                let domain = domain
                    .map(|d| format!(r#", "domain": "{d}""#))
                    .unwrap_or_default();
                format!(
                    r#"{{"id": "{id}", "category": "subscriptions", "displayName": "Netflix"{domain}}}"#
                )
            })
            .collect();
        format!(r#"{{"transactions": [{}]}}"#, results.join(","))
    }

    #[tokio::test]
    async fn test_empty_statement_reports_no_transactions() {
        let store = MemoryStore::new();
        let client = EnrichmentClient::new(Offline);
        let pipeline = ImportPipeline::new(&store, &client);
        let outcome = pipeline.run(&statement(&[])).await.unwrap();
        assert_eq!(outcome, ImportOutcome::NoTransactionsInFile);
        assert!(store.transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let store = MemoryStore::new();
        let client = EnrichmentClient::new(Scripted {
            reply: enrich_reply(&[("tx-1", Some("netflix.com")), ("tx-2", None)]),
        });
        let pipeline = ImportPipeline::new(&store, &client);
        let xml = statement(&[entry("tx-1", "NETFLIX.COM"), entry("tx-2", "NETFLIX.COM")]);

        let first = pipeline.run(&xml).await.unwrap();
        assert_eq!(
            first,
            ImportOutcome::Imported {
                inserted: 2,
                skipped: 0,
                enriched: true
            }
        );

        // The second run must insert nothing, and must be distinguishable
        // from the empty-statement outcome.
        let second = pipeline.run(&xml).await.unwrap();
        assert_eq!(second, ImportOutcome::NoNewTransactions);
        assert_eq!(store.transactions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_enrichment_failure_keeps_import_successful() {
        let store = MemoryStore::new();
        let client = EnrichmentClient::new(Offline);
        let pipeline = ImportPipeline::new(&store, &client);
        let xml = statement(&[entry("tx-1", "NETFLIX.COM")]);

        let outcome = pipeline.run(&xml).await.unwrap();
        assert_eq!(
            outcome,
            ImportOutcome::Imported {
                inserted: 1,
                skipped: 0,
                enriched: false
            }
        );

        let stored = &store.transactions().await.unwrap()[0];
        assert_eq!(stored.category, None);
        assert_eq!(stored.display_name, None);
    }

    #[tokio::test]
    async fn test_contract_violation_is_swallowed_like_any_enrichment_failure() {
        let store = MemoryStore::new();
        // Reply covers only one of the two inserted transactions.
        let client = EnrichmentClient::new(Scripted {
            reply: enrich_reply(&[("tx-1", None)]),
        });
        let pipeline = ImportPipeline::new(&store, &client);
        let xml = statement(&[entry("tx-1", "A"), entry("tx-2", "B")]);

        let outcome = pipeline.run(&xml).await.unwrap();
        assert_eq!(
            outcome,
            ImportOutcome::Imported {
                inserted: 2,
                skipped: 0,
                enriched: false
            }
        );
        // No partial application: neither row was patched.
        for transaction in store.transactions().await.unwrap() {
            assert_eq!(transaction.category, None);
        }
    }

    #[tokio::test]
    async fn test_enrichment_applies_patches() {
        let store = MemoryStore::new();
        let client = EnrichmentClient::new(Scripted {
            reply: enrich_reply(&[("tx-1", Some("netflix.com"))]),
        });
        let pipeline = ImportPipeline::new(&store, &client);

        pipeline
            .run(&statement(&[entry("tx-1", "NETFLIX.COM")]))
            .await
            .unwrap();

        let stored = &store.transactions().await.unwrap()[0];
        assert_eq!(stored.category, Some(abacus_core::Category::Subscriptions));
        assert_eq!(stored.display_name.as_deref(), Some("Netflix"));
        assert_eq!(stored.domain.as_deref(), Some("netflix.com"));
        assert_eq!(stored.subscription_id, None);
    }

    #[tokio::test]
    async fn test_twint_domain_fallback() {
        let store = MemoryStore::new();
        let client = EnrichmentClient::new(Scripted {
            reply: enrich_reply(&[("tx-1", None), ("tx-2", None)]),
        });
        let pipeline = ImportPipeline::new(&store, &client);
        let xml = statement(&[
            entry("tx-1", "Debit UBS TWINT Bob"),
            entry("tx-2", "COOP-1234 BASEL"),
        ]);

        pipeline.run(&xml).await.unwrap();

        let transactions = store.transactions().await.unwrap();
        let twint = transactions.iter().find(|t| t.id == "tx-1").unwrap();
        assert_eq!(twint.domain.as_deref(), Some("twint.ch"));
        let coop = transactions.iter().find(|t| t.id == "tx-2").unwrap();
        assert_eq!(coop.domain, None);
    }

    #[tokio::test]
    async fn test_returned_domain_wins_over_fallback() {
        let store = MemoryStore::new();
        let client = EnrichmentClient::new(Scripted {
            reply: enrich_reply(&[("tx-1", Some("merchant.ch"))]),
        });
        let pipeline = ImportPipeline::new(&store, &client);

        pipeline
            .run(&statement(&[entry("tx-1", "TWINT payment")]))
            .await
            .unwrap();

        let stored = &store.transactions().await.unwrap()[0];
        assert_eq!(stored.domain.as_deref(), Some("merchant.ch"));
    }

    #[tokio::test]
    async fn test_progress_phases_in_order() {
        let phases: &'static Mutex<Vec<ImportPhase>> =
            Box::leak(Box::new(Mutex::new(Vec::new())));
        let store = MemoryStore::new();
        let client = EnrichmentClient::new(Scripted {
            reply: enrich_reply(&[("tx-1", None)]),
        });
        let pipeline = ImportPipeline::new(&store, &client).with_progress(Box::new(|phase| {
            phases.lock().unwrap().push(phase);
        }));

        pipeline
            .run(&statement(&[entry("tx-1", "X")]))
            .await
            .unwrap();

        assert_eq!(
            *phases.lock().unwrap(),
            vec![ImportPhase::Fetching, ImportPhase::Enriching, ImportPhase::Done]
        );
    }

    #[tokio::test]
    async fn test_progress_skips_enriching_when_nothing_new() {
        let phases: &'static Mutex<Vec<ImportPhase>> =
            Box::leak(Box::new(Mutex::new(Vec::new())));
        let store = MemoryStore::new();
        let client = EnrichmentClient::new(Offline);
        let xml = statement(&[entry("tx-1", "X")]);

        ImportPipeline::new(&store, &client).run(&xml).await.unwrap();

        let pipeline = ImportPipeline::new(&store, &client).with_progress(Box::new(|phase| {
            phases.lock().unwrap().push(phase);
        }));
        pipeline.run(&xml).await.unwrap();
        assert_eq!(
            *phases.lock().unwrap(),
            vec![ImportPhase::Fetching, ImportPhase::Done]
        );
    }
}
