//! Enrichment client: the typed contract over the opaque inference call.
//!
//! Transactions and subscriptions are reduced to minimal projections before
//! serialization to bound request size; responses are deserialized into
//! typed shapes and checked against the contract before anything downstream
//! sees them.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use abacus_core::{
    Category, CreditDebitIndicator, DetectedSubscriptionCandidate, Subscription,
    SubscriptionSummary, Transaction, TransactionSubtype,
};

use crate::backend::InferenceBackend;
use crate::error::EnrichError;

const ENRICH_SYSTEM: &str = "You are a bank transaction enrichment service. \
The user message is a JSON object with `transactions` and `subscriptions`. \
Reply with a single JSON object {\"transactions\": [...]} containing exactly \
one entry per input transaction id, each with: id, category (one of \
groceries, dining, transport, shopping, entertainment, health, insurance, \
utilities, housing, travel, salary, fees, subscriptions, other), displayName \
(a clean human-readable merchant name), optionally domain (the merchant's \
web domain), and optionally subscriptionId (only when the transaction is a \
payment for one of the provided subscriptions). No prose, JSON only.";

const DETECT_SYSTEM: &str = "You are a recurring-payment detector. The user \
message is a JSON object with `transactions`. Identify recurring \
subscriptions and reply with a single JSON object {\"subscriptions\": [...]} \
where each entry has: name, subscribedAt (date of the earliest supporting \
payment, YYYY-MM-DD), price (minor currency units, positive), billingCycle \
(weekly, monthly or yearly), optionally domain, confidence (0..1), \
optionally reasoning, and transactionIds (the supporting transaction ids, \
non-empty). No prose, JSON only.";

/// One enrichment result, keyed by transaction id. A valid response carries
/// exactly one entry per submitted id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTransactionResult {
    pub id: String,
    pub category: Category,
    pub display_name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionInput<'a> {
    id: &'a str,
    statement_type: &'a str,
    date: NaiveDate,
    currency: &'a str,
    amount: i64,
    credit_debit_indicator: CreditDebitIndicator,
    signed_amount: i64,
    description: &'a str,
    subtype: TransactionSubtype,
}

impl<'a> From<&'a Transaction> for TransactionInput<'a> {
    fn from(transaction: &'a Transaction) -> Self {
        TransactionInput {
            id: &transaction.id,
            statement_type: &transaction.statement_type,
            date: transaction.date,
            currency: &transaction.currency,
            amount: transaction.amount,
            credit_debit_indicator: transaction.credit_debit_indicator,
            signed_amount: transaction.signed_amount,
            description: &transaction.transaction_additional_details,
            subtype: transaction.transaction_subtype,
        }
    }
}

#[derive(Serialize)]
struct EnrichRequest<'a> {
    transactions: Vec<TransactionInput<'a>>,
    subscriptions: Vec<SubscriptionSummary>,
}

#[derive(Deserialize)]
struct EnrichResponse {
    transactions: Vec<EnrichedTransactionResult>,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    transactions: Vec<TransactionInput<'a>>,
}

#[derive(Deserialize)]
struct DetectResponse {
    subscriptions: Vec<DetectedSubscriptionCandidate>,
}

/// Typed facade over an [`InferenceBackend`].
pub struct EnrichmentClient<B> {
    backend: B,
}

impl<B: InferenceBackend> EnrichmentClient<B> {
    pub fn new(backend: B) -> Self {
        EnrichmentClient { backend }
    }

    /// Categorize, rename and (optionally) subscription-match a batch of
    /// transactions. `subscriptions` is the snapshot of currently known
    /// subscriptions the service may match against.
    pub async fn enrich(
        &self,
        transactions: &[Transaction],
        subscriptions: &[Subscription],
    ) -> Result<Vec<EnrichedTransactionResult>, EnrichError> {
        let request = EnrichRequest {
            transactions: transactions.iter().map(TransactionInput::from).collect(),
            subscriptions: subscriptions.iter().map(SubscriptionSummary::from).collect(),
        };
        let payload = encode(&request)?;
        let raw = self.backend.complete(ENRICH_SYSTEM, &payload).await?;
        let response: EnrichResponse = decode(&raw)?;
        check_exact_cover(transactions, &response.transactions)?;
        Ok(response.transactions)
    }

    /// Propose recurring-subscription candidates for a batch of unlinked
    /// transactions. Candidates come back in service order, unmerged.
    pub async fn detect(
        &self,
        transactions: &[Transaction],
    ) -> Result<Vec<DetectedSubscriptionCandidate>, EnrichError> {
        let request = DetectRequest {
            transactions: transactions.iter().map(TransactionInput::from).collect(),
        };
        let payload = encode(&request)?;
        let raw = self.backend.complete(DETECT_SYSTEM, &payload).await?;
        let response: DetectResponse = decode(&raw)?;
        check_candidates(transactions, &response.subscriptions)?;
        Ok(response.subscriptions)
    }
}

fn encode<T: Serialize>(request: &T) -> Result<String, EnrichError> {
    serde_json::to_string(request)
        .map_err(|error| EnrichError::Contract(format!("failed to encode request: {error}")))
}

fn decode<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, EnrichError> {
    serde_json::from_str(raw)
        .map_err(|error| EnrichError::Contract(format!("malformed JSON reply: {error}")))
}

/// Enrich responses must cover every input id exactly once: equal count, no
/// unknown ids, no duplicates.
fn check_exact_cover(
    inputs: &[Transaction],
    results: &[EnrichedTransactionResult],
) -> Result<(), EnrichError> {
    if results.len() != inputs.len() {
        return Err(EnrichError::Contract(format!(
            "expected {} results, got {}",
            inputs.len(),
            results.len()
        )));
    }
    let expected: HashSet<&str> = inputs.iter().map(|t| t.id.as_str()).collect();
    let mut seen = HashSet::new();
    for result in results {
        if !expected.contains(result.id.as_str()) {
            return Err(EnrichError::Contract(format!(
                "result for unknown transaction {}",
                result.id
            )));
        }
        if !seen.insert(result.id.as_str()) {
            return Err(EnrichError::Contract(format!(
                "duplicate result for transaction {}",
                result.id
            )));
        }
    }
    Ok(())
}

fn check_candidates(
    inputs: &[Transaction],
    candidates: &[DetectedSubscriptionCandidate],
) -> Result<(), EnrichError> {
    let known: HashSet<&str> = inputs.iter().map(|t| t.id.as_str()).collect();
    for candidate in candidates {
        if !(0.0..=1.0).contains(&candidate.confidence) {
            return Err(EnrichError::Contract(format!(
                "confidence {} for '{}' outside [0, 1]",
                candidate.confidence, candidate.name
            )));
        }
        if candidate.confidence > 0.0 && candidate.transaction_ids.is_empty() {
            return Err(EnrichError::Contract(format!(
                "candidate '{}' has confidence {} but no supporting transactions",
                candidate.name, candidate.confidence
            )));
        }
        if candidate.price <= 0 {
            return Err(EnrichError::Contract(format!(
                "candidate '{}' has non-positive price {}",
                candidate.name, candidate.price
            )));
        }
        for id in &candidate.transaction_ids {
            if !known.contains(id.as_str()) {
                return Err(EnrichError::Contract(format!(
                    "candidate '{}' references unknown transaction {id}",
                    candidate.name
                )));
            }
        }
    }
    Ok(())
}
