//! Detected subscription candidates and their presentation bands.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::subscription::BillingCycle;

/// A proposed subscription produced by detection, never persisted as-is.
///
/// `confidence` is advisory only: no threshold gates persistence, the human
/// review step is the sole gate. `transaction_ids` lists the payments
/// supporting the proposal and is non-empty whenever `confidence` is above
/// zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedSubscriptionCandidate {
    pub name: String,
    pub subscribed_at: NaiveDate,
    pub price: i64,
    #[serde(default)]
    pub domain: Option<String>,
    pub billing_cycle: BillingCycle,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
    pub transaction_ids: Vec<String>,
}

/// Presentation-only classification of a confidence score.
///
/// Bands never gate which candidates can be selected or committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            ConfidenceBand::High
        } else if score >= 0.6 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        }
    }
}
