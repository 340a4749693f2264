//! Subscription types: the persisted agreement and the shapes that feed it.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::candidate::DetectedSubscriptionCandidate;

/// How often a subscription bills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Weekly,
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn label(self) -> &'static str {
        match self {
            BillingCycle::Weekly => "weekly",
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }
}

impl FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(BillingCycle::Weekly),
            "monthly" => Ok(BillingCycle::Monthly),
            "yearly" => Ok(BillingCycle::Yearly),
            other => Err(format!(
                "unknown billing cycle '{other}' (expected weekly, monthly or yearly)"
            )),
        }
    }
}

/// A recurring-payment agreement.
///
/// `id` is assigned by the store at insert time. `price` is minor currency
/// units and always positive. `subscribed_at` is the date of the first known
/// payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub billing_cycle: BillingCycle,
    pub subscribed_at: NaiveDate,
    #[serde(default)]
    pub domain: Option<String>,
}

/// The minimal projection of a subscription sent to the inference service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub billing_cycle: BillingCycle,
}

impl From<&Subscription> for SubscriptionSummary {
    fn from(subscription: &Subscription) -> Self {
        SubscriptionSummary {
            id: subscription.id,
            name: subscription.name.clone(),
            price: subscription.price,
            billing_cycle: subscription.billing_cycle,
        }
    }
}

/// An unsaved subscription plus the transactions to link to it, handed to
/// the store's atomic commit. `transaction_ids` may be empty for a direct
/// user add.
#[derive(Debug, Clone)]
pub struct SubscriptionDraft {
    pub name: String,
    pub price: i64,
    pub billing_cycle: BillingCycle,
    pub subscribed_at: NaiveDate,
    pub domain: Option<String>,
    pub transaction_ids: Vec<String>,
}

impl SubscriptionDraft {
    pub fn from_candidate(candidate: &DetectedSubscriptionCandidate) -> Self {
        SubscriptionDraft {
            name: candidate.name.clone(),
            price: candidate.price,
            billing_cycle: candidate.billing_cycle,
            subscribed_at: candidate.subscribed_at,
            domain: candidate.domain.clone(),
            transaction_ids: candidate.transaction_ids.clone(),
        }
    }
}
