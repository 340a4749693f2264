//! MACC statement parser (vendor XML export).
//!
//! Expected document shape:
//!   <statementDocument>
//!     <transactionList>
//!       <transaction>
//!         <transactionIdentification>2026070100123</transactionIdentification>
//!         <statementType>booked</statementType>
//!         <valueDate>2026-07-01</valueDate>
//!         ...
//!       </transaction>
//!     </transactionList>
//!   </statementDocument>
//!
//! A missing `transactionList` container (or a document that is not
//! well-formed XML) is fatal. A malformed or filtered individual entry is
//! dropped and counted, never fatal.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use roxmltree::{Document, Node};

use abacus_core::{CreditDebitIndicator, Transaction, TransactionSubtype};

use crate::types::ParsedStatement;

/// Only plain cash movements are importable; everything else (securities,
/// reservations, previews) is excluded by the allow-list.
const CASH: &str = "cash";

/// Parse a vendor XML statement into normalized transactions.
pub fn parse_macc_statement(xml: &str) -> Result<ParsedStatement> {
    let document = Document::parse(xml).context("statement is not well-formed XML")?;
    let list = document
        .descendants()
        .find(|node| node.has_tag_name("transactionList"))
        .context("statement has no transactionList container")?;

    let mut transactions = Vec::new();
    let mut skipped = 0;
    for node in transaction_nodes(&list) {
        match read_transaction(&node) {
            Some(transaction) => transactions.push(transaction),
            None => skipped += 1,
        }
    }
    Ok(ParsedStatement {
        transactions,
        skipped,
    })
}

/// The vendor serializes one entry as a single `transaction` element and
/// several entries as repeated siblings. Collecting element children by tag
/// name yields one uniform sequence for both shapes, so no consumer ever
/// branches on cardinality.
fn transaction_nodes<'a, 'input>(
    list: &Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    list.children()
        .filter(|node| node.has_tag_name("transaction"))
}

/// Read one entry. Returns None for entries that are filtered by the
/// allow-list or that fail to parse; the caller counts those as skipped.
fn read_transaction(node: &Node<'_, '_>) -> Option<Transaction> {
    let subtype = TransactionSubtype::from_vendor(child_text(node, "transactionSubtype")?)?;
    if child_text(node, "transactionType")? != CASH {
        return None;
    }
    if child_text(node, "bookingType")? != CASH {
        return None;
    }

    let id = child_text(node, "transactionIdentification")?.to_string();
    let statement_type = child_text(node, "statementType")?.to_string();
    let date = NaiveDate::parse_from_str(child_text(node, "valueDate")?, "%Y-%m-%d").ok()?;
    let account_iban = child_text(node, "accountIdentification")?.to_string();
    let amount = parse_minor_units(child_text(node, "amountInMaccCurrency")?)?;
    let currency = child_text(node, "maccCurrency")?.to_string();
    let indicator = CreditDebitIndicator::from_vendor(child_text(node, "creditDebitIndicator")?)?;
    let details = child_text(node, "transactionAdditionalDetails")?.to_string();

    Some(Transaction {
        id,
        statement_type,
        account_iban,
        currency,
        date,
        transaction_subtype: subtype,
        transaction_additional_details: details,
        amount,
        credit_debit_indicator: indicator,
        signed_amount: indicator.signed(amount),
        category: None,
        display_name: None,
        domain: None,
        subscription_id: None,
    })
}

fn child_text<'a>(node: &Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|child| child.has_tag_name(name))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// Convert a major-unit decimal string ("12.90") to minor units (1290),
/// rounding half-up. Negative or non-numeric amounts are malformed; the sign
/// lives in the credit/debit indicator.
fn parse_minor_units(raw: &str) -> Option<i64> {
    let value: f64 = raw.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * 100.0).round() as i64)
}
