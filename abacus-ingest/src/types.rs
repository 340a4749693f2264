use abacus_core::Transaction;

/// Normalized output of a statement parser.
///
/// `skipped` counts entries the parser dropped without failing: unknown
/// transaction kinds excluded by the allow-list, and individually malformed
/// entries inside an otherwise well-formed document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatement {
    pub transactions: Vec<Transaction>,
    pub skipped: usize,
}

impl ParsedStatement {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
