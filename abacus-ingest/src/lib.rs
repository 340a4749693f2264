//! abacus-ingest: vendor statement ingestion and the bank-specific XML parser.

pub mod parsers;
pub mod types;

pub use parsers::macc_xml::parse_macc_statement;
pub use types::ParsedStatement;
