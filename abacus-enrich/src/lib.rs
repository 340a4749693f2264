//! abacus-enrich: AI-assisted enrichment and detection over imported
//! transactions. Holds the inference client, the import pipeline, and the
//! subscription detector.

pub mod backend;
pub mod client;
pub mod detector;
pub mod error;
pub mod import;

pub use backend::{AnthropicBackend, DEFAULT_MODEL, InferenceBackend};
pub use client::{EnrichedTransactionResult, EnrichmentClient};
pub use detector::{DetectionOutcome, SubscriptionDetector};
pub use error::EnrichError;
pub use import::{ImportOutcome, ImportPhase, ImportPipeline, ProgressCallback};
