use thiserror::Error;

/// Failures talking to, or understanding, the inference service.
///
/// A schema or contract violation is [`EnrichError::Contract`], always
/// distinguishable from a transport failure.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("no inference credential configured; set ANTHROPIC_API_KEY or run `abacus setup`")]
    MissingCredential,

    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("inference service returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("inference response violates the enrichment contract: {0}")]
    Contract(String),
}

impl EnrichError {
    /// Stable machine-readable code for callers that render errors.
    pub fn code(&self) -> &'static str {
        match self {
            EnrichError::MissingCredential => "missing_credential",
            EnrichError::Transport(_) => "transport",
            EnrichError::Api { .. } => "api_error",
            EnrichError::Contract(_) => "contract_violation",
        }
    }
}
