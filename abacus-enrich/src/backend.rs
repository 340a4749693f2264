//! Injectable inference backends.
//!
//! The enrichment client is a pure function of (request payload) →
//! (validated response) at this boundary; tests substitute scripted
//! backends for the live service.

use serde::{Deserialize, Serialize};

use crate::error::EnrichError;

/// One natural-language inference call: a system contract plus a user
/// payload in, the raw model text out.
#[allow(async_fn_in_trait)]
pub trait InferenceBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String, EnrichError>;
}

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

/// Anthropic messages API backend.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl AnthropicBackend {
    /// `api_key` may be absent; the first call then fails with
    /// [`EnrichError::MissingCredential`] instead of panicking at startup.
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        AnthropicBackend {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
        }
    }
}

impl InferenceBackend for AnthropicBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String, EnrichError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(EnrichError::MissingCredential)?;

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            system: &'a str,
            messages: Vec<Msg<'a>>,
        }

        #[derive(Deserialize)]
        struct Resp {
            content: Vec<Block>,
        }

        #[derive(Deserialize)]
        struct Block {
            #[serde(rename = "type")]
            kind: String,
            text: Option<String>,
        }

        let body = Req {
            model: &self.model,
            max_tokens: 4096,
            system,
            messages: vec![Msg {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::Api { status, body });
        }

        let reply: Resp = response.json().await?;
        let mut text = String::new();
        for block in reply.content {
            if block.kind == "text" {
                if let Some(t) = block.text {
                    text.push_str(&t);
                }
            }
        }
        Ok(text.trim().to_string())
    }
}
