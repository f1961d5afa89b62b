//! HTTP client for the retrieval-and-generation upstream.

use anyhow::{Context, Result};
use reqwest::Client;

use super::{Answer, GenerateRequest, GeneratorError, RetrieverGenerator};

/// Client for the upstream generation service.
#[derive(Debug)]
pub struct UpstreamGenerator {
    client: Client,
    base_url: String,
}

impl UpstreamGenerator {
    /// Create a new client against the given base URL.
    ///
    /// The read timeout stays below the service's own 30s request deadline so
    /// a stalled upstream surfaces as a collaborator timeout, not as the
    /// request boundary firing.
    pub fn new(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("docent/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(std::time::Duration::from_secs(28))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base_url })
    }
}

#[async_trait::async_trait]
impl RetrieverGenerator for UpstreamGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<Answer, GeneratorError> {
        let url = format!("{}/generate", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("X-Request-ID", &request.request_id)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout
                } else {
                    GeneratorError::Unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(GeneratorError::Unavailable(format!(
                "upstream returned {}",
                response.status()
            )));
        }

        response
            .json::<Answer>()
            .await
            .map_err(|e| GeneratorError::Unavailable(format!("invalid upstream response: {e}")))
    }
}
