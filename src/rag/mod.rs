//! Retrieval-and-generation collaborator interface.
//!
//! The expensive downstream work (vector retrieval, LLM generation) lives
//! outside this service. Handlers talk to it through [`RetrieverGenerator`];
//! production wires the HTTP client in [`client`], integration-test mode the
//! canned [`fixture`] implementation.

use serde::{Deserialize, Serialize};

use crate::store::models::Tier;

pub mod client;
pub mod fixture;

/// Interaction mode the widget is in when a question is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Browse,
    Chat,
}

/// Effective tier for a chat request; anonymous callers have no account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestTier {
    Anonymous,
    Lightweight,
    Full,
    Premium,
}

impl From<Tier> for RequestTier {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Lightweight => RequestTier::Lightweight,
            Tier::Full => RequestTier::Full,
            Tier::Premium => RequestTier::Premium,
        }
    }
}

/// Validated payload handed to the collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub query: String,
    pub mode: ChatMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_text: Option<String>,
    pub tier: RequestTier,
    pub request_id: String,
}

/// One retrieved source backing an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub title: String,
    pub url: String,
    pub excerpt: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerMetadata {
    pub model: String,
    pub tokens_used: u64,
    pub retrieval_time_ms: u64,
    pub generation_time_ms: u64,
    pub total_time_ms: u64,
}

/// A generated answer with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
    pub metadata: AnswerMetadata,
}

/// Collaborator failures the handlers translate into the error envelope.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("generator unavailable: {0}")]
    Unavailable(String),
    #[error("generator timed out")]
    Timeout,
}

#[async_trait::async_trait]
pub trait RetrieverGenerator: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<Answer, GeneratorError>;
}
