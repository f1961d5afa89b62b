//! Canned generator for integration-test mode.

use super::{Answer, AnswerMetadata, GenerateRequest, GeneratorError, RetrieverGenerator, Source};

/// Deterministic generator used when integration-test mode is on: echoes the
/// query back with one synthetic source so end-to-end suites can assert on
/// the full response shape without a live upstream.
pub struct FixtureGenerator;

#[async_trait::async_trait]
impl RetrieverGenerator for FixtureGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<Answer, GeneratorError> {
        Ok(Answer {
            answer: format!("Fixture answer for: {}", request.query),
            sources: vec![Source {
                id: "fixture-1".to_owned(),
                title: "Fixture Document".to_owned(),
                url: "https://corpus.local/fixture".to_owned(),
                excerpt: "A canned excerpt.".to_owned(),
                score: 0.99,
            }],
            metadata: AnswerMetadata {
                model: "fixture".to_owned(),
                tokens_used: 0,
                retrieval_time_ms: 1,
                generation_time_ms: 1,
                total_time_ms: 2,
            },
        })
    }
}
