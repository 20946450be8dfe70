//! Free-form questions about a named celebrity.

use crate::llm::{ChatClient, ChatMessage, ChatRequest, LlmError, MessageContent, ModelEndpoint};
use crate::prompts::render_qa_prompt;
use crate::types::QA_FALLBACK;

const QA_TEMPERATURE: f64 = 0.5;
const QA_MAX_TOKENS: u32 = 512;

/// Answers questions from the model's own knowledge of a person.
#[derive(Clone)]
pub struct QaEngine {
    client: ChatClient,
}

impl QaEngine {
    pub fn new(endpoint: ModelEndpoint) -> Result<Self, LlmError> {
        Ok(Self {
            client: ChatClient::new(endpoint)?,
        })
    }

    pub fn build_request(&self, name: &str, question: &str) -> ChatRequest {
        ChatRequest {
            model: self.client.endpoint().model.clone(),
            messages: vec![ChatMessage::user(MessageContent::Text(render_qa_prompt(
                name, question,
            )))],
            temperature: QA_TEMPERATURE,
            max_tokens: QA_MAX_TOKENS,
        }
    }

    /// Ask `question` about `name`.
    ///
    /// Only the name goes into the prompt, not the identification profile.
    /// Returns the model text verbatim, or [`QA_FALLBACK`] on any failure.
    pub async fn ask(&self, name: &str, question: &str) -> String {
        let request = self.build_request(name, question);
        match self.client.complete(&request).await {
            Ok(answer) => {
                tracing::info!(name, answer_len = answer.len(), "question answered");
                answer
            }
            Err(e) => {
                tracing::warn!(error = %e, name, "question answering failed; using fallback");
                QA_FALLBACK.to_string()
            }
        }
    }
}
