//! Celebrity identification through a vision-language model.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::llm::{
    ChatClient, ChatMessage, ChatRequest, ContentPart, ImageUrl, LlmError, MessageContent,
    ModelEndpoint,
};
use crate::prompts::{extract_name, IDENTIFY_PROMPT};
use crate::types::IdentificationResult;

/// Low temperature keeps the model on the labelled format.
const IDENTIFY_TEMPERATURE: f64 = 0.3;
const IDENTIFY_MAX_TOKENS: u32 = 1024;

/// Asks a vision model who is in a photo.
#[derive(Clone)]
pub struct CelebrityIdentifier {
    client: ChatClient,
}

impl CelebrityIdentifier {
    pub fn new(endpoint: ModelEndpoint) -> Result<Self, LlmError> {
        Ok(Self {
            client: ChatClient::new(endpoint)?,
        })
    }

    /// The request sent for `image`: the instruction prompt plus the image
    /// inlined as a JPEG data URI.
    pub fn build_request(&self, image: &[u8]) -> ChatRequest {
        let data_uri = format!("data:image/jpeg;base64,{}", STANDARD.encode(image));
        ChatRequest {
            model: self.client.endpoint().model.clone(),
            messages: vec![ChatMessage::user(MessageContent::Parts(vec![
                ContentPart::Text {
                    text: IDENTIFY_PROMPT.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data_uri },
                },
            ]))],
            temperature: IDENTIFY_TEMPERATURE,
            max_tokens: IDENTIFY_MAX_TOKENS,
        }
    }

    /// Identify the person in `image`.
    ///
    /// Never fails: any transport, status or parse problem yields
    /// [`IdentificationResult::unavailable`]. One attempt, no retries.
    pub async fn identify(&self, image: &[u8]) -> IdentificationResult {
        let request = self.build_request(image);
        match self.client.complete(&request).await {
            Ok(profile_text) => {
                let name = extract_name(&profile_text);
                tracing::info!(name = %name, "identification complete");
                IdentificationResult { profile_text, name }
            }
            Err(e) => {
                tracing::warn!(error = %e, "identification failed; using fallback");
                IdentificationResult::unavailable()
            }
        }
    }
}
