use crate::gateway::{GatewayRequest, Upstream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("completion carried no text")]
    MissingText,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageRef },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageRef {
    pub url: String,
}

impl ChatCompletionRequest {
    /// One user turn: the instruction text followed by a single image.
    pub fn single_image(
        model: impl Into<String>,
        prompt: impl Into<String>,
        image_url: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: vec![
                    ContentPart::Text {
                        text: prompt.into(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageRef {
                            url: image_url.into(),
                        },
                    },
                ],
            }],
            max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions routed through the gateway's `openai_vision` action.
#[derive(Clone)]
pub struct VisionClient {
    upstream: Arc<dyn Upstream>,
}

impl VisionClient {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    /// Returns the trimmed text of the first choice.
    pub async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, LlmError> {
        let payload = serde_json::to_value(request)
            .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;
        let response = self.upstream.forward(GatewayRequest::vision(payload)).await;

        if !response.is_success() {
            return Err(LlmError::Status {
                status: response.status,
                body: response.body,
            });
        }

        let payload: ChatCompletionResponse = response
            .parse_json()
            .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .ok_or(LlmError::MissingText)
    }
}
