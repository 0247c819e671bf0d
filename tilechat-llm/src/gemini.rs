use crate::traits::ChatTransport;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tilechat_common::{ChatError, ChatMessage, ImageRef, Result};
use tilechat_config::GeminiConfig;
use url::Url;

const API_KEY_HEADER: &str = "X-goog-api-key";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

// Every level is optional: a missing field is reported as a malformed
// response rather than a decode error.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}

impl GeminiPart {
    fn image(image: &ImageRef) -> Self {
        GeminiPart::InlineData {
            inline_data: GeminiInlineData {
                mime_type: image.wire_mime_type().to_string(),
                data: image.to_base64(),
            },
        }
    }
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    client: reqwest::Client,
    url: Url,
    api_key: String,
    model: String,
    system_instruction: Option<String>,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl GeminiClient {
    /// Build a client from configuration. Fails on a missing API key, an
    /// unusable endpoint or HTTP client setup.
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ChatError::Config(
                "gemini.api_key is empty; set TILECHAT__GEMINI__API_KEY".into(),
            ));
        }
        let url = generate_content_url(&config.endpoint, &config.model)?;

        let mut builder = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT);
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            system_instruction: config.system_instruction.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// Full request URL, without credentials.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn build_request(&self, message: &ChatMessage) -> GeminiRequest {
        let mut parts = Vec::with_capacity(message.attachments().len() + 1);
        if let Some(text) = message.text() {
            parts.push(GeminiPart::Text {
                text: text.to_string(),
            });
        }
        parts.extend(message.attachments().iter().map(GeminiPart::image));

        let generation_config = if self.temperature.is_some() || self.max_output_tokens.is_some() {
            Some(GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            })
        } else {
            None
        };

        let system_instruction =
            self.system_instruction
                .as_ref()
                .map(|text| GeminiSystemInstruction {
                    parts: vec![GeminiPart::Text { text: text.clone() }],
                });

        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts,
            }],
            generation_config,
            system_instruction,
        }
    }
}

fn generate_content_url(endpoint: &str, model: &str) -> Result<Url> {
    let raw = format!(
        "{}/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model
    );
    Url::parse(&raw).map_err(|e| ChatError::Config(format!("invalid Gemini endpoint {raw}: {e}")))
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
fn extract_reply(body: &str) -> Result<(String, Option<u32>)> {
    let response: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| ChatError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| ChatError::MalformedResponse("no candidates".into()))?;

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        tracing::warn!("Gemini reply blocked by safety filters");
    }

    let text = candidate
        .content
        .as_ref()
        .and_then(|c| c.parts.first())
        .and_then(|p| p.text.as_deref())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ChatError::MalformedResponse("no text in first candidate".into()))?;

    let tokens = response.usage_metadata.and_then(|u| u.total_token_count);
    Ok((text.to_string(), tokens))
}

#[async_trait]
impl ChatTransport for GeminiClient {
    async fn send(&self, message: &ChatMessage) -> Result<String> {
        let request = self.build_request(message);

        tracing::debug!(
            url = %self.url,
            message_id = %message.id(),
            images = message.attachments().len(),
            "sending Gemini request"
        );

        let resp = self
            .client
            .post(self.url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Network {
                status: None,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %error_text, "Gemini API error");

            let message = match status.as_u16() {
                429 => "Rate limit exceeded".to_string(),
                401 => "Invalid API key".to_string(),
                403 => "API access forbidden".to_string(),
                code => format!("HTTP error! status: {}", code),
            };
            return Err(ChatError::Network {
                status: Some(status.as_u16()),
                message,
            });
        }

        let body = resp.text().await.map_err(|e| ChatError::Network {
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;

        let (text, tokens) = extract_reply(&body).inspect_err(|e| {
            tracing::warn!(error = %e, "unexpected Gemini response shape");
        })?;
        tracing::debug!(tokens_used = ?tokens, reply_len = text.len(), "Gemini reply received");
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
