//! Gemini generative AI client (`models/{model}:generateContent`).

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ensure_success, http_client, map_reqwest_error, ServiceError};
use crate::config::GeminiConfig;

const API_KEY_VAR: &str = "GEMINI_API_KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Inline media (base64 payload plus MIME type).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize)]
struct GoogleSearch {}

/// Wire body of a `generateContent` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

/// What to ask the model. Built with the chained setters.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    prompt: String,
    system: Option<String>,
    media: Option<InlineData>,
    json_response: bool,
    google_search: bool,
    speech_voice: Option<String>,
    temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system = Some(instruction.into());
        self
    }

    pub fn media(mut self, media: InlineData) -> Self {
        self.media = Some(media);
        self
    }

    /// Ask for `application/json` output.
    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }

    /// Ground the answer with Google Search.
    pub fn google_search(mut self) -> Self {
        self.google_search = true;
        self
    }

    /// Ask for spoken audio in the given prebuilt voice.
    pub fn speech(mut self, voice: impl Into<String>) -> Self {
        self.speech_voice = Some(voice.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn into_body(self) -> GenerateContentBody {
        let mut parts = vec![Part {
            text: Some(self.prompt),
            inline_data: None,
        }];
        if let Some(media) = self.media {
            parts.push(Part {
                text: None,
                inline_data: Some(media),
            });
        }

        let generation_config = GenerationConfig {
            temperature: self.temperature,
            // Search grounding cannot be combined with a JSON response type.
            response_mime_type: (self.json_response && !self.google_search)
                .then(|| "application/json".to_string()),
            response_modalities: self.speech_voice.as_ref().map(|_| vec!["AUDIO".to_string()]),
            speech_config: self.speech_voice.map(|voice_name| SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig { voice_name },
                },
            }),
        };

        GenerateContentBody {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: self.system.map(|text| Content {
                role: None,
                parts: vec![Part {
                    text: Some(text),
                    inline_data: None,
                }],
            }),
            generation_config: Some(generation_config),
            tools: if self.google_search {
                vec![Tool {
                    google_search: GoogleSearch {},
                }]
            } else {
                Vec::new()
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Response of a `generateContent` call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .into_iter()
            .flat_map(|c| c.parts.iter())
    }

    /// Concatenated text of the first candidate.
    pub fn text(&self) -> Option<String> {
        let text: String = self.parts().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }

    /// First inline media part of the first candidate.
    pub fn inline_data(&self) -> Option<&InlineData> {
        self.parts().find_map(|p| p.inline_data.as_ref())
    }

    fn empty_reason(&self) -> String {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return format!("prompt blocked ({})", reason);
        }
        match self.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            Some(reason) => format!("no content (finish reason {})", reason),
            None => "no candidates returned".to_string(),
        }
    }
}

/// Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    tts_model: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            http: http_client(REQUEST_TIMEOUT)?,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            tts_model: config.tts_model.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send a request to the text/vision model, or to the speech model when
    /// the request asks for audio.
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ServiceError::MissingApiKey(API_KEY_VAR))?;

        let model = if request.speech_voice.is_some() {
            &self.tts_model
        } else {
            &self.model
        };
        let body = request.into_body();

        tracing::debug!(model = %model, "calling gemini");
        let res = self
            .http
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        ensure_success(res)
            .await?
            .json::<GenerateResponse>()
            .await
            .map_err(map_reqwest_error)
    }

    /// Generate and return the text of the first candidate.
    pub async fn generate_text(&self, request: GenerateRequest) -> Result<String, ServiceError> {
        let response = self.generate(request).await?;
        response
            .text()
            .ok_or_else(|| ServiceError::EmptyResponse(response.empty_reason()))
    }

    /// Generate and parse the answer as JSON, tolerating Markdown fences.
    pub async fn generate_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: GenerateRequest,
    ) -> Result<T, ServiceError> {
        let text = self.generate_text(request).await?;
        let json_str = extract_json(&text);

        serde_json::from_str(json_str).map_err(|e| {
            tracing::error!(
                json_error = %e,
                response_preview = %json_str.chars().take(500).collect::<String>(),
                "Failed to parse JSON response from Gemini"
            );
            ServiceError::Serde(format!(
                "{} (response preview: {})",
                e,
                json_str.chars().take(200).collect::<String>()
            ))
        })
    }
}

/// Extract JSON from model text that might be wrapped in a Markdown code block.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        // Skip a language tag on the fence line.
        let content_start = text[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"key": "value"}"#), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_code_block() {
        let input = "Here you go:\n```json\n[{\"title\": \"Flood\"}]\n```";
        assert_eq!(extract_json(input), r#"[{"title": "Flood"}]"#);
    }

    #[test]
    fn test_extract_json_generic_code_block() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(input), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_body_with_media_and_json() {
        let body = GenerateRequest::new("Classify this")
            .system("You are a dispatcher")
            .media(InlineData {
                mime_type: "image/png".to_string(),
                data: "aGVsbG8=".to_string(),
            })
            .json()
            .into_body();

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "Classify this");
        assert_eq!(
            value["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(
            value["systemInstruction"]["parts"][0]["text"],
            "You are a dispatcher"
        );
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_search_grounding_drops_json_mime_type() {
        let value = serde_json::to_value(
            GenerateRequest::new("Find incidents").json().google_search().into_body(),
        )
        .unwrap();
        assert_eq!(value["tools"], json!([{ "googleSearch": {} }]));
        assert!(value["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_speech_body() {
        let value =
            serde_json::to_value(GenerateRequest::new("Hello").speech("Kore").into_body()).unwrap();
        assert_eq!(value["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            value["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Kore"
        );
    }

    #[test]
    fn test_response_accessors() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hello " }, { "text": "world" }] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello world"));
        assert!(response.inline_data().is_none());

        let blocked: GenerateResponse =
            serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } }))
                .unwrap();
        assert!(blocked.text().is_none());
        assert_eq!(blocked.empty_reason(), "prompt blocked (SAFETY)");
    }
}
