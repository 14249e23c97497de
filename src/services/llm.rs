use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::time::Duration;
use url::Url;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    /// Model selected for every stage. `gpt*` models go to the OpenAI endpoint.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub openai: OpenAIConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    /// Environment variable consulted when no key has been entered.
    #[serde(default = "default_gemini_env_key")]
    pub env_key: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_env_key")]
    pub env_key: String,
    /// Sent instead of the selected model name, for compatible endpoints.
    #[serde(default)]
    pub model: Option<String>,
}

fn default_model() -> String {
    "gemini-3-pro-preview".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_gemini_env_key() -> String {
    "API_KEY".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_env_key() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            timeout_seconds: None,
            gemini: GeminiConfig::default(),
            openai: OpenAIConfig::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            env_key: default_gemini_env_key(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            env_key: default_openai_env_key(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
}

impl Provider {
    pub fn for_model(model: &str) -> Self {
        if model.starts_with("gpt") {
            Provider::OpenAI
        } else {
            Provider::Gemini
        }
    }

    /// Whether a model of this family refuses to run on the default key set.
    pub fn requires_own_credential(&self) -> bool {
        matches!(self, Provider::OpenAI)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => f.write_str("Google Gemini"),
            Provider::OpenAI => f.write_str("OpenAI"),
        }
    }
}

/// One outbound completion. `response_schema` asks for JSON output.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub response_schema: Option<serde_json::Value>,
}

impl GenerationRequest {
    pub fn text(model: &str, prompt: String) -> Self {
        Self {
            model: model.to_string(),
            prompt,
            response_schema: None,
        }
    }

    pub fn json(model: &str, prompt: String, schema: serde_json::Value) -> Self {
        Self {
            model: model.to_string(),
            prompt,
            response_schema: Some(schema),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Builds a client bound to exactly one credential.
pub trait ClientFactory: Send + Sync {
    fn bind(&self, provider: Provider, api_key: &str) -> Box<dyn LlmClient>;
}

pub struct HttpClientFactory {
    config: LlmConfig,
    http: reqwest::Client,
}

impl HttpClientFactory {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Url::parse(&config.gemini.base_url).context("Invalid llm.gemini.base_url")?;
        Url::parse(&config.openai.base_url).context("Invalid llm.openai.base_url")?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            config: config.clone(),
            http: builder.build()?,
        })
    }
}

impl ClientFactory for HttpClientFactory {
    fn bind(&self, provider: Provider, api_key: &str) -> Box<dyn LlmClient> {
        match provider {
            Provider::Gemini => Box::new(GeminiClient::new(
                self.http.clone(),
                api_key,
                &self.config.gemini.base_url,
            )),
            Provider::OpenAI => Box::new(OpenAIClient::new(
                self.http.clone(),
                api_key,
                &self.config.openai.base_url,
                self.config.openai.model.as_deref(),
            )),
        }
    }
}

// --- Gemini ---

struct GeminiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    fn new(client: reqwest::Client, api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize, Debug)]
struct GeminiPartResponse {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

impl GeminiResponse {
    fn into_text(self) -> Result<String> {
        if let Some(err) = self.error {
            return Err(anyhow!("Gemini API returned error: {}", err.message));
        }

        let first = self
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| anyhow!("Gemini response contained no candidates"))?;

        let text: String = first
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
            return Err(anyhow!("Gemini response empty. Finish reason: {}", reason));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: request.response_schema.as_ref().map(|schema| {
                GeminiGenerationConfig {
                    response_mime_type: "application/json".to_string(),
                    response_schema: schema.clone(),
                }
            }),
        };

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            return Err(anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        let response_text = resp.text().await?;
        parse_gemini_body(&response_text)?.into_text()
    }
}

/// The body stays out of the error text; it may echo request content.
fn parse_gemini_body(body: &str) -> Result<GeminiResponse> {
    serde_json::from_str(body).map_err(|e| {
        log::debug!("Unparseable Gemini response body: {}", body);
        anyhow!("Failed to parse Gemini response: {}", e)
    })
}

// --- OpenAI ---

struct OpenAIClient {
    api_key: String,
    base_url: String,
    model_override: Option<String>,
    client: reqwest::Client,
}

impl Debug for OpenAIClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("base_url", &self.base_url)
            .field("model_override", &self.model_override)
            .finish_non_exhaustive()
    }
}

impl OpenAIClient {
    fn new(
        client: reqwest::Client,
        api_key: &str,
        base_url: &str,
        model_override: Option<&str>,
    ) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model_override: model_override.map(str::to_string),
            client,
        }
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

/// JSON mode only guarantees an object, so the schema itself travels in the prompt.
fn openai_prompt(request: &GenerationRequest) -> String {
    match &request.response_schema {
        Some(schema) => format!(
            "{}\n\nRespond only with JSON matching this schema:\n{}",
            request.prompt, schema
        ),
        None => request.prompt.clone(),
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: self
                .model_override
                .clone()
                .unwrap_or_else(|| request.model.clone()),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: openai_prompt(request),
            }],
            response_format: request
                .response_schema
                .as_ref()
                .map(|_| serde_json::json!({ "type": "json_object" })),
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            return Err(anyhow!("OpenAI API error ({}): {}", status, error_text));
        }

        let result: OpenAIResponse = resp.json().await?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("OpenAI response empty or missing content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_for_model() {
        assert_eq!(Provider::for_model("gemini-3-pro-preview"), Provider::Gemini);
        assert_eq!(Provider::for_model("gemini-3-flash-preview"), Provider::Gemini);
        assert_eq!(Provider::for_model("gpt-5.2-auto"), Provider::OpenAI);
        assert!(Provider::OpenAI.requires_own_credential());
        assert!(!Provider::Gemini.requires_own_credential());
    }

    #[test]
    fn test_gemini_request_serializes_schema_config() {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: "hi".to_string(),
                }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: serde_json::json!({ "type": "ARRAY" }),
            }),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(value["generationConfig"]["responseSchema"]["type"], "ARRAY");
    }

    #[test]
    fn test_unparseable_gemini_body_is_not_echoed() {
        let err = parse_gemini_body("<html>quota page for AIzaSECRET</html>").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Failed to parse Gemini response"));
        assert!(!message.contains("AIzaSECRET"));
    }

    #[test]
    fn test_openai_request_sets_json_mode() {
        let body = OpenAIRequest {
            model: "gpt-5.2-auto".to_string(),
            messages: vec![],
            response_format: Some(serde_json::json!({ "type": "json_object" })),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");

        let plain = OpenAIRequest {
            model: "gpt-5.2-auto".to_string(),
            messages: vec![],
            response_format: None,
        };
        let value = serde_json::to_value(&plain).unwrap();
        assert!(value.get("response_format").is_none());
    }

    #[test]
    fn test_gemini_request_omits_config_for_text() {
        let body = GeminiRequest {
            contents: vec![],
            generation_config: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("generationConfig").is_none());
    }

    #[test]
    fn test_gemini_response_parsing_safety_block() {
        let json = r#"{
            "candidates": [
                {
                    "finishReason": "SAFETY",
                    "index": 0
                }
            ]
        }"#;

        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        let err = result.into_text().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_gemini_response_parsing_empty_content() {
        let json = r#"{
            "candidates": [
                {
                    "content": { "role": "model" },
                    "finishReason": "STOP",
                    "index": 0
                }
            ]
        }"#;

        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        let err = result.into_text().unwrap_err();
        assert!(err.to_string().contains("STOP"));
    }

    #[test]
    fn test_gemini_response_parsing_success_joins_parts() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [
                            { "text": "Hello " },
                            { "text": "world" }
                        ],
                        "role": "model"
                    },
                    "finishReason": "STOP",
                    "index": 0
                }
            ]
        }"#;

        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(result.into_text().unwrap(), "Hello world");
    }

    #[test]
    fn test_gemini_error_object_surfaces_message() {
        let json = r#"{ "error": { "code": 429, "message": "Resource has been exhausted" } }"#;
        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        let err = result.into_text().unwrap_err();
        assert!(err.to_string().contains("Resource has been exhausted"));
    }

    #[test]
    fn test_openai_response_parsing_success() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1677652288,
            "model": "gpt-3.5-turbo-0613",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello there, how may I assist you today?"
                },
                "logprobs": null,
                "finish_reason": "stop"
            }]
        }"#;

        let result: OpenAIResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            result.choices[0].message.content.as_deref(),
            Some("Hello there, how may I assist you today?")
        );
    }

    #[test]
    fn test_openai_prompt_carries_schema() {
        let request = GenerationRequest::json(
            "gpt-5.2-auto",
            "List ideas".to_string(),
            serde_json::json!({ "type": "ARRAY" }),
        );
        let prompt = openai_prompt(&request);
        assert!(prompt.starts_with("List ideas"));
        assert!(prompt.contains("\"type\":\"ARRAY\""));

        let plain = GenerationRequest::text("gpt-5.2-auto", "Write".to_string());
        assert_eq!(openai_prompt(&plain), "Write");
    }

    #[test]
    fn test_factory_rejects_invalid_base_url() {
        let mut config = LlmConfig::default();
        config.gemini.base_url = "not a url".to_string();
        assert!(HttpClientFactory::new(&config).is_err());
    }

    #[test]
    fn test_client_debug_hides_key() {
        let factory = HttpClientFactory::new(&LlmConfig::default()).unwrap();
        let client = factory.bind(Provider::Gemini, "AIzaSecretValue1234");
        assert!(!format!("{:?}", client).contains("AIzaSecretValue1234"));
    }
}
