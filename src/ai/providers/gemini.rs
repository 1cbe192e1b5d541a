use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{decode_body, send_request};
use crate::ai::manager::{AIProvider, AIRequest, AIResponse, FunctionCall, FunctionChoice, MessageRole, TokenUsage};
use crate::infrastructure::error::ReviewError;

/// Google Gemini `generateContent` 提供商
pub struct GeminiProvider {
    client: Arc<reqwest::Client>,
    api_key: String,
    base_url: String,
    default_model: String,
    supported_models: Vec<String>,
    timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
    #[serde(rename = "modelVersion")]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl GeminiProvider {
    pub fn new(client: Arc<reqwest::Client>, api_key: String, base_url: String, default_model: String) -> Self {
        Self {
            client,
            api_key,
            base_url,
            default_model,
            supported_models: Vec::new(),
            timeout_secs: 60,
        }
    }

    pub fn with_supported_models(mut self, models: Vec<String>) -> Self {
        self.supported_models = models;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// `{base}/models/{model}:generateContent`，API key 走 `x-goog-api-key` 请求头
    fn endpoint_url(&self, model: &str) -> Result<url::Url, ReviewError> {
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        let raw = format!("{}/{}:generateContent", self.base_url.trim_end_matches('/'), model_path);

        url::Url::parse(&raw).map_err(|e| ReviewError::config(format!("Invalid Gemini endpoint '{raw}': {e}")))
    }

    /// 构建 API 请求体
    fn build_body(request: &AIRequest) -> Value {
        let mut body = Map::new();

        if let Some(system_prompt) = request.system_prompt() {
            body.insert(
                "system_instruction".to_string(),
                json!({"parts": [{"text": system_prompt}]}),
            );
        }

        let contents: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .map(|m| json!({"role": "user", "parts": [{"text": m.content}]}))
            .collect();
        body.insert("contents".to_string(), Value::Array(contents));

        if !request.functions.is_empty() {
            let declarations: Vec<Value> = request
                .functions
                .iter()
                .map(|f| f.to_gemini_declaration())
                .collect();
            body.insert("tools".to_string(), json!([{"functionDeclarations": declarations}]));

            let calling_config = match request.function_choice {
                FunctionChoice::Required => json!({
                    "mode": "ANY",
                    "allowedFunctionNames": request.function_names()
                }),
                FunctionChoice::Auto => json!({"mode": "AUTO"}),
            };
            body.insert(
                "toolConfig".to_string(),
                json!({"functionCallingConfig": calling_config}),
            );
        }

        let mut generation_config = Map::new();
        if let Some(temperature) = request.temperature {
            generation_config.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }
        if !generation_config.is_empty() {
            body.insert("generationConfig".to_string(), Value::Object(generation_config));
        }

        Value::Object(body)
    }
}

#[async_trait]
impl AIProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, request: &AIRequest) -> Result<AIResponse, ReviewError> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let url = self.endpoint_url(model)?;
        let body = Self::build_body(request);
        let start_time = Instant::now();

        tracing::debug!(
            model,
            functions = ?request.function_names(),
            "sending Gemini generateContent request"
        );

        let builder = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let payload = send_request(self.name(), builder, self.timeout_secs).await?;
        let api_response: GeminiResponse = decode_body(self.name(), &payload)?;

        let candidate = api_response.candidates.first().ok_or_else(|| {
            ReviewError::ai_service(self.name(), "No candidates in Gemini response", None)
        })?;

        let texts: Vec<&str> = candidate
            .content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        let function_calls: Vec<FunctionCall> = candidate
            .content
            .parts
            .iter()
            .filter_map(|part| part.function_call.as_ref())
            .map(|call| FunctionCall {
                name: call.name.clone(),
                arguments: call.args.clone().unwrap_or_else(|| json!({})),
            })
            .collect();

        let mut metadata = HashMap::new();
        if let Some(reason) = &candidate.finish_reason {
            metadata.insert("finish_reason".to_string(), reason.clone());
        }

        Ok(AIResponse {
            content: (!texts.is_empty()).then(|| texts.concat()),
            function_calls,
            model: api_response
                .model_version
                .clone()
                .unwrap_or_else(|| model.to_string()),
            provider: self.name().to_string(),
            response_time_ms: start_time.elapsed().as_millis() as u64,
            token_usage: api_response.usage_metadata.as_ref().map(|usage| TokenUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            }),
            metadata,
        })
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn supported_models(&self) -> Vec<String> {
        if self.supported_models.is_empty() {
            vec![self.default_model.clone()]
        } else {
            self.supported_models.clone()
        }
    }
}
