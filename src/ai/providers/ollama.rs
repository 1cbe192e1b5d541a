use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decode_body, send_request};
use crate::ai::manager::{AIProvider, AIRequest, AIResponse, FunctionCall, TokenUsage};
use crate::ai::result_processor::decode_arguments;
use crate::infrastructure::error::ReviewError;

/// Ollama 本地模型提供商
pub struct OllamaProvider {
    client: Arc<reqwest::Client>,
    base_url: String,
    default_model: String,
    supported_models: Vec<String>,
    timeout_secs: u64,
}

/// Ollama `/api/chat` 请求结构
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Ollama 选项结构
#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    // Ollama 使用 num_predict 而不是 max_tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama `/api/chat` 响应结构
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: Option<String>,
    created_at: Option<String>,
    message: Option<OllamaResponseMessage>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    total_duration: Option<u64>,
    done_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl OllamaProvider {
    pub fn new(client: Arc<reqwest::Client>, base_url: String, default_model: String) -> Self {
        Self {
            client,
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

    /// 构建 API 请求
    fn build_request<'a>(&'a self, request: &'a AIRequest) -> OllamaChatRequest<'a> {
        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        // Ollama 没有 tool_choice，是否调用由模型决定
        OllamaChatRequest {
            model: request.model.as_deref().unwrap_or(&self.default_model),
            messages: request
                .messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: false,
            tools: request.functions.iter().map(|f| f.to_openai_tool()).collect(),
            options,
        }
    }

    /// 参数一般是对象，个别模型会返回 JSON 字符串
    fn to_function_call(call: &OllamaFunctionCall) -> Result<FunctionCall, ReviewError> {
        let arguments = match &call.arguments {
            Value::String(raw) => decode_arguments(&call.name, raw)?,
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other.clone(),
        };
        Ok(FunctionCall {
            name: call.name.clone(),
            arguments,
        })
    }
}

#[async_trait]
impl AIProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, request: &AIRequest) -> Result<AIResponse, ReviewError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let body = self.build_request(request);
        let start_time = Instant::now();

        tracing::debug!(url = %url, model = body.model, "sending Ollama chat request");

        let payload = send_request(self.name(), self.client.post(&url).json(&body), self.timeout_secs).await?;
        let api_response: OllamaChatResponse = decode_body(self.name(), &payload)?;

        let message = api_response.message.as_ref();
        let function_calls = message
            .and_then(|m| m.tool_calls.as_ref())
            .map(|calls| {
                calls
                    .iter()
                    .map(|call| Self::to_function_call(&call.function))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        // 计算 token 使用情况（基于 Ollama 的统计信息）
        let token_usage = if api_response.prompt_eval_count.is_some() || api_response.eval_count.is_some() {
            let prompt_tokens = api_response.prompt_eval_count.unwrap_or(0);
            let completion_tokens = api_response.eval_count.unwrap_or(0);
            Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            })
        } else {
            None
        };

        let mut metadata = HashMap::new();
        if let Some(created_at) = &api_response.created_at {
            metadata.insert("created_at".to_string(), created_at.clone());
        }
        if let Some(total_duration) = api_response.total_duration {
            metadata.insert("total_duration_ns".to_string(), total_duration.to_string());
        }
        if let Some(reason) = &api_response.done_reason {
            metadata.insert("finish_reason".to_string(), reason.clone());
        }

        Ok(AIResponse {
            content: message.map(|m| m.content.clone()),
            function_calls,
            model: api_response.model.clone().unwrap_or_else(|| body.model.to_string()),
            provider: self.name().to_string(),
            response_time_ms: start_time.elapsed().as_millis() as u64,
            token_usage,
            metadata,
        })
    }

    fn is_available(&self) -> bool {
        // 本地服务不需要 API Key，只检查配置
        !self.base_url.is_empty() && !self.default_model.is_empty()
    }

    fn supported_models(&self) -> Vec<String> {
        if self.supported_models.is_empty() {
            vec![self.default_model.clone()]
        } else {
            self.supported_models.clone()
        }
    }
}
