use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{decode_body, send_request};
use crate::ai::manager::{AIProvider, AIRequest, AIResponse, FunctionCall, FunctionChoice, TokenUsage};
use crate::ai::result_processor::decode_arguments;
use crate::infrastructure::error::ReviewError;

/// OpenAI 兼容接口的两种部署方式
#[derive(Debug, Clone, PartialEq)]
pub enum OpenAIFlavor {
    /// `{base}/chat/completions` + Bearer token（OpenAI、DeepSeek 等）
    Standard,
    /// Azure OpenAI：按部署名路由，`api-key` 头鉴权
    Azure { deployment: String, api_version: String },
}

/// OpenAI 兼容的 chat completions 提供商
pub struct OpenAIProvider {
    client: Arc<reqwest::Client>,
    name: String,
    api_key: String,
    base_url: String,
    default_model: String,
    supported_models: Vec<String>,
    flavor: OpenAIFlavor,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    id: Option<String>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
    /// 旧版单函数调用
    function_call: Option<WireFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAIProvider {
    pub fn new(
        client: Arc<reqwest::Client>,
        name: &str,
        api_key: String,
        base_url: String,
        default_model: String,
    ) -> Self {
        Self {
            client,
            name: name.to_string(),
            api_key,
            base_url,
            default_model,
            supported_models: Vec::new(),
            flavor: OpenAIFlavor::Standard,
            timeout_secs: 60,
        }
    }

    pub fn azure(
        client: Arc<reqwest::Client>,
        api_key: String,
        endpoint: String,
        deployment: String,
        api_version: String,
    ) -> Self {
        Self {
            client,
            name: "azure".to_string(),
            api_key,
            base_url: endpoint,
            default_model: deployment.clone(),
            supported_models: Vec::new(),
            flavor: OpenAIFlavor::Azure {
                deployment,
                api_version,
            },
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

    pub fn flavor(&self) -> &OpenAIFlavor {
        &self.flavor
    }

    /// chat completions 的完整地址
    fn endpoint_url(&self) -> Result<url::Url, ReviewError> {
        let base = self.base_url.trim_end_matches('/');
        let raw = match &self.flavor {
            OpenAIFlavor::Standard => format!("{base}/chat/completions"),
            OpenAIFlavor::Azure { deployment, .. } => {
                format!("{base}/openai/deployments/{deployment}/chat/completions")
            }
        };

        let mut url = url::Url::parse(&raw)
            .map_err(|e| ReviewError::config(format!("Invalid {} endpoint '{}': {}", self.name, raw, e)))?;
        if let OpenAIFlavor::Azure { api_version, .. } = &self.flavor {
            url.query_pairs_mut().append_pair("api-version", api_version);
        }
        Ok(url)
    }

    fn tool_choice(request: &AIRequest) -> Option<Value> {
        if request.functions.is_empty() {
            return None;
        }
        match (request.function_choice, request.functions.as_slice()) {
            (FunctionChoice::Required, [only]) => Some(json!({
                "type": "function",
                "function": {"name": only.name}
            })),
            (FunctionChoice::Required, _) => Some(json!("required")),
            (FunctionChoice::Auto, _) => Some(json!("auto")),
        }
    }

    /// 构建 API 请求
    fn build_request<'a>(&'a self, request: &'a AIRequest) -> ChatCompletionRequest<'a> {
        // Azure 的模型由部署决定，请求体不带 model
        let model = match self.flavor {
            OpenAIFlavor::Standard => Some(request.model.as_deref().unwrap_or(&self.default_model)),
            OpenAIFlavor::Azure { .. } => None,
        };

        ChatCompletionRequest {
            model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            tools: request.functions.iter().map(|f| f.to_openai_tool()).collect(),
            tool_choice: Self::tool_choice(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    /// 把 tool_calls 与旧版 function_call 统一成 `FunctionCall`
    fn collect_function_calls(message: &ChatResponseMessage) -> Result<Vec<FunctionCall>, ReviewError> {
        let wire_calls = message
            .tool_calls
            .iter()
            .flatten()
            .map(|call| &call.function)
            .chain(message.function_call.iter());

        wire_calls
            .map(|call| -> Result<FunctionCall, ReviewError> {
                Ok(FunctionCall {
                    name: call.name.clone(),
                    arguments: decode_arguments(&call.name, &call.arguments)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: &AIRequest) -> Result<AIResponse, ReviewError> {
        let url = self.endpoint_url()?;
        let body = self.build_request(request);
        let start_time = Instant::now();

        tracing::debug!(
            provider = %self.name,
            url = %url,
            functions = ?request.function_names(),
            "sending chat completion request"
        );

        let http_request = self.client.post(url).json(&body);
        let http_request = match self.flavor {
            OpenAIFlavor::Standard => http_request.bearer_auth(&self.api_key),
            OpenAIFlavor::Azure { .. } => http_request.header("api-key", &self.api_key),
        };

        let payload = send_request(&self.name, http_request, self.timeout_secs).await?;
        let api_response: ChatCompletionResponse = decode_body(&self.name, &payload)?;

        let choice = api_response.choices.first().ok_or_else(|| {
            ReviewError::ai_service(&self.name, "No choices in chat completion response", None)
        })?;
        let function_calls = Self::collect_function_calls(&choice.message)?;

        let mut metadata = HashMap::new();
        if let Some(id) = &api_response.id {
            metadata.insert("request_id".to_string(), id.clone());
        }
        metadata.insert(
            "finish_reason".to_string(),
            choice.finish_reason.clone().unwrap_or_else(|| "unknown".to_string()),
        );

        Ok(AIResponse {
            content: choice.message.content.clone(),
            function_calls,
            model: api_response
                .model
                .clone()
                .unwrap_or_else(|| request.model.clone().unwrap_or_else(|| self.default_model.clone())),
            provider: self.name.clone(),
            response_time_ms: start_time.elapsed().as_millis() as u64,
            token_usage: api_response.usage.map(|usage| TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
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
