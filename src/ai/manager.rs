use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::functions::FunctionDefinition;
use crate::infrastructure::error::ReviewError;

/// AI 提供商 trait，定义所有 AI 服务的通用接口
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// 获取提供商名称
    fn name(&self) -> &str;

    /// 发送一次对话请求
    async fn chat(&self, request: &AIRequest) -> Result<AIResponse, ReviewError>;

    /// 检查服务是否可用（凭据是否齐全）
    fn is_available(&self) -> bool;

    /// 获取支持的模型列表
    fn supported_models(&self) -> Vec<String>;
}

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
        }
    }
}

/// 对话消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// 函数调用策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionChoice {
    /// 模型自行决定是否调用
    #[default]
    Auto,
    /// 必须调用提供的函数之一
    Required,
}

/// AI 请求结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIRequest {
    /// 对话消息
    pub messages: Vec<ChatMessage>,

    /// 提供给模型的函数，为空时是普通文本对话
    pub functions: Vec<FunctionDefinition>,

    pub function_choice: FunctionChoice,

    /// 指定使用的模型（可选）
    pub model: Option<String>,

    /// 温度参数（可选）
    pub temperature: Option<f32>,

    /// 最大 token 数（可选）
    pub max_tokens: Option<u32>,
}

impl AIRequest {
    /// 纯文本的审查请求
    pub fn prompt_review(system_prompt: &str, prompt: String) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)],
            functions: Vec::new(),
            function_choice: FunctionChoice::Auto,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// 必须调用 `function` 的审查请求
    pub fn function_review(system_prompt: &str, prompt: String, function: FunctionDefinition) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)],
            functions: vec![function],
            function_choice: FunctionChoice::Required,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// 提供多个函数，由模型选择
    pub fn auto_analysis(system_prompt: &str, prompt: String, functions: Vec<FunctionDefinition>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)],
            functions,
            function_choice: FunctionChoice::Required,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// 合并后的 system 提示词（Gemini 的 system_instruction 只接受一段）
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }
}

/// 模型返回的函数调用，参数已解码为 JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

/// AI 响应结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AIResponse {
    /// 文本内容，只返回函数调用时为 None
    pub content: Option<String>,

    /// 函数调用，按模型返回的顺序
    pub function_calls: Vec<FunctionCall>,

    /// 使用的模型
    pub model: String,

    /// 提供商名称
    pub provider: String,

    /// 响应时间（毫秒）
    pub response_time_ms: u64,

    /// token 使用情况
    pub token_usage: Option<TokenUsage>,

    /// 响应元数据
    pub metadata: HashMap<String, String>,
}

impl AIResponse {
    /// 去除首尾空白后的非空文本
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// 指定名称的第一个函数调用
    pub fn function_call(&self, name: &str) -> Option<&FunctionCall> {
        self.function_calls.iter().find(|call| call.name == name)
    }
}

/// Token 使用情况
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// 输入 token 数
    pub prompt_tokens: u32,

    /// 输出 token 数
    pub completion_tokens: u32,

    /// 总 token 数
    pub total_tokens: u32,
}
