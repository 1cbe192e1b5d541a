use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 审查错误类型
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ReviewError {
    #[error("配置错误: {message}")]
    Configuration { message: String },

    #[error("缺少 {provider} 凭据: 请在环境变量或 .env 文件中设置 {env_var}")]
    MissingCredentials { provider: String, env_var: String },

    #[error("AI 服务错误: {provider} - {message}")]
    AIService {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("网络错误: {message}")]
    Network { message: String, url: Option<String> },

    #[error("超时错误: {operation} 超时 ({timeout_seconds}s)")]
    Timeout { operation: String, timeout_seconds: u64 },

    #[error("JSON 解析错误: {message}")]
    Parsing { message: String, raw_response: String },

    #[error("缺少必需字段: {}", fields.join(", "))]
    MissingFields {
        fields: Vec<String>,
        raw_response: Option<String>,
    },

    #[error("函数参数与 schema 不匹配: {function} - {message}")]
    SchemaMismatch { function: String, message: String },

    #[error("未收到有效的函数调用结果: {message}")]
    NoFunctionCall {
        message: String,
        raw_response: Option<String>,
    },

    #[error("验证错误: {message}")]
    Validation { message: String, field: Option<String> },
}

impl ReviewError {
    /// 检查错误是否可重试
    ///
    /// 本 crate 自身不做重试，这里只是给调用方的提示。
    pub fn is_retryable(&self) -> bool {
        match self {
            ReviewError::AIService { status, .. } => {
                matches!(status, Some(429) | Some(500..=599))
            }
            ReviewError::Network { .. } => true,
            ReviewError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReviewError::Configuration { .. } => ErrorCategory::Configuration,
            ReviewError::MissingCredentials { .. } => ErrorCategory::Configuration,
            ReviewError::AIService { .. } => ErrorCategory::ExternalService,
            ReviewError::Network { .. } => ErrorCategory::Network,
            ReviewError::Timeout { .. } => ErrorCategory::Network,
            ReviewError::Parsing { .. } => ErrorCategory::Data,
            ReviewError::MissingFields { .. } => ErrorCategory::Data,
            ReviewError::SchemaMismatch { .. } => ErrorCategory::Data,
            ReviewError::NoFunctionCall { .. } => ErrorCategory::Data,
            ReviewError::Validation { .. } => ErrorCategory::Data,
        }
    }

    /// 模型返回的原始文本（如果错误携带了它）
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            ReviewError::Parsing { raw_response, .. } => Some(raw_response.as_str()),
            ReviewError::MissingFields { raw_response, .. } => raw_response.as_deref(),
            ReviewError::NoFunctionCall { raw_response, .. } => raw_response.as_deref(),
            _ => None,
        }
    }

    /// 是否属于模型输出解析失败
    pub fn is_parsing_failure(&self) -> bool {
        self.category() == ErrorCategory::Data
    }

    /// 创建配置错误
    pub fn config(message: impl Into<String>) -> Self {
        ReviewError::Configuration {
            message: message.into(),
        }
    }

    /// 创建 AI 服务错误
    pub fn ai_service(provider: impl Into<String>, message: impl Into<String>, status: Option<u16>) -> Self {
        ReviewError::AIService {
            provider: provider.into(),
            message: message.into(),
            status,
        }
    }

    /// 创建解析错误
    pub fn parsing(message: impl Into<String>, raw_response: impl Into<String>) -> Self {
        ReviewError::Parsing {
            message: message.into(),
            raw_response: raw_response.into(),
        }
    }

    /// 创建 schema 不匹配错误
    pub fn schema_mismatch(function: impl Into<String>, message: impl Into<String>) -> Self {
        ReviewError::SchemaMismatch {
            function: function.into(),
            message: message.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>, field: Option<String>) -> Self {
        ReviewError::Validation {
            message: message.into(),
            field,
        }
    }

    /// 附加原始响应文本
    pub fn with_raw_response(self, raw: impl Into<String>) -> Self {
        match self {
            ReviewError::MissingFields { fields, .. } => ReviewError::MissingFields {
                fields,
                raw_response: Some(raw.into()),
            },
            ReviewError::NoFunctionCall { message, .. } => ReviewError::NoFunctionCall {
                message,
                raw_response: Some(raw.into()),
            },
            other => other,
        }
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Configuration,
    Network,
    ExternalService,
    Data,
}

impl ReviewError {
    /// 将 HTTP 传输错误映射为网络或超时错误
    pub fn from_transport(error: reqwest::Error, operation: &str, timeout_seconds: u64) -> Self {
        if error.is_timeout() {
            return ReviewError::Timeout {
                operation: operation.to_string(),
                timeout_seconds,
            };
        }
        error.into()
    }
}

impl From<reqwest::Error> for ReviewError {
    fn from(error: reqwest::Error) -> Self {
        let url = error.url().map(redact_url);
        ReviewError::Network {
            message: error.without_url().to_string(),
            url,
        }
    }
}

/// 去掉查询串和片段，错误信息里只保留 scheme、host 与路径
fn redact_url(url: &url::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}
