pub mod gemini;
pub mod ollama;
pub mod openai;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::ai::api_error::extract_api_error;
use crate::ai::manager::AIProvider;
use crate::config::providers::ApiFormat;
use crate::config::Config;
use crate::infrastructure::error::ReviewError;

/// 创建共享的 HTTP 客户端
pub fn build_http_client(timeout_secs: u64) -> Result<Arc<reqwest::Client>, ReviewError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| ReviewError::config(format!("Failed to create HTTP client: {e}")))?;
    Ok(Arc::new(client))
}

/// 根据配置创建当前提供商
pub fn create_provider(config: &Config) -> Result<Arc<dyn AIProvider>, ReviewError> {
    let info = config.provider_info()?;
    let client = build_http_client(config.timeout_secs)?;
    let api_key = config.api_key().unwrap_or_default().to_string();
    let endpoint = config.endpoint().ok_or_else(|| {
        ReviewError::config(format!(
            "{} endpoint is required. Please set {}",
            info.display_name,
            info.url_env_var()
        ))
    })?;
    let model = config.effective_model();

    tracing::debug!(
        provider = %info.name,
        endpoint = %endpoint,
        model = %model,
        "creating AI provider"
    );

    let provider: Arc<dyn AIProvider> = match info.api_format {
        ApiFormat::OpenAI => Arc::new(
            OpenAIProvider::new(client, &info.name, api_key, endpoint, model)
                .with_supported_models(info.supported_models.clone())
                .with_timeout(config.timeout_secs),
        ),
        ApiFormat::Azure => {
            let deployment = config
                .azure_deployment
                .clone()
                .filter(|d| !d.is_empty())
                .ok_or_else(|| {
                    ReviewError::config(
                        "Azure OpenAI deployment is required. Please set AZURE_OPENAI_DEPLOYMENT_NAME",
                    )
                })?;
            Arc::new(
                OpenAIProvider::azure(
                    client,
                    api_key,
                    endpoint,
                    deployment,
                    config.azure_api_version.clone(),
                )
                .with_supported_models(info.supported_models.clone())
                .with_timeout(config.timeout_secs),
            )
        }
        ApiFormat::Google => Arc::new(
            GeminiProvider::new(client, api_key, endpoint, model)
                .with_supported_models(info.supported_models.clone())
                .with_timeout(config.timeout_secs),
        ),
        ApiFormat::Ollama => Arc::new(
            OllamaProvider::new(client, endpoint, model)
                .with_supported_models(info.supported_models.clone())
                .with_timeout(config.timeout_secs),
        ),
    };

    Ok(provider)
}

/// 发送请求并读取响应体；非 2xx 转为 `AIService` 错误
pub(crate) async fn send_request(
    provider: &str,
    request: reqwest::RequestBuilder,
    timeout_secs: u64,
) -> Result<String, ReviewError> {
    let operation = format!("{provider} chat request");

    let response = request
        .send()
        .await
        .map_err(|e| ReviewError::from_transport(e, &operation, timeout_secs))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ReviewError::from_transport(e, &operation, timeout_secs))?;

    if !status.is_success() {
        let message = extract_api_error(&body);
        tracing::warn!(provider, status = status.as_u16(), error = %message, "AI service returned an error");
        return Err(ReviewError::ai_service(provider, message, Some(status.as_u16())));
    }

    Ok(body)
}

/// 解析提供商的响应 JSON
pub(crate) fn decode_body<T: DeserializeOwned>(provider: &str, body: &str) -> Result<T, ReviewError> {
    serde_json::from_str(body)
        .map_err(|e| ReviewError::parsing(format!("Failed to parse {provider} response: {e}"), body))
}
