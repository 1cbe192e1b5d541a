use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// 提供商配置信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// 提供商名称
    pub name: String,
    /// 显示名称
    pub display_name: String,
    /// 默认 API 基础地址
    pub default_url: String,
    /// 是否需要 API Key
    pub requires_api_key: bool,
    /// 默认模型
    pub default_model: String,
    /// 支持的模型列表
    pub supported_models: Vec<String>,
    /// API 格式类型
    pub api_format: ApiFormat,
    /// 环境变量前缀
    pub env_prefix: String,
    /// 描述
    pub description: String,
}

/// API 格式类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    /// OpenAI 兼容格式 (OpenAI, DeepSeek)
    OpenAI,
    /// Azure OpenAI 部署格式
    Azure,
    /// Google Generative AI 格式 (Gemini)
    Google,
    /// Ollama 格式
    Ollama,
}

/// 提供商配置文件结构
#[derive(Debug, Deserialize)]
struct ProvidersConfig {
    providers: Vec<ProviderInfo>,
}

const CONFIG_PATHS: [&str; 3] = [
    "providers.toml",
    "config/providers.toml",
    "/etc/ai-review/providers.toml",
];

/// 从指定的 TOML 文件加载提供商信息
pub fn load_providers_from_path(path: impl AsRef<Path>) -> anyhow::Result<HashMap<String, ProviderInfo>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let config: ProvidersConfig = toml::from_str(&content)?;
    Ok(config
        .providers
        .into_iter()
        .map(|info| (info.name.clone(), info))
        .collect())
}

/// 从配置文件加载提供商信息，找不到时使用内置配置
fn load_providers_from_config() -> HashMap<String, ProviderInfo> {
    for path in CONFIG_PATHS {
        if !Path::new(path).exists() {
            continue;
        }
        match load_providers_from_path(path) {
            Ok(providers) if !providers.is_empty() => {
                tracing::debug!(path, count = providers.len(), "loaded provider registry");
                return providers;
            }
            Ok(_) => tracing::warn!(path, "provider file has no providers, ignoring"),
            Err(e) => tracing::warn!(path, error = %e, "failed to load provider file"),
        }
    }

    get_default_providers()
}

fn provider(
    name: &str,
    display_name: &str,
    default_url: &str,
    requires_api_key: bool,
    supported_models: &[&str],
    api_format: ApiFormat,
    env_prefix: &str,
    description: &str,
) -> ProviderInfo {
    ProviderInfo {
        name: name.to_string(),
        display_name: display_name.to_string(),
        default_url: default_url.to_string(),
        requires_api_key,
        default_model: supported_models.first().map(|m| m.to_string()).unwrap_or_default(),
        supported_models: supported_models.iter().map(|m| m.to_string()).collect(),
        api_format,
        env_prefix: env_prefix.to_string(),
        description: description.to_string(),
    }
}

/// 获取默认提供商配置（硬编码备份）
fn get_default_providers() -> HashMap<String, ProviderInfo> {
    let providers = vec![
        provider(
            "gemini",
            "Gemini",
            "https://generativelanguage.googleapis.com/v1beta",
            true,
            &["gemini-1.5-flash", "gemini-1.5-pro", "gemini-2.0-flash"],
            ApiFormat::Google,
            "GEMINI",
            "Google Gemini 系列模型，需要 API Key",
        ),
        provider(
            "azure",
            "Azure OpenAI",
            "",
            true,
            &["gpt-4o", "gpt-4o-mini", "gpt-35-turbo"],
            ApiFormat::Azure,
            "AZURE_OPENAI",
            "Azure OpenAI 部署，需要 API Key、endpoint 与部署名",
        ),
        provider(
            "openai",
            "OpenAI",
            "https://api.openai.com/v1",
            true,
            &["gpt-4o-mini", "gpt-4o", "gpt-4-turbo"],
            ApiFormat::OpenAI,
            "OPENAI",
            "OpenAI GPT 系列模型，需要 API Key",
        ),
        provider(
            "deepseek",
            "DeepSeek",
            "https://api.deepseek.com/v1",
            true,
            &["deepseek-chat", "deepseek-coder"],
            ApiFormat::OpenAI,
            "DEEPSEEK",
            "深度求索 AI 服务，OpenAI 兼容接口，需要 API Key",
        ),
        provider(
            "ollama",
            "Ollama",
            "http://localhost:11434",
            false,
            &["qwen2.5-coder:7b", "llama3.1", "mistral"],
            ApiFormat::Ollama,
            "OLLAMA",
            "本地 Ollama 服务，无需 API Key",
        ),
    ];

    providers
        .into_iter()
        .map(|info| (info.name.clone(), info))
        .collect()
}

/// 全局提供商配置映射
pub static PROVIDER_REGISTRY: Lazy<HashMap<String, ProviderInfo>> =
    Lazy::new(load_providers_from_config);

impl ProviderInfo {
    /// 获取 API 地址环境变量名
    pub fn url_env_var(&self) -> String {
        format!("{}_ENDPOINT", self.env_prefix)
    }

    /// 获取 API Key 环境变量名
    pub fn api_key_env_var(&self) -> String {
        format!("{}_API_KEY", self.env_prefix)
    }
}

/// 提供商注册表操作
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// 获取所有已注册的提供商（按名称排序）
    pub fn list_providers() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = PROVIDER_REGISTRY.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// 获取提供商信息
    pub fn get_provider(name: &str) -> Option<&'static ProviderInfo> {
        PROVIDER_REGISTRY.get(name)
    }

    /// 检查提供商是否存在
    pub fn exists(name: &str) -> bool {
        PROVIDER_REGISTRY.contains_key(name)
    }

    /// 获取提供商配置文件路径信息
    pub fn get_config_info() -> String {
        format!(
            "提供商配置将从以下位置按顺序加载：\n\
            1. ./providers.toml (当前目录)\n\
            2. ./config/providers.toml\n\
            3. /etc/ai-review/providers.toml (系统配置)\n\
            4. 内置默认配置 (备用)\n\
            \n\
            当前加载的提供商数量: {}",
            PROVIDER_REGISTRY.len()
        )
    }
}
