pub mod providers;

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use crate::config::providers::{ApiFormat, ProviderInfo, ProviderRegistry};
use crate::infrastructure::error::ReviewError;

pub const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: String,
    /// 为空时使用提供商的默认模型
    pub model: String,
    /// 提供商名称 -> API Key
    pub api_keys: HashMap<String, String>,
    /// 提供商名称 -> 自定义 endpoint
    pub endpoints: HashMap<String, String>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: "gemini".to_string(),
            model: String::new(),
            api_keys: HashMap::new(),
            endpoints: HashMap::new(),
            azure_deployment: None,
            azure_api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            temperature: 0.7,
            max_tokens: None,
            timeout_secs: 60,
            debug: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        let mut config = Config::default();

        // 加载 .env 文件
        #[cfg(not(test))]
        config.load_from_env_file();
        // 加载环境变量（覆盖配置文件）
        config.load_from_env();

        config
    }

    pub fn load_from_env_file(&mut self) {
        // 尝试从用户主目录加载
        if let Ok(home) = env::var("HOME") {
            let user_env_path = PathBuf::from(home).join(".ai-review").join(".env");
            if user_env_path.exists() {
                dotenvy::from_path(user_env_path).ok();
            }
        }

        // 尝试从当前目录加载
        dotenvy::dotenv().ok();
    }

    pub fn load_from_env(&mut self) {
        self.load_from(|key| env::var(key).ok());
    }

    /// 从任意键值来源加载配置，环境变量与测试共用这一条路径
    pub fn load_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("AI_REVIEW_PROVIDER") {
            self.provider = provider.trim().to_lowercase();
        }
        if let Some(model) = lookup("AI_REVIEW_MODEL") {
            self.model = model;
        }
        if let Some(value) = lookup("AI_REVIEW_TEMPERATURE") {
            match value.trim().parse() {
                Ok(temperature) => self.temperature = temperature,
                Err(_) => tracing::warn!(value = %value, "ignoring invalid AI_REVIEW_TEMPERATURE"),
            }
        }
        if let Some(value) = lookup("AI_REVIEW_MAX_TOKENS") {
            match value.trim().parse() {
                Ok(max_tokens) => self.max_tokens = Some(max_tokens),
                Err(_) => tracing::warn!(value = %value, "ignoring invalid AI_REVIEW_MAX_TOKENS"),
            }
        }
        if let Some(value) = lookup("AI_REVIEW_TIMEOUT") {
            match value.trim().parse() {
                Ok(timeout) => self.timeout_secs = timeout,
                Err(_) => tracing::warn!(value = %value, "ignoring invalid AI_REVIEW_TIMEOUT"),
            }
        }
        if let Some(value) = lookup("AI_REVIEW_DEBUG") {
            self.debug = matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }

        for name in ProviderRegistry::list_providers() {
            let Some(info) = ProviderRegistry::get_provider(name) else {
                continue;
            };
            if let Some(key) = lookup(&info.api_key_env_var()).filter(|k| !k.trim().is_empty()) {
                self.api_keys.insert(info.name.clone(), key.trim().to_string());
            }
            if let Some(url) = lookup(&info.url_env_var()).filter(|u| !u.trim().is_empty()) {
                self.endpoints.insert(info.name.clone(), url.trim().to_string());
            }
        }

        if let Some(deployment) = lookup("AZURE_OPENAI_DEPLOYMENT_NAME") {
            self.azure_deployment = Some(deployment);
        }
        if let Some(version) = lookup("AZURE_OPENAI_API_VERSION") {
            self.azure_api_version = version;
        }
    }

    pub fn update_from_args(&mut self, args: &crate::cli::args::Args) {
        // 命令行参数优先级最高
        if !args.provider.is_empty() {
            self.provider = args.provider.to_lowercase();
        }
        if !args.model.is_empty() {
            self.model = args.model.clone();
        }
        if let Some(temperature) = args.temperature {
            self.temperature = temperature;
        }
        if args.debug {
            self.debug = true;
        }
    }

    /// 当前提供商的注册信息
    pub fn provider_info(&self) -> Result<&'static ProviderInfo, ReviewError> {
        ProviderRegistry::get_provider(&self.provider).ok_or_else(|| {
            ReviewError::config(format!(
                "Unsupported provider: {} (available: {})",
                self.provider,
                ProviderRegistry::list_providers().join(", ")
            ))
        })
    }

    /// 当前提供商的 API Key
    pub fn api_key(&self) -> Option<&str> {
        self.api_keys.get(&self.provider).map(String::as_str)
    }

    /// 当前提供商的 endpoint，未配置时使用注册表默认值
    pub fn endpoint(&self) -> Option<String> {
        if let Some(url) = self.endpoints.get(&self.provider) {
            return Some(url.clone());
        }
        ProviderRegistry::get_provider(&self.provider)
            .map(|info| info.default_url.clone())
            .filter(|url| !url.is_empty())
    }

    /// 实际使用的模型名
    pub fn effective_model(&self) -> String {
        if !self.model.is_empty() {
            return self.model.clone();
        }
        match self.provider_info() {
            Ok(info) if info.api_format == ApiFormat::Azure => self
                .azure_deployment
                .clone()
                .unwrap_or_else(|| info.default_model.clone()),
            Ok(info) => info.default_model.clone(),
            Err(_) => String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ReviewError> {
        let info = self.provider_info()?;

        if info.requires_api_key && self.api_key().is_none() {
            return Err(ReviewError::MissingCredentials {
                provider: info.display_name.clone(),
                env_var: info.api_key_env_var(),
            });
        }

        if info.api_format == ApiFormat::Azure {
            if self.endpoint().is_none() {
                return Err(ReviewError::config(format!(
                    "Azure OpenAI endpoint is required. Please set {}",
                    info.url_env_var()
                )));
            }
            if self.azure_deployment.as_deref().map_or(true, str::is_empty) {
                return Err(ReviewError::config(
                    "Azure OpenAI deployment is required. Please set AZURE_OPENAI_DEPLOYMENT_NAME",
                ));
            }
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ReviewError::config(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }

        if self.timeout_secs == 0 {
            return Err(ReviewError::config("timeout must be greater than 0"));
        }

        Ok(())
    }
}
